use glam::UVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::route::Cell;

use super::AoiId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("{0} must be greater than zero")]
    ZeroDimension(&'static str),
    #[error("{0} areas do not fit in 2-byte area ids")]
    TooManyAreas(u64),
}

/// Area ids and counts travel as 2-byte fields.
pub const MAX_AREAS: u64 = 1 << 16;

/// How the map is cut into areas of interest. Areas are numbered row-major
/// from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    map_width: u32,
    map_height: u32,
    aoi_width: u32,
    aoi_height: u32,
}

impl GridLayout {
    pub fn new(
        map_width: u32,
        map_height: u32,
        aoi_width: u32,
        aoi_height: u32,
    ) -> Result<Self, GridError> {
        for (name, value) in [
            ("map width", map_width),
            ("map height", map_height),
            ("area width", aoi_width),
            ("area height", aoi_height),
        ] {
            if value == 0 {
                return Err(GridError::ZeroDimension(name));
            }
        }
        let layout = Self {
            map_width,
            map_height,
            aoi_width,
            aoi_height,
        };
        let count = u64::from(layout.nb_aoi_horizontal()) * u64::from(layout.nb_aoi_vertical());
        if count > MAX_AREAS {
            return Err(GridError::TooManyAreas(count));
        }
        Ok(layout)
    }

    pub fn map_size(&self) -> UVec2 {
        UVec2::new(self.map_width, self.map_height)
    }

    pub fn aoi_size(&self) -> UVec2 {
        UVec2::new(self.aoi_width, self.aoi_height)
    }

    pub fn nb_aoi_horizontal(&self) -> u32 {
        self.map_width.div_ceil(self.aoi_width)
    }

    pub fn nb_aoi_vertical(&self) -> u32 {
        self.map_height.div_ceil(self.aoi_height)
    }

    pub fn aoi_count(&self) -> u32 {
        self.nb_aoi_horizontal() * self.nb_aoi_vertical()
    }

    pub fn last_aoi_id(&self) -> AoiId {
        self.aoi_count() - 1
    }

    /// Area containing `cell`, or `None` off the map.
    pub fn aoi_at(&self, cell: Cell) -> Option<AoiId> {
        if cell.x >= self.map_width || cell.y >= self.map_height {
            return None;
        }
        let col = cell.x / self.aoi_width;
        let row = cell.y / self.aoi_height;
        Some(row * self.nb_aoi_horizontal() + col)
    }

    /// Top-left cell of an area.
    pub fn origin(&self, aoi: AoiId) -> Cell {
        let n = self.nb_aoi_horizontal();
        UVec2::new((aoi % n) * self.aoi_width, (aoi / n) * self.aoi_height)
    }

    pub fn adjacent(&self, aoi: AoiId) -> Vec<AoiId> {
        adjacent_aois(aoi, self.nb_aoi_horizontal(), self.last_aoi_id())
    }
}

/// Ids of `current` and every area touching it, diagonals included.
///
/// An area is on the left edge when its id is a multiple of the row length,
/// on the right edge when the next id is, on the top edge within the first
/// row and on the bottom edge within the last.
pub fn adjacent_aois(current: AoiId, nb_aoi_horizontal: u32, last_aoi_id: AoiId) -> Vec<AoiId> {
    let n = nb_aoi_horizontal;
    let is_at_top = current < n;
    let is_at_bottom = last_aoi_id.checked_sub(n).is_none_or(|edge| current > edge);
    let is_at_left = current % n == 0;
    let is_at_right = (current + 1) % n == 0;

    let mut adjacent = Vec::with_capacity(9);
    adjacent.push(current);
    if !is_at_top {
        adjacent.push(current - n);
    }
    if !is_at_bottom {
        adjacent.push(current + n);
    }
    if !is_at_left {
        adjacent.push(current - 1);
    }
    if !is_at_right {
        adjacent.push(current + 1);
    }
    if !is_at_top && !is_at_left {
        adjacent.push(current - 1 - n);
    }
    if !is_at_top && !is_at_right {
        adjacent.push(current + 1 - n);
    }
    if !is_at_bottom && !is_at_left {
        adjacent.push(current - 1 + n);
    }
    if !is_at_bottom && !is_at_right {
        adjacent.push(current + 1 + n);
    }
    adjacent
}
