//! Spatial partition of the map into areas of interest. Changes are
//! recorded in the area where they happen; observers read the union of the
//! areas around them.

mod aoi;
mod layout;

pub use aoi::Aoi;
pub use layout::{GridError, GridLayout, MAX_AREAS, adjacent_aois};

use glam::UVec2;
use parking_lot::Mutex;

use crate::packet::{EntityKey, UpdatePacket};

pub type AoiId = u32;

/// An entity entering `current`, coming from `previous` or spawning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub key: EntityKey,
    pub previous: Option<AoiId>,
    pub current: AoiId,
}

impl Transition {
    /// Areas `current` brings into view that `previous` did not.
    pub fn revealed(&self, layout: &GridLayout) -> Vec<AoiId> {
        let now = layout.adjacent(self.current);
        match self.previous {
            None => now,
            Some(previous) => {
                let before = layout.adjacent(previous);
                now.into_iter().filter(|id| !before.contains(id)).collect()
            }
        }
    }
}

pub trait TransitionObserver {
    fn on_transition(&mut self, transition: Transition);
}

impl<F: FnMut(Transition)> TransitionObserver for F {
    fn on_transition(&mut self, transition: Transition) {
        self(transition)
    }
}

/// Every area of the map, each behind its own lock so producers in
/// different areas never contend.
#[derive(Debug)]
pub struct AoiGrid {
    layout: GridLayout,
    cells: Vec<Mutex<Aoi>>,
}

impl AoiGrid {
    pub fn new(layout: GridLayout) -> Self {
        let map = layout.map_size();
        let cells = (0..layout.aoi_count())
            .map(|id| {
                let origin = layout.origin(id);
                let size = layout.aoi_size().min(map - origin);
                Mutex::new(Aoi::new(id, origin, size))
            })
            .collect();
        Self { layout, cells }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn with<R>(&self, aoi: AoiId, f: impl FnOnce(&mut Aoi) -> R) -> Option<R> {
        let cell = self.cells.get(aoi as usize)?;
        Some(f(&mut cell.lock()))
    }

    /// Applies `f` to the pending packet of an area.
    pub fn record(&self, aoi: AoiId, f: impl FnOnce(&mut UpdatePacket)) -> bool {
        self.with(aoi, |cell| f(cell.update_packet_mut())).is_some()
    }

    pub fn entities(&self, aoi: AoiId) -> Vec<EntityKey> {
        self.with(aoi, |cell| cell.entities().to_vec())
            .unwrap_or_default()
    }

    /// Places `key` in `current`, takes it out of `previous`, and reports
    /// the move to `observer`.
    pub fn add_entity(
        &self,
        key: EntityKey,
        current: AoiId,
        previous: Option<AoiId>,
        observer: &mut impl TransitionObserver,
    ) -> bool {
        if previous == Some(current) {
            return false;
        }
        if self.with(current, |cell| cell.insert(key)).is_none() {
            log::warn!("no area {current} for {} {}", key.category.as_str(), key.id);
            return false;
        }
        if let Some(previous) = previous {
            let removed = self.delete_entity(key, previous);
            if !removed {
                log::error!(
                    "{} {} was not in area {previous}",
                    key.category.as_str(),
                    key.id
                );
            }
            debug_assert!(removed, "entity moved out of an area it was never in");
        }
        observer.on_transition(Transition {
            key,
            previous,
            current,
        });
        true
    }

    pub fn delete_entity(&self, key: EntityKey, aoi: AoiId) -> bool {
        self.with(aoi, |cell| cell.remove(key)).unwrap_or(false)
    }

    /// Takes every area's pending packet, one lock at a time.
    pub fn flush(&self) -> Vec<UpdatePacket> {
        self.cells.iter().map(|cell| cell.lock().clear()).collect()
    }
}

impl From<GridLayout> for AoiGrid {
    fn from(layout: GridLayout) -> Self {
        Self::new(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Property;

    fn grid() -> AoiGrid {
        AoiGrid::new(GridLayout::new(30, 30, 10, 10).unwrap())
    }

    #[test]
    fn edge_areas_are_clipped() {
        let grid = AoiGrid::new(GridLayout::new(25, 10, 10, 10).unwrap());
        assert_eq!(grid.len(), 3);
        assert_eq!(grid.with(2, |aoi| aoi.size()), Some(UVec2::new(5, 10)));
    }

    #[test]
    fn moving_entity_notifies_observer() {
        let grid = grid();
        let mut seen = Vec::new();
        let key = EntityKey::player(1);

        assert!(grid.add_entity(key, 0, None, &mut |t: Transition| seen.push(t)));
        assert!(grid.add_entity(key, 1, Some(0), &mut |t: Transition| seen.push(t)));
        assert!(!grid.add_entity(key, 1, Some(1), &mut |t: Transition| seen.push(t)));

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].previous, Some(0));
        assert!(grid.entities(0).is_empty());
        assert_eq!(grid.entities(1), [key]);
    }

    #[test]
    fn revealed_areas() {
        let layout = GridLayout::new(30, 30, 10, 10).unwrap();
        let t = Transition {
            key: EntityKey::player(1),
            previous: Some(0),
            current: 1,
        };
        let mut revealed = t.revealed(&layout);
        revealed.sort_unstable();
        assert_eq!(revealed, [2, 5]);
    }

    #[test]
    fn flush_empties_every_area() {
        let grid = grid();
        grid.record(4, |p| {
            p.update_property(EntityKey::monster(2), Property::Alive(true));
        });

        let flushed = grid.flush();
        assert_eq!(flushed.len(), 9);
        assert!(!flushed[4].is_empty());
        assert!(grid.flush().iter().all(UpdatePacket::is_empty));
    }
}
