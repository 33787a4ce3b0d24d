use crate::codec::{Record, ToRecord};

use super::{PersonalUpdatePacket, PlayerSnapshot, UpdatePacket};

/// Which schema a payload was encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Init,
    Update,
}

impl PacketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketKind::Init => "init",
            PacketKind::Update => "update",
        }
    }
}

/// First message a joining player receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitFrame {
    pub stamp: u32,
    pub nb_connected: u16,
    pub nb_aoi_horizontal: u32,
    pub last_aoi_id: u32,
    pub player: PlayerSnapshot,
}

impl ToRecord for InitFrame {
    fn to_record(&self) -> Record {
        Record::new()
            .with("stamp", self.stamp)
            .with("nbconnected", self.nb_connected)
            .with("nbAOIhorizontal", self.nb_aoi_horizontal)
            .with("lastAOIid", self.last_aoi_id)
            .with("player", self.player.to_record())
    }
}

/// Per-tick message for one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateFrame<'a> {
    pub stamp: u32,
    pub latency: u16,
    pub nb_connected: u16,
    pub global: Option<&'a UpdatePacket>,
    pub local: Option<&'a PersonalUpdatePacket>,
}

impl ToRecord for UpdateFrame<'_> {
    fn to_record(&self) -> Record {
        Record::new()
            .with("stamp", self.stamp)
            .with("latency", self.latency)
            .with("nbconnected", self.nb_connected)
            .with_opt("global", self.global.map(ToRecord::to_record))
            .with_opt("local", self.local.map(ToRecord::to_record))
    }
}
