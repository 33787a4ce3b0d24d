//! Game-level messages: what changed in an area, what only one player
//! needs to know, and the frames that carry them.

mod delta;
mod frame;
mod personal;
mod schemas;
mod snapshot;
mod update;

pub use delta::{Delta, Property};
pub use frame::{InitFrame, PacketKind, UpdateFrame};
pub use personal::{HpEvent, PersonalUpdatePacket};
pub use schemas::SchemaRegistry;
pub use snapshot::{
    Category, EntityId, EntityKey, ItemSnapshot, MonsterSnapshot, NO_ENTITY, PlayerSnapshot,
    Snapshot, Trim,
};
pub use update::UpdatePacket;
