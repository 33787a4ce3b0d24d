pub mod codec;
pub mod dispatch;
pub mod interest;
pub mod latency;
pub mod packet;
pub mod route;
pub mod world;

pub use codec::{Codec, CodecError, Record, Schema, SchemaError, ToRecord, Value, WireConfig};
pub use dispatch::{DispatchError, Dispatcher, PacketSink, SinkError, TickReport};
pub use interest::{Aoi, AoiGrid, AoiId, GridError, GridLayout, adjacent_aois};
pub use latency::{LATENCY_WINDOW, LatencyEstimator, short_stamp};
pub use packet::{
    Category, EntityId, EntityKey, HpEvent, InitFrame, PacketKind, PersonalUpdatePacket, Property,
    SchemaRegistry, Snapshot, Trim, UpdateFrame, UpdatePacket,
};
pub use route::{Cell, Orientation, Role, Route, RouteError, TrimmedRoute};
pub use world::{ItemInfo, MonsterInfo, PendingDelivery, World, WorldConfig, WorldError};

/// Flush interval, in milliseconds.
pub const DEFAULT_UPDATE_RATE_MS: u64 = 200;
