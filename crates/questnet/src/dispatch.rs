//! Consumer side of update propagation: once per tick, flush every area and
//! assemble one frame per connected player.

use std::sync::Arc;

use thiserror::Error;

use crate::codec::{Codec, CodecError, ToRecord};
use crate::packet::{EntityId, PacketKind, SchemaRegistry, UpdateFrame, UpdatePacket};
use crate::world::World;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("connection of player {0} is closed")]
    Closed(EntityId),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Where encoded frames go. Implemented by the network layer.
pub trait PacketSink {
    fn send(&self, player: EntityId, kind: PacketKind, payload: Vec<u8>) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub sent: usize,
    pub bytes: usize,
    /// Frames with nothing new, not sent.
    pub skipped: usize,
    /// Area packets or frames dropped because they could not be encoded.
    pub lost: usize,
    pub closed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("unknown player {0}")]
    UnknownPlayer(EntityId),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

pub struct Dispatcher {
    codec: Codec,
    schemas: Arc<SchemaRegistry>,
}

impl Dispatcher {
    pub fn new(codec: Codec, schemas: Arc<SchemaRegistry>) -> Self {
        Self { codec, schemas }
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Encodes and sends the init frame to a player who just joined.
    pub fn send_init(
        &self,
        world: &World,
        player: EntityId,
        stamp: u32,
        sink: &impl PacketSink,
    ) -> Result<usize, DispatchError> {
        let frame = world
            .init_frame(player, stamp)
            .ok_or(DispatchError::UnknownPlayer(player))?;
        let payload = self
            .codec
            .encode(&frame.to_record(), self.schemas.frame(PacketKind::Init))?;
        let len = payload.len();
        sink.send(player, PacketKind::Init, payload)?;
        Ok(len)
    }

    /// Runs one flush: every area's pending packet is taken, then each
    /// connected player gets the union of the areas around it plus what it
    /// alone is owed.
    pub fn tick(&self, world: &World, stamp: u32, sink: &impl PacketSink) -> TickReport {
        let mut report = TickReport::default();
        let areas: Vec<Option<UpdatePacket>> = world
            .grid()
            .flush()
            .into_iter()
            .enumerate()
            .map(|(aoi, packet)| self.validate(aoi, packet, &mut report))
            .collect();

        let nb_connected = world.nb_connected().min(usize::from(u16::MAX)) as u16;

        for player in world.player_ids() {
            let Some(delivery) = world.take_delivery(player) else {
                continue;
            };

            let mut global = UpdatePacket::new();
            for aoi in world.layout().adjacent(delivery.aoi) {
                if let Some(Some(packet)) = areas.get(aoi as usize) {
                    global.merge(packet);
                }
            }
            world.snapshot_into(&mut global, &delivery.catch_up);
            for &aoi in &delivery.new_aois {
                world.synchronize(&mut global, aoi);
            }
            global.remove_echo(player);
            global.clean();

            let personal = &delivery.personal;
            if global.is_empty() && personal.is_empty() {
                report.skipped += 1;
                continue;
            }

            let frame = UpdateFrame {
                stamp,
                latency: delivery.latency.min(u32::from(u16::MAX)) as u16,
                nb_connected,
                global: (!global.is_empty()).then_some(&global),
                local: (!personal.is_empty()).then_some(personal),
            };
            let payload = match self
                .codec
                .encode(&frame.to_record(), self.schemas.frame(PacketKind::Update))
            {
                Ok(payload) => payload,
                Err(err) => {
                    log::warn!("lost update for player {player}: {err}");
                    report.lost += 1;
                    continue;
                }
            };

            let len = payload.len();
            match sink.send(player, PacketKind::Update, payload) {
                Ok(()) => {
                    report.sent += 1;
                    report.bytes += len;
                }
                Err(SinkError::Closed(_)) => {
                    log::debug!("player {player} disconnected during dispatch");
                    if let Err(err) = world.leave(player) {
                        log::debug!("cleanup of player {player}: {err}");
                    }
                    report.closed += 1;
                }
                Err(err) => {
                    log::warn!("failed to send update to player {player}: {err}");
                    report.lost += 1;
                }
            }
        }

        report
    }

    /// Area packets that fail to encode are dropped whole.
    fn validate(
        &self,
        aoi: usize,
        packet: UpdatePacket,
        report: &mut TickReport,
    ) -> Option<UpdatePacket> {
        if packet.is_empty() {
            return Some(packet);
        }
        match self.codec.encode(&packet.to_record(), self.schemas.update()) {
            Ok(_) => Some(packet),
            Err(err) => {
                log::warn!("lost update of area {aoi}: {err}");
                report.lost += 1;
                None
            }
        }
    }
}
