use questnet::{EntityId, TickReport};

#[derive(Debug, Clone)]
pub enum ServerEvent {
    PlayerJoined {
        player: EntityId,
        name: String,
    },
    PlayerLeft {
        player: EntityId,
        reason: DisconnectReason,
    },
    Dispatched {
        tick: u64,
        report: TickReport,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum DisconnectReason {
    Graceful,
    ConnectionClosed,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Graceful => "left",
            DisconnectReason::ConnectionClosed => "lost connection",
        }
    }
}
