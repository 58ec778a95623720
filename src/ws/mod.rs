//! WebSocket transport

pub mod handler;
pub mod protocol;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;
use uuid::Uuid;

use protocol::ServerMsg;

/// Queue depth of one connection's outbound channel
pub const OUTBOUND_BUFFER: usize = 64;

/// Outbound channel feeding a connection's writer task
pub type Outbound = mpsc::Sender<ServerMsg>;

/// Queue a message for a connection without waiting.
///
/// A full queue drops the message; a closed one means the peer is gone and
/// its disconnect is already on the way.
pub fn deliver(player_id: Uuid, outbound: &Outbound, msg: ServerMsg) -> bool {
    match outbound.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(player_id = %player_id, "Outbound queue full, dropping message");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let id = Uuid::new_v4();
        assert!(deliver(id, &tx, ServerMsg::error("first")));
        assert!(!deliver(id, &tx, ServerMsg::error("second")));
        assert!(matches!(rx.try_recv(), Ok(ServerMsg::Error { message }) if message == "first"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_queue_reports_failure() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert!(!deliver(Uuid::new_v4(), &tx, ServerMsg::error("gone")));
    }
}
