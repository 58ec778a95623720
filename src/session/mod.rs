//! Room lifecycle: lobby, match start, departures and staleness

pub mod manager;
pub mod room;

pub use manager::RoomManager;

use crate::game::ActionError;

/// Room and routing failures, worded as the client shows them
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Game already in progress")]
    GameInProgress,

    #[error("Room is full")]
    RoomFull,

    #[error("Already in room")]
    AlreadyInRoom,

    #[error("Game already started")]
    GameAlreadyStarted,

    #[error("Need exactly 4 players to start")]
    NotEnoughPlayers,

    #[error("Unknown map")]
    UnknownMap,

    #[error("Game not in progress")]
    GameNotInProgress,

    #[error("Player not in room")]
    NotInRoom,

    #[error(transparent)]
    Action(#[from] ActionError),
}
