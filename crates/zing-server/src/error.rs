//! Client-facing error taxonomy. Distinct from
//! [`zing_core::error::EngineError`], which represents broken engine
//! invariants rather than ordinary gameplay rejections.

use zing_core::protocol::ErrorReason;

/// Abstract error kind — decides whether an error is surfaced to the
/// client or only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    StateConflict,
    Capacity,
    Internal,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("that card is not in your hand")]
    IllegalCard,
    #[error("the room is paused")]
    Paused,
    #[error("your turn already expired")]
    TurnExpired,
    #[error("only the host can do that")]
    NotHost,
    #[error("the host cannot kick themself")]
    KickSelfForbidden,
    #[error("room not found")]
    RoomNotFound,
    #[error("room code did not match")]
    CodeMismatch,
    #[error("invite expired or not found")]
    InviteExpired,
    #[error("invite not found")]
    InviteNotFound,
    #[error("that player is not on your friend list")]
    NotFriends,
    #[error("a game is already in progress")]
    GameInProgress,
    #[error("the game has already started")]
    AlreadyStarted,
    #[error("room is full")]
    RoomFull,
    #[error("wrong number of players for that mode")]
    WrongPlayerCount,
    #[error("invalid team assignment")]
    InvalidTeamAssignment,
    #[error("reconnect token invalid or expired")]
    RejoinInvalid,
    #[error("internal server error")]
    Internal,
}

impl RoomError {
    pub fn kind(&self) -> ErrorKind {
        use RoomError::*;
        match self {
            NotYourTurn | IllegalCard | Paused => ErrorKind::Validation,
            NotHost | KickSelfForbidden | NotFriends => ErrorKind::Authorization,
            RoomNotFound | InviteExpired | InviteNotFound => ErrorKind::NotFound,
            GameInProgress | AlreadyStarted | TurnExpired | CodeMismatch
            | WrongPlayerCount | InvalidTeamAssignment | RejoinInvalid => ErrorKind::StateConflict,
            RoomFull => ErrorKind::Capacity,
            Internal => ErrorKind::Internal,
        }
    }

    pub fn reason(&self) -> ErrorReason {
        use RoomError::*;
        match self {
            NotYourTurn => ErrorReason::NotYourTurn,
            IllegalCard => ErrorReason::IllegalCard,
            Paused => ErrorReason::Paused,
            TurnExpired => ErrorReason::TurnExpired,
            NotHost => ErrorReason::NotHost,
            KickSelfForbidden => ErrorReason::KickSelfForbidden,
            RoomNotFound => ErrorReason::RoomNotFound,
            CodeMismatch => ErrorReason::CodeMismatch,
            InviteExpired => ErrorReason::InviteExpired,
            InviteNotFound => ErrorReason::InviteNotFound,
            NotFriends => ErrorReason::NotFriends,
            GameInProgress => ErrorReason::GameInProgress,
            AlreadyStarted => ErrorReason::AlreadyStarted,
            RoomFull => ErrorReason::RoomFull,
            WrongPlayerCount => ErrorReason::WrongPlayerCount,
            InvalidTeamAssignment => ErrorReason::InvalidTeamAssignment,
            RejoinInvalid => ErrorReason::RejoinInvalid,
            Internal => ErrorReason::ServerError,
        }
    }
}
