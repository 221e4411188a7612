//! Errors internal to the Game Engine.
//!
//! These represent broken invariants, not user-facing gameplay rejections —
//! a caller hitting one of these means the Room Actor validated something
//! the engine didn't expect. See `zing-server::error` for the client-facing
//! taxonomy (not-your-turn, illegal-card, etc.).

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("card {0} is not in the acting player's hand")]
    CardNotInHand(String),
    #[error("no active turn (round not in progress)")]
    NoActiveTurn,
    #[error("unknown player {0}")]
    UnknownPlayer(String),
    #[error("start requires exactly {expected} player-role members, found {found}")]
    WrongPlayerCount { expected: usize, found: usize },
    #[error("team assignment must cover every player exactly once with 2 per team")]
    InvalidTeamAssignment,
}
