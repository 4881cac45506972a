//! Typed failures returned by the game handlers

use crate::round::RoundPhase;
use shared::ErrorKind;
use thiserror::Error;

/// Every way a command can be refused.
///
/// Validation variants are raised before any state is touched. The remaining
/// variants are conflicts with the current game state; in both cases the
/// state is left exactly as it was.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("player name must be 1 to {max} characters with no surrounding whitespace")]
    InvalidName { max: usize },

    #[error("year {year} is outside the allowed range {min}..={max}")]
    YearOutOfRange { year: i32, min: i32, max: i32 },

    #[error("round timer must be longer than zero")]
    InvalidTimer,

    #[error("invalid track: {0}")]
    InvalidTrack(String),

    #[error("player '{0}' has already joined")]
    DuplicatePlayer(String),

    #[error("unknown player '{0}'")]
    UnknownPlayer(String),

    #[error("this connection already plays as '{0}'")]
    AlreadyJoined(String),

    #[error("no session with id {0}")]
    UnknownSession(u32),

    #[error("no round is currently collecting guesses")]
    RoundNotActive,

    #[error("cannot {action} while the round is {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: RoundPhase,
    },
}

impl GameError {
    /// Wire-level category sent back to the originating client.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::InvalidName { .. }
            | GameError::YearOutOfRange { .. }
            | GameError::InvalidTimer
            | GameError::InvalidTrack(_) => ErrorKind::Validation,
            GameError::DuplicatePlayer(_) => ErrorKind::DuplicatePlayer,
            GameError::UnknownPlayer(_) => ErrorKind::UnknownPlayer,
            GameError::AlreadyJoined(_) => ErrorKind::AlreadyJoined,
            GameError::UnknownSession(_) => ErrorKind::UnknownSession,
            GameError::RoundNotActive => ErrorKind::RoundNotActive,
            GameError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
        }
    }
}
