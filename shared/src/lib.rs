use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_MIN_YEAR: i32 = 1900;
pub const DEFAULT_MAX_YEAR: i32 = 2100;
pub const MAX_NAME_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Heartbeat,
    Join {
        player_name: String,
    },
    Resume {
        player_name: String,
    },
    SubmitGuess {
        year: i32,
        bet: bool,
    },
    SetBet {
        bet: bool,
    },
    StartRound {
        song: SongInfo,
        correct_year: i32,
        timer_secs: Option<u64>,
    },
    LockRound,
    AdvanceRound,
    Disconnect,

    Connected {
        session_id: u32,
    },
    Accepted,
    Rejected {
        error: ErrorKind,
        message: String,
    },
    Event(GameEvent),
    Disconnected {
        reason: String,
    },
}

/// Display metadata for the track being guessed. `uri` doubles as the track id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct SongInfo {
    pub uri: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub player_name: String,
    pub guess: i32,
    pub points_earned: u32,
    pub bet_placed: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub player_name: String,
    pub total_points: u32,
}

/// Events fanned out to every connected session.
///
/// `RoundStarted` deliberately has no slot for the correct year or for any
/// player's guess, so neither can leak before the reveal.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum GameEvent {
    PlayerJoined {
        player_name: String,
        total_players: u32,
    },
    /// `timer_duration` and `started_at` are both in milliseconds.
    RoundStarted {
        round_number: u32,
        song: SongInfo,
        timer_duration: u64,
        started_at: u64,
    },
    GuessSubmitted {
        player_name: String,
        bet_placed: bool,
    },
    BetUpdated {
        player_name: String,
        bet: bool,
    },
    RoundEnded {
        round_number: u32,
        correct_year: i32,
        results: Vec<RoundResult>,
        leaderboard: Vec<LeaderboardEntry>,
    },
}

impl GameEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::PlayerJoined { .. } => "player_joined",
            GameEvent::RoundStarted { .. } => "round_started",
            GameEvent::GuessSubmitted { .. } => "guess_submitted",
            GameEvent::BetUpdated { .. } => "bet_updated",
            GameEvent::RoundEnded { .. } => "round_ended",
        }
    }
}

/// Failure kinds a client can receive in a `Rejected` reply.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    DuplicatePlayer,
    UnknownPlayer,
    RoundNotActive,
    InvalidTransition,
    NotJoined,
    AlreadyJoined,
    UnknownSession,
}

impl ErrorKind {
    /// True for conflicts with current game state, false for malformed input.
    pub fn is_state_conflict(&self) -> bool {
        !matches!(
            self,
            ErrorKind::Validation | ErrorKind::NotJoined | ErrorKind::UnknownSession
        )
    }
}
