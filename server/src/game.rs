//! Game orchestrator
//!
//! `Game` is the single owner of all mutable game state. Every command
//! handler follows the same shape: validate the input, apply the mutation
//! through the roster or round machine, then build the resulting event and
//! hand it to the session hub. The typed result is returned to the caller
//! separately from the broadcast.
//!
//! Handlers never leave partial state behind: every check that can fail runs
//! before the first mutation.

use crate::config::GameConfig;
use crate::error::GameError;
use crate::history::SongHistory;
use crate::roster::Roster;
use crate::round::{RoundMachine, RoundOutcome, RoundPhase};
use crate::session_hub::SessionHub;
use crate::utils::get_timestamp;
use log::{debug, error, info};
use shared::{GameEvent, LeaderboardEntry, SongInfo, MAX_NAME_LEN};
use std::time::Duration;

/// Source of wall-clock milliseconds
pub type Clock = Box<dyn Fn() -> u64 + Send + Sync>;

/// Everything the orchestrator mutates
#[derive(Debug)]
pub struct GameState {
    pub config: GameConfig,
    pub roster: Roster,
    pub history: SongHistory,
    pub rounds: RoundMachine,
}

impl GameState {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            roster: Roster::new(),
            history: SongHistory::new(),
            rounds: RoundMachine::new(),
        }
    }
}

/// Returned by `start_round` so the caller can arm the round timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTicket {
    pub round_number: u32,
    pub timer_duration: Duration,
}

pub struct Game {
    state: GameState,
    sessions: SessionHub,
    clock: Clock,
}

impl Game {
    pub fn new(config: GameConfig) -> Self {
        Self::with_clock(config, Box::new(get_timestamp))
    }

    pub fn with_clock(config: GameConfig, clock: Clock) -> Self {
        let sessions = SessionHub::new(config.max_sessions);
        Self {
            state: GameState::new(config),
            sessions,
            clock,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn sessions(&self) -> &SessionHub {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut SessionHub {
        &mut self.sessions
    }

    pub fn phase(&self) -> RoundPhase {
        self.state.rounds.phase()
    }

    pub fn current_round_number(&self) -> Option<u32> {
        self.state.rounds.current().map(|round| round.round_number)
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.state.roster.snapshot()
    }

    /// Lets the track-selection side skip songs that were already played.
    pub fn has_played(&self, track_id: &str) -> bool {
        self.state.history.has(track_id)
    }

    /// Adds a player and announces them. Returns the new player count.
    pub fn join(&mut self, name: &str) -> Result<u32, GameError> {
        validate_name(name)?;
        self.state.roster.add(name)?;

        let total_players = self.state.roster.len() as u32;
        self.sessions.broadcast(&GameEvent::PlayerJoined {
            player_name: name.to_string(),
            total_players,
        });
        Ok(total_players)
    }

    /// Records a guess for the current round. The latest submission wins.
    pub fn submit_guess(&mut self, name: &str, year: i32, bet: bool) -> Result<(), GameError> {
        self.validate_year(year)?;
        self.expire_round_if_due();

        let now = (self.clock)();
        let state = &mut self.state;
        state.rounds.add_guess(&state.roster, name, year, bet, now)?;

        self.sessions.broadcast(&GameEvent::GuessSubmitted {
            player_name: name.to_string(),
            bet_placed: bet,
        });
        Ok(())
    }

    pub fn set_bet(&mut self, name: &str, bet: bool) -> Result<(), GameError> {
        self.expire_round_if_due();

        let now = (self.clock)();
        let state = &mut self.state;
        state.rounds.update_bet(&state.roster, name, bet, now)?;

        self.sessions.broadcast(&GameEvent::BetUpdated {
            player_name: name.to_string(),
            bet,
        });
        Ok(())
    }

    /// Opens a new round. Uses the configured timer when none is given.
    pub fn start_round(
        &mut self,
        song: SongInfo,
        correct_year: i32,
        timer_duration: Option<Duration>,
    ) -> Result<RoundTicket, GameError> {
        if song.uri.trim().is_empty() {
            return Err(GameError::InvalidTrack("track uri is empty".to_string()));
        }
        self.validate_year(correct_year)?;
        let timer_duration = timer_duration.unwrap_or(self.state.config.timer_duration);
        if timer_duration.is_zero() {
            return Err(GameError::InvalidTimer);
        }
        if self.state.history.has(&song.uri) {
            debug!("Track {} has already been played this session", song.uri);
        }

        let now = (self.clock)();
        let state = &mut self.state;
        let round = state
            .rounds
            .start_round(song, correct_year, timer_duration, now, &mut state.history)?;

        let ticket = RoundTicket {
            round_number: round.round_number,
            timer_duration,
        };
        let event = GameEvent::RoundStarted {
            round_number: round.round_number,
            song: round.song.clone(),
            timer_duration: timer_duration.as_millis() as u64,
            started_at: round.started_at,
        };

        self.sessions.broadcast(&event);
        Ok(ticket)
    }

    /// Closes collection early and reveals the results.
    pub fn lock_round(&mut self) -> Result<RoundOutcome, GameError> {
        self.state.rounds.lock()?;
        self.finish_round()
    }

    /// Scores the current round. Idempotent once the round is scored.
    pub fn compute_results(&mut self) -> Result<RoundOutcome, GameError> {
        self.finish_round()
    }

    /// Ends whatever round is in progress and returns to `NoRound`.
    ///
    /// A collecting round is locked and scored first so its results are still
    /// revealed. Calling this with no round is a no-op.
    pub fn advance_round(&mut self) -> Result<(), GameError> {
        if self.phase() == RoundPhase::NoRound {
            return Ok(());
        }
        if self.phase() == RoundPhase::Collecting {
            self.state.rounds.lock()?;
        }
        self.finish_round()?;

        let state = &mut self.state;
        state.rounds.advance(&mut state.history)?;
        info!(
            "Advanced past round {} ({} tracks played)",
            state.rounds.last_round_number(),
            state.history.len()
        );
        Ok(())
    }

    /// Joins on behalf of a connected session and binds the session to the
    /// new player. A session speaks for at most one player.
    pub fn join_session(&mut self, session_id: u32, name: &str) -> Result<u32, GameError> {
        let Some(session) = self.sessions.get(session_id) else {
            return Err(GameError::UnknownSession(session_id));
        };
        if let Some(current) = &session.player_name {
            return Err(GameError::AlreadyJoined(current.clone()));
        }

        let total_players = self.join(name)?;
        self.sessions.bind_player(session_id, name);
        Ok(total_players)
    }

    /// Timer callback for `round_number`.
    ///
    /// Stale timers, for rounds that were already advanced or locked, do
    /// nothing. Returns true if the round was locked and scored.
    pub fn on_round_timer(&mut self, round_number: u32) -> bool {
        if self.current_round_number() != Some(round_number)
            || self.phase() != RoundPhase::Collecting
        {
            debug!("Ignoring stale timer for round {}", round_number);
            return false;
        }

        self.state.rounds.lock().is_ok() && self.finish_round().is_ok()
    }

    /// Drops a session from the hub. The player it spoke for keeps its score.
    pub fn disconnect(&mut self, session_id: u32) {
        self.sessions.unregister(session_id);
    }

    /// Rebinds a reconnecting session to an existing player.
    pub fn resume(&mut self, session_id: u32, name: &str) -> Result<(), GameError> {
        let Some(session) = self.sessions.get(session_id) else {
            return Err(GameError::UnknownSession(session_id));
        };
        if let Some(current) = session.player_name.as_deref() {
            if current != name {
                return Err(GameError::AlreadyJoined(current.to_string()));
            }
        }
        if !self.state.roster.contains(name) {
            return Err(GameError::UnknownPlayer(name.to_string()));
        }
        match self.sessions.session_for_player(name) {
            Some(holder) if holder != session_id => {
                Err(GameError::DuplicatePlayer(name.to_string()))
            }
            _ => {
                if !self.sessions.bind_player(session_id, name) {
                    return Err(GameError::UnknownSession(session_id));
                }
                info!("Session {} resumed as '{}'", session_id, name);
                Ok(())
            }
        }
    }

    /// Locks a collecting round whose deadline passed before its timer fired.
    fn expire_round_if_due(&mut self) {
        let now = (self.clock)();
        if self.state.rounds.lock_if_expired(now) {
            if let Err(e) = self.finish_round() {
                error!("Failed to score expired round: {}", e);
            }
        }
    }

    /// Scores a locked round and broadcasts `RoundEnded` the first time only.
    fn finish_round(&mut self) -> Result<RoundOutcome, GameError> {
        let already_scored = self.phase() == RoundPhase::Scored;

        let state = &mut self.state;
        let outcome = state
            .rounds
            .compute_results(&mut state.roster, &state.config.scoring)?;

        if !already_scored {
            let event = GameEvent::RoundEnded {
                round_number: outcome.round_number,
                correct_year: outcome.correct_year,
                results: outcome.results.clone(),
                leaderboard: self.state.roster.snapshot(),
            };
            let delivered = self.sessions.broadcast(&event);
            info!(
                "Round {} ended (answer {}), results sent to {} sessions",
                outcome.round_number, outcome.correct_year, delivered
            );
        }

        Ok(outcome)
    }

    fn validate_year(&self, year: i32) -> Result<(), GameError> {
        let config = &self.state.config;
        if config.year_in_range(year) {
            Ok(())
        } else {
            Err(GameError::YearOutOfRange {
                year,
                min: config.min_year,
                max: config.max_year,
            })
        }
    }
}

/// Names are roster keys and are never rewritten, so padded names are refused.
fn validate_name(name: &str) -> Result<(), GameError> {
    if name.is_empty() || name.trim() != name || name.chars().count() > MAX_NAME_LEN {
        return Err(GameError::InvalidName { max: MAX_NAME_LEN });
    }
    Ok(())
}
