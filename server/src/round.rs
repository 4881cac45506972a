//! Round lifecycle state machine
//!
//! A round moves through a fixed set of phases:
//!
//! ```text
//! NoRound --start_round--> Collecting --lock/deadline--> Locked --compute_results--> Scored
//!    ^                                                                                 |
//!    +-------------------------- start_round / advance (archives track) ---------------+
//! ```
//!
//! Guesses and bets are only accepted while `Collecting`. Scoring runs exactly
//! once per round: the outcome is cached on the round and every later call to
//! `compute_results` returns the cached copy. Round numbers are handed out by
//! the machine itself and keep increasing for the lifetime of the game.

use crate::error::GameError;
use crate::history::SongHistory;
use crate::roster::Roster;
use crate::scoring::{score, ScoringTable};
use crate::utils::millis_remaining;
use log::{debug, info};
use shared::{RoundResult, SongInfo};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    NoRound,
    Collecting,
    Locked,
    Scored,
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundPhase::NoRound => "no_round",
            RoundPhase::Collecting => "collecting",
            RoundPhase::Locked => "locked",
            RoundPhase::Scored => "scored",
        };
        f.write_str(name)
    }
}

/// One player's submission for the current round.
///
/// A bet can arrive before the guess it applies to, so `year` is optional
/// until the player actually guesses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub year: Option<i32>,
    pub bet: bool,
    /// Wall-clock milliseconds of the latest change
    pub submitted_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub round_number: u32,
    pub correct_year: i32,
    pub results: Vec<RoundResult>,
}

#[derive(Debug, Clone)]
pub struct Round {
    pub round_number: u32,
    pub song: SongInfo,
    pub correct_year: i32,
    pub phase: RoundPhase,
    /// Wall-clock milliseconds when collection opened
    pub started_at: u64,
    pub timer_duration: Duration,
    submissions: HashMap<String, Submission>,
    outcome: Option<RoundOutcome>,
}

impl Round {
    pub fn track_id(&self) -> &str {
        &self.song.uri
    }

    pub fn submission(&self, player: &str) -> Option<&Submission> {
        self.submissions.get(player)
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.len()
    }

    /// True once `now - started_at >= timer_duration`.
    pub fn deadline_passed(&self, now: u64) -> bool {
        millis_remaining(self.started_at, self.timer_duration, now) == 0
    }

    fn ensure_collecting(&self) -> Result<(), GameError> {
        if self.phase == RoundPhase::Collecting {
            Ok(())
        } else {
            Err(GameError::RoundNotActive)
        }
    }
}

#[derive(Debug, Default)]
pub struct RoundMachine {
    current: Option<Round>,
    last_round_number: u32,
}

impl RoundMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RoundPhase {
        self.current
            .as_ref()
            .map_or(RoundPhase::NoRound, |round| round.phase)
    }

    pub fn current(&self) -> Option<&Round> {
        self.current.as_ref()
    }

    /// Highest round number handed out so far, zero before the first round.
    pub fn last_round_number(&self) -> u32 {
        self.last_round_number
    }

    /// Opens a new round for collection.
    ///
    /// Allowed from `NoRound` or `Scored`; a scored round is archived into
    /// `history` first. Fails with `InvalidTransition` while a round is still
    /// collecting or locked.
    pub fn start_round(
        &mut self,
        song: SongInfo,
        correct_year: i32,
        timer_duration: Duration,
        now: u64,
        history: &mut SongHistory,
    ) -> Result<&Round, GameError> {
        match self.phase() {
            RoundPhase::NoRound => {}
            RoundPhase::Scored => self.archive(history),
            phase => {
                return Err(GameError::InvalidTransition {
                    action: "start a round",
                    phase,
                })
            }
        }

        self.last_round_number += 1;
        info!(
            "Round {} started: '{}' ({:?} to guess)",
            self.last_round_number, song.title, timer_duration
        );

        let round = self.current.insert(Round {
            round_number: self.last_round_number,
            song,
            correct_year,
            phase: RoundPhase::Collecting,
            started_at: now,
            timer_duration,
            submissions: HashMap::new(),
            outcome: None,
        });
        Ok(&*round)
    }

    /// Closes collection. Returns the number of the round that was locked.
    pub fn lock(&mut self) -> Result<u32, GameError> {
        let phase = self.phase();
        match self.current.as_mut() {
            Some(round) if round.phase == RoundPhase::Collecting => {
                round.phase = RoundPhase::Locked;
                info!(
                    "Round {} locked with {} submissions",
                    round.round_number,
                    round.submissions.len()
                );
                Ok(round.round_number)
            }
            _ => Err(GameError::InvalidTransition {
                action: "lock the round",
                phase,
            }),
        }
    }

    /// Locks the round if its timer has run out. Returns true if it did.
    pub fn lock_if_expired(&mut self, now: u64) -> bool {
        let expired = self.current.as_ref().is_some_and(|round| {
            round.phase == RoundPhase::Collecting && round.deadline_passed(now)
        });

        expired && self.lock().is_ok()
    }

    /// Records or replaces a player's guess. The latest submission wins.
    pub fn add_guess(
        &mut self,
        roster: &Roster,
        player: &str,
        year: i32,
        bet: bool,
        now: u64,
    ) -> Result<(), GameError> {
        let round = self.collecting_round(roster, player)?;

        round.submissions.insert(
            player.to_string(),
            Submission {
                year: Some(year),
                bet,
                submitted_at: now,
            },
        );
        debug!("Round {}: guess from '{}'", round.round_number, player);
        Ok(())
    }

    /// Sets a player's bet, with or without a guess on record.
    pub fn update_bet(
        &mut self,
        roster: &Roster,
        player: &str,
        bet: bool,
        now: u64,
    ) -> Result<(), GameError> {
        let round = self.collecting_round(roster, player)?;

        let submission = round
            .submissions
            .entry(player.to_string())
            .or_insert(Submission {
                year: None,
                bet,
                submitted_at: now,
            });
        submission.bet = bet;
        submission.submitted_at = now;
        debug!("Round {}: '{}' set bet to {}", round.round_number, player, bet);
        Ok(())
    }

    /// Scores a locked round and credits every player's points to the roster.
    ///
    /// Only the first call on a round does any work; later calls return the
    /// cached outcome without touching scores again. Submissions without a
    /// year are left out of the results.
    pub fn compute_results(
        &mut self,
        roster: &mut Roster,
        table: &ScoringTable,
    ) -> Result<RoundOutcome, GameError> {
        let phase = self.phase();
        let round = match self.current.as_mut() {
            Some(round) if matches!(round.phase, RoundPhase::Locked | RoundPhase::Scored) => round,
            _ => {
                return Err(GameError::InvalidTransition {
                    action: "score the round",
                    phase,
                })
            }
        };

        if let Some(outcome) = &round.outcome {
            return Ok(outcome.clone());
        }

        let mut results: Vec<RoundResult> = round
            .submissions
            .iter()
            .filter_map(|(name, submission)| {
                submission.year.map(|year| RoundResult {
                    player_name: name.clone(),
                    guess: year,
                    points_earned: score(round.correct_year, year, submission.bet, table),
                    bet_placed: submission.bet,
                })
            })
            .collect();
        results.sort_by(|a, b| {
            b.points_earned
                .cmp(&a.points_earned)
                .then_with(|| a.player_name.cmp(&b.player_name))
        });

        // Validate every recipient before crediting anyone.
        if let Some(missing) = results.iter().find(|r| !roster.contains(&r.player_name)) {
            return Err(GameError::UnknownPlayer(missing.player_name.clone()));
        }
        for result in &results {
            roster.adjust_score(&result.player_name, i64::from(result.points_earned))?;
        }

        let outcome = RoundOutcome {
            round_number: round.round_number,
            correct_year: round.correct_year,
            results,
        };
        round.phase = RoundPhase::Scored;
        round.outcome = Some(outcome.clone());
        info!(
            "Round {} scored: {} results",
            round.round_number,
            outcome.results.len()
        );
        Ok(outcome)
    }

    /// Discards a scored round after archiving its track.
    pub fn advance(&mut self, history: &mut SongHistory) -> Result<(), GameError> {
        match self.phase() {
            RoundPhase::Scored => {
                self.archive(history);
                Ok(())
            }
            phase => Err(GameError::InvalidTransition {
                action: "advance",
                phase,
            }),
        }
    }

    fn archive(&mut self, history: &mut SongHistory) {
        if let Some(round) = self.current.take() {
            history.record(round.track_id());
        }
    }

    fn collecting_round(&mut self, roster: &Roster, player: &str) -> Result<&mut Round, GameError> {
        if !roster.contains(player) {
            return Err(GameError::UnknownPlayer(player.to_string()));
        }
        let round = self.current.as_mut().ok_or(GameError::RoundNotActive)?;
        round.ensure_collecting()?;
        Ok(round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn song(uri: &str) -> SongInfo {
        SongInfo {
            uri: uri.to_string(),
            title: format!("Title of {}", uri),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            cover_url: None,
        }
    }

    fn roster_with(names: &[&str]) -> Roster {
        let mut roster = Roster::new();
        for name in names {
            roster.add(name).unwrap();
        }
        roster
    }

    fn started(machine: &mut RoundMachine, history: &mut SongHistory, uri: &str, year: i32) {
        machine
            .start_round(song(uri), year, Duration::from_secs(30), 1_000, history)
            .unwrap();
    }

    #[test]
    fn test_new_machine_has_no_round() {
        let machine = RoundMachine::new();
        assert_eq!(machine.phase(), RoundPhase::NoRound);
        assert_eq!(machine.last_round_number(), 0);
        assert!(machine.current().is_none());
    }

    #[test]
    fn test_start_round_opens_collection() {
        let mut machine = RoundMachine::new();
        let mut history = SongHistory::new();

        let round = assert_ok!(machine.start_round(
            song("track-1"),
            1990,
            Duration::from_secs(20),
            5_000,
            &mut history
        ));
        assert_eq!(round.round_number, 1);
        assert_eq!(round.phase, RoundPhase::Collecting);
        assert_eq!(round.started_at, 5_000);
        assert_eq!(machine.phase(), RoundPhase::Collecting);
    }

    #[test]
    fn test_start_round_while_active_fails() {
        let mut machine = RoundMachine::new();
        let mut history = SongHistory::new();
        started(&mut machine, &mut history, "track-1", 1990);

        let error = assert_err!(machine.start_round(
            song("track-2"),
            2000,
            Duration::from_secs(30),
            2_000,
            &mut history
        ));
        assert_eq!(
            error,
            GameError::InvalidTransition {
                action: "start a round",
                phase: RoundPhase::Collecting
            }
        );

        assert_ok!(machine.lock());
        assert_err!(machine.start_round(
            song("track-2"),
            2000,
            Duration::from_secs(30),
            2_000,
            &mut history
        ));
        assert_eq!(machine.last_round_number(), 1);
        assert_eq!(machine.current().map(|r| r.track_id()), Some("track-1"));
    }

    #[test]
    fn test_round_numbers_strictly_increase() {
        let mut machine = RoundMachine::new();
        let mut history = SongHistory::new();
        let mut roster = Roster::new();
        let table = ScoringTable::default();

        let mut seen = Vec::new();
        for i in 0..5 {
            let uri = format!("track-{}", i);
            let number = machine
                .start_round(song(&uri), 1990, Duration::from_secs(1), 0, &mut history)
                .unwrap()
                .round_number;
            seen.push(number);
            machine.lock().unwrap();
            machine.compute_results(&mut roster, &table).unwrap();
        }

        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn test_guess_requires_known_player() {
        let mut machine = RoundMachine::new();
        let mut history = SongHistory::new();
        let roster = roster_with(&["Ann"]);
        started(&mut machine, &mut history, "track-1", 1990);

        let error = assert_err!(machine.add_guess(&roster, "Zed", 1990, false, 1_100));
        assert_eq!(error, GameError::UnknownPlayer("Zed".to_string()));
        assert_eq!(machine.current().unwrap().submission_count(), 0);
    }

    #[test]
    fn test_guess_without_round_fails() {
        let mut machine = RoundMachine::new();
        let roster = roster_with(&["Ann"]);

        let error = assert_err!(machine.add_guess(&roster, "Ann", 1990, false, 0));
        assert_eq!(error, GameError::RoundNotActive);
    }

    #[test]
    fn test_last_guess_wins() {
        let mut machine = RoundMachine::new();
        let mut history = SongHistory::new();
        let roster = roster_with(&["Ann"]);
        started(&mut machine, &mut history, "track-1", 1990);

        assert_ok!(machine.add_guess(&roster, "Ann", 1980, true, 1_100));
        assert_ok!(machine.add_guess(&roster, "Ann", 1991, false, 1_200));

        let round = machine.current().unwrap();
        assert_eq!(round.submission_count(), 1);
        assert_eq!(
            round.submission("Ann"),
            Some(&Submission {
                year: Some(1991),
                bet: false,
                submitted_at: 1_200
            })
        );
    }

    #[test]
    fn test_bet_before_and_after_guess() {
        let mut machine = RoundMachine::new();
        let mut history = SongHistory::new();
        let roster = roster_with(&["Ann", "Bob"]);
        started(&mut machine, &mut history, "track-1", 1990);

        assert_ok!(machine.update_bet(&roster, "Ann", true, 1_100));
        let ann = machine.current().unwrap().submission("Ann").unwrap();
        assert_eq!(ann.year, None);
        assert!(ann.bet);

        assert_ok!(machine.add_guess(&roster, "Bob", 1985, false, 1_100));
        assert_ok!(machine.update_bet(&roster, "Bob", true, 1_300));
        let bob = machine.current().unwrap().submission("Bob").unwrap();
        assert_eq!(bob.year, Some(1985));
        assert!(bob.bet);
        assert_eq!(bob.submitted_at, 1_300);
    }

    #[test]
    fn test_submissions_rejected_after_lock() {
        let mut machine = RoundMachine::new();
        let mut history = SongHistory::new();
        let mut roster = roster_with(&["Ann"]);
        started(&mut machine, &mut history, "track-1", 1990);
        assert_ok!(machine.add_guess(&roster, "Ann", 1990, false, 1_100));
        assert_ok!(machine.lock());

        assert_eq!(
            machine.add_guess(&roster, "Ann", 1970, true, 1_200),
            Err(GameError::RoundNotActive)
        );
        assert_eq!(
            machine.update_bet(&roster, "Ann", true, 1_200),
            Err(GameError::RoundNotActive)
        );

        assert_ok!(machine.compute_results(&mut roster, &ScoringTable::default()));
        assert_eq!(
            machine.add_guess(&roster, "Ann", 1970, true, 1_300),
            Err(GameError::RoundNotActive)
        );

        let submission = machine.current().unwrap().submission("Ann").unwrap();
        assert_eq!(submission.year, Some(1990));
        assert!(!submission.bet);
    }

    #[test]
    fn test_lock_requires_collecting() {
        let mut machine = RoundMachine::new();
        let mut history = SongHistory::new();
        assert_err!(machine.lock());

        started(&mut machine, &mut history, "track-1", 1990);
        assert_eq!(machine.lock(), Ok(1));
        assert_err!(machine.lock());
    }

    #[test]
    fn test_deadline_expiry() {
        let mut machine = RoundMachine::new();
        let mut history = SongHistory::new();
        machine
            .start_round(song("track-1"), 1990, Duration::from_secs(30), 10_000, &mut history)
            .unwrap();

        assert!(!machine.lock_if_expired(39_999));
        assert_eq!(machine.phase(), RoundPhase::Collecting);

        assert!(machine.lock_if_expired(40_000));
        assert_eq!(machine.phase(), RoundPhase::Locked);

        assert!(!machine.lock_if_expired(50_000));
    }

    #[test]
    fn test_compute_results_requires_lock() {
        let mut machine = RoundMachine::new();
        let mut history = SongHistory::new();
        let mut roster = Roster::new();
        let table = ScoringTable::default();

        assert_err!(machine.compute_results(&mut roster, &table));
        started(&mut machine, &mut history, "track-1", 1990);
        assert_err!(machine.compute_results(&mut roster, &table));
    }

    #[test]
    fn test_compute_results_is_idempotent() {
        let mut machine = RoundMachine::new();
        let mut history = SongHistory::new();
        let mut roster = roster_with(&["Ann", "Bob", "Cid"]);
        let table = ScoringTable {
            points_exact: 10,
            points_close: 5,
            points_near: 2,
            points_wrong: 0,
            points_bet_multiplier: 2,
        };
        started(&mut machine, &mut history, "track-1", 1990);

        machine.add_guess(&roster, "Ann", 1990, false, 1_100).unwrap();
        machine.add_guess(&roster, "Bob", 1988, false, 1_100).unwrap();
        machine.add_guess(&roster, "Cid", 1990, true, 1_100).unwrap();
        machine.lock().unwrap();

        let first = assert_ok!(machine.compute_results(&mut roster, &table));
        let second = assert_ok!(machine.compute_results(&mut roster, &table));
        assert_eq!(first, second);
        assert_eq!(machine.phase(), RoundPhase::Scored);

        let points: Vec<(&str, u32)> = first
            .results
            .iter()
            .map(|r| (r.player_name.as_str(), r.points_earned))
            .collect();
        assert_eq!(points, vec![("Cid", 20), ("Ann", 10), ("Bob", 5)]);

        assert_eq!(roster.find("Ann").unwrap().score, 10);
        assert_eq!(roster.find("Bob").unwrap().score, 5);
        assert_eq!(roster.find("Cid").unwrap().score, 20);
    }

    #[test]
    fn test_bet_only_submission_left_out_of_results() {
        let mut machine = RoundMachine::new();
        let mut history = SongHistory::new();
        let mut roster = roster_with(&["Ann", "Bob"]);
        started(&mut machine, &mut history, "track-1", 1990);

        machine.update_bet(&roster, "Ann", true, 1_100).unwrap();
        machine.add_guess(&roster, "Bob", 1999, false, 1_100).unwrap();
        machine.lock().unwrap();

        let outcome = machine
            .compute_results(&mut roster, &ScoringTable::default())
            .unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].player_name, "Bob");
        assert_eq!(outcome.results[0].points_earned, 0);
    }

    #[test]
    fn test_advance_archives_track() {
        let mut machine = RoundMachine::new();
        let mut history = SongHistory::new();
        let mut roster = Roster::new();
        started(&mut machine, &mut history, "track-1", 1990);

        assert_err!(machine.advance(&mut history));
        machine.lock().unwrap();
        assert_err!(machine.advance(&mut history));
        machine
            .compute_results(&mut roster, &ScoringTable::default())
            .unwrap();

        assert_ok!(machine.advance(&mut history));
        assert_eq!(machine.phase(), RoundPhase::NoRound);
        assert!(history.has("track-1"));
        assert_eq!(machine.last_round_number(), 1);
    }

    #[test]
    fn test_next_round_archives_previous_track() {
        let mut machine = RoundMachine::new();
        let mut history = SongHistory::new();
        let mut roster = Roster::new();
        started(&mut machine, &mut history, "track-1", 1990);
        machine.lock().unwrap();
        machine
            .compute_results(&mut roster, &ScoringTable::default())
            .unwrap();
        assert!(!history.has("track-1"));

        let round = machine
            .start_round(song("track-2"), 2005, Duration::from_secs(30), 2_000, &mut history)
            .unwrap();
        assert_eq!(round.round_number, 2);
        assert!(history.has("track-1"));
        assert!(!history.has("track-2"));
    }
}
