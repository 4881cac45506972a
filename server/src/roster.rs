//! Authoritative player list and cumulative scores
//!
//! Players are keyed by their exact, case-sensitive name. A player is never
//! removed once joined, so a dropped connection can reclaim its score later.

use crate::error::GameError;
use log::info;
use shared::LeaderboardEntry;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub name: String,
    pub score: u32,
    /// Position in join order, used to break leaderboard ties
    pub joined_seq: u32,
}

#[derive(Debug, Default)]
pub struct Roster {
    players: HashMap<String, Player>,
    next_seq: u32,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new player with a zero score.
    ///
    /// Fails with `DuplicatePlayer` on an exact name match, leaving the roster
    /// unchanged.
    pub fn add(&mut self, name: &str) -> Result<&Player, GameError> {
        if self.players.contains_key(name) {
            return Err(GameError::DuplicatePlayer(name.to_string()));
        }

        let player = Player {
            name: name.to_string(),
            score: 0,
            joined_seq: self.next_seq,
        };
        self.next_seq += 1;

        info!("Player '{}' joined (#{})", name, player.joined_seq);
        let player = self.players.entry(name.to_string()).or_insert(player);
        Ok(&*player)
    }

    pub fn find(&self, name: &str) -> Option<&Player> {
        self.players.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.players.contains_key(name)
    }

    /// Applies `delta` to a player's score and returns the new total.
    ///
    /// Scores never drop below zero.
    pub fn adjust_score(&mut self, name: &str, delta: i64) -> Result<u32, GameError> {
        let player = self
            .players
            .get_mut(name)
            .ok_or_else(|| GameError::UnknownPlayer(name.to_string()))?;

        let updated = (i64::from(player.score) + delta).clamp(0, i64::from(u32::MAX));
        player.score = updated as u32;
        Ok(player.score)
    }

    /// Leaderboard ordered by score descending, earlier joiners first on ties.
    pub fn snapshot(&self) -> Vec<LeaderboardEntry> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.joined_seq.cmp(&b.joined_seq))
        });

        players
            .into_iter()
            .enumerate()
            .map(|(index, player)| LeaderboardEntry {
                rank: index as u32 + 1,
                player_name: player.name.clone(),
                total_points: player.score,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
