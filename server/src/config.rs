//! Game configuration shared by the orchestrator and the network layer

use crate::scoring::ScoringTable;
use shared::{DEFAULT_MAX_YEAR, DEFAULT_MIN_YEAR};
use std::time::Duration;

pub const DEFAULT_TIMER_SECS: u64 = 30;
pub const DEFAULT_MAX_SESSIONS: usize = 64;
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Collection window used when a round is started without its own timer
    pub timer_duration: Duration,
    pub min_year: i32,
    pub max_year: i32,
    pub scoring: ScoringTable,
    pub max_sessions: usize,
    /// Sessions silent for longer than this are dropped from the hub
    pub session_timeout: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            timer_duration: Duration::from_secs(DEFAULT_TIMER_SECS),
            min_year: DEFAULT_MIN_YEAR,
            max_year: DEFAULT_MAX_YEAR,
            scoring: ScoringTable::default(),
            max_sessions: DEFAULT_MAX_SESSIONS,
            session_timeout: Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECS),
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_year > self.max_year {
            return Err(format!(
                "min year {} is greater than max year {}",
                self.min_year, self.max_year
            ));
        }
        if self.timer_duration.is_zero() {
            return Err("round timer must be longer than zero".to_string());
        }
        if self.scoring.points_bet_multiplier == 0 {
            return Err("bet multiplier must be at least 1".to_string());
        }
        if self.max_sessions == 0 {
            return Err("server must accept at least one session".to_string());
        }
        Ok(())
    }

    pub fn year_in_range(&self, year: i32) -> bool {
        (self.min_year..=self.max_year).contains(&year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timer_duration, Duration::from_secs(30));
        assert_eq!(config.scoring.points_exact, 10);
    }

    #[test]
    fn test_inverted_year_bounds_rejected() {
        let config = GameConfig {
            min_year: 2000,
            max_year: 1990,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timer_and_multiplier_rejected() {
        let config = GameConfig {
            timer_duration: Duration::ZERO,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.scoring.points_bet_multiplier = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_year_in_range() {
        let config = GameConfig {
            min_year: 1950,
            max_year: 2020,
            ..GameConfig::default()
        };
        assert!(config.year_in_range(1950));
        assert!(config.year_in_range(2020));
        assert!(!config.year_in_range(1949));
        assert!(!config.year_in_range(2021));
    }
}
