//! Points awarded for a single year guess
//!
//! Scoring is a pure function of the correct year, the guess, the bet flag and
//! the configured point table. It never touches game state, so the round state
//! machine can call it once per recorded guess and cache the outcome.

/// Guesses within this many years of the answer earn `points_close`.
pub const CLOSE_RANGE: u32 = 2;
/// Guesses within this many years of the answer earn `points_near`.
pub const NEAR_RANGE: u32 = 5;

/// Point values for each accuracy bucket plus the bet multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringTable {
    pub points_exact: u32,
    pub points_close: u32,
    pub points_near: u32,
    pub points_wrong: u32,
    pub points_bet_multiplier: u32,
}

impl Default for ScoringTable {
    fn default() -> Self {
        Self {
            points_exact: 10,
            points_close: 5,
            points_near: 2,
            points_wrong: 0,
            points_bet_multiplier: 2,
        }
    }
}

/// Scores one guess.
///
/// A bet multiplies whatever bucket the guess lands in, including a zero
/// outcome. There is no penalty for a losing bet.
pub fn score(correct_year: i32, guess_year: i32, bet: bool, table: &ScoringTable) -> u32 {
    let distance = correct_year.abs_diff(guess_year);

    let points = if distance == 0 {
        table.points_exact
    } else if distance <= CLOSE_RANGE {
        table.points_close
    } else if distance <= NEAR_RANGE {
        table.points_near
    } else {
        table.points_wrong
    };

    if bet {
        points.saturating_mul(table.points_bet_multiplier)
    } else {
        points
    }
}
