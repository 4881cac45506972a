//! # Year Guessing Game Server Library
//!
//! This library is the authoritative engine for a real-time party game in which
//! players hear a track and guess the year it was released. Players join a
//! session, a round starts for a track, guesses (optionally backed by a
//! score-multiplying bet) are collected until the round locks, and the results plus
//! a leaderboard are broadcast to every connected client.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Game State
//! The server owns the roster, the played-track history and the current round.
//! Clients never hold state of their own; they render what the server
//! broadcasts.
//!
//! ### Ordering and Idempotence
//! Every mutation runs on one task, so no two commands interleave. A round is
//! scored exactly once no matter how many times locking or scoring is
//! triggered, and a timer that fires for a round that has already moved on is
//! ignored.
//!
//! ### Failure Isolation
//! A client that stops reading is pruned from the broadcast set without
//! stalling delivery to anybody else or rolling back game state.
//!
//! ## Module Organization
//!
//! ### Roster (`roster`) and History (`history`)
//! Player list with cumulative scores, and the grow-only set of played tracks.
//!
//! ### Scoring (`scoring`)
//! Pure function from guess accuracy and bet flag to points.
//!
//! ### Round State Machine (`round`)
//! `NoRound -> Collecting -> Locked -> Scored`, guess and bet collection, and
//! the cached round outcome.
//!
//! ### Session Hub (`session_hub`)
//! Live connection registry with non-blocking, per-session isolated fan-out.
//!
//! ### Game (`game`)
//! Orchestrator exposing the command handlers (join, guess, bet, start, lock,
//! advance) and building the outbound events.
//!
//! ### Network (`network`)
//! UDP transport: decodes client packets, drives the single-writer loop, arms
//! round timers and sweeps idle sessions.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new("127.0.0.1:8080", GameConfig::default()).await?;
//!
//!     // Runs until a Shutdown message arrives:
//!     // - decodes join/guess/bet/round commands from clients
//!     // - applies them to the game one at a time
//!     // - locks rounds when their timers run out
//!     // - broadcasts events and drops idle sessions
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod game;
pub mod history;
pub mod network;
pub mod roster;
pub mod round;
pub mod scoring;
pub mod session_hub;
pub mod utils;
