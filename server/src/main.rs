use clap::Parser;
use log::info;
use server::config::{
    GameConfig, DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TIMEOUT_SECS, DEFAULT_TIMER_SECS,
};
use server::network::{Server, ServerMessage, ServerResult};
use server::scoring::ScoringTable;
use shared::{DEFAULT_MAX_YEAR, DEFAULT_MIN_YEAR};
use std::time::Duration;

// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Seconds players have to guess when a round gives no timer
    #[clap(short, long, default_value_t = DEFAULT_TIMER_SECS)]
    timer_secs: u64,
    /// Earliest accepted year
    #[clap(long, default_value_t = DEFAULT_MIN_YEAR)]
    min_year: i32,
    /// Latest accepted year
    #[clap(long, default_value_t = DEFAULT_MAX_YEAR)]
    max_year: i32,
    /// Maximum concurrent connections
    #[clap(short, long, default_value_t = DEFAULT_MAX_SESSIONS)]
    max_sessions: usize,
    /// Seconds of silence before a connection is dropped
    #[clap(long, default_value_t = DEFAULT_SESSION_TIMEOUT_SECS)]
    session_timeout_secs: u64,
    /// Points for guessing the exact year
    #[clap(long, default_value = "10")]
    points_exact: u32,
    /// Points for a guess within two years
    #[clap(long, default_value = "5")]
    points_close: u32,
    /// Points for a guess within five years
    #[clap(long, default_value = "2")]
    points_near: u32,
    /// Points for any other guess
    #[clap(long, default_value = "0")]
    points_wrong: u32,
    /// Multiplier applied when a player bets
    #[clap(long, default_value = "2")]
    bet_multiplier: u32,
}

impl Args {
    fn game_config(&self) -> GameConfig {
        GameConfig {
            timer_duration: Duration::from_secs(self.timer_secs),
            min_year: self.min_year,
            max_year: self.max_year,
            scoring: ScoringTable {
                points_exact: self.points_exact,
                points_close: self.points_close,
                points_near: self.points_near,
                points_wrong: self.points_wrong,
                points_bet_multiplier: self.bet_multiplier,
            },
            max_sessions: self.max_sessions,
            session_timeout: Duration::from_secs(self.session_timeout_secs),
        }
    }
}

/// Parses command-line arguments, then runs the game server until Ctrl+C.
#[tokio::main]
async fn main() -> ServerResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    let mut server = Server::new(&address, args.game_config()).await?;
    let handle = server.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = handle.send(ServerMessage::Shutdown);
        }
    });

    server.run().await
}
