//! Room view simulator binary.
//!
//! # Usage
//!
//! ```bash
//! # Accept an invite to a room
//! roomview-sim --scenario invite-join --room '!lobby:sim'
//!
//! # Peek a public room by alias, then join it
//! roomview-sim --scenario peek-join --room '#lobby:sim' --log-level debug
//! ```

mod scenario;

use clap::Parser;
use scenario::Scenario;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Room view simulator
#[derive(Parser, Debug)]
#[command(name = "roomview-sim")]
#[command(about = "Drives scripted room view sessions against simulated collaborators")]
#[command(version)]
struct Args {
    /// Room id or alias to view
    #[arg(short, long, default_value = "!lobby:sim")]
    room: String,

    /// Seed for the simulated environment
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Scripted session to run
    #[arg(long, value_enum, default_value_t = Scenario::InviteJoin)]
    scenario: Scenario,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Room view simulator starting");
    tracing::info!("Viewing {} ({:?})", args.room, args.scenario);

    let last = scenario::run(args.scenario, &args.room, args.seed).await?;

    tracing::info!(
        identity = ?last.identity,
        membership = ?last.membership,
        view_mode = ?last.view_mode,
        "final view"
    );

    Ok(())
}
