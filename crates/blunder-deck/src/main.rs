//! Blunder deck generator
//!
//! Reads PGN games, evaluates every position with Stockfish and writes the
//! blunders of the selected player to an Anki package.

use blunder_deck::{run_pipeline, Cli};
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env before parsing so it can supply option defaults
    let _ = dotenvy::dotenv();

    let config = Cli::parse().into_config()?;
    info!(
        pgn = %config.pgn,
        player = %config.player,
        threshold = config.detection.threshold,
        deck_id = config.deck.id,
        "Config loaded"
    );

    match run_pipeline(&config).await {
        Ok(summary) => {
            info!(
                games = summary.games,
                analysed = summary.analysed,
                parse_failures = summary.parse_failures,
                filtered = summary.filtered,
                positions = summary.positions,
                cards = summary.cards,
                "Run complete"
            );
            println!("Anki deck saved to {}", config.output.display());
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            Err(e.into())
        }
    }
}
