//! The pipeline: games in, cards and a deck out.

use std::fs::File;
use std::io::BufWriter;

use chess_core::{notation, Game, ParsedGame};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cards::{build_card, CardRecord};
use crate::config::{ParsePolicy, PipelineConfig};
use crate::deck::write_deck;
use crate::detector::detect_blunders;
use crate::error::DeckError;
use crate::evaluator::{evaluate_position, Evaluator, PositionAnalysis, SearchLimit};
use crate::stockfish::StockfishEngine;

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub games: usize,
    pub analysed: usize,
    pub parse_failures: usize,
    /// Games the player filter excluded (including winner/loser on a draw)
    pub filtered: usize,
    pub positions: usize,
    pub cards: usize,
}

/// Evaluate every position of `game` once: the start plus one per move.
pub async fn analyze_game<E: Evaluator + ?Sized>(
    engine: &mut E,
    game: &Game,
    limit: SearchLimit,
) -> Result<Vec<PositionAnalysis>, DeckError> {
    let mut analyses = Vec::with_capacity(game.moves.len() + 1);

    for (ply, pos) in game.positions().iter().enumerate() {
        let analysis = evaluate_position(engine, pos, limit).await.map_err(|e| match e {
            DeckError::EngineUnavailable(msg) => DeckError::EngineUnavailable(format!(
                "{} at ply {ply} ({}): {msg}",
                game.label(),
                notation::fen(pos)
            )),
            other => other,
        })?;
        debug!(game = game.ordinal, ply, eval = %analysis.evaluation, "Position evaluated");
        analyses.push(analysis);
    }

    Ok(analyses)
}

/// Run detection over `games` and build the cards, in input order.
pub async fn collect_cards<E: Evaluator + ?Sized>(
    engine: &mut E,
    games: Vec<ParsedGame>,
    config: &PipelineConfig,
) -> Result<(Vec<CardRecord>, RunSummary), DeckError> {
    let mut cards = Vec::new();
    let mut summary = RunSummary {
        games: games.len(),
        ..Default::default()
    };

    for parsed in games {
        let game = match parsed {
            Ok(game) => game,
            Err(e) => match config.on_parse_error {
                ParsePolicy::Skip => {
                    warn!(error = %e, "Skipping unparseable game");
                    summary.parse_failures += 1;
                    continue;
                }
                ParsePolicy::Abort => return Err(e.into()),
            },
        };

        let sides = match config.player.eligible_sides(&game) {
            Ok(sides) if sides.is_empty() => {
                info!(game = %game.label(), filter = %config.player, "No matching player, skipping");
                summary.filtered += 1;
                continue;
            }
            Ok(sides) => sides,
            Err(e @ DeckError::InvalidFilterResult { .. }) => {
                warn!(error = %e, "Skipping game");
                summary.filtered += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        let analyses = analyze_game(engine, &game, config.limit).await?;
        summary.analysed += 1;
        summary.positions += analyses.len();

        let events = detect_blunders(&game, &analyses, &sides, &config.detection);
        info!(
            game = %game.label(),
            moves = game.moves.len(),
            blunders = events.len(),
            "Game analysed"
        );

        cards.extend(
            events
                .iter()
                .map(|event| build_card(event, &game, config.pv_length)),
        );
    }

    summary.cards = cards.len();
    Ok((cards, summary))
}

/// Full run: read the games, analyse them with one engine session, write the
/// deck (and the JSON export when configured).
pub async fn run_pipeline(config: &PipelineConfig) -> Result<RunSummary, DeckError> {
    let games = chess_core::read_pgn_source(&config.pgn)?;
    info!(source = %config.pgn, games = games.len(), "Games loaded");

    let mut engine = StockfishEngine::new(config.engine.clone()).await?;
    info!(engine = %config.engine.path.display(), "Engine ready");

    let collected = collect_cards(&mut engine, games, config).await;
    engine.quit().await;
    let (cards, summary) = collected?;

    write_deck(&config.output, &config.deck, &cards)?;
    if let Some(path) = &config.json_output {
        write_json(path, &cards)?;
    }

    Ok(summary)
}

/// Write the card records as a pretty-printed JSON array.
pub fn write_json(path: &std::path::Path, cards: &[CardRecord]) -> Result<(), DeckError> {
    let file = File::create(path).map_err(|e| DeckError::write(path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), cards)
        .map_err(|e| DeckError::write(path, e))?;
    info!(path = %path.display(), cards = cards.len(), "Card JSON written");
    Ok(())
}
