//! Flashcard records built from detected blunders

use chess_core::{notation, Game, GameMetadata};
use serde::{Deserialize, Serialize};
use shakmaty::{Chess, Position};
use tracing::warn;
use uuid::Uuid;

use crate::analysis::color_name;
use crate::detector::BlunderEvent;
use crate::evaluator::CandidateLine;

/// Note field names, in the order `CardRecord::fields` returns them.
pub const FIELD_NAMES: [&str; 29] = [
    "CardID",
    "Title",
    "FEN",
    "PGN",
    "PGNContinuation",
    "Moves",
    "Alternatives",
    "Played",
    "Mover",
    "MoveNumber",
    "EvalBefore",
    "EvalAfter",
    "Loss",
    "White",
    "Black",
    "Result",
    "Date",
    "Site",
    "Event",
    "UTCDate",
    "UTCTime",
    "WhiteElo",
    "BlackElo",
    "WhiteRatingDiff",
    "BlackRatingDiff",
    "Variant",
    "TimeControl",
    "ECO",
    "Termination",
];

/// Everything one card shows. Strings are plain text; escaping is up to the
/// writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    pub id: Uuid,
    /// `<Date> - <White> vs <Black>`
    pub title: String,
    /// Position before the blunder
    pub fen: String,
    /// Movetext from the start of the game up to the blunder
    pub position_pgn: String,
    /// Movetext from the blunder to the end of the game
    pub continuation: String,
    /// Engine's best line from the position before the blunder
    pub best_line: String,
    /// Ranked engine first moves with evaluations, e.g. `1. Nf3 (0.34)`
    pub alternatives: Vec<String>,
    pub played: String,
    pub mover: String,
    pub move_number: u32,
    pub eval_before: String,
    pub eval_after: String,
    pub loss: i32,
    pub metadata: GameMetadata,
}

impl CardRecord {
    pub fn field_names() -> &'static [&'static str] {
        &FIELD_NAMES
    }

    /// Field values matching `field_names`.
    pub fn fields(&self) -> Vec<String> {
        let m = &self.metadata;
        vec![
            self.id.to_string(),
            self.title.clone(),
            self.fen.clone(),
            self.position_pgn.clone(),
            self.continuation.clone(),
            self.best_line.clone(),
            self.alternatives.join(", "),
            self.played.clone(),
            self.mover.clone(),
            self.move_number.to_string(),
            self.eval_before.clone(),
            self.eval_after.clone(),
            self.loss.to_string(),
            m.white.clone(),
            m.black.clone(),
            m.result.clone(),
            m.date.clone(),
            m.site.clone(),
            m.event.clone(),
            m.utc_date.clone(),
            m.utc_time.clone(),
            m.white_elo.clone(),
            m.black_elo.clone(),
            m.white_rating_diff.clone(),
            m.black_rating_diff.clone(),
            m.variant.clone(),
            m.time_control.clone(),
            m.eco.clone(),
            m.termination.clone(),
        ]
    }
}

/// Build the card for `event`, showing at most `pv_length` moves of the best
/// engine line.
pub fn build_card(event: &BlunderEvent, game: &Game, pv_length: usize) -> CardRecord {
    let ply = event.ply.min(game.moves.len());
    let (played_before, rest) = game.moves.split_at(ply);

    let mut before = game.initial.clone();
    for mv in played_before {
        before.play_unchecked(*mv);
    }

    let best_line = event
        .candidates
        .first()
        .map(|line| render_line(&before, line, pv_length))
        .unwrap_or_default();

    let alternatives = event
        .candidates
        .iter()
        .filter_map(|line| first_move(&before, line))
        .collect();

    let m = &game.metadata;
    CardRecord {
        id: Uuid::new_v4(),
        title: format!("{} - {} vs {}", m.date, m.white, m.black),
        fen: notation::fen(&before),
        position_pgn: notation::movetext(&game.initial, played_before),
        continuation: notation::movetext(&before, rest),
        best_line,
        alternatives,
        played: notation::san(&before, event.played),
        mover: color_name(event.mover).to_string(),
        move_number: before.fullmoves().get(),
        eval_before: event.before.to_string(),
        eval_after: event.after.to_string(),
        loss: event.loss,
        metadata: m.clone(),
    }
}

fn render_line(pos: &Chess, line: &CandidateLine, pv_length: usize) -> String {
    let shown = &line.moves[..line.moves.len().min(pv_length)];
    let (legal, rejected) = notation::uci_line(pos, shown);
    if let Some(mv) = rejected {
        warn!(
            uci = %mv,
            fen = %notation::fen(pos),
            "Engine suggested an illegal move, truncating line"
        );
    }
    notation::movetext(pos, &legal)
}

fn first_move(pos: &Chess, line: &CandidateLine) -> Option<String> {
    let first = line.moves.first()?;
    let (legal, _) = notation::uci_line(pos, std::slice::from_ref(first));
    match legal.first() {
        Some(&mv) => Some(format!(
            "{}. {} ({})",
            line.rank,
            notation::san(pos, mv),
            line.evaluation
        )),
        None => {
            warn!(uci = %first, fen = %notation::fen(pos), "Engine suggested an illegal move");
            None
        }
    }
}
