//! Blunder detection over a fully evaluated game.

use chess_core::Game;
use shakmaty::{Color, Move};
use tracing::debug;

use crate::analysis::{self, Evaluation};
use crate::evaluator::{CandidateLine, PositionAnalysis};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionConfig {
    /// Centipawn loss a move must strictly exceed
    pub threshold: u32,
    /// Drop blunders that leave the game decided beyond this many centipawns
    pub max_eval: Option<u32>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 200,
            max_eval: None,
        }
    }
}

/// A flagged move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlunderEvent {
    /// Ordinal of the game the move belongs to
    pub game: usize,
    /// 0-based index of the blunder in the game's moves
    pub ply: usize,
    pub mover: Color,
    pub played: Move,
    pub before: Evaluation,
    pub after: Evaluation,
    pub loss: i32,
    /// What the engine preferred in the position before the blunder
    pub candidates: Vec<CandidateLine>,
}

/// Flag every move by one of `sides` whose loss exceeds the threshold.
///
/// `analyses[i]` is the analysis of the position before move `i`, so a game
/// of N moves needs N+1 entries; the last one is the final position.
pub fn detect_blunders(
    game: &Game,
    analyses: &[PositionAnalysis],
    sides: &[Color],
    config: &DetectionConfig,
) -> Vec<BlunderEvent> {
    debug_assert_eq!(analyses.len(), game.moves.len() + 1);

    let mut events = Vec::new();

    for (ply, (pair, played)) in analyses.windows(2).zip(&game.moves).enumerate() {
        let mover = game.mover(ply);
        if !sides.contains(&mover) {
            continue;
        }

        let (before, after) = (&pair[0], &pair[1]);
        let loss = analysis::calculate_loss(before.evaluation, after.evaluation, mover);
        debug!(
            game = game.ordinal,
            ply,
            before = %before.evaluation,
            after = %after.evaluation,
            loss,
            "Move evaluated"
        );

        if !analysis::is_blunder(loss, config.threshold) {
            continue;
        }

        if let Some(cutoff) = config.max_eval {
            if analysis::is_decided(after.evaluation, cutoff) {
                debug!(game = game.ordinal, ply, after = %after.evaluation, "Already decided, skipping");
                continue;
            }
        }

        events.push(BlunderEvent {
            game: game.ordinal,
            ply,
            mover,
            played: *played,
            before: before.evaluation,
            after: after.evaluation,
            loss,
            candidates: before.lines.clone(),
        });
    }

    events
}
