//! The engine seam: anything that can score a position.

use std::time::Duration;

use async_trait::async_trait;
use shakmaty::{Chess, Position};

use crate::analysis::Evaluation;
use crate::error::DeckError;

/// How long the engine may think about one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    MoveTime(Duration),
    Nodes(u64),
    Depth(u32),
}

impl SearchLimit {
    /// The UCI `go` command for this limit.
    pub fn go_command(&self) -> String {
        match self {
            Self::MoveTime(d) => format!("go movetime {}", d.as_millis().max(1)),
            Self::Nodes(n) => format!("go nodes {n}"),
            Self::Depth(d) => format!("go depth {d}"),
        }
    }

    /// Time the search is expected to take, before any grace period.
    pub fn budget(&self) -> Duration {
        match self {
            Self::MoveTime(d) => *d,
            Self::Nodes(_) | Self::Depth(_) => Duration::ZERO,
        }
    }
}

/// One ranked engine line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLine {
    /// 1-based engine preference
    pub rank: u32,
    pub evaluation: Evaluation,
    /// Principal variation in UCI notation
    pub moves: Vec<String>,
}

/// Evaluation of a single position plus the engine's ranked candidate lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionAnalysis {
    pub evaluation: Evaluation,
    pub lines: Vec<CandidateLine>,
}

impl PositionAnalysis {
    /// Analysis of a position without legal moves; no engine call needed.
    pub fn terminal(pos: &Chess) -> Option<Self> {
        let evaluation = if pos.is_checkmate() {
            Evaluation::Mate {
                winner: !pos.turn(),
                moves: 0,
            }
        } else if pos.is_stalemate() {
            Evaluation::Centipawns(0)
        } else {
            return None;
        };

        Some(Self {
            evaluation,
            lines: Vec::new(),
        })
    }

    pub fn best_move(&self) -> Option<&str> {
        self.lines
            .first()
            .and_then(|line| line.moves.first())
            .map(String::as_str)
    }
}

#[async_trait]
pub trait Evaluator: Send {
    /// Score `position` within `limit`. The returned evaluation is from
    /// White's point of view.
    async fn analyse(
        &mut self,
        position: &Chess,
        limit: SearchLimit,
    ) -> Result<PositionAnalysis, DeckError>;
}

/// Score a position, answering terminal positions locally.
pub async fn evaluate_position<E: Evaluator + ?Sized>(
    engine: &mut E,
    position: &Chess,
    limit: SearchLimit,
) -> Result<PositionAnalysis, DeckError> {
    if let Some(analysis) = PositionAnalysis::terminal(position) {
        return Ok(analysis);
    }
    engine.analyse(position, limit).await
}
