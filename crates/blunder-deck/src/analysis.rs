//! Evaluation math, pure functions only
//! (No engine, process or file dependencies)

use std::fmt;

use shakmaty::Color;

/// Value of an immediate mate; longer mates are worth less.
pub const MATE_SCORE: i32 = 10_000;

/// Value lost per move of mate distance.
const MATE_STEP: i32 = 10;

/// Mate distances beyond this all map to the same value.
const MAX_MATE_DISTANCE: u32 = 99;

/// Centipawn scores are clamped to this magnitude so every mate outranks them.
pub const CP_LIMIT: i32 = 9_000;

/// Score as reported by the engine, relative to the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineScore {
    Cp(i32),
    /// Mate in N moves (positive = side to move mates, negative = gets mated,
    /// zero = side to move is already checkmated)
    Mate(i32),
}

/// Evaluation normalized to White's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    Centipawns(i32),
    Mate { winner: Color, moves: u32 },
}

impl Evaluation {
    /// Normalize a side-to-move score.
    pub fn from_side_to_move(score: EngineScore, turn: Color) -> Self {
        match score {
            EngineScore::Cp(cp) => Self::Centipawns(match turn {
                Color::White => cp,
                Color::Black => -cp,
            }),
            EngineScore::Mate(n) if n > 0 => Self::Mate {
                winner: turn,
                moves: n.unsigned_abs(),
            },
            EngineScore::Mate(n) => Self::Mate {
                winner: !turn,
                moves: n.unsigned_abs(),
            },
        }
    }

    /// Bounded numeric value from White's perspective.
    pub fn white_value(self) -> i32 {
        match self {
            Self::Centipawns(cp) => cp.clamp(-CP_LIMIT, CP_LIMIT),
            Self::Mate { winner, moves } => {
                let value = MATE_SCORE - MATE_STEP * moves.min(MAX_MATE_DISTANCE) as i32;
                match winner {
                    Color::White => value,
                    Color::Black => -value,
                }
            }
        }
    }

    /// Bounded numeric value from `side`'s perspective.
    pub fn value_for(self, side: Color) -> i32 {
        match side {
            Color::White => self.white_value(),
            Color::Black => -self.white_value(),
        }
    }

    pub fn is_mate(self) -> bool {
        matches!(self, Self::Mate { .. })
    }
}

/// Lichess-style rendering: `0.34`, `-1.50`, `Mate in 3 for White`.
impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Centipawns(cp) => write!(f, "{:.2}", f64::from(cp) / 100.0),
            Self::Mate { winner, moves: 0 } => write!(f, "Checkmate, {} wins", color_name(winner)),
            Self::Mate { winner, moves } => write!(f, "Mate in {moves} for {}", color_name(winner)),
        }
    }
}

pub fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "White",
        Color::Black => "Black",
    }
}

/// How much worse the position became for `mover` (negative when it improved).
pub fn calculate_loss(before: Evaluation, after: Evaluation, mover: Color) -> i32 {
    before.value_for(mover) - after.value_for(mover)
}

/// A move is a blunder when its loss strictly exceeds the threshold.
pub fn is_blunder(loss: i32, threshold: u32) -> bool {
    i64::from(loss) > i64::from(threshold)
}

/// Whether the position is already decided beyond `cutoff` centipawns.
pub fn is_decided(eval: Evaluation, cutoff: u32) -> bool {
    eval.white_value().unsigned_abs() > cutoff
}
