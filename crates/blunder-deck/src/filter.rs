//! Which side's moves are eligible for blunder detection.

use std::fmt;
use std::str::FromStr;

use chess_core::Game;
use shakmaty::Color;

use crate::error::DeckError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PlayerFilter {
    White,
    Black,
    /// Both sides (`both`, `white/black`, `any`)
    #[default]
    Both,
    Winner,
    Loser,
    /// Player name, matched case-insensitively against the White/Black tags
    Named(String),
}

impl FromStr for PlayerFilter {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DeckError::Config("player filter must not be empty".into()));
        }
        Ok(match trimmed.to_lowercase().as_str() {
            "white" => Self::White,
            "black" => Self::Black,
            "both" | "white/black" | "any" => Self::Both,
            "winner" => Self::Winner,
            "loser" => Self::Loser,
            _ => Self::Named(trimmed.to_string()),
        })
    }
}

impl fmt::Display for PlayerFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => f.write_str("white"),
            Self::Black => f.write_str("black"),
            Self::Both => f.write_str("white/black"),
            Self::Winner => f.write_str("winner"),
            Self::Loser => f.write_str("loser"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl PlayerFilter {
    /// Sides whose moves may be flagged in `game`.
    ///
    /// An empty result means the game has no eligible moves (a name that
    /// matches neither player). `winner`/`loser` need a decisive result.
    pub fn eligible_sides(&self, game: &Game) -> Result<Vec<Color>, DeckError> {
        let decisive = |select: fn(Color) -> Color| {
            game.result()
                .winner()
                .map(|winner| vec![select(winner)])
                .ok_or_else(|| DeckError::InvalidFilterResult {
                    filter: self.to_string(),
                    game: game.label(),
                    result: game.metadata.result.clone(),
                })
        };

        match self {
            Self::White => Ok(vec![Color::White]),
            Self::Black => Ok(vec![Color::Black]),
            Self::Both => Ok(vec![Color::White, Color::Black]),
            Self::Winner => decisive(|winner| winner),
            Self::Loser => decisive(|winner| !winner),
            Self::Named(name) => Ok([Color::White, Color::Black]
                .into_iter()
                .filter(|&color| game.metadata.player(color).to_lowercase() == name.to_lowercase())
                .collect()),
        }
    }
}
