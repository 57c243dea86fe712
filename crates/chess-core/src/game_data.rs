use serde::{Deserialize, Serialize};
use shakmaty::{CastlingMode, Chess, Color, Move, Position};

/// PGN header fields copied onto every card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub event: String,
    pub site: String,
    pub date: String,
    pub white: String,
    pub black: String,
    pub result: String, // "1-0", "0-1", "1/2-1/2", "*"
    pub utc_date: String,
    pub utc_time: String,
    pub white_elo: String,
    pub black_elo: String,
    pub white_rating_diff: String,
    pub black_rating_diff: String,
    pub variant: String,
    pub time_control: String,
    pub eco: String,
    pub termination: String,
}

impl GameMetadata {
    /// Store a header value. Unknown tags are ignored, the first value of a
    /// duplicated tag wins.
    pub fn set_tag(&mut self, name: &[u8], value: &str) {
        let slot = match name {
            b"Event" => &mut self.event,
            b"Site" => &mut self.site,
            b"Date" => &mut self.date,
            b"White" => &mut self.white,
            b"Black" => &mut self.black,
            b"Result" => &mut self.result,
            b"UTCDate" => &mut self.utc_date,
            b"UTCTime" => &mut self.utc_time,
            b"WhiteElo" => &mut self.white_elo,
            b"BlackElo" => &mut self.black_elo,
            b"WhiteRatingDiff" => &mut self.white_rating_diff,
            b"BlackRatingDiff" => &mut self.black_rating_diff,
            b"Variant" => &mut self.variant,
            b"TimeControl" => &mut self.time_control,
            b"ECO" => &mut self.eco,
            b"Termination" => &mut self.termination,
            _ => return,
        };
        if slot.is_empty() {
            *slot = value.trim().to_string();
        }
    }

    pub fn game_result(&self) -> GameResult {
        GameResult::parse(&self.result)
    }

    /// Recorded name of the player with the given color.
    pub fn player(&self, color: Color) -> &str {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
    Unknown,
}

impl GameResult {
    pub fn parse(tag: &str) -> Self {
        match tag.trim() {
            "1-0" => Self::WhiteWins,
            "0-1" => Self::BlackWins,
            "1/2-1/2" | "½-½" => Self::Draw,
            _ => Self::Unknown,
        }
    }

    pub fn winner(self) -> Option<Color> {
        match self {
            Self::WhiteWins => Some(Color::White),
            Self::BlackWins => Some(Color::Black),
            Self::Draw | Self::Unknown => None,
        }
    }

    pub fn is_decisive(self) -> bool {
        self.winner().is_some()
    }
}

/// A parsed game: headers plus the legal mainline from its start position.
///
/// Moves are validated while parsing, so replaying them never fails.
#[derive(Debug, Clone)]
pub struct Game {
    /// 1-based position of the game in the input, counted across files.
    pub ordinal: usize,
    pub metadata: GameMetadata,
    pub initial: Chess,
    pub moves: Vec<Move>,
}

impl Game {
    pub fn result(&self) -> GameResult {
        self.metadata.game_result()
    }

    /// Chess960 when the game was read with `Variant "Chess960"`.
    pub fn castling_mode(&self) -> CastlingMode {
        self.initial.castles().mode()
    }

    /// Color of the side playing the move at `ply` (0-based).
    pub fn mover(&self, ply: usize) -> Color {
        if ply % 2 == 0 {
            self.initial.turn()
        } else {
            !self.initial.turn()
        }
    }

    /// Every position of the game: the start plus one per move.
    pub fn positions(&self) -> Vec<Chess> {
        let mut pos = self.initial.clone();
        let mut out = Vec::with_capacity(self.moves.len() + 1);
        out.push(pos.clone());
        for mv in &self.moves {
            pos.play_unchecked(*mv);
            out.push(pos.clone());
        }
        out
    }

    /// Position reached after `ply` moves, `None` past the end of the game.
    pub fn position_at(&self, ply: usize) -> Option<Chess> {
        if ply > self.moves.len() {
            return None;
        }
        let mut pos = self.initial.clone();
        for mv in &self.moves[..ply] {
            pos.play_unchecked(*mv);
        }
        Some(pos)
    }

    /// Short label for logs and error messages.
    pub fn label(&self) -> String {
        format!(
            "game #{} ({} vs {})",
            self.ordinal, self.metadata.white, self.metadata.black
        )
    }
}
