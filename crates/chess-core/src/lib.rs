//! Game data, PGN reading and notation helpers shared by the blunder tools.

pub mod error;
pub mod game_data;
pub mod notation;
pub mod pgn;

pub use error::{GameParseError, NotationError, PgnError};
pub use game_data::{Game, GameMetadata, GameResult};
pub use pgn::{read_games, read_pgn_source, ParsedGame};
