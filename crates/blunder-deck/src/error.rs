//! Pipeline error types

use std::path::PathBuf;

use chess_core::{GameParseError, PgnError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input error: {0}")]
    Input(#[from] PgnError),

    #[error("Parse failure: {0}")]
    Parse(#[from] GameParseError),

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Filter '{filter}' needs a decisive result but {game} ended '{result}'")]
    InvalidFilterResult {
        filter: String,
        game: String,
        result: String,
    },

    #[error("Failed to write deck to {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeckError {
    pub fn write(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Write {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
