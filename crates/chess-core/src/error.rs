use std::path::PathBuf;

use thiserror::Error;

/// A single game that could not be turned into a legal move sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("game #{ordinal} ({white} vs {black}): {reason}")]
pub struct GameParseError {
    pub ordinal: usize,
    pub white: String,
    pub black: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum PgnError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid PGN pattern {pattern}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("No PGN files match {0}")]
    NoFiles(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotationError {
    #[error("Invalid SAN token '{0}'")]
    InvalidSan(String),

    #[error("Illegal move '{san}' in position {fen}")]
    IllegalMove { san: String, fen: String },
}
