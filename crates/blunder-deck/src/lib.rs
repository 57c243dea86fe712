//! Blunder flashcards: analyse PGN games with a UCI engine, flag the moves
//! that lost the most, and package them as an Anki deck.

pub mod analysis;
pub mod analyzer;
pub mod cards;
pub mod config;
pub mod deck;
pub mod detector;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod stockfish;
pub mod template;

pub use analysis::Evaluation;
pub use analyzer::{collect_cards, run_pipeline, RunSummary};
pub use cards::CardRecord;
pub use config::{Cli, ParsePolicy, PipelineConfig};
pub use error::DeckError;
pub use evaluator::{Evaluator, PositionAnalysis, SearchLimit};
