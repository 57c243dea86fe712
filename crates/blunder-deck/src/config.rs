//! Command-line and environment configuration

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::deck::{random_deck_id, Deck};
use crate::detector::DetectionConfig;
use crate::error::DeckError;
use crate::evaluator::SearchLimit;
use crate::filter::PlayerFilter;
use crate::stockfish::EngineOptions;
use crate::template::CardTemplate;

/// What to do with a game that fails to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ParsePolicy {
    /// Log a warning and continue with the next game
    #[default]
    Skip,
    /// Stop the run
    Abort,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "blunder-deck",
    version,
    about = "Find blunders in PGN games with a UCI engine and turn them into an Anki deck"
)]
pub struct Cli {
    /// Path to the UCI engine executable
    #[arg(long, env = "STOCKFISH_PATH", default_value = "/usr/games/stockfish")]
    pub engine: PathBuf,

    /// PGN file or glob pattern (e.g. "games/*.pgn")
    #[arg(long, env = "PGN_PATH", default_value = "sample.pgn")]
    pub pgn: String,

    /// white, black, white/black, winner, loser or a player name
    #[arg(long, env = "PLAYER_FILTER", default_value = "white/black")]
    pub player: String,

    /// Output deck file [default: anki_deck_<deck id>.apkg]
    #[arg(long, env = "DECK_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Centipawn loss a move must exceed to count as a blunder
    #[arg(long, env = "BLUNDER_THRESHOLD", default_value_t = 200)]
    pub blunder_threshold: u32,

    /// Seconds of engine time per position
    #[arg(long, env = "ENGINE_TIME", default_value_t = 0.2)]
    pub engine_time: f64,

    /// Search a fixed number of nodes instead of a fixed time
    #[arg(long, env = "ENGINE_NODES")]
    pub nodes: Option<u64>,

    /// Search to a fixed depth instead of a fixed time
    #[arg(long, env = "ENGINE_DEPTH")]
    pub depth: Option<u32>,

    /// Seconds the engine may overrun its budget before it is considered hung
    #[arg(long, env = "ENGINE_GRACE_SECS", default_value_t = 10.0)]
    pub engine_grace: f64,

    /// Number of candidate lines to request
    #[arg(long, env = "ENGINE_MULTIPV", default_value_t = 1)]
    pub multipv: u32,

    #[arg(long, env = "ENGINE_THREADS", default_value_t = 1)]
    pub threads: u32,

    /// Engine hash size in MB
    #[arg(long, env = "ENGINE_HASH_MB", default_value_t = 256)]
    pub hash: u32,

    /// Moves of the best line shown on a card
    #[arg(long, env = "PV_LENGTH", default_value_t = 5)]
    pub pv_length: usize,

    /// Ignore blunders that leave the game decided beyond this many centipawns
    #[arg(long, env = "MAX_EVAL")]
    pub max_eval: Option<u32>,

    #[arg(long, env = "DECK_NAME", default_value = "Chess Blunders")]
    pub deck_name: String,

    /// Anki deck id [default: random]
    #[arg(long, env = "DECK_ID")]
    pub deck_id: Option<i64>,

    /// Directory with front.html, back.html and style.css
    #[arg(long, env = "TEMPLATE_DIR")]
    pub template_dir: Option<PathBuf>,

    #[arg(long, env = "ON_PARSE_ERROR", value_enum, default_value_t = ParsePolicy::Skip)]
    pub on_parse_error: ParsePolicy,

    /// Also write the card records as JSON
    #[arg(long = "json", env = "CARDS_JSON")]
    pub json: Option<PathBuf>,
}

/// Everything one run needs, validated.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub engine: EngineOptions,
    pub pgn: String,
    pub player: PlayerFilter,
    pub limit: SearchLimit,
    pub detection: DetectionConfig,
    pub pv_length: usize,
    pub deck: Deck,
    pub output: PathBuf,
    pub json_output: Option<PathBuf>,
    pub on_parse_error: ParsePolicy,
}

impl Cli {
    /// Validate the options and resolve defaults that depend on each other.
    pub fn into_config(self) -> Result<PipelineConfig, DeckError> {
        if !self.engine.exists() {
            return Err(DeckError::Config(format!(
                "Engine path does not exist: {}",
                self.engine.display()
            )));
        }

        chess_core::pgn::resolve_sources(&self.pgn)
            .map_err(|e| DeckError::Config(e.to_string()))?;

        if !(self.engine_time.is_finite() && self.engine_time > 0.0) {
            return Err(DeckError::Config(format!(
                "Engine time must be positive, got {}",
                self.engine_time
            )));
        }
        if !(self.engine_grace.is_finite() && self.engine_grace >= 0.0) {
            return Err(DeckError::Config(format!(
                "Engine grace must not be negative, got {}",
                self.engine_grace
            )));
        }
        if self.multipv == 0 {
            return Err(DeckError::Config("MultiPV must be at least 1".into()));
        }
        if self.pv_length == 0 {
            return Err(DeckError::Config("PV length must be at least 1".into()));
        }
        if self.threads == 0 {
            return Err(DeckError::Config("Threads must be at least 1".into()));
        }

        let engine_time = seconds("Engine time", self.engine_time)?;
        let grace = seconds("Engine grace", self.engine_grace)?;

        let deck_id = match self.deck_id {
            Some(id) if id <= 0 => {
                return Err(DeckError::Config(format!("Deck id must be positive, got {id}")))
            }
            Some(id) => id,
            None => random_deck_id(),
        };

        let template = match &self.template_dir {
            Some(dir) => CardTemplate::from_dir(dir)?,
            None => CardTemplate::default(),
        };

        let limit = match (self.nodes, self.depth) {
            (Some(nodes), _) => SearchLimit::Nodes(nodes),
            (None, Some(depth)) => SearchLimit::Depth(depth),
            (None, None) => SearchLimit::MoveTime(engine_time),
        };

        let output = self
            .output
            .unwrap_or_else(|| PathBuf::from(format!("anki_deck_{deck_id}.apkg")));

        Ok(PipelineConfig {
            engine: EngineOptions {
                path: self.engine,
                args: Vec::new(),
                threads: self.threads,
                hash_mb: self.hash,
                multipv: self.multipv,
                grace,
            },
            pgn: self.pgn,
            player: self.player.parse()?,
            limit,
            detection: DetectionConfig {
                threshold: self.blunder_threshold,
                max_eval: self.max_eval,
            },
            pv_length: self.pv_length,
            deck: Deck {
                id: deck_id,
                name: self.deck_name,
                template,
            },
            output,
            json_output: self.json,
            on_parse_error: self.on_parse_error,
        })
    }
}

fn seconds(what: &str, value: f64) -> Result<Duration, DeckError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| DeckError::Config(format!("{what} of {value}s is out of range: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        engine: String,
        pgn: String,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let engine = dir.path().join("stockfish");
        let pgn = dir.path().join("games.pgn");
        fs::write(&engine, "").unwrap();
        fs::write(&pgn, "1. e4 e5 *\n").unwrap();
        Fixture {
            engine: engine.display().to_string(),
            pgn: pgn.display().to_string(),
            dir,
        }
    }

    fn parse(f: &Fixture, extra: &[&str]) -> Result<PipelineConfig, DeckError> {
        let mut args = vec!["blunder-deck", "--engine", &f.engine, "--pgn", &f.pgn];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap().into_config()
    }

    #[test]
    fn test_defaults() {
        let f = fixture();
        let config = parse(&f, &["--deck-id", "1234567890"]).unwrap();

        assert_eq!(config.player, PlayerFilter::Both);
        assert_eq!(config.detection.threshold, 200);
        assert_eq!(config.detection.max_eval, None);
        assert_eq!(config.limit, SearchLimit::MoveTime(Duration::from_millis(200)));
        assert_eq!(config.engine.multipv, 1);
        assert_eq!(config.engine.grace, Duration::from_secs(10));
        assert_eq!(config.pv_length, 5);
        assert_eq!(config.deck.name, "Chess Blunders");
        assert_eq!(config.output, PathBuf::from("anki_deck_1234567890.apkg"));
        assert_eq!(config.on_parse_error, ParsePolicy::Skip);
        assert!(config.json_output.is_none());
    }

    #[test]
    fn test_random_deck_id_names_output() {
        let f = fixture();
        let config = parse(&f, &[]).unwrap();
        assert!((1 << 30..1 << 31).contains(&config.deck.id));
        assert_eq!(
            config.output,
            PathBuf::from(format!("anki_deck_{}.apkg", config.deck.id))
        );
    }

    #[test]
    fn test_nodes_and_depth_override_time() {
        let f = fixture();
        let config = parse(&f, &["--nodes", "50000", "--depth", "12"]).unwrap();
        assert_eq!(config.limit, SearchLimit::Nodes(50_000));

        let config = parse(&f, &["--depth", "12"]).unwrap();
        assert_eq!(config.limit, SearchLimit::Depth(12));
    }

    #[test]
    fn test_options_are_carried() {
        let f = fixture();
        let config = parse(
            &f,
            &[
                "--player",
                "Winner",
                "--blunder-threshold",
                "150",
                "--max-eval",
                "2500",
                "--multipv",
                "3",
                "--on-parse-error",
                "abort",
                "--json",
                "cards.json",
            ],
        )
        .unwrap();
        assert_eq!(config.player, PlayerFilter::Winner);
        assert_eq!(config.detection.threshold, 150);
        assert_eq!(config.detection.max_eval, Some(2500));
        assert_eq!(config.engine.multipv, 3);
        assert_eq!(config.on_parse_error, ParsePolicy::Abort);
        assert_eq!(config.json_output, Some(PathBuf::from("cards.json")));
    }

    #[test]
    fn test_validation_failures() {
        let f = fixture();
        for extra in [
            &["--engine-time", "0"][..],
            &["--engine-time", "NaN"],
            &["--engine-time", "1e20"],
            &["--engine-grace", "1e20"],
            &["--multipv", "0"],
            &["--pv-length", "0"],
            &["--deck-id", "0"],
        ] {
            assert!(
                matches!(parse(&f, extra), Err(DeckError::Config(_))),
                "{extra:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_missing_engine_and_pgn() {
        let f = fixture();
        let missing = f.dir.path().join("nope").display().to_string();

        let args = ["blunder-deck", "--engine", &missing, "--pgn", &f.pgn];
        let result = Cli::try_parse_from(args).unwrap().into_config();
        assert!(matches!(result, Err(DeckError::Config(_))));

        let args = ["blunder-deck", "--engine", &f.engine, "--pgn", &missing];
        let result = Cli::try_parse_from(args).unwrap().into_config();
        assert!(matches!(result, Err(DeckError::Config(_))));
    }

    #[test]
    fn test_negative_threshold_rejected_by_parser() {
        let f = fixture();
        let args = [
            "blunder-deck",
            "--engine",
            &f.engine,
            "--pgn",
            &f.pgn,
            "--blunder-threshold",
            "-5",
        ];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_template_dir() {
        let f = fixture();
        let tpl = f.dir.path().join("tpl");
        fs::create_dir(&tpl).unwrap();
        fs::write(tpl.join("front.html"), "F {{FEN}}").unwrap();
        fs::write(tpl.join("back.html"), "B {{Moves}}").unwrap();
        fs::write(tpl.join("style.css"), "").unwrap();

        let dir = tpl.display().to_string();
        let config = parse(&f, &["--template-dir", &dir]).unwrap();
        assert_eq!(config.deck.template.front, "F {{FEN}}");
    }
}
