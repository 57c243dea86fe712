//! PGN reading on top of pgn-reader's streaming visitor.
//!
//! Every game in the input yields either a [`Game`] with a validated mainline
//! or a [`GameParseError`]; one bad game never hides the games after it.

use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Move, Position};
use tracing::debug;

use crate::error::{GameParseError, PgnError};
use crate::game_data::{Game, GameMetadata};

pub type ParsedGame = Result<Game, GameParseError>;

/// Tags collected during header parsing.
#[derive(Default)]
struct GameTags {
    metadata: GameMetadata,
    fen: Option<String>,
}

/// State during movetext parsing.
struct GameState {
    ordinal: usize,
    metadata: GameMetadata,
    initial: Chess,
    board: Chess,
    moves: Vec<Move>,
    error: Option<String>,
}

/// Visitor that turns each game into a [`ParsedGame`].
struct GameBuilder {
    /// Ordinal of the most recently started game.
    ordinal: usize,
}

impl GameBuilder {
    fn new(first_ordinal: usize) -> Self {
        Self {
            ordinal: first_ordinal.saturating_sub(1),
        }
    }

    fn failure(&self, metadata: &GameMetadata, reason: String) -> GameParseError {
        GameParseError {
            ordinal: self.ordinal,
            white: metadata.white.clone(),
            black: metadata.black.clone(),
            reason,
        }
    }
}

const STANDARD_START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Resolve the start position from the `Variant` and `FEN` tags.
fn initial_position(tags: &GameTags) -> Result<Chess, String> {
    let castling_mode = match tags.metadata.variant.to_ascii_lowercase().as_str() {
        "" | "standard" | "from position" => CastlingMode::Standard,
        "chess960" | "chess 960" | "fischerandom" => CastlingMode::Chess960,
        other => return Err(format!("unsupported variant '{other}'")),
    };

    // A Chess960 game without a FEN tag starts from the standard array
    let fen = tags.fen.as_deref().unwrap_or(STANDARD_START);
    let fen = Fen::from_ascii(fen.as_bytes()).map_err(|e| format!("invalid FEN tag: {e}"))?;
    fen.into_position::<Chess>(castling_mode)
        .map_err(|e| format!("illegal FEN position: {e}"))
}

impl Visitor for GameBuilder {
    type Tags = GameTags;
    type Movetext = GameState;
    type Output = ParsedGame;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        self.ordinal += 1;
        ControlFlow::Continue(GameTags::default())
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let value = value.decode_utf8_lossy();
        if name == b"FEN" {
            if tags.fen.is_none() {
                tags.fen = Some(value.trim().to_string());
            }
        } else {
            tags.metadata.set_tag(name, &value);
        }
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        match initial_position(&tags) {
            Ok(initial) => ControlFlow::Continue(GameState {
                ordinal: self.ordinal,
                metadata: tags.metadata,
                board: initial.clone(),
                initial,
                moves: Vec::new(),
                error: None,
            }),
            Err(reason) => ControlFlow::Break(Err(self.failure(&tags.metadata, reason))),
        }
    }

    fn begin_variation(&mut self, _: &mut Self::Movetext) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true)) // mainline only
    }

    fn san(&mut self, state: &mut Self::Movetext, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        if state.error.is_some() {
            return ControlFlow::Continue(());
        }

        match san_plus.san.to_move(&state.board) {
            Ok(mv) => {
                state.board.play_unchecked(mv);
                state.moves.push(mv);
            }
            Err(e) => {
                state.error = Some(format!(
                    "illegal move {san_plus} at ply {}: {e}",
                    state.moves.len() + 1
                ));
            }
        }
        ControlFlow::Continue(())
    }

    fn end_game(&mut self, state: Self::Movetext) -> Self::Output {
        if let Some(reason) = state.error {
            return Err(self.failure(&state.metadata, reason));
        }
        Ok(Game {
            ordinal: state.ordinal,
            metadata: state.metadata,
            initial: state.initial,
            moves: state.moves,
        })
    }
}

/// Read every game from a PGN stream. Games are numbered from `first_ordinal`.
pub fn read_games<R: Read>(input: R, first_ordinal: usize) -> std::io::Result<Vec<ParsedGame>> {
    let mut reader = Reader::new(input);
    let mut builder = GameBuilder::new(first_ordinal);
    let mut games = Vec::new();

    while let Some(game) = reader.read_game(&mut builder)? {
        games.push(game);
    }

    Ok(games)
}

/// Resolve a PGN source: an existing file, or a glob pattern over files.
pub fn resolve_sources(source: &str) -> Result<Vec<PathBuf>, PgnError> {
    let path = Path::new(source);
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let paths: Vec<PathBuf> = glob::glob(source)
        .map_err(|e| PgnError::Pattern {
            pattern: source.to_string(),
            message: e.to_string(),
        })?
        .filter_map(|p| p.ok())
        .filter(|p| p.is_file())
        .collect();

    if paths.is_empty() {
        return Err(PgnError::NoFiles(source.to_string()));
    }
    Ok(paths)
}

/// Read all games from every file matching `source`, numbering them
/// consecutively across files.
pub fn read_pgn_source(source: &str) -> Result<Vec<ParsedGame>, PgnError> {
    let mut games = Vec::new();

    for path in resolve_sources(source)? {
        let file = File::open(&path).map_err(|source| PgnError::Io {
            path: path.clone(),
            source,
        })?;
        let parsed = read_games(BufReader::new(file), games.len() + 1).map_err(|source| {
            PgnError::Io {
                path: path.clone(),
                source,
            }
        })?;
        debug!(path = %path.display(), games = parsed.len(), "Read PGN file");
        games.extend(parsed);
    }

    Ok(games)
}
