#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use async_trait::async_trait;
use blunder_deck::evaluator::CandidateLine;
use blunder_deck::{DeckError, Evaluation, Evaluator, PositionAnalysis, SearchLimit};
use chess_core::notation;
use rusqlite::Connection;
use shakmaty::{Chess, Position};

/// Evaluator answering from a table keyed by FEN; unknown positions fail.
#[derive(Default)]
pub struct ScriptedEvaluator {
    table: HashMap<String, PositionAnalysis>,
    /// FEN of every position the pipeline asked about, in order
    pub calls: Vec<String>,
}

impl ScriptedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score the positions of `movetext` played from the initial position:
    /// `white_cp[i]` is the White-relative score before move `i`, the last
    /// entry the final position.
    pub fn script(mut self, movetext: &str, white_cp: &[i32]) -> Self {
        let start = Chess::default();
        let moves = notation::parse_movetext(&start, movetext).unwrap();
        assert_eq!(moves.len() + 1, white_cp.len(), "one score per position");

        let mut pos = start;
        for (i, &cp) in white_cp.iter().enumerate() {
            self.table.insert(
                notation::fen(&pos),
                PositionAnalysis {
                    evaluation: Evaluation::Centipawns(cp),
                    lines: Vec::new(),
                },
            );
            if let Some(mv) = moves.get(i) {
                pos.play_unchecked(*mv);
            }
        }
        self
    }

    /// Attach an engine line to the position reached after `movetext`.
    pub fn best_line(mut self, movetext: &str, uci: &[&str]) -> Self {
        let start = Chess::default();
        let mut pos = start.clone();
        for mv in notation::parse_movetext(&start, movetext).unwrap() {
            pos.play_unchecked(mv);
        }
        let entry = self
            .table
            .get_mut(&notation::fen(&pos))
            .expect("score the position before adding a line");
        entry.lines = vec![CandidateLine {
            rank: 1,
            evaluation: entry.evaluation,
            moves: uci.iter().map(|m| m.to_string()).collect(),
        }];
        self
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn analyse(
        &mut self,
        position: &Chess,
        _limit: SearchLimit,
    ) -> Result<PositionAnalysis, DeckError> {
        let fen = notation::fen(position);
        self.calls.push(fen.clone());
        self.table
            .get(&fen)
            .cloned()
            .ok_or_else(|| DeckError::EngineUnavailable(format!("unscripted position {fen}")))
    }
}

/// Game 1: White drops 500cp with 4. Nxe5. Game 2: nothing above 50cp.
pub const TWO_GAMES: &str = r#"[Event "Casual"]
[Site "https://lichess.org/abcdefgh"]
[Date "2024.03.01"]
[White "alice"]
[Black "bob"]
[Result "0-1"]
[WhiteElo "1500"]
[BlackElo "1550"]
[ECO "C50"]

1. e4 e5 2. Nf3 Nc6 3. Bc4 Nd4 4. Nxe5 Qg5 0-1

[Event "Casual"]
[Date "2024.03.02"]
[White "carol"]
[Black "alice"]
[Result "1/2-1/2"]

1. d4 d5 2. c4 e6 3. Nc3 Nf6 1/2-1/2
"#;

pub const GAME_ONE_MOVES: &str = "e4 e5 Nf3 Nc6 Bc4 Nd4 Nxe5 Qg5";
pub const GAME_ONE_EVALS: &[i32] = &[20, 30, 30, 25, 25, 30, 80, -420, -420];
pub const GAME_TWO_MOVES: &str = "d4 d5 c4 e6 Nc3 Nf6";
pub const GAME_TWO_EVALS: &[i32] = &[20, 25, 30, 35, 20, 30, -10];

pub fn two_game_engine() -> ScriptedEvaluator {
    ScriptedEvaluator::new()
        .script(GAME_ONE_MOVES, GAME_ONE_EVALS)
        .script(GAME_TWO_MOVES, GAME_TWO_EVALS)
        .best_line("e4 e5 Nf3 Nc6 Bc4 Nd4", &["f3d4", "e5d4", "c2c3"])
}

/// Open the collection inside an .apkg. Keep the returned file alive while
/// the connection is in use.
pub fn open_apkg(path: &Path) -> (Connection, tempfile::NamedTempFile) {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut db = tempfile::NamedTempFile::new().unwrap();
    let mut entry = archive.by_name("collection.anki2").unwrap();
    std::io::copy(&mut entry, &mut db).unwrap();
    db.flush().unwrap();
    let conn = Connection::open(db.path()).unwrap();
    (conn, db)
}

pub fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}
