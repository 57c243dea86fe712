//! Stockfish engine wrapper using UCI protocol (async I/O)

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chess_core::notation;
use shakmaty::{CastlingMode, Chess, Position};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::debug;

use crate::analysis::{EngineScore, Evaluation};
use crate::error::DeckError;
use crate::evaluator::{CandidateLine, Evaluator, PositionAnalysis, SearchLimit};

/// How the engine process is started and configured.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub threads: u32,
    pub hash_mb: u32,
    /// Number of ranked lines to request (UCI MultiPV)
    pub multipv: u32,
    /// Extra time allowed on top of the search budget before the engine is
    /// considered unresponsive
    pub grace: Duration,
}

impl EngineOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            threads: 1,
            hash_mb: 256,
            multipv: 1,
            grace: Duration::from_secs(10),
        }
    }
}

/// A single PV line from (multi-PV) analysis, relative to the side to move
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PvLine {
    /// 1-based multipv index
    pub multipv: u32,
    pub score: Option<EngineScore>,
    /// Principal variation moves
    pub pv: Vec<String>,
}

/// Stockfish engine instance
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    options: EngineOptions,
    /// Current value of the engine's UCI_Chess960 option
    chess960: bool,
}

impl StockfishEngine {
    /// Spawn a new engine process and initialize UCI
    pub async fn new(options: EngineOptions) -> Result<Self, DeckError> {
        let path = options.path.display().to_string();
        let mut process = Command::new(&options.path)
            .args(&options.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| DeckError::EngineUnavailable(format!("Failed to spawn {path}: {e}")))?;

        let (Some(stdin), Some(stdout)) = (process.stdin.take(), process.stdout.take()) else {
            let _ = process.start_kill();
            return Err(DeckError::EngineUnavailable(format!(
                "No stdio pipes for {path}"
            )));
        };

        // Startup can be slow (NNUE load); never allow less than a few seconds
        let startup = options.grace.max(Duration::from_secs(5));
        let mut engine = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
            options,
            chess960: false,
        };

        timeout(startup, engine.handshake())
            .await
            .map_err(|_| {
                DeckError::EngineUnavailable(format!("{path} did not complete the UCI handshake"))
            })??;

        Ok(engine)
    }

    async fn handshake(&mut self) -> Result<(), DeckError> {
        self.send("uci").await?;
        self.wait_for("uciok").await?;

        // Configure for analysis
        let threads = self.options.threads;
        let hash = self.options.hash_mb;
        let multipv = self.options.multipv.max(1);
        self.send(&format!("setoption name Threads value {threads}")).await?;
        self.send(&format!("setoption name Hash value {hash}")).await?;
        self.send(&format!("setoption name MultiPV value {multipv}")).await?;
        self.send("setoption name UCI_AnalyseMode value true").await?;
        self.send("isready").await?;
        self.wait_for("readyok").await
    }

    /// Send a command to the engine
    async fn send(&mut self, cmd: &str) -> Result<(), DeckError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| DeckError::EngineUnavailable(format!("Failed to write to engine: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| DeckError::EngineUnavailable(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    /// Read one line; end of output means the engine died
    async fn read_line(&mut self) -> Result<String, DeckError> {
        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| DeckError::EngineUnavailable(format!("Failed to read from engine: {e}")))?;
        if read == 0 {
            return Err(DeckError::EngineUnavailable(
                "Engine closed its output (crashed or exited)".into(),
            ));
        }
        let trimmed = line.trim().to_string();
        debug!(line = %trimmed, "SF >");
        Ok(trimmed)
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), DeckError> {
        loop {
            if self.read_line().await? == expected {
                return Ok(());
            }
        }
    }

    /// Switch UCI_Chess960 so castling is reported as king-takes-rook and
    /// X-FEN castling rights are read correctly.
    async fn set_chess960(&mut self, enabled: bool) -> Result<(), DeckError> {
        if self.chess960 == enabled {
            return Ok(());
        }
        self.send(&format!("setoption name UCI_Chess960 value {enabled}")).await?;
        self.send("isready").await?;
        self.wait_for("readyok").await?;
        self.chess960 = enabled;
        Ok(())
    }

    /// Search a position and collect the final info line of every PV
    pub async fn search(&mut self, fen: &str, limit: SearchLimit) -> Result<Vec<PvLine>, DeckError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&limit.go_command()).await?;

        let slots = self.options.multipv.max(1) as usize;
        let mut lines: Vec<PvLine> = vec![PvLine::default(); slots];

        loop {
            let line = self.read_line().await?;

            if line.starts_with("info") && line.contains(" pv ") {
                // Bound scores come from aspiration windows, not final values
                if line.contains("lowerbound") || line.contains("upperbound") {
                    continue;
                }
                let idx = parse_multipv_index(&line).unwrap_or(1).max(1) as usize - 1;
                if let Some(entry) = lines.get_mut(idx) {
                    entry.multipv = idx as u32 + 1;
                    entry.score = parse_score(&line);
                    entry.pv = parse_pv(&line);
                }
            } else if line.starts_with("bestmove") {
                break;
            }
        }

        lines.retain(|l| !l.pv.is_empty());
        Ok(lines)
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        if timeout(Duration::from_secs(2), self.process.wait()).await.is_err() {
            let _ = self.process.start_kill();
        }
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

#[async_trait]
impl Evaluator for StockfishEngine {
    async fn analyse(
        &mut self,
        position: &Chess,
        limit: SearchLimit,
    ) -> Result<PositionAnalysis, DeckError> {
        let fen = notation::fen(position);
        let deadline = limit.budget() + self.options.grace;
        let chess960 = position.castles().mode() == CastlingMode::Chess960;

        let raw = timeout(deadline, async {
            self.set_chess960(chess960).await?;
            self.search(&fen, limit).await
        })
        .await
            .map_err(|_| {
                DeckError::EngineUnavailable(format!(
                    "No bestmove within {:.1}s for position {fen}",
                    deadline.as_secs_f64()
                ))
            })??;

        let turn = position.turn();
        let lines: Vec<CandidateLine> = raw
            .into_iter()
            .filter_map(|line| {
                line.score.map(|score| CandidateLine {
                    rank: line.multipv,
                    evaluation: Evaluation::from_side_to_move(score, turn),
                    moves: line.pv,
                })
            })
            .collect();

        let evaluation = lines
            .first()
            .map(|line| line.evaluation)
            .ok_or_else(|| {
                DeckError::EngineUnavailable(format!("Engine returned no score for position {fen}"))
            })?;

        Ok(PositionAnalysis { evaluation, lines })
    }
}

/// Parse centipawn or mate score from info line
fn parse_score(line: &str) -> Option<EngineScore> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "score" && i + 2 < parts.len() {
            let value = parts[i + 2].parse().ok()?;
            return match parts[i + 1] {
                "cp" => Some(EngineScore::Cp(value)),
                "mate" => Some(EngineScore::Mate(value)),
                _ => None,
            };
        }
    }
    None
}

/// Parse multipv index from info line
fn parse_multipv_index(line: &str) -> Option<u32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "multipv" && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// Parse PV moves from info line
fn parse_pv(line: &str) -> Vec<String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut in_pv = false;
    let mut moves = Vec::new();

    for part in parts {
        if part == "pv" {
            in_pv = true;
            continue;
        }
        if in_pv {
            // PV ends at next keyword or end of line
            if part.starts_with("bmc") || part == "string" {
                break;
            }
            moves.push(part.to_string());
        }
    }

    moves
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_score() {
        let line = "info depth 20 seldepth 25 multipv 1 score cp 35 nodes 100000 pv e2e4";
        assert_eq!(parse_score(line), Some(EngineScore::Cp(35)));

        let line = "info depth 20 score mate -3 nodes 100000 pv e2e4";
        assert_eq!(parse_score(line), Some(EngineScore::Mate(-3)));

        assert_eq!(parse_score("info depth 1 nodes 20 pv e2e4"), None);
    }

    #[test]
    fn test_parse_multipv_index() {
        let line = "info depth 12 multipv 3 score cp -12 pv g1f3";
        assert_eq!(parse_multipv_index(line), Some(3));
        assert_eq!(parse_multipv_index("info depth 12 score cp 5 pv g1f3"), None);
    }

    #[test]
    fn test_parse_pv() {
        let line = "info depth 20 score cp 35 pv e2e4 e7e5 g1f3";
        let pv = parse_pv(line);
        assert_eq!(pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn test_parse_pv_stops_at_bmc() {
        let line = "info depth 20 score cp 35 pv e2e4 e7e5 bmc 0.2";
        assert_eq!(parse_pv(line), vec!["e2e4", "e7e5"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_engine_unavailable() {
        let options = EngineOptions::new("/nonexistent/path/to/stockfish");
        let result = StockfishEngine::new(options).await;
        assert!(matches!(result, Err(DeckError::EngineUnavailable(_))));
    }

    #[cfg(unix)]
    mod fake_engine {
        use std::io::Write;

        use shakmaty::fen::Fen;
        use shakmaty::Color;
        use tempfile::NamedTempFile;

        use super::*;

        const ANSWERING: &str = r#"
            go*)
              echo "info depth 1 seldepth 1 multipv 1 score cp 35 nodes 20 pv e2e4 e7e5"
              echo "info depth 2 seldepth 2 multipv 1 score cp 41 lowerbound nodes 30 pv g1f3"
              echo "info depth 2 seldepth 2 multipv 1 score cp 41 nodes 40 pv d2d4 d7d5 c2c4"
              echo "bestmove d2d4 ponder d7d5" ;;"#;

        /// Shell script speaking just enough UCI; `on_go` is a case arm.
        fn script(on_go: &str) -> NamedTempFile {
            let mut file = NamedTempFile::new().unwrap();
            write!(
                file,
                r#"while read -r line; do
  case "$line" in
    uci) echo "id name Fake"; echo uciok ;;
    isready) echo readyok ;;
    quit) exit 0 ;;
    {on_go}
  esac
done
"#
            )
            .unwrap();
            file.flush().unwrap();
            file
        }

        fn options(script: &NamedTempFile) -> EngineOptions {
            EngineOptions {
                args: vec![script.path().display().to_string()],
                grace: Duration::from_millis(200),
                ..EngineOptions::new("/bin/sh")
            }
        }

        const LIMIT: SearchLimit = SearchLimit::MoveTime(Duration::from_millis(10));

        #[tokio::test]
        async fn test_analysis_keeps_last_exact_line() {
            let file = script(ANSWERING);
            let mut engine = StockfishEngine::new(options(&file)).await.unwrap();

            let analysis = engine.analyse(&Chess::default(), LIMIT).await.unwrap();
            assert_eq!(analysis.evaluation, Evaluation::Centipawns(41));
            assert_eq!(analysis.best_move(), Some("d2d4"));
            assert_eq!(analysis.lines[0].moves, vec!["d2d4", "d7d5", "c2c4"]);

            engine.quit().await;
        }

        #[tokio::test]
        async fn test_black_to_move_is_flipped() {
            let file = script(ANSWERING);
            let mut engine = StockfishEngine::new(options(&file)).await.unwrap();

            let mut pos = Chess::default();
            let mv = notation::parse_movetext(&pos, "e4").unwrap().remove(0);
            pos.play_unchecked(mv);
            assert_eq!(pos.turn(), Color::Black);

            let analysis = engine.analyse(&pos, LIMIT).await.unwrap();
            assert_eq!(analysis.evaluation, Evaluation::Centipawns(-41));

            engine.quit().await;
        }

        #[tokio::test]
        async fn test_multipv_lines_ranked_by_index() {
            // Line 2 arrives first and last; slot 3 is never filled
            let file = script(
                r#"go*)
              echo "info depth 4 multipv 2 score cp 5 pv d2d4"
              echo "info depth 5 multipv 1 score cp 30 pv e2e4 e7e5"
              echo "info depth 5 multipv 2 score cp -12 pv g1f3"
              echo "bestmove e2e4" ;;"#,
            );
            let mut engine = StockfishEngine::new(EngineOptions {
                multipv: 3,
                ..options(&file)
            })
            .await
            .unwrap();

            let analysis = engine.analyse(&Chess::default(), LIMIT).await.unwrap();
            assert_eq!(analysis.evaluation, Evaluation::Centipawns(30));
            assert_eq!(analysis.lines.len(), 2);
            assert_eq!(analysis.lines[0].rank, 1);
            assert_eq!(analysis.lines[0].moves, vec!["e2e4", "e7e5"]);
            assert_eq!(analysis.lines[1].rank, 2);
            assert_eq!(analysis.lines[1].evaluation, Evaluation::Centipawns(-12));
            assert_eq!(analysis.lines[1].moves, vec!["g1f3"]);

            engine.quit().await;
        }

        #[tokio::test]
        async fn test_chess960_mode_follows_position() {
            // Answers with a king-takes-rook castle only once UCI_Chess960 is on
            let file = script(
                r#""setoption name UCI_Chess960 value true") mode=960 ;;
    "setoption name UCI_Chess960 value false") mode=std ;;
    go*)
              if [ "$mode" = 960 ]; then
                echo "info depth 1 multipv 1 score cp 20 pv b1h1 b8h8"
              else
                echo "info depth 1 multipv 1 score cp 20 pv e2e4"
              fi
              echo "bestmove none" ;;"#,
            );
            let mut engine = StockfishEngine::new(options(&file)).await.unwrap();

            let pos: Chess = Fen::from_ascii(b"rk5r/pppppppp/8/8/8/8/PPPPPPPP/RK5R w HAha - 0 1")
                .unwrap()
                .into_position(CastlingMode::Chess960)
                .unwrap();
            let analysis = engine.analyse(&pos, LIMIT).await.unwrap();
            let (moves, rejected) = notation::uci_line(&pos, &analysis.lines[0].moves);
            assert_eq!(rejected, None);
            assert_eq!(moves.len(), 2);
            assert!(moves[0].is_castle());

            let analysis = engine.analyse(&Chess::default(), LIMIT).await.unwrap();
            assert_eq!(analysis.best_move(), Some("e2e4"));

            engine.quit().await;
        }

        #[tokio::test]
        async fn test_crash_during_search() {
            let file = script("go*) exit 1 ;;");
            let mut engine = StockfishEngine::new(options(&file)).await.unwrap();

            let result = engine.analyse(&Chess::default(), LIMIT).await;
            assert!(matches!(result, Err(DeckError::EngineUnavailable(_))));
        }

        #[tokio::test]
        async fn test_silent_engine_times_out() {
            let file = script("go*) ;;");
            let mut engine = StockfishEngine::new(options(&file)).await.unwrap();

            let result = engine.analyse(&Chess::default(), LIMIT).await;
            assert!(matches!(result, Err(DeckError::EngineUnavailable(_))));
        }

        #[tokio::test]
        async fn test_no_handshake() {
            let mut file = NamedTempFile::new().unwrap();
            writeln!(file, "exit 0").unwrap();
            file.flush().unwrap();

            let result = StockfishEngine::new(options(&file)).await;
            assert!(matches!(result, Err(DeckError::EngineUnavailable(_))));
        }
    }
}
