//! FEN, movetext and UCI helpers.

use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus};
use shakmaty::uci::UciMove;
use shakmaty::{Chess, Color, EnPassantMode, Move, Position};

use crate::error::NotationError;

pub fn fen(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

/// Render moves as numbered movetext, e.g. `1. e4 e5 2. Nf3` or, when the
/// first move is Black's, `14... Nc6 15. g5`.
///
/// Moves must be legal in sequence from `start`.
pub fn movetext(start: &Chess, moves: &[Move]) -> String {
    let mut pos = start.clone();
    let mut out = String::new();

    for (i, mv) in moves.iter().enumerate() {
        if !out.is_empty() {
            out.push(' ');
        }
        let number = pos.fullmoves().get();
        if pos.turn() == Color::White {
            out.push_str(&format!("{number}. "));
        } else if i == 0 {
            out.push_str(&format!("{number}... "));
        }
        let san = SanPlus::from_move_and_play_unchecked(&mut pos, *mv);
        out.push_str(&san.to_string());
    }

    out
}

/// Parse movetext (move numbers, check marks and result markers allowed)
/// into moves played from `start`.
pub fn parse_movetext(start: &Chess, text: &str) -> Result<Vec<Move>, NotationError> {
    let mut pos = start.clone();
    let mut moves = Vec::new();

    for token in text.split_whitespace() {
        // "12." / "12..." / "12.e4"
        let token = token
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .trim_start_matches('.');
        if token.is_empty() || matches!(token, "1-0" | "0-1" | "1/2-1/2" | "*") {
            continue;
        }

        let san_plus: SanPlus = token
            .parse()
            .map_err(|_| NotationError::InvalidSan(token.to_string()))?;
        let mv = san_plus
            .san
            .to_move(&pos)
            .map_err(|_| NotationError::IllegalMove {
                san: token.to_string(),
                fen: fen(&pos),
            })?;
        pos.play_unchecked(mv);
        moves.push(mv);
    }

    Ok(moves)
}

/// Convert a UCI line into moves, stopping at the first move that is not
/// legal in the running position. Returns the legal prefix and the rejected
/// move, if any.
pub fn uci_line(start: &Chess, line: &[String]) -> (Vec<Move>, Option<String>) {
    let mut pos = start.clone();
    let mut moves = Vec::with_capacity(line.len());

    for uci in line {
        let legal = uci
            .parse::<UciMove>()
            .ok()
            .and_then(|u| u.to_move(&pos).ok());
        match legal {
            Some(mv) => {
                pos.play_unchecked(mv);
                moves.push(mv);
            }
            None => return (moves, Some(uci.clone())),
        }
    }

    (moves, None)
}

/// SAN of a single move, without check suffix.
pub fn san(pos: &Chess, mv: Move) -> String {
    San::from_move(pos, mv).to_string()
}
