//! Rules-engine pass-through.
//!
//! [`Game`] owns a shakmaty position together with an undo stack and a SAN
//! log. All mutation goes through validated move application; everything
//! else is read-only queries (legal destinations, attackers, check status)
//! the tool catalogue renders into text for the model.

use rand::seq::SliceRandom;
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position, Role, Square};
use thiserror::Error;

/// Board-part of the standard starting FEN, used to detect an untouched game.
const STARTING_BOARD: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid FEN string: {0}")]
    InvalidFen(String),

    #[error("could not parse move '{0}'")]
    MoveParse(String),

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("unknown square '{0}'")]
    BadSquare(String),

    #[error("no move to undo")]
    EmptyMoveStack,

    #[error("no legal moves in this position")]
    NoLegalMoves,
}

/// A chess game: current position, undo stack, and SAN move log.
#[derive(Debug, Clone)]
pub struct Game {
    pos: Chess,
    stack: Vec<Chess>,
    moves: Vec<Move>,
    sans: Vec<SanPlus>,
    /// Side to move and fullmove number at the base of the stack, for
    /// numbering the rendered move history after a SETUP.
    start_turn: Color,
    start_fullmove: u32,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    /// A game at the standard starting position.
    pub fn new() -> Self {
        let pos = Chess::default();
        let start_turn = pos.turn();
        let start_fullmove = pos.fullmoves().get();
        Self {
            pos,
            stack: Vec::new(),
            moves: Vec::new(),
            sans: Vec::new(),
            start_turn,
            start_fullmove,
        }
    }

    /// Replaces the position from a FEN string, clearing the move stack.
    pub fn set_fen(&mut self, fen: &str) -> Result<(), EngineError> {
        let parsed: Fen = fen
            .parse()
            .map_err(|_| EngineError::InvalidFen(fen.to_string()))?;
        let pos: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|_| EngineError::InvalidFen(fen.to_string()))?;
        self.start_turn = pos.turn();
        self.start_fullmove = pos.fullmoves().get();
        self.pos = pos;
        self.stack.clear();
        self.moves.clear();
        self.sans.clear();
        Ok(())
    }

    /// Current position as a full FEN string.
    pub fn fen(&self) -> String {
        Fen::from_position(self.pos.clone(), EnPassantMode::Legal).to_string()
    }

    pub fn turn(&self) -> Color {
        self.pos.turn()
    }

    /// Read-only view of the current position for attack/occupancy queries.
    pub fn position(&self) -> &Chess {
        &self.pos
    }

    pub fn is_check(&self) -> bool {
        self.pos.is_check()
    }

    /// Squares of the pieces currently giving check.
    pub fn checkers(&self) -> Vec<Square> {
        self.pos.checkers().into_iter().collect()
    }

    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    /// Whether the game sits untouched at the standard starting setup.
    pub fn is_starting_position(&self) -> bool {
        self.fen().starts_with(STARTING_BOARD)
    }

    /// Parses a move in standard algebraic notation and applies it.
    ///
    /// `San::to_move` only resolves against the legal moves of the current
    /// position, so a syntactically valid but illegal move fails here with
    /// [`EngineError::IllegalMove`].
    pub fn push_san(&mut self, san: &str) -> Result<Move, EngineError> {
        let parsed: SanPlus = san
            .trim()
            .parse()
            .map_err(|_| EngineError::MoveParse(san.trim().to_string()))?;
        let m = parsed
            .san
            .to_move(&self.pos)
            .map_err(|_| EngineError::IllegalMove(san.trim().to_string()))?;
        Ok(self.apply(m))
    }

    /// Parses a move in UCI coordinates (`e2e4`) and applies it.
    pub fn push_uci(&mut self, uci: &str) -> Result<Move, EngineError> {
        let parsed: UciMove = uci
            .parse()
            .map_err(|_| EngineError::MoveParse(uci.to_string()))?;
        let m = parsed
            .to_move(&self.pos)
            .map_err(|_| EngineError::IllegalMove(uci.to_string()))?;
        Ok(self.apply(m))
    }

    /// Applies a uniformly random legal move.
    pub fn random_move(&mut self) -> Result<Move, EngineError> {
        let legal = self.pos.legal_moves();
        let m = legal
            .choose(&mut rand::thread_rng())
            .ok_or(EngineError::NoLegalMoves)?
            .clone();
        Ok(self.apply(m))
    }

    /// Pops the most recent move off the stack.
    pub fn undo(&mut self) -> Result<(), EngineError> {
        let prev = self.stack.pop().ok_or(EngineError::EmptyMoveStack)?;
        self.pos = prev;
        self.moves.pop();
        self.sans.pop();
        Ok(())
    }

    fn apply(&mut self, m: Move) -> Move {
        self.stack.push(self.pos.clone());
        self.moves.push(m.clone());
        let san = SanPlus::from_move_and_play_unchecked(&mut self.pos, m.clone());
        self.sans.push(san);
        m
    }

    /// Resolves a SAN move against the current position without applying
    /// it, returning the move and the position it would lead to.
    pub fn probe_san(&self, san: &str) -> Result<(Move, Chess), EngineError> {
        let parsed: SanPlus = san
            .trim()
            .parse()
            .map_err(|_| EngineError::MoveParse(san.trim().to_string()))?;
        let m = parsed
            .san
            .to_move(&self.pos)
            .map_err(|_| EngineError::IllegalMove(san.trim().to_string()))?;
        let mut after = self.pos.clone();
        after.play_unchecked(m.clone());
        Ok((m, after))
    }

    /// Numbered SAN rendering of the move history, e.g. `1. e4 e5 2. Nf3`.
    pub fn history_san(&self) -> String {
        let mut out = String::new();
        let mut number = self.start_fullmove;
        let mut turn = self.start_turn;
        for (i, san) in self.sans.iter().enumerate() {
            match turn {
                Color::White => {
                    if i > 0 {
                        out.push(' ');
                    }
                    out.push_str(&format!("{}. {}", number, san));
                }
                Color::Black => {
                    if i == 0 {
                        out.push_str(&format!("{}... {}", number, san));
                    } else {
                        out.push_str(&format!(" {}", san));
                    }
                    number += 1;
                }
            }
            turn = !turn;
        }
        out
    }

    pub fn piece_at(&self, sq: Square) -> Option<shakmaty::Piece> {
        self.pos.board().piece_at(sq)
    }

    /// All occupied squares with their pieces, ordered by square.
    pub fn piece_map(&self) -> Vec<(Square, shakmaty::Piece)> {
        let board = self.pos.board();
        board
            .occupied()
            .into_iter()
            .filter_map(|sq| board.piece_at(sq).map(|p| (sq, p)))
            .collect()
    }

    /// UCI strings of the legal moves leaving the given square.
    pub fn legal_from(&self, sq: Square) -> Vec<String> {
        self.pos
            .legal_moves()
            .iter()
            .filter(|m| m.from() == Some(sq))
            .map(|m| m.to_uci(CastlingMode::Standard).to_string())
            .collect()
    }

    /// Squares attacked by the piece standing on `sq` in the current
    /// position (empty when the square is empty).
    pub fn attacks_from(&self, sq: Square) -> Vec<Square> {
        attacks_from_on(&self.pos, sq)
    }

    /// Squares of `color`'s pieces attacking `sq`.
    pub fn attackers(&self, sq: Square, color: Color) -> Vec<Square> {
        attackers_on(&self.pos, sq, color)
    }

    /// Whether `sq` is attacked by any piece of `color`.
    pub fn is_attacked_by(&self, sq: Square, color: Color) -> bool {
        !self.attackers(sq, color).is_empty()
    }
}

/// Squares attacked by the piece on `sq` in an arbitrary position.
pub fn attacks_from_on(pos: &Chess, sq: Square) -> Vec<Square> {
    pos.board().attacks_from(sq).into_iter().collect()
}

/// Squares of `color`'s pieces attacking `sq` in an arbitrary position.
pub fn attackers_on(pos: &Chess, sq: Square, color: Color) -> Vec<Square> {
    let board = pos.board();
    board
        .attacks_to(sq, color, board.occupied())
        .into_iter()
        .collect()
}

/// Parses a board-square label such as `e4`.
pub fn parse_square(name: &str) -> Result<Square, EngineError> {
    Square::from_ascii(name.trim().as_bytes())
        .map_err(|_| EngineError::BadSquare(name.trim().to_string()))
}

/// UCI string of a move in a standard-castling game.
pub fn uci_of(m: &Move) -> String {
    m.to_uci(CastlingMode::Standard).to_string()
}

pub fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

pub fn role_name(role: Role) -> &'static str {
    match role {
        Role::Pawn => "pawn",
        Role::Knight => "knight",
        Role::Bishop => "bishop",
        Role::Rook => "rook",
        Role::Queen => "queen",
        Role::King => "king",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_san_advances_position() {
        let mut game = Game::new();
        let m = game.push_san("e4").unwrap();
        assert_eq!(uci_of(&m), "e2e4");
        assert_eq!(game.turn(), Color::Black);
        assert_eq!(game.move_count(), 1);
        assert!(!game.is_starting_position());
    }

    #[test]
    fn push_san_rejects_garbage() {
        let mut game = Game::new();
        assert!(matches!(
            game.push_san("Z9"),
            Err(EngineError::MoveParse(_))
        ));
        assert_eq!(game.move_count(), 0);
    }

    #[test]
    fn push_san_rejects_illegal() {
        let mut game = Game::new();
        // Ke2 is syntactically fine but the king cannot move yet.
        assert!(matches!(
            game.push_san("Ke2"),
            Err(EngineError::IllegalMove(_))
        ));
    }

    #[test]
    fn undo_restores_previous_position() {
        let mut game = Game::new();
        let before = game.fen();
        game.push_san("e4").unwrap();
        game.undo().unwrap();
        assert_eq!(game.fen(), before);
        assert!(matches!(game.undo(), Err(EngineError::EmptyMoveStack)));
    }

    #[test]
    fn set_fen_replaces_position_and_clears_stack() {
        let mut game = Game::new();
        game.push_san("e4").unwrap();
        game.set_fen("rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2")
            .unwrap();
        assert_eq!(game.move_count(), 0);
        assert!(matches!(game.undo(), Err(EngineError::EmptyMoveStack)));
        assert!(game.set_fen("not a fen").is_err());
    }

    #[test]
    fn random_move_is_legal() {
        let mut game = Game::new();
        game.random_move().unwrap();
        assert_eq!(game.move_count(), 1);
    }

    #[test]
    fn history_san_numbers_moves() {
        let mut game = Game::new();
        game.push_san("e4").unwrap();
        game.push_san("e5").unwrap();
        game.push_san("Nf3").unwrap();
        assert_eq!(game.history_san(), "1. e4 e5 2. Nf3");
    }

    #[test]
    fn probe_does_not_commit() {
        let game = {
            let mut g = Game::new();
            g.push_san("e4").unwrap();
            g.push_san("e5").unwrap();
            g
        };
        let before = game.fen();
        let (m, after) = game.probe_san("Qh5").unwrap();
        assert_eq!(uci_of(&m), "d1h5");
        assert!(!after.is_check());
        assert_eq!(game.fen(), before);
    }

    #[test]
    fn attackers_sees_defenders_of_e5() {
        let mut game = Game::new();
        game.push_san("e4").unwrap();
        game.push_san("e5").unwrap();
        game.push_san("Nf3").unwrap();
        // The knight on f3 attacks the black pawn on e5.
        let sq = parse_square("e5").unwrap();
        let white = game.attackers(sq, Color::White);
        assert_eq!(white, vec![parse_square("f3").unwrap()]);
        assert!(game.is_attacked_by(sq, Color::White));
    }

    #[test]
    fn parse_square_rejects_nonsense() {
        assert!(parse_square("e9").is_err());
        assert!(parse_square("zz").is_err());
        assert_eq!(parse_square(" e4 ").unwrap().to_string(), "e4");
    }
}
