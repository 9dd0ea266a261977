//! The tool catalogue exposed to the model.
//!
//! A closed set of capabilities, each bound to the session it executes
//! against. Every tool validates its arguments against a serde-typed input
//! struct before touching the session; malformed input and illegal moves
//! are returned to the model as error *content* (never raised), so it can
//! self-correct on its next turn. Side effects (board mutation, outbound
//! envelopes, history appends) happen only after validation.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shakmaty::{Chess, Color, Square};

use crate::engine;
use crate::error::ToolError;
use crate::message::ToolCall;
use crate::protocol::{Envelope, MoveSpec};
use crate::session::Session;

/// The result of executing a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: String) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn error(content: String) -> Self {
        Self {
            content,
            is_error: true,
        }
    }
}

/// Definition sent to the LLM so it knows what tools are available.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value, // JSON Schema
}

/// The fixed set of tool kinds. Tool dispatch goes through this enum;
/// names outside it are rejected as invalid input, never as an unhandled
/// lookup failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    MakeMove,
    GetPosition,
    GetMoves,
    GetSquareInfo,
    AnalyseMove,
    SendMessage,
    MarkSquare,
    MarkedSquares,
    StopInteraction,
}

/// Catalogue order as advertised to the model.
pub const CATALOGUE: [ToolKind; 9] = [
    ToolKind::MakeMove,
    ToolKind::GetPosition,
    ToolKind::GetMoves,
    ToolKind::GetSquareInfo,
    ToolKind::AnalyseMove,
    ToolKind::SendMessage,
    ToolKind::MarkSquare,
    ToolKind::MarkedSquares,
    ToolKind::StopInteraction,
];

impl ToolKind {
    pub fn from_name(name: &str) -> Result<Self, ToolError> {
        match name {
            "make_move" => Ok(Self::MakeMove),
            "get_position" => Ok(Self::GetPosition),
            "get_moves" => Ok(Self::GetMoves),
            "get_square_info" => Ok(Self::GetSquareInfo),
            "analyse_move" => Ok(Self::AnalyseMove),
            "send_message" => Ok(Self::SendMessage),
            "mark_square" => Ok(Self::MarkSquare),
            "marked_squares" => Ok(Self::MarkedSquares),
            "stop_interaction" => Ok(Self::StopInteraction),
            other => Err(ToolError::InvalidInput(format!("unknown tool '{other}'"))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::MakeMove => "make_move",
            Self::GetPosition => "get_position",
            Self::GetMoves => "get_moves",
            Self::GetSquareInfo => "get_square_info",
            Self::AnalyseMove => "analyse_move",
            Self::SendMessage => "send_message",
            Self::MarkSquare => "mark_square",
            Self::MarkedSquares => "marked_squares",
            Self::StopInteraction => "stop_interaction",
        }
    }

    /// Whether executing this tool ends the agent's turn.
    pub fn terminates_turn(self) -> bool {
        matches!(self, Self::StopInteraction)
    }

    fn description(self) -> &'static str {
        match self {
            Self::MakeMove => {
                "Make a move on the chessboard. The move should be in algebraic notation \
                 (e.g., e5 or Nf6)."
            }
            Self::GetPosition => "Get the current state of the chessboard.",
            Self::GetMoves => "Get the list of moves made in the game.",
            Self::GetSquareInfo => {
                "Get information about a square on the chessboard (piece, legal moves, \
                 attackers and defenders)."
            }
            Self::AnalyseMove => {
                "Analyse a move to see if it is legal, if it gives check, and if it \
                 captures a piece, without playing it."
            }
            Self::SendMessage => {
                "Send a chat message to the user. This is the only way to send a message \
                 to the user."
            }
            Self::MarkSquare => {
                "Mark a square on the chessboard (removes the mark if it is already marked)."
            }
            Self::MarkedSquares => "Get the marked squares on the chessboard.",
            Self::StopInteraction => "Stop the current interaction with the chessboard.",
        }
    }

    fn parameters(self) -> Value {
        match self {
            Self::MakeMove | Self::AnalyseMove => json!({
                "type": "object",
                "properties": {
                    "move": {
                        "type": "string",
                        "description": "The move in algebraic notation (e.g., e5 or Nf6)"
                    }
                },
                "required": ["move"]
            }),
            Self::GetSquareInfo => json!({
                "type": "object",
                "properties": {
                    "square_name": {
                        "type": "string",
                        "description": "The name of the square (e.g., e4, f6)"
                    }
                },
                "required": ["square_name"]
            }),
            Self::SendMessage => json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "The text message to send"
                    }
                },
                "required": ["message"]
            }),
            Self::MarkSquare => json!({
                "type": "object",
                "properties": {
                    "square": {
                        "type": "string",
                        "description": "The name of the square (e.g., e4, f6)"
                    }
                },
                "required": ["square"]
            }),
            Self::GetPosition | Self::GetMoves | Self::MarkedSquares | Self::StopInteraction => {
                json!({ "type": "object", "properties": {} })
            }
        }
    }
}

/// Produce definitions for the LLM (sent in the API request).
pub fn definitions() -> Vec<ToolDefinition> {
    CATALOGUE
        .iter()
        .map(|kind| ToolDefinition {
            name: kind.name().to_string(),
            description: kind.description().to_string(),
            parameters: kind.parameters(),
        })
        .collect()
}

/// Executes one tool call against the session. Failures become error
/// content in the returned result; they never propagate.
pub fn execute(session: &mut Session, call: &ToolCall) -> ToolResult {
    match run(session, call) {
        Ok(content) => ToolResult::success(content),
        Err(err) => ToolResult::error(err.to_string()),
    }
}

fn run(session: &mut Session, call: &ToolCall) -> Result<String, ToolError> {
    match ToolKind::from_name(&call.name)? {
        ToolKind::MakeMove => make_move(session, parse_args(call)?),
        ToolKind::GetPosition => Ok(get_position(session)),
        ToolKind::GetMoves => Ok(get_moves(session)),
        ToolKind::GetSquareInfo => get_square_info(session, parse_args(call)?),
        ToolKind::AnalyseMove => analyse_move(session, parse_args(call)?),
        ToolKind::SendMessage => send_message(session, parse_args(call)?),
        ToolKind::MarkSquare => mark_square(session, parse_args(call)?),
        ToolKind::MarkedSquares => Ok(marked_squares(session)),
        ToolKind::StopInteraction => Ok("Interaction stopped.".to_string()),
    }
}

fn parse_args<T: DeserializeOwned>(call: &ToolCall) -> Result<T, ToolError> {
    serde_json::from_value(call.arguments.clone())
        .map_err(|e| ToolError::InvalidInput(e.to_string()))
}

#[derive(Deserialize)]
struct MoveInput {
    #[serde(rename = "move")]
    mv: String,
}

#[derive(Deserialize)]
struct SquareInfoInput {
    square_name: String,
}

#[derive(Deserialize)]
struct MessageInput {
    message: String,
}

#[derive(Deserialize)]
struct MarkInput {
    square: String,
}

fn make_move(session: &mut Session, input: MoveInput) -> Result<String, ToolError> {
    let m = session.game.push_san(&input.mv)?;
    let uci = engine::uci_of(&m);
    let envelope = Envelope::move_played(&session.id, MoveSpec::from_uci(&uci));
    session.send(envelope);
    Ok(format!("Move made: {uci}"))
}

fn get_position(session: &Session) -> String {
    if session.game.is_starting_position() {
        return "The chessboard is in the starting position.".to_string();
    }

    let game = &session.game;
    let mut lines: Vec<String> = vec!["Here is the current state of the chess game:".into()];
    for (sq, piece) in game.piece_map() {
        let attacked = game.is_attacked_by(sq, !piece.color);
        lines.push(format!(
            "{}: {} {}{}",
            sq,
            engine::color_name(piece.color),
            engine::role_name(piece.role),
            if attacked { " (attacked)" } else { "" }
        ));
    }

    let move_count = game.move_count();
    if move_count > 0 && move_count < 20 {
        lines.push(format!("Move history: {}", game.history_san()));
    }

    let mut status = format!("It is {}'s turn.", engine::color_name(game.turn()));
    if game.is_check() {
        let checkers: Vec<String> = game
            .checkers()
            .iter()
            .map(|sq| describe_occupant(game.piece_at(*sq), *sq))
            .collect();
        status.push_str(&format!(
            " The position is a check. Checkers: {}",
            checkers.join(", ")
        ));
    } else {
        status.push_str(" The position is not a check.");
    }
    lines.push(status);

    lines.join("\n")
}

fn get_moves(session: &Session) -> String {
    if session.game.move_count() == 0 {
        if session.game.is_starting_position() {
            return "No moves have been made yet.".to_string();
        }
        return "The move history is unavailable, but the game is not in the starting position."
            .to_string();
    }
    format!("Moves made: {}", session.game.history_san())
}

fn get_square_info(session: &Session, input: SquareInfoInput) -> Result<String, ToolError> {
    let sq = engine::parse_square(&input.square_name)?;
    let game = &session.game;

    let occupant = match game.piece_at(sq) {
        None => format!("No piece on {sq}."),
        Some(piece) => {
            let mut line = format!(
                "There is a {} {} on {}.",
                engine::color_name(piece.color),
                engine::role_name(piece.role),
                sq
            );
            let legal = game.legal_from(sq);
            if legal.is_empty() {
                line.push_str(" It can't move because");
                if game.turn() != piece.color {
                    line.push_str(&format!(
                        " it is not {}'s turn.",
                        engine::color_name(piece.color)
                    ));
                } else if game.is_check() {
                    line.push_str(" of a check.");
                } else {
                    line.push_str(" it is blocked or pinned.");
                }
                let attacks: Vec<String> = game
                    .attacks_from(sq)
                    .iter()
                    .map(Square::to_string)
                    .collect();
                if !attacks.is_empty() {
                    line.push_str(&format!(
                        " However, it attacks the following squares: {}.",
                        attacks.join(", ")
                    ));
                }
            } else {
                line.push_str(&format!(
                    " It can move to the following squares: {}.",
                    legal.join(", ")
                ));
            }
            line
        }
    };

    Ok([
        occupant,
        attacker_line(game.position(), sq, Color::White),
        attacker_line(game.position(), sq, Color::Black),
    ]
    .join("\n"))
}

fn analyse_move(session: &Session, input: MoveInput) -> Result<String, ToolError> {
    let (m, after) = match session.game.probe_san(&input.mv) {
        Ok(probe) => probe,
        // Content, not an error: the model asked whether the move works.
        Err(_) => return Ok(format!("The move {} is illegal.", input.mv.trim())),
    };

    let mut result = format!("The move {} is legal.", input.mv.trim());
    if after.is_check() {
        result.push_str(" It gives check.");
    } else {
        result.push_str(" It does not give check.");
    }

    match m.capture() {
        Some(role) => result.push_str(&format!(
            " It captures a {} {}.",
            engine::color_name(!session.game.turn()),
            engine::role_name(role)
        )),
        None => result.push_str(" It does not capture any piece."),
    }

    let to = m.to();
    let attacked: Vec<String> = engine::attacks_from_on(&after, to)
        .iter()
        .map(Square::to_string)
        .collect();
    result.push('\n');
    result.push_str(&format!(
        "It attacks the following squares: {}.",
        if attacked.is_empty() {
            "none".to_string()
        } else {
            attacked.join(", ")
        }
    ));
    result.push('\n');
    result.push_str(&attacker_line(&after, to, Color::White));
    result.push('\n');
    result.push_str(&attacker_line(&after, to, Color::Black));

    Ok(result)
}

fn send_message(session: &mut Session, input: MessageInput) -> Result<String, ToolError> {
    let envelope = Envelope::chat(&session.id, input.message.as_str());
    session.send(envelope);
    session.stage_reply(input.message.as_str());
    Ok(format!("Message sent: {}", input.message))
}

fn mark_square(session: &mut Session, input: MarkInput) -> Result<String, ToolError> {
    let sq = engine::parse_square(&input.square)?;
    let name = sq.to_string();
    let marked = session.toggle_marker(&name);
    let envelope = Envelope::marker(&session.id, &name);
    session.send(envelope);
    Ok(if marked {
        format!("Marked {name}.")
    } else {
        format!("Removed the mark on {name}.")
    })
}

fn marked_squares(session: &Session) -> String {
    if session.markers.is_empty() {
        return "No marked squares.".to_string();
    }
    format!("Marked squares: {}", session.markers.join(", "))
}

/// One line naming the attackers (or defenders, when the occupant shares
/// the attacking color) of a square.
fn attacker_line(pos: &Chess, sq: Square, color: Color) -> String {
    let occupant = pos.board().piece_at(sq);
    let title = match occupant {
        Some(p) if p.color == color => "defenders",
        _ => "attackers",
    };
    let attackers = engine::attackers_on(pos, sq, color);
    if attackers.is_empty() {
        return format!("No {} {} for {}.", engine::color_name(color), title, sq);
    }
    let pieces: Vec<String> = attackers
        .iter()
        .map(|a| describe_occupant(pos.board().piece_at(*a), *a))
        .collect();
    format!(
        "{} {} for {}: {}.",
        capitalize(engine::color_name(color)),
        title,
        sq,
        pieces.join(", ")
    )
}

fn describe_occupant(piece: Option<shakmaty::Piece>, sq: Square) -> String {
    match piece {
        Some(p) => format!("{} on {}", engine::role_name(p.role), sq),
        None => sq.to_string(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
