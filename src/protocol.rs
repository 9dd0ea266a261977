//! Wire protocol for the WebSocket connection.
//!
//! Every frame in either direction is one JSON [`Envelope`]. The server
//! issues the initial START (the only envelope without a session id); the
//! client drives the game with SETUP/MOVE/UNDO/CHAT/MARKER; the server
//! echoes moves, chat, markers, and failures back on the same shape.

use serde::{Deserialize, Serialize};

/// Request/response action carried by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Start,
    Setup,
    Move,
    Undo,
    Chat,
    Marker,
    Error,
}

/// A move in board-square coordinates, e.g. `{"source":"e2","target":"e4"}`.
///
/// `promotion` is the lowercase piece letter suffix of UCI notation
/// (`e7e8q`), absent for ordinary moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSpec {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

impl MoveSpec {
    /// Splits a UCI move string (`e2e4`, `e7e8q`) into its parts.
    pub fn from_uci(uci: &str) -> Self {
        let source = uci.get(..2).unwrap_or_default().to_string();
        let target = uci.get(2..4).unwrap_or_default().to_string();
        let promotion = match uci.get(4..) {
            Some(p) if !p.is_empty() => Some(p.to_string()),
            _ => None,
        };
        Self {
            source,
            target,
            promotion,
        }
    }

    /// Reassembles the UCI move string.
    pub fn to_uci(&self) -> String {
        format!(
            "{}{}{}",
            self.source,
            self.target,
            self.promotion.as_deref().unwrap_or_default()
        )
    }
}

/// One protocol frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Session identifier. Issued by the server on START and echoed by the
    /// client on every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub action: Action,
    #[serde(rename = "move", default, skip_serializing_if = "Option::is_none")]
    pub mv: Option<MoveSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Envelope {
    pub fn start(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            action: Action::Start,
            mv: None,
            fen: None,
            text: None,
        }
    }

    pub fn move_played(id: &str, mv: MoveSpec) -> Self {
        Self {
            id: Some(id.to_string()),
            action: Action::Move,
            mv: Some(mv),
            fen: None,
            text: None,
        }
    }

    pub fn chat(id: &str, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.to_string()),
            action: Action::Chat,
            mv: None,
            fen: None,
            text: Some(text.into()),
        }
    }

    /// A marker toggle echo; both squares of the move field name the
    /// toggled square.
    pub fn marker(id: &str, square: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            action: Action::Marker,
            mv: Some(MoveSpec {
                source: square.to_string(),
                target: square.to_string(),
                promotion: None,
            }),
            fen: None,
            text: None,
        }
    }

    /// A failure report carrying the session's current position so the
    /// client can resynchronize its view.
    pub fn error(id: Option<&str>, fen: Option<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.map(str::to_string),
            action: Action::Error,
            mv: None,
            fen,
            text: Some(text.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_spec_uci_round_trip() {
        let mv = MoveSpec::from_uci("e2e4");
        assert_eq!(mv.source, "e2");
        assert_eq!(mv.target, "e4");
        assert_eq!(mv.promotion, None);
        assert_eq!(mv.to_uci(), "e2e4");
    }

    #[test]
    fn move_spec_promotion() {
        let mv = MoveSpec::from_uci("e7e8q");
        assert_eq!(mv.promotion.as_deref(), Some("q"));
        assert_eq!(mv.to_uci(), "e7e8q");
    }

    #[test]
    fn envelope_serde_round_trip() {
        let env = Envelope::move_played("abc", MoveSpec::from_uci("g1f3"));
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"action\":\"MOVE\""));
        assert!(json.contains("\"move\""));
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.action, Action::Move);
        assert_eq!(back.mv.unwrap().to_uci(), "g1f3");
    }

    #[test]
    fn inbound_chat_envelope_parses() {
        let back: Envelope =
            serde_json::from_str(r#"{"id":"x","action":"CHAT","text":"hello"}"#).unwrap();
        assert_eq!(back.action, Action::Chat);
        assert_eq!(back.text.as_deref(), Some("hello"));
        assert!(back.mv.is_none());
    }

    #[test]
    fn absent_fields_are_skipped() {
        let json = serde_json::to_string(&Envelope::start("s")).unwrap();
        assert!(!json.contains("fen"));
        assert!(!json.contains("text"));
        assert!(!json.contains("move"));
    }
}
