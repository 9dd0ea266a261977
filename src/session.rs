//! Per-game session state and the session registry.
//!
//! One [`Session`] exists per live WebSocket connection. It owns the game
//! state, the conversation history replayed to the model, the UI marker
//! set, and the exclusive outbound handle for pushing envelopes to its
//! client. The [`SessionRegistry`] is the sole owner of the id → session
//! mapping: sessions are created when a connection opens and removed when
//! it closes, never anywhere else.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::engine::Game;
use crate::error::DispatchError;
use crate::message::Message;
use crate::protocol::Envelope;

/// Fire-and-forget handle for pushing envelopes to one client.
///
/// Wraps the sending half of an unbounded channel; a per-connection writer
/// task drains the other end into the socket sink. Tests hold the receiver
/// directly to observe emitted envelopes.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl Outbound {
    pub fn new(tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { tx }
    }

    /// Pushes an envelope to the client. A send failure means the
    /// connection is gone; the session is about to be removed anyway, so
    /// the envelope is dropped with a log line rather than an error.
    pub fn send(&self, envelope: Envelope) {
        if self.tx.send(envelope).is_err() {
            tracing::debug!("dropping outbound envelope for closed connection");
        }
    }
}

/// Mutable state for one game/connection.
pub struct Session {
    pub id: String,
    pub game: Game,
    /// Conversation turns replayed verbatim to the model provider.
    /// Append-only during an agent turn.
    pub history: Vec<Message>,
    /// Squares currently highlighted in the UI. Insertion-ordered and
    /// duplicate-free; toggled by the `mark_square` tool.
    pub markers: Vec<String>,
    /// Chat the agent sent mid-turn via `send_message`, held back until
    /// the next user input so tool-call request/result pairs stay
    /// adjacent in `history`.
    pending_replies: Vec<String>,
    outbound: Outbound,
}

impl Session {
    fn new(id: String, outbound: Outbound) -> Self {
        Self {
            id,
            game: Game::new(),
            history: Vec::new(),
            markers: Vec::new(),
            pending_replies: Vec::new(),
            outbound,
        }
    }

    pub fn send(&self, envelope: Envelope) {
        self.outbound.send(envelope);
    }

    /// Stages chat text the agent sent to the user. It enters `history`
    /// on the next [`Session::commit_user`] call.
    pub fn stage_reply(&mut self, text: impl Into<String>) {
        self.pending_replies.push(text.into());
    }

    /// Appends a user message, first committing any staged agent chat so
    /// the conversation replays in the order it happened.
    pub fn commit_user(&mut self, text: impl Into<String>) {
        let staged = std::mem::take(&mut self.pending_replies);
        self.history
            .extend(staged.into_iter().map(Message::assistant));
        self.history.push(Message::user(text));
    }

    /// Clears the conversation, staged chat included.
    pub fn clear_history(&mut self) {
        self.pending_replies.clear();
        self.history.clear();
    }

    /// Toggles a marker, returning whether the square is now marked.
    pub fn toggle_marker(&mut self, square: &str) -> bool {
        if let Some(i) = self.markers.iter().position(|s| s == square) {
            self.markers.remove(i);
            false
        } else {
            self.markers.push(square.to_string());
            true
        }
    }

    /// Owned snapshot of the conversation for one provider call: the
    /// system prompt followed by the full history. The provider never
    /// observes the live (mutable) history.
    pub fn conversation(&self, system_prompt: &str) -> Vec<Message> {
        let mut convo = Vec::with_capacity(self.history.len() + 1);
        convo.push(Message::system(system_prompt));
        convo.extend(self.history.iter().cloned());
        convo
    }
}

/// Injected concurrent store mapping session id → session.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh session with empty history/markers and a starting
    /// position, keyed by a newly generated id.
    pub async fn create(&self, outbound: Outbound) -> (String, Arc<Mutex<Session>>) {
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Mutex::new(Session::new(id.clone(), outbound)));
        self.sessions
            .lock()
            .await
            .insert(id.clone(), Arc::clone(&session));
        (id, session)
    }

    pub async fn get(&self, id: &str) -> Result<Arc<Mutex<Session>>, DispatchError> {
        self.sessions
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DispatchError::SessionNotFound(id.to_string()))
    }

    /// Drops a session's entry. Called when its connection closes.
    pub async fn remove(&self, id: &str) {
        self.sessions.lock().await.remove(id);
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::session_with_capture;
    use super::*;
    use crate::protocol::Action;

    #[tokio::test]
    async fn sessions_are_distinct_and_independent() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (id_a, a) = registry.create(Outbound::new(tx.clone())).await;
        let (id_b, b) = registry.create(Outbound::new(tx)).await;
        assert_ne!(id_a, id_b);
        assert_eq!(registry.len().await, 2);

        a.lock().await.game.push_san("e4").unwrap();
        a.lock().await.history.push(Message::user("hello"));
        a.lock().await.toggle_marker("e4");

        let b = b.lock().await;
        assert_eq!(b.game.move_count(), 0);
        assert!(b.history.is_empty());
        assert!(b.markers.is_empty());
    }

    #[tokio::test]
    async fn get_unknown_session_fails() {
        let registry = SessionRegistry::new();
        let err = registry.get("nope").await.unwrap_err();
        assert!(err.to_string().contains("unknown session"));
    }

    #[tokio::test]
    async fn remove_drops_the_entry() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (id, _session) = registry.create(Outbound::new(tx)).await;
        assert!(registry.get(&id).await.is_ok());
        registry.remove(&id).await;
        assert!(registry.get(&id).await.is_err());
        assert_eq!(registry.len().await, 0);
    }

    #[test]
    fn marker_toggle_round_trips() {
        let (mut session, _rx) = session_with_capture();
        assert!(session.toggle_marker("e4"));
        assert!(session.toggle_marker("f6"));
        assert_eq!(session.markers, vec!["e4", "f6"]);
        assert!(!session.toggle_marker("e4"));
        assert_eq!(session.markers, vec!["f6"]);
    }

    #[test]
    fn commit_user_flushes_staged_replies_first() {
        let (mut session, _rx) = session_with_capture();
        session.stage_reply("I'll play e4");
        session.stage_reply("your move");
        session.commit_user("nice");
        let contents: Vec<&str> = session.history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["I'll play e4", "your move", "nice"]);

        // A later commit has nothing staged left to flush.
        session.commit_user("again");
        assert_eq!(session.history.len(), 4);
    }

    #[test]
    fn clear_history_drops_staged_replies_too() {
        let (mut session, _rx) = session_with_capture();
        session.stage_reply("pending");
        session.history.push(Message::user("hello"));
        session.clear_history();
        assert!(session.history.is_empty());
        session.commit_user("fresh");
        assert_eq!(session.history.len(), 1);
        assert_eq!(session.history[0].content, "fresh");
    }

    #[test]
    fn conversation_snapshot_prepends_system_prompt() {
        let (mut session, _rx) = session_with_capture();
        session.history.push(Message::user("hi"));
        let convo = session.conversation("sys");
        assert_eq!(convo.len(), 2);
        assert_eq!(convo[0].content, "sys");
        assert_eq!(convo[1].content, "hi");
    }

    #[test]
    fn outbound_capture_sees_envelopes() {
        let (session, mut rx) = session_with_capture();
        session.send(Envelope::start(&session.id));
        let env = rx.try_recv().unwrap();
        assert_eq!(env.action, Action::Start);
    }
}
