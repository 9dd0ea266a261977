//! Protocol dispatcher.
//!
//! Routes one inbound envelope to exactly one action against its session,
//! invoking the agent loop for MOVE and CHAT. Anything that fails while
//! handling an envelope is caught at this boundary and converted into an
//! ERROR envelope carrying the session's current position; the session
//! itself survives and keeps serving the connection.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::agent::{self, TurnKind};
use crate::engine;
use crate::error::DispatchError;
use crate::protocol::{Action, Envelope, MoveSpec};
use crate::provider::ModelProvider;
use crate::session::{Session, SessionRegistry};

pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    provider: Arc<dyn ModelProvider>,
    system_prompt: String,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<SessionRegistry>,
        provider: Arc<dyn ModelProvider>,
        system_prompt: String,
    ) -> Self {
        Self {
            registry,
            provider,
            system_prompt,
        }
    }

    /// Handles one inbound envelope. Failures are reported on the
    /// connection's own session so the client always gets a FEN to
    /// resynchronize against, even when the envelope named a bogus id.
    pub async fn handle(&self, conn_session: &Arc<Mutex<Session>>, envelope: Envelope) {
        if let Err(err) = self.route(&envelope).await {
            error!(action = ?envelope.action, error = %err, "request failed");
            let session = conn_session.lock().await;
            let reply = Envelope::error(
                envelope.id.as_deref(),
                Some(session.game.fen()),
                err.to_string(),
            );
            session.send(reply);
        }
    }

    async fn route(&self, envelope: &Envelope) -> Result<(), DispatchError> {
        let id = envelope
            .id
            .as_deref()
            .ok_or(DispatchError::MissingField("id"))?;
        let session = self.registry.get(id).await?;
        // Held for the whole envelope, agent turn included: only one agent
        // loop may mutate a session at a time.
        let mut session = session.lock().await;

        match envelope.action {
            Action::Setup => {
                let fen = envelope
                    .fen
                    .as_deref()
                    .ok_or(DispatchError::MissingField("fen"))?;
                session.game.set_fen(fen)?;
                info!(id, "position replaced");
                Ok(())
            }
            Action::Move => {
                let m = match &envelope.mv {
                    Some(spec) => session.game.push_uci(&spec.to_uci())?,
                    // Auto-play: the engine picks a uniformly random legal move.
                    None => session.game.random_move()?,
                };
                let uci = engine::uci_of(&m);
                debug!(id, %uci, "human move applied");
                let echo = Envelope::move_played(&session.id, MoveSpec::from_uci(&uci));
                session.send(echo);
                agent::run_turn(
                    self.provider.as_ref(),
                    &mut session,
                    &self.system_prompt,
                    TurnKind::Move,
                )
                .await
            }
            Action::Undo => {
                session.game.undo()?;
                Ok(())
            }
            Action::Chat => match envelope.text.as_deref() {
                // An empty chat message is the client's reset signal.
                None | Some("") => {
                    info!(id, "clearing message history");
                    session.clear_history();
                    Ok(())
                }
                Some(text) => {
                    session.commit_user(text);
                    agent::run_turn(
                        self.provider.as_ref(),
                        &mut session,
                        &self.system_prompt,
                        TurnKind::Chat,
                    )
                    .await
                }
            },
            Action::Marker => {
                let spec = envelope
                    .mv
                    .as_ref()
                    .ok_or(DispatchError::MissingField("move"))?;
                let name = engine::parse_square(&spec.source)?.to_string();
                session.toggle_marker(&name);
                let echo = Envelope::marker(&session.id, &name);
                session.send(echo);
                Ok(())
            }
            // Server-issued actions have no inbound meaning.
            Action::Start | Action::Error => {
                debug!(id, action = ?envelope.action, "ignoring server-only action");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::ScriptedProvider;
    use crate::message::Message;
    use crate::provider::ModelTurn;
    use crate::session::Outbound;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct Fixture {
        dispatcher: Dispatcher,
        provider: Arc<ScriptedProvider>,
        session: Arc<Mutex<Session>>,
        id: String,
        rx: mpsc::UnboundedReceiver<Envelope>,
    }

    async fn fixture(turns: Vec<ModelTurn>) -> Fixture {
        let registry = Arc::new(SessionRegistry::new());
        let provider = Arc::new(ScriptedProvider::new(turns));
        let provider_dyn: Arc<dyn ModelProvider> = provider.clone();
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            provider_dyn,
            "test system prompt".to_string(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let (id, session) = registry.create(Outbound::new(tx)).await;
        Fixture {
            dispatcher,
            provider,
            session,
            id,
            rx,
        }
    }

    fn stop_script() -> Vec<ModelTurn> {
        vec![ModelTurn::ToolCalls {
            text: String::new(),
            calls: vec![crate::agent::test_support::tool_call(
                "c1",
                "stop_interaction",
                json!({}),
            )],
        }]
    }

    fn inbound(id: &str, action: Action) -> Envelope {
        Envelope {
            id: Some(id.to_string()),
            action,
            mv: None,
            fen: None,
            text: None,
        }
    }

    #[tokio::test]
    async fn empty_chat_clears_history_without_invoking_the_agent() {
        let mut fx = fixture(vec![]).await;
        fx.session
            .lock()
            .await
            .history
            .push(Message::user("earlier"));

        let mut env = inbound(&fx.id, Action::Chat);
        env.text = Some(String::new());
        fx.dispatcher.handle(&fx.session, env).await;

        assert!(fx.session.lock().await.history.is_empty());
        assert_eq!(fx.provider.call_count(), 0);
        assert!(fx.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn chat_with_text_runs_a_chat_turn() {
        let mut fx = fixture(stop_script()).await;
        let mut env = inbound(&fx.id, Action::Chat);
        env.text = Some("what's your plan?".to_string());
        fx.dispatcher.handle(&fx.session, env).await;

        assert_eq!(fx.provider.call_count(), 1);
        let session = fx.session.lock().await;
        assert_eq!(session.history[0].content, "what's your plan?");
        assert!(fx.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn move_applies_echoes_then_runs_a_move_turn() {
        let mut fx = fixture(stop_script()).await;
        let mut env = inbound(&fx.id, Action::Move);
        env.mv = Some(MoveSpec::from_uci("e2e4"));
        fx.dispatcher.handle(&fx.session, env).await;

        let session = fx.session.lock().await;
        assert_eq!(session.game.move_count(), 1);
        let echo = fx.rx.try_recv().unwrap();
        assert_eq!(echo.action, Action::Move);
        assert_eq!(echo.mv.unwrap().to_uci(), "e2e4");
        assert_eq!(fx.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn move_without_spec_plays_a_random_legal_move() {
        let mut fx = fixture(stop_script()).await;
        fx.dispatcher
            .handle(&fx.session, inbound(&fx.id, Action::Move))
            .await;

        let session = fx.session.lock().await;
        assert_eq!(session.game.move_count(), 1);
        let echo = fx.rx.try_recv().unwrap();
        assert_eq!(echo.action, Action::Move);
        // Exactly one MOVE envelope for the auto-played move.
        assert!(fx.rx.try_recv().is_err());
        assert_eq!(fx.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn illegal_inbound_move_becomes_an_error_envelope() {
        let mut fx = fixture(vec![]).await;
        let fen_before = fx.session.lock().await.game.fen();
        let mut env = inbound(&fx.id, Action::Move);
        env.mv = Some(MoveSpec::from_uci("e2e5"));
        fx.dispatcher.handle(&fx.session, env).await;

        let reply = fx.rx.try_recv().unwrap();
        assert_eq!(reply.action, Action::Error);
        assert_eq!(reply.fen.as_deref(), Some(fen_before.as_str()));
        assert_eq!(fx.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn setup_replaces_the_position() {
        let mut fx = fixture(vec![]).await;
        let target = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2";
        let mut env = inbound(&fx.id, Action::Setup);
        env.fen = Some(target.to_string());
        fx.dispatcher.handle(&fx.session, env).await;

        assert_eq!(fx.session.lock().await.game.fen(), target);
        assert!(fx.rx.try_recv().is_err());

        // Missing FEN is a client error, reported back.
        fx.dispatcher
            .handle(&fx.session, inbound(&fx.id, Action::Setup))
            .await;
        let reply = fx.rx.try_recv().unwrap();
        assert_eq!(reply.action, Action::Error);
        assert!(reply.text.unwrap().contains("missing field 'fen'"));
    }

    #[tokio::test]
    async fn undo_on_fresh_game_reports_an_error() {
        let mut fx = fixture(vec![]).await;
        fx.dispatcher
            .handle(&fx.session, inbound(&fx.id, Action::Undo))
            .await;
        let reply = fx.rx.try_recv().unwrap();
        assert_eq!(reply.action, Action::Error);
        assert!(reply.text.unwrap().contains("no move to undo"));
        assert!(reply.fen.is_some());
    }

    #[tokio::test]
    async fn undo_pops_the_last_move() {
        let mut fx = fixture(vec![]).await;
        let fen_start = fx.session.lock().await.game.fen();
        fx.session.lock().await.game.push_san("e4").unwrap();

        fx.dispatcher
            .handle(&fx.session, inbound(&fx.id, Action::Undo))
            .await;

        assert_eq!(fx.session.lock().await.game.fen(), fen_start);
        assert!(fx.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn marker_toggle_is_echoed() {
        let mut fx = fixture(vec![]).await;
        let mut env = inbound(&fx.id, Action::Marker);
        env.mv = Some(MoveSpec {
            source: "e4".to_string(),
            target: "e4".to_string(),
            promotion: None,
        });
        fx.dispatcher.handle(&fx.session, env.clone()).await;

        assert_eq!(fx.session.lock().await.markers, vec!["e4"]);
        let echo = fx.rx.try_recv().unwrap();
        assert_eq!(echo.action, Action::Marker);

        fx.dispatcher.handle(&fx.session, env).await;
        assert!(fx.session.lock().await.markers.is_empty());
    }

    #[tokio::test]
    async fn unknown_session_id_is_reported_on_the_connection() {
        let mut fx = fixture(vec![]).await;
        fx.dispatcher
            .handle(&fx.session, inbound("not-a-session", Action::Undo))
            .await;
        let reply = fx.rx.try_recv().unwrap();
        assert_eq!(reply.action, Action::Error);
        assert!(reply.text.unwrap().contains("unknown session"));
        assert!(reply.fen.is_some());
    }

    #[tokio::test]
    async fn provider_failure_surfaces_as_error_envelope() {
        let mut fx = fixture(vec![]).await;
        let mut env = inbound(&fx.id, Action::Chat);
        env.text = Some("hello?".to_string());
        fx.dispatcher.handle(&fx.session, env).await;

        let reply = fx.rx.try_recv().unwrap();
        assert_eq!(reply.action, Action::Error);
        assert!(reply.text.unwrap().contains("provider"));
    }
}
