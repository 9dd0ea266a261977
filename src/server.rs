//! HTTP/WebSocket transport.
//!
//! One axum router: `/` serves the embedded demo page, `/ws` upgrades to
//! the game protocol. Each connection gets its own session and a writer
//! task draining the session's outbound queue into the socket sink.
//! Inbound frames are processed strictly in arrival order: the next
//! frame is not read until the previous one, agent turn included, has
//! completed.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::protocol::Envelope;
use crate::provider::ModelProvider;
use crate::session::{Outbound, SessionRegistry};

/// Shared state handed to every connection.
#[derive(Clone)]
struct AppState {
    registry: Arc<SessionRegistry>,
    dispatcher: Arc<Dispatcher>,
}

/// Builds the application router.
pub fn router(
    registry: Arc<SessionRegistry>,
    provider: Arc<dyn ModelProvider>,
    system_prompt: String,
) -> Router {
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&registry),
        provider,
        system_prompt,
    ));
    let state = AppState {
        registry,
        dispatcher,
    };
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Binds and serves until ctrl-c.
pub async fn serve(addr: &str, router: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Envelope>();
    let (id, session) = state.registry.create(Outbound::new(tx)).await;
    info!(%id, sessions = state.registry.len().await, "connection opened");

    // Writer task: the only place that touches the sink, so envelope
    // ordering matches emission order.
    let writer = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let json = match serde_json::to_string(&envelope) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to encode envelope");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    session.lock().await.send(Envelope::start(&id));

    while let Some(Ok(msg)) = stream.next().await {
        let text = match msg {
            WsMessage::Text(t) => t.to_string(),
            WsMessage::Close(_) => break,
            _ => continue,
        };
        match serde_json::from_str::<Envelope>(&text) {
            Ok(envelope) => state.dispatcher.handle(&session, envelope).await,
            Err(err) => {
                debug!(error = %err, "undecodable frame");
                let session = session.lock().await;
                let fen = session.game.fen();
                session.send(Envelope::error(
                    Some(&id),
                    Some(fen),
                    format!("invalid request: {err}"),
                ));
            }
        }
    }

    // The registry entry must not outlive the connection.
    state.registry.remove(&id).await;
    writer.abort();
    info!(%id, "connection closed, session removed");
}
