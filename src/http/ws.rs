use super::handlers::ErrorResponse;
use super::state::{AppState, SessionInfo};
use crate::protocol::OutboundEvent;
use crate::session::{InboundMessage, LiveSession};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

const OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
pub struct AudioQuery {
    pub session_id: Option<String>,
    /// Accepted as an alias of `session_id`
    pub user_id: Option<String>,
}

/// Keeps a session id in the registry for as long as it is held.
///
/// `release` removes the entry before the session's handler returns; the
/// `Drop` fallback only covers an upgrade that never completed.
struct Registration {
    state: AppState,
    session_id: String,
    released: bool,
}

impl Registration {
    fn new(state: AppState, session_id: String) -> Self {
        Self {
            state,
            session_id,
            released: false,
        }
    }

    async fn release(mut self) {
        self.state.sessions.write().await.remove(&self.session_id);
        self.released = true;
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let sessions = self.state.sessions.clone();
        let session_id = std::mem::take(&mut self.session_id);
        tokio::spawn(async move {
            sessions.write().await.remove(&session_id);
        });
    }
}

/// GET /ws/audio?session_id=...
/// Upgrade to a live translation session
pub async fn ws_audio(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<AudioQuery>,
) -> Response {
    let session_id = query
        .session_id
        .or(query.user_id)
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("session-{}", uuid::Uuid::new_v4()));

    // A session id may only be connected once at a time
    {
        let mut sessions = state.sessions.write().await;
        if sessions.contains_key(&session_id) {
            return (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: format!("Session {} is already connected", session_id),
                }),
            )
                .into_response();
        }
        sessions.insert(
            session_id.clone(),
            SessionInfo {
                session_id: session_id.clone(),
                started_at: chrono::Utc::now(),
            },
        );
    }

    info!("Accepting session: {}", session_id);

    // Dropped with the callback if the upgrade never completes
    let registration = Registration::new(state.clone(), session_id);

    ws.on_upgrade(move |socket| handle_socket(socket, state, registration))
}

async fn handle_socket(socket: WebSocket, state: AppState, registration: Registration) {
    let session_id = registration.session_id.clone();
    let (mut sender, receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundEvent>(OUTBOUND_BUFFER);

    // Writer: serialize every outbound event as one text frame
    let writer = {
        let session_id = session_id.clone();
        tokio::spawn(async move {
            while let Some(event) = outbound_rx.recv().await {
                if sender.send(Message::Text(event.to_json())).await.is_err() {
                    debug!(session_id = %session_id, "Client gone, stopping writer");
                    break;
                }
            }
            let _ = sender.close().await;
        })
    };

    let inbound = receiver
        .filter_map(|message| async move {
            match message {
                Ok(Message::Binary(bytes)) => Some(InboundMessage::Audio(bytes)),
                Ok(Message::Text(text)) => Some(InboundMessage::Text(text)),
                Ok(Message::Close(_)) => Some(InboundMessage::Close),
                Ok(_) => None,
                Err(e) => {
                    debug!("WebSocket receive error: {}", e);
                    Some(InboundMessage::Close)
                }
            }
        })
        .boxed();

    let session = LiveSession::new(
        state.config.session_config(session_id.clone()),
        state.services.clone(),
    );

    match tokio::spawn(session.run(inbound, outbound_tx)).await {
        Ok(stats) => info!(
            session_id = %session_id,
            reason = ?stats.close_reason,
            usage_secs = stats.usage_secs,
            segments = stats.transcript_segments_count,
            "Session finished"
        ),
        Err(e) => error!(session_id = %session_id, "Session task failed: {}", e),
    }

    registration.release().await;

    // Final enrichment results may still be in flight
    if let Err(e) = writer.await {
        error!(session_id = %session_id, "Writer task failed: {}", e);
    }
}
