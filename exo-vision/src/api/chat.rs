//! Chat assistant endpoints
//!
//! POST streams the reply as SSE:
//! - `token` events `{ "content": "..." }` as text arrives
//! - at most one `error` event `{ "message": "...", "fallback": "..." }`
//! - a final `done` event `{ "content": "<full reply>", "fallback": bool }`
//!
//! The reply is appended to the session history only once the stream
//! finishes. A client that disconnects mid-reply leaves just its own message
//! in the history.
//!
//! One reply streams per session at a time; a second POST while a reply is
//! in flight answers 409.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    routing::get,
    Json, Router,
};
use exo_common::sse::{json_event, keep_alive};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use tracing::{info, warn};
use uuid::Uuid;

use super::sessions::on_session;
use crate::services::chat_relay::FALLBACK_MESSAGE;
use crate::services::{ChatChunk, ChatMessage};
use crate::session::SessionStore;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatHistory {
    pub session_id: Uuid,
    pub messages: Vec<ChatMessage>,
}

/// Text stored when the relay fails after `partial` was streamed
fn fallback_reply(partial: &str) -> String {
    if partial.is_empty() {
        FALLBACK_MESSAGE.to_string()
    } else {
        format!("{}\n\n{}", partial, FALLBACK_MESSAGE)
    }
}

/// Clears a session's in-flight flag if the reply stream is dropped early
struct InFlightGuard {
    sessions: SessionStore,
    id: Uuid,
    armed: bool,
}

impl InFlightGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let sessions = self.sessions.clone();
        let id = self.id;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                sessions
                    .with_session(id, |s| s.chat_in_flight = false)
                    .await;
            });
        }
    }
}

/// GET /api/sessions/:id/chat
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ChatHistory>> {
    on_session(&state, id, |s| {
        Ok(Json(ChatHistory {
            session_id: id,
            messages: s.chat_history.clone(),
        }))
    })
    .await
}

/// DELETE /api/sessions/:id/chat
pub async fn clear_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    on_session(&state, id, |s| {
        s.chat_history.clear();
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

/// POST /api/sessions/:id/chat
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let transcript = on_session(&state, id, |s| {
        if s.chat_in_flight {
            return Err(ApiError::Conflict(
                "a reply is already streaming for this session".to_string(),
            ));
        }
        s.chat_in_flight = true;
        s.push_chat(ChatMessage::user(message));
        Ok(s.chat_history.clone())
    })
    .await?;

    info!(session_id = %id, turns = transcript.len(), "Relaying chat message");

    let replies = state.chat.stream_reply(&transcript);
    let sessions = state.sessions.clone();
    let mut guard = InFlightGuard {
        sessions: sessions.clone(),
        id,
        armed: true,
    };

    let stream = async_stream::stream! {
        let mut replies = Box::pin(replies);
        let mut reply = String::new();
        let mut fallback = false;

        while let Some(chunk) = replies.next().await {
            match chunk {
                ChatChunk::Token(text) => {
                    reply.push_str(&text);
                    yield Ok(json_event("token", &json!({ "content": text })));
                }
                ChatChunk::Error(message) => {
                    warn!(session_id = %id, "Chat relay failed: {}", message);
                    yield Ok(json_event(
                        "error",
                        &json!({ "message": message, "fallback": FALLBACK_MESSAGE }),
                    ));
                    reply = fallback_reply(&reply);
                    fallback = true;
                    break;
                }
                ChatChunk::Done => break,
            }
        }

        let stored = reply.clone();
        let session_found = sessions
            .with_session(id, move |s| {
                s.push_chat(ChatMessage::assistant(stored));
                s.chat_in_flight = false;
            })
            .await;
        guard.disarm();
        if session_found.is_none() {
            warn!(session_id = %id, "Session ended before chat reply was stored");
        }

        yield Ok(json_event("done", &json!({ "content": reply, "fallback": fallback })));
    };

    Ok(Sse::new(stream).keep_alive(keep_alive()))
}

pub fn chat_routes() -> Router<AppState> {
    Router::new().route(
        "/api/sessions/:id/chat",
        get(get_history).post(send_message).delete(clear_history),
    )
}
