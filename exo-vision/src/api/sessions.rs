//! Session and guessing-game endpoints
//!
//! A browser tab creates a session once and drives its game through the
//! per-session routes. Every game route answers with the updated
//! [`GameView`].

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use exo_common::game::{GameView, GuessOutcome, Truth};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::Session;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
    pub game: GameView,
}

#[derive(Debug, Deserialize)]
pub struct GuessRequest {
    pub guess: Truth,
}

#[derive(Debug, Serialize)]
pub struct GuessResponse {
    pub outcome: GuessOutcome,
    pub game: GameView,
}

/// Run `f` on a session, mapping an unknown id to 404
pub(crate) async fn on_session<T>(
    state: &AppState,
    id: Uuid,
    f: impl FnOnce(&mut Session) -> ApiResult<T>,
) -> ApiResult<T> {
    state
        .sessions
        .with_session(id, f)
        .await
        .unwrap_or_else(|| Err(ApiError::NotFound(format!("session {}", id))))
}

/// POST /api/sessions
pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let (session_id, game) = state.sessions.create(|s| s.game.view()).await;
    (StatusCode::CREATED, Json(SessionCreated { session_id, game }))
}

/// DELETE /api/sessions/:id
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("session {}", id)))
    }
}

/// GET /api/sessions/:id/game
pub async fn get_game(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GameView>> {
    on_session(&state, id, |s| Ok(Json(s.game.view()))).await
}

/// POST /api/sessions/:id/game/guess
pub async fn submit_guess(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<GuessRequest>,
) -> ApiResult<Json<GuessResponse>> {
    on_session(&state, id, |s| {
        let outcome = s.game.submit_guess(request.guess)?;
        Ok(Json(GuessResponse {
            outcome,
            game: s.game.view(),
        }))
    })
    .await
}

/// POST /api/sessions/:id/game/advance
pub async fn advance_round(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GameView>> {
    on_session(&state, id, |s| {
        s.game.advance()?;
        Ok(Json(s.game.view()))
    })
    .await
}

/// POST /api/sessions/:id/game/reroll
pub async fn reroll_round(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GameView>> {
    on_session(&state, id, |s| {
        s.game.reroll()?;
        Ok(Json(s.game.view()))
    })
    .await
}

/// POST /api/sessions/:id/game/restart
pub async fn restart_game(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GameView>> {
    on_session(&state, id, |s| {
        s.game.restart();
        Ok(Json(s.game.view()))
    })
    .await
}

/// Build session and game routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", delete(delete_session))
        .route("/api/sessions/:id/game", get(get_game))
        .route("/api/sessions/:id/game/guess", post(submit_guess))
        .route("/api/sessions/:id/game/advance", post(advance_round))
        .route("/api/sessions/:id/game/reroll", post(reroll_round))
        .route("/api/sessions/:id/game/restart", post(restart_game))
}
