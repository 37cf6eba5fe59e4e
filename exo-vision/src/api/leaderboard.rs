//! Leaderboard endpoint

use axum::{extract::State, routing::get, Json, Router};
use exo_common::leaderboard::Leaderboard;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    #[serde(flatten)]
    pub leaderboard: Leaderboard,
    /// Model served by the classifier, if loaded
    pub current_model: Option<String>,
}

/// GET /api/leaderboard
///
/// Re-reads the metrics file on each request.
pub async fn get_leaderboard(State(state): State<AppState>) -> Json<LeaderboardResponse> {
    let path = state.config.metrics_path();
    let leaderboard = tokio::task::spawn_blocking(move || Leaderboard::load(&path))
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Leaderboard load task failed: {}", e);
            Leaderboard::unavailable()
        });

    let current_model = state
        .classifier
        .facade()
        .ok()
        .map(|f| f.model_name().to_string());

    Json(LeaderboardResponse {
        leaderboard,
        current_model,
    })
}

pub fn leaderboard_routes() -> Router<AppState> {
    Router::new().route("/api/leaderboard", get(get_leaderboard))
}
