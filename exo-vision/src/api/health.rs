//! Service status endpoints
//!
//! GET /health, GET /api/buildinfo, GET /api/events

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use exo_common::sse::create_heartbeat_sse_stream;
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;

use crate::{AppState, ClassifierStatus};

const MODULE_NAME: &str = "exo-vision";

/// Classifier section of the health report
#[derive(Debug, Serialize)]
pub struct ClassifierHealth {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the classifier is disabled
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub active_sessions: usize,
    pub classifier: ClassifierHealth,
}

/// Compile-time identification of the running binary
#[derive(Debug, Serialize)]
pub struct BuildInfo {
    pub module: &'static str,
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub build_profile: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            module: MODULE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            git_hash: env!("GIT_HASH"),
            build_timestamp: env!("BUILD_TIMESTAMP"),
            build_profile: env!("BUILD_PROFILE"),
        }
    }
}

/// GET /health
///
/// Always 200; a missing classifier reports "degraded" rather than failing.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let classifier = match &state.classifier {
        ClassifierStatus::Ready(facade) => ClassifierHealth {
            available: true,
            model: Some(facade.model_name().to_string()),
            error: None,
        },
        ClassifierStatus::Unavailable(reason) => ClassifierHealth {
            available: false,
            model: None,
            error: Some(reason.clone()),
        },
    };

    Json(HealthResponse {
        status: if classifier.available { "ok" } else { "degraded" }.to_string(),
        module: MODULE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        active_sessions: state.sessions.len().await,
        classifier,
    })
}

/// GET /api/buildinfo
pub async fn build_info() -> Json<BuildInfo> {
    Json(BuildInfo::current())
}

/// GET /api/events
///
/// Connection-status stream for the UI header indicator.
pub async fn status_events() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    create_heartbeat_sse_stream(MODULE_NAME)
}

/// Build status routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/buildinfo", get(build_info))
        .route("/api/events", get(status_events))
}
