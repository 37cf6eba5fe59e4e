//! exo-vision library - ExoVision web service
//!
//! Serves the browser UI and JSON/SSE API for the transit simulator, the
//! "planet or not?" game, the Kepler classifier, the leaderboard and the chat
//! assistant.

use axum::Router;
use chrono::{DateTime, Utc};
use exo_common::config::ServiceConfig;
use exo_common::game::CurveSettings;
use exo_common::ClassificationFacade;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub mod api;
pub mod error;
pub mod services;
pub mod session;

pub use crate::error::{ApiError, ApiResult};

use crate::services::ChatRelay;
use crate::session::{SessionSettings, SessionStore};

/// Classifier availability, decided once at startup
///
/// A failed artifact load disables classification routes but leaves the rest
/// of the service running.
#[derive(Clone, Debug)]
pub enum ClassifierStatus {
    Ready(Arc<ClassificationFacade>),
    Unavailable(String),
}

impl ClassifierStatus {
    /// Load model and manifest named by `config`
    pub fn load(config: &ServiceConfig) -> Self {
        let model_path = config.model_path();
        let features_path = config.features_path();
        match ClassificationFacade::load(
            &model_path,
            &features_path,
            config.threshold,
            config.missing_value_default,
        ) {
            Ok(facade) => ClassifierStatus::Ready(Arc::new(facade)),
            Err(e) => {
                error!("Classifier disabled: {}", e);
                ClassifierStatus::Unavailable(format!(
                    "Could not load classifier artifacts (expected {} and {}): {}",
                    model_path.display(),
                    features_path.display(),
                    e
                ))
            }
        }
    }

    /// The facade, or 503 with the load error
    pub fn facade(&self) -> ApiResult<&ClassificationFacade> {
        match self {
            ClassifierStatus::Ready(facade) => Ok(facade),
            ClassifierStatus::Unavailable(reason) => Err(ApiError::Unavailable(reason.clone())),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ClassifierStatus::Ready(_))
    }
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub classifier: ClassifierStatus,
    pub sessions: SessionStore,
    pub chat: Arc<ChatRelay>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: ServiceConfig, classifier: ClassifierStatus, chat: ChatRelay) -> Self {
        let sessions = SessionStore::new(SessionSettings {
            rounds_total: config.rounds_total,
            curve: CurveSettings {
                points: config.curve_points,
                noise_sigma: config.game_noise_sigma,
            },
        });
        info!(
            classifier_ready = classifier.is_ready(),
            rounds_total = config.rounds_total,
            "Application state initialized"
        );
        Self {
            config: Arc::new(config),
            classifier,
            sessions,
            chat: Arc::new(chat),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::ui_routes())
        .merge(api::health_routes())
        .merge(api::simulate_routes())
        .merge(api::predict_routes())
        .merge(api::leaderboard_routes())
        .merge(api::session_routes())
        .merge(api::chat_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
