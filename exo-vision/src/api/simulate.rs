//! Light-curve simulator endpoints
//!
//! POST /api/simulate/transit, POST /api/simulate/decoy
//!
//! Inputs are never rejected; out-of-range values are clamped by the
//! synthesizer and the point count is capped.

use axum::{extract::State, routing::post, Json, Router};
use exo_common::synth::{
    clamp_noise_sigma, synthesize_decoy_with, synthesize_shape, DecoyProfile, DipShape,
    SignalCurve, TransitParameters,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Upper bound on requested curve length
pub const MAX_CURVE_POINTS: usize = 20_000;

/// POST /api/simulate/transit request
#[derive(Debug, Default, Deserialize)]
pub struct TransitRequest {
    pub points: Option<usize>,
    /// Physical parameters; ignored when `shape` is given
    #[serde(flatten)]
    pub params: TransitParameters,
    /// Explicit synthesizer inputs
    pub shape: Option<DipShape>,
    /// Seed for reproducible noise
    pub seed: Option<u64>,
}

/// POST /api/simulate/transit response
#[derive(Debug, Serialize)]
pub struct TransitResponse {
    pub shape: DipShape,
    pub noise_sigma: f64,
    pub curve: SignalCurve,
}

/// POST /api/simulate/decoy request
#[derive(Debug, Default, Deserialize)]
pub struct DecoyRequest {
    pub points: Option<usize>,
    pub noise_sigma: Option<f64>,
    pub seed: Option<u64>,
}

/// POST /api/simulate/decoy response
#[derive(Debug, Serialize)]
pub struct DecoyResponse {
    pub profile: DecoyProfile,
    pub curve: SignalCurve,
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn point_count(state: &AppState, requested: Option<usize>) -> usize {
    requested
        .unwrap_or(state.config.curve_points)
        .clamp(1, MAX_CURVE_POINTS)
}

/// POST /api/simulate/transit
pub async fn simulate_transit(
    State(state): State<AppState>,
    Json(request): Json<TransitRequest>,
) -> Json<TransitResponse> {
    let points = point_count(&state, request.points);
    let shape = request
        .shape
        .unwrap_or_else(|| request.params.dip_shape())
        .sanitized();
    let noise_sigma = clamp_noise_sigma(request.params.noise_sigma);

    let mut rng = rng_for(request.seed);
    let curve = synthesize_shape(&mut rng, points, shape, noise_sigma);

    tracing::debug!(
        points,
        depth = shape.depth,
        width = shape.width,
        "Transit curve synthesized"
    );

    Json(TransitResponse {
        shape,
        noise_sigma,
        curve,
    })
}

/// POST /api/simulate/decoy
pub async fn simulate_decoy(
    State(state): State<AppState>,
    Json(request): Json<DecoyRequest>,
) -> Json<DecoyResponse> {
    let points = point_count(&state, request.points);
    let noise_sigma = request.noise_sigma.unwrap_or(state.config.game_noise_sigma);

    let mut rng = rng_for(request.seed);
    let profile = DecoyProfile::draw(&mut rng);
    let curve = synthesize_decoy_with(&mut rng, points, &profile, noise_sigma);

    Json(DecoyResponse { profile, curve })
}

/// Build simulator routes
pub fn simulate_routes() -> Router<AppState> {
    Router::new()
        .route("/api/simulate/transit", post(simulate_transit))
        .route("/api/simulate/decoy", post(simulate_decoy))
}
