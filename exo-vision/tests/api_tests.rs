//! Integration tests for exo-vision API endpoints
//!
//! Tests cover:
//! - Health and degraded startup without classifier artifacts
//! - Single and batch classification
//! - Simulator endpoints
//! - Session lifecycle and the guessing game state machine
//! - Leaderboard degradation
//! - Chat relay streaming and fallback

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::post,
    Router,
};
use exo_common::config::{ChatConfig, ServiceConfig};
use exo_vision::services::ChatRelay;
use exo_vision::{build_router, AppState, ClassifierStatus};
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

const FEATURES_JSON: &str = r#"["koi_period", "koi_depth", "koi_prad"]"#;

const MODEL_JSON: &str = r#"{
    "name": "logreg_test",
    "intercept": -1.0,
    "weights": { "koi_period": 0.0, "koi_depth": 0.001, "koi_prad": -0.5 }
}"#;

const METRICS_JSON: &str = r#"{
    "logreg_test": { "accuracy": 0.91, "f1": 0.88 },
    "random_forest": 0.95
}"#;

/// Test helper: artifacts directory with manifest, model and metrics
fn write_artifacts(dir: &Path) {
    std::fs::write(dir.join("features.json"), FEATURES_JSON).unwrap();
    std::fs::write(dir.join("model.json"), MODEL_JSON).unwrap();
    std::fs::write(dir.join("metrics.json"), METRICS_JSON).unwrap();
}

/// Test helper: configuration rooted at `dir`
fn test_config(dir: &Path, chat_host: &str) -> ServiceConfig {
    ServiceConfig {
        artifacts_dir: dir.to_path_buf(),
        curve_points: 64,
        rounds_total: 2,
        chat: ChatConfig {
            host: chat_host.to_string(),
            timeout_secs: 5,
            ..ChatConfig::default()
        },
        ..ServiceConfig::default()
    }
}

/// Test helper: app with explicit chat host
fn setup_app_with_chat(dir: &Path, chat_host: &str) -> Router {
    let config = test_config(dir, chat_host);
    let classifier = ClassifierStatus::load(&config);
    let chat = ChatRelay::new(config.chat.clone()).unwrap();
    build_router(AppState::new(config, classifier, chat))
}

/// Test helper: app whose chat host refuses connections
fn setup_app(dir: &Path) -> Router {
    setup_app_with_chat(dir, "http://127.0.0.1:1")
}

/// Test helper: app backed by a full artifacts directory
fn setup_ready_app() -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();
    write_artifacts(dir.path());
    let app = setup_app(dir.path());
    (dir, app)
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn csv_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("Body should be UTF-8")
}

async fn extract_json(body: Body) -> Value {
    serde_json::from_str(&body_text(body).await).expect("Should parse JSON")
}

/// Parse an SSE body into (event, data) pairs, skipping comments
fn parse_sse(text: &str) -> Vec<(String, Value)> {
    text.split("\n\n")
        .filter_map(|block| {
            let mut event = None;
            let mut data = String::new();
            for line in block.lines() {
                if let Some(rest) = line.strip_prefix("event:") {
                    event = Some(rest.trim().to_string());
                } else if let Some(rest) = line.strip_prefix("data:") {
                    data.push_str(rest.trim());
                }
            }
            Some((event?, serde_json::from_str(&data).ok()?))
        })
        .collect()
}

async fn create_session(app: &Router) -> (String, Value) {
    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/sessions"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = extract_json(response.into_body()).await;
    (body["session_id"].as_str().unwrap().to_string(), body["game"].clone())
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_ok_with_artifacts() {
    let (_dir, app) = setup_ready_app();

    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "exo-vision");
    assert!(body["version"].is_string());
    assert_eq!(body["classifier"]["available"], true);
    assert_eq!(body["classifier"]["model"], "logreg_test");
}

#[tokio::test]
async fn test_buildinfo_reports_module() {
    let (_dir, app) = setup_ready_app();

    let response = app
        .oneshot(test_request("GET", "/api/buildinfo"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["module"], "exo-vision");
    assert!(body["git_hash"].is_string());
    assert!(body["build_profile"].is_string());
}

#[tokio::test]
async fn test_missing_artifacts_degrade_classifier_only() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(dir.path());

    let response = app
        .clone()
        .oneshot(test_request("GET", "/health"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["classifier"]["available"], false);
    assert!(body["classifier"]["error"].is_string());

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/features"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "UNAVAILABLE");

    // Simulator keeps working
    let response = app
        .oneshot(json_request("POST", "/api/simulate/decoy", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_index_and_script_served() {
    let (_dir, app) = setup_ready_app();

    let response = app.clone().oneshot(test_request("GET", "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response.into_body()).await;
    assert!(page.contains("<title>ExoVision</title>"));
    for tab in ["simulator", "game", "classifier", "leaderboard", "chat"] {
        assert!(
            page.contains(&format!("data-tab=\"{}\"", tab)),
            "missing tab {}",
            tab
        );
    }

    let response = app
        .oneshot(test_request("GET", "/static/app.js"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/javascript"
    );
}

// =============================================================================
// Classifier
// =============================================================================

#[tokio::test]
async fn test_features_listed_in_manifest_order() {
    let (_dir, app) = setup_ready_app();

    let response = app
        .oneshot(test_request("GET", "/api/features"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["features"], json!(["koi_period", "koi_depth", "koi_prad"]));
    assert_eq!(body["threshold"], 0.5);
}

#[tokio::test]
async fn test_predict_reports_substituted_features() {
    let (_dir, app) = setup_ready_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/predict",
            json!({ "features": { "koi_depth": "2000", "koi_prad": "n/a" } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["model"], "logreg_test");
    assert_eq!(body["substituted_features"], json!(["koi_period", "koi_prad"]));
    // σ(-1 + 0.001 * 2000) = σ(1)
    let p = body["probability"].as_f64().unwrap();
    assert!((p - 0.731_058_578_6).abs() < 1e-6);
    assert_eq!(body["label"], "CONFIRMED");
}

#[tokio::test]
async fn test_predict_threshold_override() {
    let (_dir, app) = setup_ready_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/predict",
            json!({ "features": { "koi_depth": 2000 }, "threshold": 0.9 }),
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["label"], "FALSE_POSITIVE");
    assert_eq!(body["threshold"], 0.9);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/predict",
            json!({ "features": {}, "threshold": 1.5 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_csv_missing_columns_rejected() {
    let (_dir, app) = setup_ready_app();

    let response = app
        .oneshot(csv_request("/api/predict/csv", "koi_period,koi_depth\n1,2\n"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "MISSING_COLUMNS");
    assert_eq!(body["error"]["missing_columns"], json!(["koi_prad"]));
}

#[tokio::test]
async fn test_csv_scored_with_extra_columns_preserved() {
    let (_dir, app) = setup_ready_app();
    let csv = "kepoi_name,koi_prad,koi_depth,koi_period\n\
               K00001.01,1.0,2000,3.5\n\
               K00002.01,4.0,,10\n";

    let response = app
        .clone()
        .oneshot(csv_request("/api/predict/csv", csv))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["total_records"], 2);
    assert_eq!(body["extra_columns"], json!(["kepoi_name"]));
    assert_eq!(body["coerced_cells"], 1);
    assert_eq!(
        body["columns"],
        json!(["kepoi_name", "koi_prad", "koi_depth", "koi_period", "P_confirmed", "Prediction"])
    );
    assert_eq!(body["preview"][0][0], "K00001.01");

    let response = app
        .oneshot(csv_request("/api/predict/csv?format=csv", csv))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("koi_predictions.csv"));
    assert_eq!(response.headers()["x-coerced-cells"], "1");

    let text = body_text(response.into_body()).await;
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("kepoi_name,koi_prad,koi_depth,koi_period,P_confirmed,Prediction")
    );
    assert_eq!(lines.count(), 2);
}

// =============================================================================
// Simulator
// =============================================================================

#[tokio::test]
async fn test_csv_overlong_row_rejected() {
    let (_dir, app) = setup_ready_app();
    let csv = "koi_period,koi_depth,koi_prad\n\
               3.5,2000,1.0\n\
               10,500,2.0,EXTRA_CELL\n";

    let response = app
        .oneshot(csv_request("/api/predict/csv?format=csv", csv))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("line 3"), "unexpected message: {}", message);
}

#[tokio::test]
async fn test_simulate_transit_with_explicit_shape() {
    let (_dir, app) = setup_ready_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/simulate/transit",
            json!({
                "points": 400,
                "noise_sigma": 0.0,
                "shape": { "depth": 0.01, "width": 0.05, "center": 0.5, "shape_factor": 0.0 }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let points = body["curve"]["points"].as_array().unwrap();
    assert_eq!(points.len(), 400);

    let fluxes: Vec<f64> = points.iter().map(|p| p["flux"].as_f64().unwrap()).collect();
    let min = fluxes.iter().cloned().fold(f64::INFINITY, f64::min);
    assert!((min - 0.99).abs() < 1e-9);
    assert_eq!(fluxes[0], 1.0);
}

#[tokio::test]
async fn test_simulate_transit_clamps_inputs() {
    let (_dir, app) = setup_ready_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/simulate/transit",
            json!({
                "points": 10_000_000,
                "noise_sigma": 0.0,
                "shape": { "depth": 0.01, "width": 0.0, "center": 2.0, "shape_factor": 7.0 }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["shape"]["center"], 1.0);
    assert_eq!(body["shape"]["shape_factor"], 1.0);
    assert_eq!(body["curve"]["points"].as_array().unwrap().len(), 20_000);
}

#[tokio::test]
async fn test_simulate_transit_caps_huge_noise() {
    let (_dir, app) = setup_ready_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/simulate/transit",
            json!({ "points": 200, "noise_sigma": 1e308, "seed": 3 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["noise_sigma"], 1.0);
    let points = body["curve"]["points"].as_array().unwrap();
    assert_eq!(points.len(), 200);
    assert!(points.iter().all(|p| p["flux"].is_f64()));
}

#[tokio::test]
async fn test_simulate_seed_is_reproducible() {
    let (_dir, app) = setup_ready_app();
    let request = json!({ "points": 100, "seed": 42 });

    let a = app
        .clone()
        .oneshot(json_request("POST", "/api/simulate/decoy", request.clone()))
        .await
        .unwrap();
    let b = app
        .oneshot(json_request("POST", "/api/simulate/decoy", request))
        .await
        .unwrap();

    let a = extract_json(a.into_body()).await;
    let b = extract_json(b.into_body()).await;
    assert_eq!(a, b);
}

// =============================================================================
// Sessions and game
// =============================================================================

#[tokio::test]
async fn test_game_round_flow() {
    let (_dir, app) = setup_ready_app();
    let (id, game) = create_session(&app).await;
    assert_eq!(game["phase"], "awaiting_guess");
    assert_eq!(game["score"], 0);
    assert!(game.get("truth").is_none());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/sessions/{}/game/guess", id),
            json!({ "guess": "PLANET" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let correct = body["outcome"]["correct"].as_bool().unwrap();
    assert_eq!(body["game"]["phase"], "round_scored");
    assert_eq!(body["game"]["score"], if correct { 1 } else { 0 });
    assert!(body["game"]["truth"].is_string());

    // Second guess on the same round is rejected and the score stands
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/sessions/{}/game/guess", id),
            json!({ "guess": "NOT_PLANET" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "CONFLICT");

    let response = app
        .clone()
        .oneshot(test_request("POST", &format!("/api/sessions/{}/game/advance", id)))
        .await
        .unwrap();
    let game = extract_json(response.into_body()).await;
    assert_eq!(game["phase"], "awaiting_guess");
    assert_eq!(game["round_index"], 1);
    assert_eq!(game["score"], if correct { 1 } else { 0 });

    let response = app
        .clone()
        .oneshot(test_request("POST", &format!("/api/sessions/{}/game/restart", id)))
        .await
        .unwrap();
    let game = extract_json(response.into_body()).await;
    assert_eq!(game["round_index"], 0);
    assert_eq!(game["score"], 0);
}

#[tokio::test]
async fn test_game_completes_after_last_round() {
    let (_dir, app) = setup_ready_app();
    let (id, _) = create_session(&app).await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/sessions/{}/game/guess", id),
                json!({ "guess": "NOT_PLANET" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        app.clone()
            .oneshot(test_request("POST", &format!("/api/sessions/{}/game/advance", id)))
            .await
            .unwrap();
    }

    let response = app
        .clone()
        .oneshot(test_request("GET", &format!("/api/sessions/{}/game", id)))
        .await
        .unwrap();
    let game = extract_json(response.into_body()).await;
    assert_eq!(game["phase"], "game_complete");

    let response = app
        .oneshot(test_request("POST", &format!("/api/sessions/{}/game/reroll", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_session_delete_and_unknown_session() {
    let (_dir, app) = setup_ready_app();
    let (id, _) = create_session(&app).await;

    let response = app
        .clone()
        .oneshot(test_request("DELETE", &format!("/api/sessions/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(test_request("GET", &format!("/api/sessions/{}/game", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(test_request("DELETE", &format!("/api/sessions/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Leaderboard
// =============================================================================

#[tokio::test]
async fn test_leaderboard_ranked_by_accuracy() {
    let (_dir, app) = setup_ready_app();

    let response = app
        .oneshot(test_request("GET", "/api/leaderboard"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["available"], true);
    assert_eq!(body["current_model"], "logreg_test");
    assert_eq!(body["entries"][0]["model"], "random_forest");
    assert_eq!(body["entries"][0]["accuracy_display"], "95.0%");
    assert_eq!(body["entries"][1]["metrics"]["precision"], Value::Null);
}

#[tokio::test]
async fn test_leaderboard_unavailable_without_metrics() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(dir.path());

    let response = app
        .oneshot(test_request("GET", "/api/leaderboard"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["available"], false);
    assert_eq!(body["entries"], json!([]));
    assert_eq!(body["current_model"], Value::Null);
}

// =============================================================================
// Chat
// =============================================================================

/// Serve a canned NDJSON chat reply on an ephemeral port
async fn spawn_mock_chat_server() -> String {
    async fn reply() -> &'static str {
        concat!(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"A transit \"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"dims the star.\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        )
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/api/chat", post(reply));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_chat_streams_tokens_and_stores_reply() {
    let dir = TempDir::new().unwrap();
    write_artifacts(dir.path());
    let host = spawn_mock_chat_server().await;
    let app = setup_app_with_chat(dir.path(), &host);
    let (id, _) = create_session(&app).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/sessions/{}/chat", id),
            json!({ "message": "What is a transit?" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let events = parse_sse(&body_text(response.into_body()).await);
    let tokens: Vec<&str> = events
        .iter()
        .filter(|(e, _)| e == "token")
        .map(|(_, d)| d["content"].as_str().unwrap())
        .collect();
    assert_eq!(tokens, vec!["A transit ", "dims the star."]);

    let (event, done) = events.last().unwrap();
    assert_eq!(event, "done");
    assert_eq!(done["content"], "A transit dims the star.");
    assert_eq!(done["fallback"], false);

    let response = app
        .oneshot(test_request("GET", &format!("/api/sessions/{}/chat", id)))
        .await
        .unwrap();
    let history = extract_json(response.into_body()).await;
    assert_eq!(history["messages"][0]["role"], "user");
    assert_eq!(history["messages"][1]["role"], "assistant");
    assert_eq!(history["messages"][1]["content"], "A transit dims the star.");
}

#[tokio::test]
async fn test_chat_unreachable_server_yields_fallback() {
    let (_dir, app) = setup_ready_app();
    let (id, _) = create_session(&app).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/sessions/{}/chat", id),
            json!({ "message": "Hello" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let events = parse_sse(&body_text(response.into_body()).await);
    assert!(events.iter().any(|(e, _)| e == "error"));
    let (event, done) = events.last().unwrap();
    assert_eq!(event, "done");
    assert_eq!(done["fallback"], true);

    let response = app
        .clone()
        .oneshot(test_request("GET", &format!("/api/sessions/{}/chat", id)))
        .await
        .unwrap();
    let history = extract_json(response.into_body()).await;
    assert_eq!(history["messages"].as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(test_request("DELETE", &format!("/api/sessions/{}/chat", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(test_request("GET", &format!("/api/sessions/{}/chat", id)))
        .await
        .unwrap();
    let history = extract_json(response.into_body()).await;
    assert_eq!(history["messages"], json!([]));
}

#[tokio::test]
async fn test_chat_rejects_empty_message() {
    let (_dir, app) = setup_ready_app();
    let (id, _) = create_session(&app).await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/sessions/{}/chat", id),
            json!({ "message": "   " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_second_message_conflicts_while_streaming() {
    let (_dir, app) = setup_ready_app();
    let (id, _) = create_session(&app).await;
    let uri = format!("/api/sessions/{}/chat", id);

    // Body not yet read, so the first reply is still in flight
    let first = app
        .clone()
        .oneshot(json_request("POST", &uri, json!({ "message": "first" })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .clone()
        .oneshot(json_request("POST", &uri, json!({ "message": "second" })))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body = extract_json(second.into_body()).await;
    assert_eq!(body["error"]["code"], "CONFLICT");

    let events = parse_sse(&body_text(first.into_body()).await);
    assert_eq!(events.last().unwrap().0, "done");

    let response = app
        .clone()
        .oneshot(test_request("GET", &uri))
        .await
        .unwrap();
    let history = extract_json(response.into_body()).await;
    let messages = history["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], "first");
    assert_eq!(messages[1]["role"], "assistant");

    let third = app
        .oneshot(json_request("POST", &uri, json!({ "message": "third" })))
        .await
        .unwrap();
    assert_eq!(third.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_chat_abandoned_reply_releases_session() {
    let (_dir, app) = setup_ready_app();
    let (id, _) = create_session(&app).await;
    let uri = format!("/api/sessions/{}/chat", id);

    let abandoned = app
        .clone()
        .oneshot(json_request("POST", &uri, json!({ "message": "first" })))
        .await
        .unwrap();
    assert_eq!(abandoned.status(), StatusCode::OK);
    drop(abandoned);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let response = app
        .oneshot(json_request("POST", &uri, json!({ "message": "again" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
