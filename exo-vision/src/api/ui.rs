//! ExoVision browser UI
//!
//! One page with five tabs: the light-curve simulator, the "Planet or Not?"
//! guessing game, the KOI classifier (single form and CSV upload), the model
//! leaderboard and the chat assistant. `app.js` drives every tab through the
//! JSON/SSE API and fills the footer from `/api/buildinfo`. Both files are
//! compiled into the binary.

use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};

use crate::AppState;

const INDEX_HTML: &str = include_str!("../ui/index.html");
const APP_JS: &str = include_str!("../ui/app.js");

/// GET / serves the tabbed ExoVision page
pub async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /static/app.js serves the client script behind every tab
pub async fn serve_app_js() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/javascript")],
        APP_JS,
    )
        .into_response()
}

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(serve_index))
        .route("/static/app.js", get(serve_app_js))
}
