//! HTTP API handlers for exo-vision

pub mod chat;
pub mod health;
pub mod leaderboard;
pub mod predict;
pub mod sessions;
pub mod simulate;
pub mod ui;

pub use chat::chat_routes;
pub use health::health_routes;
pub use leaderboard::leaderboard_routes;
pub use predict::predict_routes;
pub use sessions::session_routes;
pub use simulate::simulate_routes;
pub use ui::ui_routes;
