mod assets;
mod chat;
mod health;
mod metrics;

use std::sync::Arc;

use axum::Router;
use axum::handler::HandlerWithoutStateExt;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use assets::{index_handler, missing_asset};
pub use chat::chat_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;

pub fn router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.static_dir)
        .append_index_html_on_directories(false)
        .not_found_service(missing_asset.into_service());

    Router::new()
        .route("/", get(index_handler))
        .nest_service("/static", static_files)
        .route("/api/chat", post(chat_handler))
        .route("/monk", post(chat_handler)) // older clients
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
