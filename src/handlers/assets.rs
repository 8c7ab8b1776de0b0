use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::warn;

use crate::state::AppState;

pub async fn index_handler(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    let path = state.static_dir.join(&state.index_file);
    match ServeFile::new(&path).oneshot(request).await {
        Ok(response) if response.status() != StatusCode::NOT_FOUND => response.into_response(),
        Ok(_) => {
            warn!(path = %path.display(), "index file not found");
            not_found(&state.index_file)
        }
        Err(never) => match never {},
    }
}

/// Fallback for the `/static` directory service. Sees the path with the prefix stripped.
pub async fn missing_asset(uri: Uri) -> Response {
    let name = uri.path().trim_start_matches('/');
    warn!(requested = %name, "static file not found");
    not_found(name)
}

fn not_found(name: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("Error: {name} not found")).into_response()
}
