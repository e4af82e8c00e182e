//! HTTP route handlers.

mod chart;
mod health;

pub use chart::{ChartRequest, ChartResponse, chart};
pub use health::{HealthResponse, health};

use axum::{
    Json,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Body returned for unknown paths.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundResponse {
    pub error: String,
    pub path: String,
    pub supported_paths: Vec<String>,
}

/// Fallback for every unmatched path or method.
///
/// Bare `OPTIONS` requests are answered with an empty `200` so clients that
/// send OPTIONS without CORS preflight headers still succeed.
pub async fn not_found(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }

    tracing::debug!(method = %method, path = %uri.path(), "no route");

    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            error: "resource not found".to_string(),
            path: uri.path().to_string(),
            supported_paths: state.chart_paths(),
        }),
    )
        .into_response()
}
