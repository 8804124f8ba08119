//! # Marketplace Proxy Handler
//!
//! Browser-facing pass-through to the Magic Eden API.
//!
//! - **Route**: `ANY /api/magic-eden/{*path}`
//! - Only `GET` is forwarded; any other method gets `405 {"error":"Method not allowed"}`.
//! - Success returns the upstream JSON body verbatim.
//! - An upstream non-2xx keeps its status and answers
//!   `{"error":"Magic Eden API error: <status> <reason>","details":"<upstream body>"}`.
//! - Transport failures answer `500 {"error":"Failed to fetch from Magic Eden API","details":...}`.
//!
//! ```bash
//! curl "http://localhost:3000/api/magic-eden/marketplace/popular_collections?timeRange=1d"
//! ```

use axum::extract::{Path, RawQuery, State};
use axum::http::{Method, StatusCode};
use axum::Json;
use lib_core::dto::ErrorResponse;
use lib_core::AppError;
use lib_market::UpstreamGateway;
use serde_json::Value;
use std::sync::Arc;
use tracing::{instrument, warn};

type ProxyError = (StatusCode, Json<ErrorResponse>);

#[instrument(skip(gateway, query))]
pub async fn forward(
    State(gateway): State<Arc<UpstreamGateway>>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, ProxyError> {
    gateway
        .forward(&method, &path, query.as_deref())
        .await
        .map(Json)
        .map_err(proxy_error)
}

fn proxy_error(err: AppError) -> ProxyError {
    match err {
        AppError::MethodNotAllowed(_) => (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(ErrorResponse {
                error: "Method not allowed".to_string(),
                details: None,
            }),
        ),
        AppError::Upstream { .. } => (err.status_code(), Json(err.to_error_response())),
        other => {
            warn!("Proxy transport failure: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to fetch from Magic Eden API".to_string(),
                    details: Some(other.to_string()),
                }),
            )
        }
    }
}
