use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::services::AppState;

pub const TRIGGER_SECRET_HEADER: &str = "x-trigger-secret";

/// Rejects trigger deliveries that do not carry the configured shared secret.
/// Without a configured secret every delivery is accepted.
pub async fn trigger_secret_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.config.trigger_secret.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = headers
        .get(TRIGGER_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    if provided != Some(expected) {
        tracing::warn!("Trigger delivery rejected: missing or wrong {}", TRIGGER_SECRET_HEADER);
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
