use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use crate::{extractors::AppJson, services::AppState};

/// POST /triggers - Document event delivered by the hosting event system.
///
/// Always acknowledged with 202: handler failures are logged, never reported
/// back, so the event system does not re-deliver and send duplicates.
pub async fn receive_trigger(
    State(state): State<Arc<AppState>>,
    AppJson(delivery): AppJson<serde_json::Value>,
) -> impl IntoResponse {
    let outcome = state.triggers().handle_delivery(delivery).await;
    (StatusCode::ACCEPTED, Json(outcome))
}
