use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use tracing::info;

use super::{ApiError, AppState, Caller};
use crate::models::Alert;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/alerts/{id}/resolve", post(handler))
}

/// `POST /alerts/{id}/resolve`. Resolving twice keeps the first timestamp.
async fn handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(alert_id): Path<i64>,
) -> Result<Json<Alert>, ApiError> {
    // ---
    let scope = state.scope_for(caller).await?;

    // Alerts of other users' reservoirs are reported as missing
    let alert = state
        .stores
        .alerts
        .find(alert_id)
        .await?
        .filter(|a| scope.contains(a.reservoir_id))
        .ok_or_else(|| ApiError::not_found("Alert"))?;

    let resolved = state
        .stores
        .alerts
        .resolve(alert.id, Utc::now())
        .await?
        .ok_or_else(|| ApiError::not_found("Alert"))?;

    info!(alert_id, user = caller.0, resolved_at = ?resolved.resolved_at, "Alert resolved");
    Ok(Json(resolved))
}
