use std::collections::HashMap;

use axum::{extract::State, routing::get, Json, Router};
use tracing::debug;

use super::{ApiError, AppState, Caller};
use crate::dashboard::{self, DashboardResponse};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/dashboard", get(handler))
}

/// `GET /dashboard`: status of each of the caller's reservoirs.
async fn handler(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<DashboardResponse>, ApiError> {
    // ---
    let scope = state.scope_for(caller).await?;
    let alerts = state
        .stores
        .alerts
        .find_unresolved_for_reservoirs(&scope.reservoir_ids())
        .await?;

    let mut last_measurements = HashMap::new();
    for reservoir in scope.reservoirs() {
        if let Some(m) = state
            .stores
            .measurements
            .find_last_for_reservoir(reservoir.id)
            .await?
        {
            last_measurements.insert(reservoir.id, m);
        }
    }

    debug!(
        user = caller.0,
        reservoirs = scope.reservoirs().len(),
        unresolved = alerts.len(),
        "Building dashboard"
    );
    Ok(Json(dashboard::summarize(
        scope.reservoirs(),
        &alerts,
        &last_measurements,
    )))
}
