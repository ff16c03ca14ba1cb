use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use tracing::{info, warn};

use super::{ApiError, AppState, Caller};
use crate::pipeline::ImportResult;

// ---

/// Media types accepted for an upload. Spreadsheet tools label CSV exports
/// inconsistently, hence the list.
const ACCEPTED_CONTENT_TYPES: [&str; 4] = [
    "text/csv",
    "text/plain",
    "application/csv",
    "application/vnd.ms-excel",
];

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/reservoirs/{id}/measurements/import", post(handler))
}

/// `POST /reservoirs/{id}/measurements/import` with the raw CSV as body.
async fn handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(reservoir_id): Path<i64>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ImportResult>, ApiError> {
    // ---
    info!(reservoir_id, user = caller.0, bytes = body.len(), "CSV import requested");

    check_content_type(&headers)?;

    let scope = state.scope_for(caller).await?;
    let reservoir = scope
        .reservoir(reservoir_id)
        .ok_or_else(|| ApiError::not_found("Reservoir"))?;

    match state.importer.import(&body, reservoir).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            warn!(reservoir_id, "CSV import failed: {}", e);
            Err(e.into())
        }
    }
}

/// A missing Content-Type is tolerated; a present one must name CSV or text.
fn check_content_type(headers: &HeaderMap) -> Result<(), ApiError> {
    // ---
    let Some(value) = headers.get(header::CONTENT_TYPE) else {
        return Ok(());
    };

    let media_type = value
        .to_str()
        .unwrap_or_default()
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if ACCEPTED_CONTENT_TYPES.contains(&media_type.as_str()) {
        Ok(())
    } else {
        Err(ApiError::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("Invalid file type. Expected CSV file, got: {media_type}"),
        ))
    }
}
