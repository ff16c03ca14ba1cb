use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{ApiError, AppState, Caller};
use crate::models::{Alert, Measurement, MeasurementSource, NewMeasurement};
use crate::store::StoreResult;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/reservoirs/{id}/measurements", post(handler))
}

/// Body of a manual or integration-sourced measurement.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeasurement {
    measured_at: Option<DateTime<Utc>>,
    ph: Option<f64>,
    ec: Option<f64>,
    water_temp: Option<f64>,
    source: Option<MeasurementSource>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Created {
    measurement: Measurement,
    alerts: Vec<Alert>,
    /// False when the stored measurement could not be checked for anomalies.
    alerts_evaluated: bool,
}

/// `POST /reservoirs/{id}/measurements`: store one measurement and run the
/// alerting pass over it.
async fn handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(reservoir_id): Path<i64>,
    Json(body): Json<CreateMeasurement>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    // ---
    let scope = state.scope_for(caller).await?;
    if !scope.contains(reservoir_id) {
        return Err(ApiError::not_found("Reservoir"));
    }

    let new = validate(body, reservoir_id, Utc::now())
        .map_err(|msg| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, msg))?;

    let measurement = state.stores.measurements.persist(new).await?;

    // Committed from here on; alerting failures are logged, not returned
    let (alerts, alerts_evaluated) = match raise_alerts(&state, &measurement).await {
        Ok(alerts) => (alerts, true),
        Err(e) => {
            error!(
                reservoir_id,
                measurement_id = measurement.id,
                "Alerting pass failed: {}",
                e
            );
            (Vec::new(), false)
        }
    };

    info!(
        reservoir_id,
        measurement_id = measurement.id,
        alerts = alerts.len(),
        "Measurement recorded"
    );
    Ok((
        StatusCode::CREATED,
        Json(Created {
            measurement,
            alerts,
            alerts_evaluated,
        }),
    ))
}

async fn raise_alerts(state: &AppState, measurement: &Measurement) -> StoreResult<Vec<Alert>> {
    // ---
    let profile = state
        .stores
        .profiles
        .find_for_reservoir(measurement.reservoir_id)
        .await?;
    state
        .alerting
        .on_measurement_created(measurement, profile.as_ref())
        .await
}

/// Check plausibility of the readings and fill in defaults.
fn validate(
    body: CreateMeasurement,
    reservoir_id: i64,
    now: DateTime<Utc>,
) -> Result<NewMeasurement, String> {
    // ---
    let source = match body.source.unwrap_or(MeasurementSource::Manual) {
        MeasurementSource::CsvImport => {
            return Err("CSV_IMPORT measurements must be uploaded through the import endpoint".into())
        }
        other => other,
    };

    if let Some(ph) = body.ph {
        if !(0.0..=14.0).contains(&ph) {
            return Err(format!("pH must be between 0 and 14, got {ph}"));
        }
    }
    if let Some(ec) = body.ec {
        if !(ec.is_finite() && ec > 0.0) {
            return Err(format!("EC must be a positive value, got {ec}"));
        }
    }
    if let Some(temp) = body.water_temp {
        if !(-10.0..=50.0).contains(&temp) {
            return Err(format!("Water temperature must be between -10°C and 50°C, got {temp}"));
        }
    }

    let new = NewMeasurement::new(reservoir_id, body.measured_at.unwrap_or(now), source)
        .with_readings(body.ph, body.ec, body.water_temp);
    if !new.has_any_value() {
        return Err("At least one measurement value (ph, ec, waterTemp) must be provided".into());
    }
    Ok(new)
}
