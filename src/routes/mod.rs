//! HTTP gateway (EMBP): merges every endpoint's subrouter and owns the
//! pieces they share, namely application state, the caller extractor and
//! the error response.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;

use crate::access::AccessScope;
use crate::detector::AnomalyDetector;
use crate::error::{ImportError, StoreError};
use crate::pipeline::{AlertingPipeline, ImportOptions, ImportPipeline};
use crate::store::Stores;
use crate::Config;

mod alerts;
mod dashboard;
mod health;
mod import;
mod measurements;

/// Header carrying the authenticated user id, set by the auth proxy in front
/// of this service.
pub const USER_ID_HEADER: &str = "x-user-id";

// ---

/// Everything a handler needs, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub alerting: AlertingPipeline,
    pub importer: ImportPipeline,
}

impl AppState {
    // ---
    pub fn new(stores: Stores, config: &Config) -> Self {
        // ---
        let alerting = AlertingPipeline::new(
            AnomalyDetector::new(config.thresholds),
            stores.alerts.clone(),
        );
        let importer = ImportPipeline::new(
            stores.measurements.clone(),
            stores.profiles.clone(),
            alerting.clone(),
            ImportOptions {
                evaluate_alerts: config.alert_on_csv_import,
            },
        );
        AppState {
            stores,
            alerting,
            importer,
        }
    }

    /// Reservoirs the caller owns.
    pub async fn scope_for(&self, caller: Caller) -> Result<AccessScope, ApiError> {
        Ok(AccessScope::load(self.stores.reservoirs.as_ref(), caller.0).await?)
    }
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(import::router())
        .merge(measurements::router())
        .merge(dashboard::router())
        .merge(alerts::router())
        .merge(health::router())
        .with_state(state)
}

// ---

/// Authenticated user id, as forwarded by the auth proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub i64);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // ---
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Authentication required"))?;

        raw.to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(Caller)
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Malformed user id header"))
    }
}

/// JSON error body `{"success": false, "error": "..."}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    // ---
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::new(StatusCode::NOT_FOUND, format!("{what} not found"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let body = Json(json!({ "success": false, "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        tracing::error!("Storage failure: {}", e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Storage failure")
    }
}

impl From<ImportError> for ApiError {
    fn from(e: ImportError) -> Self {
        // ---
        match e {
            ImportError::Storage(inner) => inner.into(),
            other => ApiError::new(StatusCode::BAD_REQUEST, other.to_string()),
        }
    }
}
