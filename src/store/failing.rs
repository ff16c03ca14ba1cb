//! Alert store whose every call fails, for exercising error paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AlertRepository, StoreResult};
use crate::error::StoreError;
use crate::models::{Alert, NewAlert};

// ---

#[derive(Debug, Default)]
pub struct FailingAlerts;

fn down<T>() -> StoreResult<T> {
    Err(StoreError::Unavailable("alert table offline".to_string()))
}

#[async_trait]
impl AlertRepository for FailingAlerts {
    // ---
    async fn find_unresolved_for_reservoirs(&self, _reservoir_ids: &[i64]) -> StoreResult<Vec<Alert>> {
        down()
    }

    async fn find(&self, _alert_id: i64) -> StoreResult<Option<Alert>> {
        down()
    }

    async fn persist(&self, _alerts: Vec<NewAlert>) -> StoreResult<Vec<Alert>> {
        down()
    }

    async fn resolve(&self, _alert_id: i64, _at: DateTime<Utc>) -> StoreResult<Option<Alert>> {
        down()
    }
}
