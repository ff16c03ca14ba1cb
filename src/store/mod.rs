//! Storage collaborators consumed by the monitoring core.
//!
//! The core only ever talks to these traits. Two backends implement them:
//! [`PgStore`] for production and [`MemoryStore`] for tests and local runs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{Alert, Measurement, NewAlert, NewMeasurement, RangeProfile, Reservoir};

mod memory;
mod postgres;

#[cfg(test)]
pub(crate) mod failing;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

// ---

#[async_trait]
pub trait MeasurementRepository: Send + Sync {
    /// Most recent measurement of a reservoir by `measured_at`.
    async fn find_last_for_reservoir(&self, reservoir_id: i64) -> StoreResult<Option<Measurement>>;

    async fn persist(&self, measurement: NewMeasurement) -> StoreResult<Measurement>;

    /// Store all measurements atomically, returning them in input order.
    async fn persist_batch(&self, measurements: Vec<NewMeasurement>) -> StoreResult<Vec<Measurement>>;
}

#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// Unresolved alerts of the given reservoirs, newest first.
    async fn find_unresolved_for_reservoirs(&self, reservoir_ids: &[i64]) -> StoreResult<Vec<Alert>>;

    async fn find(&self, alert_id: i64) -> StoreResult<Option<Alert>>;

    /// Store all alerts atomically, returning them in input order.
    async fn persist(&self, alerts: Vec<NewAlert>) -> StoreResult<Vec<Alert>>;

    /// Set `resolved_at` if unset. Returns the alert as stored afterwards.
    async fn resolve(&self, alert_id: i64, at: DateTime<Utc>) -> StoreResult<Option<Alert>>;
}

#[async_trait]
pub trait ProfileLookup: Send + Sync {
    /// Culture profile of the farm owning the reservoir, if any.
    async fn find_for_reservoir(&self, reservoir_id: i64) -> StoreResult<Option<RangeProfile>>;

    /// Insert or replace a profile by name.
    async fn upsert(&self, profile: &RangeProfile) -> StoreResult<()>;
}

#[async_trait]
pub trait ReservoirDirectory: Send + Sync {
    async fn find(&self, reservoir_id: i64) -> StoreResult<Option<Reservoir>>;

    /// Reservoirs of all farms owned by `owner_id`, ordered by name.
    async fn list_for_owner(&self, owner_id: i64) -> StoreResult<Vec<Reservoir>>;
}

/// Shared handles to every collaborator, cloned into each request.
#[derive(Clone)]
pub struct Stores {
    pub measurements: Arc<dyn MeasurementRepository>,
    pub alerts: Arc<dyn AlertRepository>,
    pub profiles: Arc<dyn ProfileLookup>,
    pub reservoirs: Arc<dyn ReservoirDirectory>,
}

impl Stores {
    // ---
    /// Use one backend for all four collaborators.
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: MeasurementRepository
            + AlertRepository
            + ProfileLookup
            + ReservoirDirectory
            + 'static,
    {
        let backend = Arc::new(backend);
        Stores {
            measurements: backend.clone(),
            alerts: backend.clone(),
            profiles: backend.clone(),
            reservoirs: backend,
        }
    }
}
