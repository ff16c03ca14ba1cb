//! In-process storage backend.
//!
//! Keeps every table in a single mutex-guarded struct. Used by the test
//! suites and by `STORAGE_BACKEND=memory` for running without PostgreSQL.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    AlertRepository, MeasurementRepository, ProfileLookup, ReservoirDirectory, StoreResult,
};
use crate::error::StoreError;
use crate::models::{Alert, Measurement, NewAlert, NewMeasurement, RangeProfile, Reservoir};

// ---

#[derive(Debug)]
struct FarmRow {
    name: String,
    owner_id: i64,
    culture_profile: Option<String>,
}

#[derive(Debug)]
struct ReservoirRow {
    name: String,
    farm_id: i64,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    profiles: BTreeMap<String, RangeProfile>,
    farms: BTreeMap<i64, FarmRow>,
    reservoirs: BTreeMap<i64, ReservoirRow>,
    measurements: Vec<Measurement>,
    alerts: Vec<Alert>,
}

impl Tables {
    // ---
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn reservoir(&self, reservoir_id: i64) -> Option<Reservoir> {
        // ---
        let row = self.reservoirs.get(&reservoir_id)?;
        let farm = self.farms.get(&row.farm_id)?;
        Some(Reservoir {
            id: reservoir_id,
            name: row.name.clone(),
            farm_id: row.farm_id,
            farm_name: farm.name.clone(),
            owner_id: farm.owner_id,
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    /// Register a farm, optionally bound to a culture profile by name.
    pub fn add_farm(
        &self,
        name: &str,
        owner_id: i64,
        culture_profile: Option<&str>,
    ) -> StoreResult<i64> {
        // ---
        let mut tables = self.lock()?;
        let id = tables.allocate_id();
        tables.farms.insert(
            id,
            FarmRow {
                name: name.to_string(),
                owner_id,
                culture_profile: culture_profile.map(str::to_string),
            },
        );
        Ok(id)
    }

    pub fn add_reservoir(&self, farm_id: i64, name: &str) -> StoreResult<i64> {
        // ---
        let mut tables = self.lock()?;
        let id = tables.allocate_id();
        tables.reservoirs.insert(
            id,
            ReservoirRow {
                name: name.to_string(),
                farm_id,
            },
        );
        Ok(id)
    }

    /// All stored measurements of a reservoir, in insertion order.
    pub fn measurements_for(&self, reservoir_id: i64) -> StoreResult<Vec<Measurement>> {
        let tables = self.lock()?;
        Ok(tables
            .measurements
            .iter()
            .filter(|m| m.reservoir_id == reservoir_id)
            .cloned()
            .collect())
    }

    /// All stored alerts of a reservoir, resolved or not, in insertion order.
    pub fn alerts_for(&self, reservoir_id: i64) -> StoreResult<Vec<Alert>> {
        let tables = self.lock()?;
        Ok(tables
            .alerts
            .iter()
            .filter(|a| a.reservoir_id == reservoir_id)
            .cloned()
            .collect())
    }
}

// ---

#[async_trait]
impl MeasurementRepository for MemoryStore {
    // ---
    async fn find_last_for_reservoir(&self, reservoir_id: i64) -> StoreResult<Option<Measurement>> {
        let tables = self.lock()?;
        Ok(tables
            .measurements
            .iter()
            .filter(|m| m.reservoir_id == reservoir_id)
            .max_by_key(|m| (m.measured_at, m.id))
            .cloned())
    }

    async fn persist(&self, measurement: NewMeasurement) -> StoreResult<Measurement> {
        let mut tables = self.lock()?;
        let id = tables.allocate_id();
        let stored = measurement.into_persisted(id);
        tables.measurements.push(stored.clone());
        Ok(stored)
    }

    async fn persist_batch(&self, measurements: Vec<NewMeasurement>) -> StoreResult<Vec<Measurement>> {
        // ---
        let mut tables = self.lock()?;
        let mut stored = Vec::with_capacity(measurements.len());
        for measurement in measurements {
            let id = tables.allocate_id();
            stored.push(measurement.into_persisted(id));
        }
        tables.measurements.extend(stored.iter().cloned());
        Ok(stored)
    }
}

#[async_trait]
impl AlertRepository for MemoryStore {
    // ---
    async fn find_unresolved_for_reservoirs(&self, reservoir_ids: &[i64]) -> StoreResult<Vec<Alert>> {
        let tables = self.lock()?;
        let mut alerts: Vec<Alert> = tables
            .alerts
            .iter()
            .filter(|a| !a.is_resolved() && reservoir_ids.contains(&a.reservoir_id))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(alerts)
    }

    async fn find(&self, alert_id: i64) -> StoreResult<Option<Alert>> {
        let tables = self.lock()?;
        Ok(tables.alerts.iter().find(|a| a.id == alert_id).cloned())
    }

    async fn persist(&self, alerts: Vec<NewAlert>) -> StoreResult<Vec<Alert>> {
        // ---
        let mut tables = self.lock()?;
        let mut stored = Vec::with_capacity(alerts.len());
        for alert in alerts {
            let id = tables.allocate_id();
            stored.push(alert.into_persisted(id));
        }
        tables.alerts.extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn resolve(&self, alert_id: i64, at: DateTime<Utc>) -> StoreResult<Option<Alert>> {
        // ---
        let mut tables = self.lock()?;
        Ok(tables
            .alerts
            .iter_mut()
            .find(|a| a.id == alert_id)
            .map(|alert| {
                alert.resolve(at);
                alert.clone()
            }))
    }
}

#[async_trait]
impl ProfileLookup for MemoryStore {
    // ---
    async fn find_for_reservoir(&self, reservoir_id: i64) -> StoreResult<Option<RangeProfile>> {
        let tables = self.lock()?;
        Ok(tables
            .reservoirs
            .get(&reservoir_id)
            .and_then(|r| tables.farms.get(&r.farm_id))
            .and_then(|farm| farm.culture_profile.as_ref())
            .and_then(|name| tables.profiles.get(name))
            .cloned())
    }

    async fn upsert(&self, profile: &RangeProfile) -> StoreResult<()> {
        let mut tables = self.lock()?;
        tables
            .profiles
            .insert(profile.name().to_string(), profile.clone());
        Ok(())
    }
}

#[async_trait]
impl ReservoirDirectory for MemoryStore {
    // ---
    async fn find(&self, reservoir_id: i64) -> StoreResult<Option<Reservoir>> {
        Ok(self.lock()?.reservoir(reservoir_id))
    }

    async fn list_for_owner(&self, owner_id: i64) -> StoreResult<Vec<Reservoir>> {
        // ---
        let tables = self.lock()?;
        let mut reservoirs: Vec<Reservoir> = tables
            .reservoirs
            .keys()
            .filter_map(|id| tables.reservoir(*id))
            .filter(|r| r.owner_id == owner_id)
            .collect();
        reservoirs.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(reservoirs)
    }
}
