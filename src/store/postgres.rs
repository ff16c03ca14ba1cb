//! PostgreSQL storage backend.
//!
//! Plain runtime-checked `sqlx` queries against the tables created by
//! [`crate::schema::create_schema`]. Batch writes run in one transaction so a
//! failed import or alert pass leaves nothing behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{
    AlertRepository, MeasurementRepository, ProfileLookup, ReservoirDirectory, StoreResult,
};
use crate::models::{
    Alert, Channel, Measurement, NewAlert, NewMeasurement, RangeProfile, Reservoir,
};

// ---

const MEASUREMENT_COLUMNS: &str =
    "id, reservoir_id, measured_at, ph, ec, water_temp, source, created_at";

const ALERT_COLUMNS: &str = "id, reservoir_id, measurement_id, alert_type, severity, message, \
     measured_value, expected_min, expected_max, culture_name, created_at, resolved_at";

const RESERVOIR_SELECT: &str = r#"
    SELECT r.id, r.name, r.farm_id, f.name AS farm_name, f.owner_id
      FROM reservoir r
      JOIN farm f ON f.id = r.farm_id
"#;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    // ---
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

async fn insert_measurement<'e, E>(executor: E, m: &NewMeasurement) -> Result<Measurement, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    // ---
    let sql = format!(
        r#"
        INSERT INTO measurement (reservoir_id, measured_at, ph, ec, water_temp, source, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {MEASUREMENT_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Measurement>(&sql)
        .bind(m.reservoir_id)
        .bind(m.measured_at)
        .bind(m.ph)
        .bind(m.ec)
        .bind(m.water_temp)
        .bind(m.source.as_str())
        .bind(m.created_at)
        .fetch_one(executor)
        .await
}

#[async_trait]
impl MeasurementRepository for PgStore {
    // ---
    async fn find_last_for_reservoir(&self, reservoir_id: i64) -> StoreResult<Option<Measurement>> {
        // ---
        let sql = format!(
            r#"
            SELECT {MEASUREMENT_COLUMNS}
              FROM measurement
             WHERE reservoir_id = $1
             ORDER BY measured_at DESC, id DESC
             LIMIT 1
            "#
        );
        let row = sqlx::query_as::<_, Measurement>(&sql)
            .bind(reservoir_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn persist(&self, measurement: NewMeasurement) -> StoreResult<Measurement> {
        Ok(insert_measurement(&self.pool, &measurement).await?)
    }

    async fn persist_batch(&self, measurements: Vec<NewMeasurement>) -> StoreResult<Vec<Measurement>> {
        // ---
        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(measurements.len());
        for measurement in &measurements {
            stored.push(insert_measurement(&mut *tx, measurement).await?);
        }
        tx.commit().await?;
        Ok(stored)
    }
}

#[async_trait]
impl AlertRepository for PgStore {
    // ---
    async fn find_unresolved_for_reservoirs(&self, reservoir_ids: &[i64]) -> StoreResult<Vec<Alert>> {
        // ---
        let sql = format!(
            r#"
            SELECT {ALERT_COLUMNS}
              FROM alert
             WHERE resolved_at IS NULL
               AND reservoir_id = ANY($1)
             ORDER BY created_at DESC, id DESC
            "#
        );
        let rows = sqlx::query_as::<_, Alert>(&sql)
            .bind(reservoir_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find(&self, alert_id: i64) -> StoreResult<Option<Alert>> {
        // ---
        let sql = format!("SELECT {ALERT_COLUMNS} FROM alert WHERE id = $1");
        let row = sqlx::query_as::<_, Alert>(&sql)
            .bind(alert_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn persist(&self, alerts: Vec<NewAlert>) -> StoreResult<Vec<Alert>> {
        // ---
        if alerts.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            INSERT INTO alert (
                reservoir_id, measurement_id, alert_type, severity, message,
                measured_value, expected_min, expected_max, culture_name, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ALERT_COLUMNS}
            "#
        );

        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(alerts.len());
        for alert in &alerts {
            let row = sqlx::query_as::<_, Alert>(&sql)
                .bind(alert.reservoir_id)
                .bind(alert.measurement_id)
                .bind(alert.alert_type.as_str())
                .bind(alert.severity.as_str())
                .bind(&alert.message)
                .bind(alert.measured_value)
                .bind(alert.expected_min)
                .bind(alert.expected_max)
                .bind(&alert.culture_name)
                .bind(alert.created_at)
                .fetch_one(&mut *tx)
                .await?;
            stored.push(row);
        }
        tx.commit().await?;
        Ok(stored)
    }

    async fn resolve(&self, alert_id: i64, at: DateTime<Utc>) -> StoreResult<Option<Alert>> {
        // ---
        // COALESCE keeps the first resolution time
        let sql = format!(
            r#"
            UPDATE alert
               SET resolved_at = COALESCE(resolved_at, $2)
             WHERE id = $1
            RETURNING {ALERT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Alert>(&sql)
            .bind(alert_id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl ProfileLookup for PgStore {
    // ---
    async fn find_for_reservoir(&self, reservoir_id: i64) -> StoreResult<Option<RangeProfile>> {
        // ---
        let profile = sqlx::query_as::<_, RangeProfile>(
            r#"
            SELECT cp.name, cp.ph_min, cp.ph_max, cp.ec_min, cp.ec_max,
                   cp.water_temp_min, cp.water_temp_max
              FROM reservoir r
              JOIN farm f ON f.id = r.farm_id
              JOIN culture_profile cp ON cp.id = f.culture_profile_id
             WHERE r.id = $1
            "#,
        )
        .bind(reservoir_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(profile) = &profile {
            profile.validate()?;
        }
        Ok(profile)
    }

    async fn upsert(&self, profile: &RangeProfile) -> StoreResult<()> {
        // ---
        let ph = profile.band(Channel::Ph);
        let ec = profile.band(Channel::Ec);
        let temp = profile.band(Channel::WaterTemp);

        sqlx::query(
            r#"
            INSERT INTO culture_profile (
                name, ph_min, ph_max, ec_min, ec_max, water_temp_min, water_temp_max
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (name) DO UPDATE SET
                ph_min = EXCLUDED.ph_min,
                ph_max = EXCLUDED.ph_max,
                ec_min = EXCLUDED.ec_min,
                ec_max = EXCLUDED.ec_max,
                water_temp_min = EXCLUDED.water_temp_min,
                water_temp_max = EXCLUDED.water_temp_max
            "#,
        )
        .bind(profile.name())
        .bind(ph.min)
        .bind(ph.max)
        .bind(ec.min)
        .bind(ec.max)
        .bind(temp.min)
        .bind(temp.max)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ReservoirDirectory for PgStore {
    // ---
    async fn find(&self, reservoir_id: i64) -> StoreResult<Option<Reservoir>> {
        // ---
        let sql = format!("{RESERVOIR_SELECT} WHERE r.id = $1");
        let row = sqlx::query_as::<_, Reservoir>(&sql)
            .bind(reservoir_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_for_owner(&self, owner_id: i64) -> StoreResult<Vec<Reservoir>> {
        // ---
        let sql = format!("{RESERVOIR_SELECT} WHERE f.owner_id = $1 ORDER BY r.name ASC, r.id ASC");
        let rows = sqlx::query_as::<_, Reservoir>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
