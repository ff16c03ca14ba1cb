//! Database schema management for `hydrosense-monitor`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the reference table `culture_profile`, the ownership tables
/// `farm` and `reservoir` (read by the core, written by the CRUD layer), and
/// the `measurement` and `alert` tables the pipelines write to. Safe to call
/// on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Every band must have min < max
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS culture_profile (
            id              SERIAL PRIMARY KEY,
            name            TEXT             NOT NULL UNIQUE,
            ph_min          DOUBLE PRECISION NOT NULL,
            ph_max          DOUBLE PRECISION NOT NULL,
            ec_min          DOUBLE PRECISION NOT NULL,
            ec_max          DOUBLE PRECISION NOT NULL,
            water_temp_min  DOUBLE PRECISION NOT NULL,
            water_temp_max  DOUBLE PRECISION NOT NULL,
            CHECK (ph_min < ph_max),
            CHECK (ec_min < ec_max),
            CHECK (water_temp_min < water_temp_max)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS farm (
            id                  BIGSERIAL PRIMARY KEY,
            name                TEXT        NOT NULL,
            owner_id            BIGINT      NOT NULL,
            culture_profile_id  INTEGER     REFERENCES culture_profile (id) ON DELETE SET NULL,
            created_at          TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at          TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reservoir (
            id          BIGSERIAL PRIMARY KEY,
            name        TEXT        NOT NULL,
            farm_id     BIGINT      NOT NULL REFERENCES farm (id) ON DELETE CASCADE,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS measurement (
            id            BIGSERIAL PRIMARY KEY,
            reservoir_id  BIGINT           NOT NULL REFERENCES reservoir (id) ON DELETE CASCADE,
            measured_at   TIMESTAMPTZ      NOT NULL,
            ph            DOUBLE PRECISION,
            ec            DOUBLE PRECISION,
            water_temp    DOUBLE PRECISION,
            source        TEXT             NOT NULL,
            created_at    TIMESTAMPTZ      NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alert (
            id              BIGSERIAL PRIMARY KEY,
            reservoir_id    BIGINT           NOT NULL REFERENCES reservoir (id) ON DELETE CASCADE,
            measurement_id  BIGINT           NOT NULL REFERENCES measurement (id) ON DELETE CASCADE,
            alert_type      TEXT             NOT NULL,
            severity        TEXT             NOT NULL,
            message         TEXT             NOT NULL,
            measured_value  DOUBLE PRECISION NOT NULL,
            expected_min    DOUBLE PRECISION,
            expected_max    DOUBLE PRECISION,
            culture_name    TEXT             NOT NULL,
            created_at      TIMESTAMPTZ      NOT NULL,
            resolved_at     TIMESTAMPTZ
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Indexes for the ownership joins and the dashboard queries
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_farm_owner_id ON farm (owner_id);",
        "CREATE INDEX IF NOT EXISTS idx_reservoir_farm_id ON reservoir (farm_id);",
        "CREATE INDEX IF NOT EXISTS idx_measurement_reservoir_measured_at \
             ON measurement (reservoir_id, measured_at DESC);",
        "CREATE INDEX IF NOT EXISTS idx_alert_reservoir_id ON alert (reservoir_id);",
        "CREATE INDEX IF NOT EXISTS idx_alert_measurement_id ON alert (measurement_id);",
        "CREATE INDEX IF NOT EXISTS idx_alert_unresolved \
             ON alert (reservoir_id) WHERE resolved_at IS NULL;",
    ];
    for statement in indexes {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(())
}
