//! Entry point for the `hydrosense-monitor` service.
//!
//! Startup sequence:
//! - Load `.env` and the typed configuration
//! - Initialize structured logging/tracing
//! - Open the configured storage backend (PostgreSQL or in-memory) and, for
//!   PostgreSQL, create the schema if it does not exist
//! - Seed the built-in culture profiles when enabled
//! - Mount the routes gateway and serve HTTP
//!
//! # Environment Variables
//! See [`hydrosense::config::load_from_env`] for the full list. Logging is
//! controlled by `RUST_LOG` or `AXUM_LOG_LEVEL` (default: `debug`),
//! `AXUM_SPAN_EVENTS` and `FORCE_COLOR`.
use std::{env, io::IsTerminal};

use anyhow::{Context, Result};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use hydrosense::config::{self, mask_db_url};
use hydrosense::store::{MemoryStore, PgStore, Stores};
use hydrosense::{profiles, routes, schema, AppState, StorageBackend};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let stores = open_stores(&cfg.storage).await?;

    if cfg.seed_profiles {
        profiles::seed(stores.profiles.as_ref()).await?;
    }

    let app = routes::router(AppState::new(stores, &cfg));

    tracing::info!("Listening on {}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.bind_addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn open_stores(storage: &StorageBackend) -> Result<Stores> {
    // ---
    match storage {
        StorageBackend::Postgres { db_url, pool_max } => {
            let masked = mask_db_url(db_url);
            tracing::info!("Attempting to connect to database: {}", masked);

            let pool = PgPoolOptions::new()
                .max_connections(*pool_max)
                .connect(db_url)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to database '{}': {}", masked, e))?;

            tracing::info!("Successfully connected to database");
            schema::create_schema(&pool).await?;
            Ok(Stores::from_backend(PgStore::new(pool)))
        }
        StorageBackend::Memory => {
            // Farms and reservoirs are provisioned elsewhere; an empty
            // memory store answers every caller with an empty scope.
            tracing::warn!("Using in-memory storage, data is lost on exit");
            Ok(Stores::from_backend(MemoryStore::new()))
        }
    }
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// - Color output follows `FORCE_COLOR=1|true|yes` / `0|false|no`, otherwise
///   TTY detection
/// - `AXUM_SPAN_EVENTS`: `"full"` (ENTER, EXIT, CLOSE), `"enter_exit"`, or
///   CLOSE only by default
/// - `RUST_LOG` wins over `AXUM_LOG_LEVEL`
///
/// Call once, before any tracing macro fires.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AXUM_LOG_LEVEL").ok().as_deref() {
            Some(l @ ("trace" | "debug" | "info" | "warn" | "error")) => l.to_string(),
            _ => "debug".to_string(),
        };
        EnvFilter::new(format!("{level},sqlx::query=warn,hyper=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
