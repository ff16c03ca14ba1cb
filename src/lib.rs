//! Hydroponic reservoir monitoring: CSV ingestion of water-quality
//! measurements and range-based anomaly alerting.
//!
//! Module layout follows the Explicit Module Boundary Pattern (EMBP): each
//! top-level module exposes a small surface and the binary in `main.rs`
//! only wires them together.
//!
//! - [`csv_parser`], [`detector`], [`dashboard`]: pure core logic
//! - [`pipeline`]: orchestration of the core over the storage traits
//! - [`store`]: storage traits plus PostgreSQL and in-memory backends
//! - [`routes`]: the axum HTTP gateway

pub mod access;
pub mod config;
pub mod csv_parser;
pub mod dashboard;
pub mod detector;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod profiles;
pub mod routes;
pub mod schema;
pub mod store;

pub use config::{Config, StorageBackend};
pub use routes::{router, AppState};
