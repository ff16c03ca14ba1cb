//! Orchestration of the parser and detector over the storage collaborators.

mod alerting;
mod import;

pub use alerting::AlertingPipeline;
pub use import::{ImportOptions, ImportPipeline, ImportResult};
