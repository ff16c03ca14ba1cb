use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::AlertingPipeline;
use crate::csv_parser;
use crate::error::ImportError;
use crate::models::{Measurement, Reservoir};
use crate::store::{MeasurementRepository, ProfileLookup, StoreResult};

// ---

/// Behaviour switches for bulk import.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Run the alerting pass for every imported row, as manual entries do.
    pub evaluate_alerts: bool,
}

/// Summary returned to the caller of a successful import.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    /// Only present when imported rows went through a completed alerting
    /// pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerts_raised: Option<usize>,
}

/// Parses an uploaded CSV file and stores its valid rows for one reservoir.
#[derive(Clone)]
pub struct ImportPipeline {
    measurements: Arc<dyn MeasurementRepository>,
    profiles: Arc<dyn ProfileLookup>,
    alerting: AlertingPipeline,
    options: ImportOptions,
}

impl ImportPipeline {
    // ---
    pub fn new(
        measurements: Arc<dyn MeasurementRepository>,
        profiles: Arc<dyn ProfileLookup>,
        alerting: AlertingPipeline,
        options: ImportOptions,
    ) -> Self {
        ImportPipeline {
            measurements,
            profiles,
            alerting,
            options,
        }
    }

    /// Import `csv` into `reservoir`, which the caller has already
    /// authorized.
    ///
    /// Partial success is normal: valid rows are stored even when siblings
    /// fail, and the failures come back in [`ImportResult::errors`]. An
    /// `Err` means nothing was stored: the file was empty or unreadable,
    /// its header was wrong, not a single row was valid, or the batch write
    /// failed. Once rows are committed a failing alerting pass is logged and
    /// leaves `alerts_raised` unset.
    pub async fn import(&self, csv: &[u8], reservoir: &Reservoir) -> Result<ImportResult, ImportError> {
        // ---
        if csv.iter().all(u8::is_ascii_whitespace) {
            return Err(ImportError::Empty);
        }
        let content =
            std::str::from_utf8(csv).map_err(|e| ImportError::Unreadable(e.to_string()))?;

        let outcome = csv_parser::parse(content, reservoir.id)?;
        let errors = outcome.error_messages();

        if outcome.candidates.is_empty() && !errors.is_empty() {
            warn!(
                reservoir_id = reservoir.id,
                errors = errors.len(),
                "CSV import rejected, no valid rows"
            );
            return Err(ImportError::NoValidRows { errors });
        }

        let stored = self.measurements.persist_batch(outcome.candidates).await?;

        let alerts_raised = if self.options.evaluate_alerts && !stored.is_empty() {
            match self.evaluate(&stored, reservoir.id).await {
                Ok(raised) => Some(raised),
                Err(e) => {
                    error!(
                        reservoir_id = reservoir.id,
                        imported = stored.len(),
                        "Alerting pass failed after import: {}",
                        e
                    );
                    None
                }
            }
        } else {
            None
        };

        info!(
            reservoir_id = reservoir.id,
            imported = stored.len(),
            skipped = errors.len(),
            "CSV import complete"
        );

        Ok(ImportResult {
            success: true,
            imported: stored.len(),
            skipped: errors.len(),
            errors,
            alerts_raised,
        })
    }

    async fn evaluate(&self, stored: &[Measurement], reservoir_id: i64) -> StoreResult<usize> {
        // ---
        let profile = self.profiles.find_for_reservoir(reservoir_id).await?;
        let mut raised = 0;
        for measurement in stored {
            raised += self
                .alerting
                .on_measurement_created(measurement, profile.as_ref())
                .await?
                .len();
        }
        Ok(raised)
    }
}
