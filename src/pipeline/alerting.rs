use std::sync::Arc;

use tracing::debug;

use crate::detector::AnomalyDetector;
use crate::models::{Alert, Measurement, RangeProfile};
use crate::store::{AlertRepository, StoreResult};

// ---

/// Runs the detector once over a freshly stored measurement and stores
/// whatever alerts it raises.
#[derive(Clone)]
pub struct AlertingPipeline {
    detector: AnomalyDetector,
    alerts: Arc<dyn AlertRepository>,
}

impl AlertingPipeline {
    // ---
    pub fn new(detector: AnomalyDetector, alerts: Arc<dyn AlertRepository>) -> Self {
        AlertingPipeline { detector, alerts }
    }

    /// Must be called exactly once per created measurement; there is no
    /// deduplication.
    pub async fn on_measurement_created(
        &self,
        measurement: &Measurement,
        profile: Option<&RangeProfile>,
    ) -> StoreResult<Vec<Alert>> {
        // ---
        let raised = self.detector.detect(measurement, profile);
        if raised.is_empty() {
            debug!(measurement_id = measurement.id, "No anomalies");
            return Ok(Vec::new());
        }
        self.alerts.persist(raised).await
    }
}
