//! Anomaly detection for reservoir measurements.
//!
//! Compares each reading of a measurement against the culture profile's
//! band for that channel and classifies out-of-band readings by how far
//! they stray, relative to the band's width.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::{AlertType, Band, Channel, Measurement, NewAlert, RangeProfile, Severity};

// ---

/// Deviation percentages separating the severity tiers.
///
/// A reading deviating by more than `critical_percent` of the band width is
/// CRITICAL, by more than `warn_percent` is WARN, anything else out of band
/// is INFO.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholds {
    pub warn_percent: f64,
    pub critical_percent: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        SeverityThresholds {
            warn_percent: 10.0,
            critical_percent: 25.0,
        }
    }
}

impl SeverityThresholds {
    // ---
    pub fn classify(&self, deviation_percent: f64) -> Severity {
        // ---
        if deviation_percent > self.critical_percent {
            Severity::Critical
        } else if deviation_percent > self.warn_percent {
            Severity::Warn
        } else {
            Severity::Info
        }
    }
}

/// Deviation from the band as a percentage of the band's width.
pub fn deviation_percent(value: f64, band: Band) -> f64 {
    band.deviation(value) / band.width() * 100.0
}

/// Stateless detector parameterized by its severity thresholds.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnomalyDetector {
    thresholds: SeverityThresholds,
}

impl AnomalyDetector {
    // ---
    pub fn new(thresholds: SeverityThresholds) -> Self {
        AnomalyDetector { thresholds }
    }

    /// Produce one unsaved alert per out-of-band reading.
    ///
    /// Without a profile there is nothing to compare against and the result
    /// is empty. Bounds are inclusive: a reading equal to `min` or `max` is
    /// acceptable.
    pub fn detect(&self, measurement: &Measurement, profile: Option<&RangeProfile>) -> Vec<NewAlert> {
        // ---
        let Some(profile) = profile else {
            info!(
                measurement_id = measurement.id,
                reservoir_id = measurement.reservoir_id,
                "No culture profile configured, skipping anomaly detection"
            );
            return Vec::new();
        };

        let alerts: Vec<NewAlert> = Channel::ALL
            .into_iter()
            .filter_map(|channel| self.check_channel(measurement, profile, channel))
            .collect();

        if !alerts.is_empty() {
            info!(
                measurement_id = measurement.id,
                alerts = alerts.len(),
                "Anomaly detection completed"
            );
        }
        alerts
    }

    fn check_channel(
        &self,
        measurement: &Measurement,
        profile: &RangeProfile,
        channel: Channel,
    ) -> Option<NewAlert> {
        // ---
        let value = measurement.reading(channel)?;
        let band = profile.band(channel);
        if band.contains(value) {
            return None;
        }

        let percent = deviation_percent(value, band);
        let severity = self.thresholds.classify(percent);
        let alert_type = channel.alert_type();

        warn!(
            measurement_id = measurement.id,
            channel = channel.field_name(),
            value,
            min = band.min,
            max = band.max,
            severity = %severity,
            "Reading outside culture range"
        );

        Some(NewAlert {
            reservoir_id: measurement.reservoir_id,
            measurement_id: measurement.id,
            alert_type,
            severity,
            message: alert_message(alert_type, value, band, profile.name()),
            measured_value: value,
            expected_min: band.min,
            expected_max: band.max,
            culture_name: profile.name().to_string(),
            created_at: Utc::now(),
        })
    }
}

fn alert_message(alert_type: AlertType, value: f64, band: Band, culture: &str) -> String {
    // ---
    let (min, max) = (band.min, band.max);
    match alert_type {
        AlertType::PhOutOfRange => format!(
            "pH level {value:.2} is outside the recommended range [{min:.2} - {max:.2}] for {culture}"
        ),
        AlertType::EcOutOfRange => format!(
            "EC level {value:.2} mS/cm is outside the recommended range [{min:.2} - {max:.2}] for {culture}"
        ),
        AlertType::TempOutOfRange => format!(
            "Water temperature {value:.2}°C is outside the recommended range [{min:.2} - {max:.2}] for {culture}"
        ),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::MeasurementSource;
    use chrono::TimeZone;

    fn profile() -> RangeProfile {
        RangeProfile::new("Lettuce", (5.5, 6.5), (1.0, 2.0), (18.0, 24.0)).unwrap()
    }

    fn measurement(ph: Option<f64>, ec: Option<f64>, water_temp: Option<f64>) -> Measurement {
        // ---
        Measurement {
            id: 42,
            reservoir_id: 3,
            measured_at: Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap(),
            ph,
            ec,
            water_temp,
            source: MeasurementSource::Manual,
            created_at: Utc.with_ymd_and_hms(2025, 3, 26, 18, 46, 0).unwrap(),
        }
    }

    fn detect(m: &Measurement) -> Vec<NewAlert> {
        AnomalyDetector::default().detect(m, Some(&profile()))
    }

    #[test]
    fn test_no_profile_means_no_alerts() {
        // ---
        let m = measurement(Some(14.0), Some(9.0), Some(45.0));
        assert!(AnomalyDetector::default().detect(&m, None).is_empty());
    }

    #[test]
    fn test_values_inside_range_raise_nothing() {
        // ---
        assert!(detect(&measurement(Some(6.0), Some(1.5), Some(21.0))).is_empty());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        // ---
        assert!(detect(&measurement(Some(5.5), Some(1.0), Some(18.0))).is_empty());
        assert!(detect(&measurement(Some(6.5), Some(2.0), Some(24.0))).is_empty());
    }

    #[test]
    fn test_missing_channels_are_skipped() {
        // ---
        assert!(detect(&measurement(None, None, None)).is_empty());

        let alerts = detect(&measurement(None, Some(3.0), None));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::EcOutOfRange);
    }

    #[test]
    fn test_each_channel_is_independent() {
        // ---
        let alerts = detect(&measurement(Some(4.0), Some(3.0), Some(30.0)));
        let types: Vec<AlertType> = alerts.iter().map(|a| a.alert_type).collect();
        assert_eq!(
            types,
            vec![AlertType::PhOutOfRange, AlertType::EcOutOfRange, AlertType::TempOutOfRange]
        );
        assert!(alerts.iter().all(|a| a.measurement_id == 42 && a.reservoir_id == 3));
    }

    #[test]
    fn test_ph_far_above_range_is_critical() {
        // ---
        let alerts = detect(&measurement(Some(7.2), None, None));
        assert_eq!(alerts.len(), 1);

        let alert = &alerts[0];
        assert_eq!(alert.alert_type, AlertType::PhOutOfRange);
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.measured_value, 7.2);
        assert_eq!(alert.expected_min, 5.5);
        assert_eq!(alert.expected_max, 6.5);
        assert_eq!(alert.culture_name, "Lettuce");
        assert_eq!(
            alert.message,
            "pH level 7.20 is outside the recommended range [5.50 - 6.50] for Lettuce"
        );
    }

    #[test]
    fn test_ec_moderately_above_range_is_warn() {
        // ---
        let alerts = detect(&measurement(None, Some(2.15), None));
        assert_eq!(alerts[0].severity, Severity::Warn);
        assert_eq!(
            alerts[0].message,
            "EC level 2.15 mS/cm is outside the recommended range [1.00 - 2.00] for Lettuce"
        );
    }

    #[test]
    fn test_slight_deviation_is_info() {
        // ---
        // 0.05 outside a band of width 1.0 is 5%
        let alerts = detect(&measurement(Some(5.45), None, None));
        assert_eq!(alerts[0].severity, Severity::Info);
    }

    #[test]
    fn test_temperature_below_range_message() {
        // ---
        let alerts = detect(&measurement(None, None, Some(12.0)));
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(
            alerts[0].message,
            "Water temperature 12.00°C is outside the recommended range [18.00 - 24.00] for Lettuce"
        );
    }

    #[test]
    fn test_threshold_edges() {
        // ---
        let t = SeverityThresholds::default();
        assert_eq!(t.classify(0.0), Severity::Info);
        assert_eq!(t.classify(10.0), Severity::Info);
        assert_eq!(t.classify(10.01), Severity::Warn);
        assert_eq!(t.classify(25.0), Severity::Warn);
        assert_eq!(t.classify(25.01), Severity::Critical);
    }

    #[test]
    fn test_severity_is_monotonic_in_deviation() {
        // ---
        let band = profile().band(Channel::Ph);
        let t = SeverityThresholds::default();
        let mut previous = Severity::Info;
        for step in 1..=200 {
            let value = band.max + step as f64 * 0.01;
            let severity = t.classify(deviation_percent(value, band));
            assert!(severity >= previous, "severity dropped at {value}");
            previous = severity;
        }
        assert_eq!(previous, Severity::Critical);
    }

    #[test]
    fn test_custom_thresholds() {
        // ---
        let detector = AnomalyDetector::new(SeverityThresholds {
            warn_percent: 50.0,
            critical_percent: 100.0,
        });
        let alerts = detector.detect(&measurement(Some(7.2), None, None), Some(&profile()));
        assert_eq!(alerts[0].severity, Severity::Warn);
    }
}
