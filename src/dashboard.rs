//! Dashboard aggregation: per-reservoir status and alert totals.
//!
//! Status reflects the most severe unresolved alert of a reservoir, but INFO
//! alerts never raise it above OK.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Alert, Measurement, Reservoir, Severity};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservoirStatus {
    Ok,
    Warn,
    Critical,
}

/// Latest readings of a reservoir, as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMeasurementView {
    pub measured_at: DateTime<Utc>,
    pub ph: Option<f64>,
    pub ec: Option<f64>,
    pub water_temp: Option<f64>,
}

impl From<&Measurement> for LastMeasurementView {
    fn from(m: &Measurement) -> Self {
        LastMeasurementView {
            measured_at: m.measured_at,
            ph: m.ph,
            ec: m.ec,
            water_temp: m.water_temp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservoirSummary {
    pub id: i64,
    pub name: String,
    pub farm_name: String,
    pub last_measurement: Option<LastMeasurementView>,
    pub status: ReservoirStatus,
}

/// Unresolved alert counts. INFO alerts only show up in `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertsSummary {
    pub total: usize,
    pub critical: usize,
    pub warn: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardResponse {
    pub reservoirs: Vec<ReservoirSummary>,
    pub alerts: AlertsSummary,
}

/// Status implied by a reservoir's unresolved alerts.
pub fn reservoir_status<'a>(alerts: impl IntoIterator<Item = &'a Alert>) -> ReservoirStatus {
    // ---
    alerts
        .into_iter()
        .filter(|a| !a.is_resolved())
        .map(|a| match a.severity {
            Severity::Critical => ReservoirStatus::Critical,
            Severity::Warn => ReservoirStatus::Warn,
            Severity::Info => ReservoirStatus::Ok,
        })
        .max()
        .unwrap_or(ReservoirStatus::Ok)
}

/// Counts over the unresolved alerts only.
pub fn alerts_summary<'a>(alerts: impl IntoIterator<Item = &'a Alert>) -> AlertsSummary {
    // ---
    let mut summary = AlertsSummary::default();
    for alert in alerts.into_iter().filter(|a| !a.is_resolved()) {
        summary.total += 1;
        match alert.severity {
            Severity::Critical => summary.critical += 1,
            Severity::Warn => summary.warn += 1,
            Severity::Info => {}
        }
    }
    summary
}

/// Build the dashboard for the caller's reservoirs.
///
/// `reservoirs` is the caller's authorized scope; alerts of reservoirs
/// outside it are ignored, as are resolved alerts. `last_measurements` maps
/// reservoir id to its most recent measurement.
pub fn summarize(
    reservoirs: &[Reservoir],
    unresolved_alerts: &[Alert],
    last_measurements: &HashMap<i64, Measurement>,
) -> DashboardResponse {
    // ---
    let mut by_reservoir: HashMap<i64, Vec<&Alert>> = HashMap::new();
    for alert in unresolved_alerts {
        by_reservoir.entry(alert.reservoir_id).or_default().push(alert);
    }

    let mut summaries: Vec<ReservoirSummary> = reservoirs
        .iter()
        .map(|r| ReservoirSummary {
            id: r.id,
            name: r.name.clone(),
            farm_name: r.farm_name.clone(),
            last_measurement: last_measurements.get(&r.id).map(LastMeasurementView::from),
            status: by_reservoir
                .get(&r.id)
                .map(|alerts| reservoir_status(alerts.iter().copied()))
                .unwrap_or(ReservoirStatus::Ok),
        })
        .collect();
    summaries.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

    let in_scope = unresolved_alerts
        .iter()
        .filter(|a| reservoirs.iter().any(|r| r.id == a.reservoir_id));

    DashboardResponse {
        reservoirs: summaries,
        alerts: alerts_summary(in_scope),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{AlertType, MeasurementSource, NewAlert};
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, hour, 0, 0).unwrap()
    }

    fn alert(id: i64, reservoir_id: i64, severity: Severity) -> Alert {
        // ---
        NewAlert {
            reservoir_id,
            measurement_id: 100 + id,
            alert_type: AlertType::PhOutOfRange,
            severity,
            message: String::new(),
            measured_value: 7.0,
            expected_min: 5.5,
            expected_max: 6.5,
            culture_name: "Lettuce".to_string(),
            created_at: at(8),
        }
        .into_persisted(id)
    }

    fn reservoir(id: i64, name: &str) -> Reservoir {
        Reservoir {
            id,
            name: name.to_string(),
            farm_id: 1,
            farm_name: "North".to_string(),
            owner_id: 1,
        }
    }

    #[test]
    fn test_critical_takes_precedence() {
        // ---
        let alerts = [
            alert(1, 1, Severity::Warn),
            alert(2, 1, Severity::Critical),
            alert(3, 1, Severity::Warn),
        ];
        assert_eq!(reservoir_status(&alerts), ReservoirStatus::Critical);
    }

    #[test]
    fn test_warn_only_is_warn() {
        // ---
        let alerts = [alert(1, 1, Severity::Warn), alert(2, 1, Severity::Info)];
        assert_eq!(reservoir_status(&alerts), ReservoirStatus::Warn);
    }

    #[test]
    fn test_info_and_empty_are_ok() {
        // ---
        let alerts = [alert(1, 1, Severity::Info), alert(2, 1, Severity::Info)];
        assert_eq!(reservoir_status(&alerts), ReservoirStatus::Ok);
        assert_eq!(reservoir_status(&[] as &[Alert]), ReservoirStatus::Ok);
    }

    #[test]
    fn test_resolved_alerts_do_not_count() {
        // ---
        let mut critical = alert(1, 1, Severity::Critical);
        critical.resolve(at(9));
        assert_eq!(reservoir_status([&critical]), ReservoirStatus::Ok);
        assert_eq!(alerts_summary([&critical]), AlertsSummary::default());
    }

    #[test]
    fn test_summarize_builds_statuses_and_totals() {
        // ---
        let reservoirs = vec![reservoir(2, "Tank B"), reservoir(1, "Tank A"), reservoir(3, "Tank C")];
        let alerts = vec![
            alert(10, 1, Severity::Critical),
            alert(11, 1, Severity::Warn),
            alert(12, 1, Severity::Warn),
            alert(13, 2, Severity::Warn),
            alert(14, 3, Severity::Info),
            // belongs to someone else's reservoir
            alert(15, 99, Severity::Critical),
        ];
        let mut last = HashMap::new();
        last.insert(
            1,
            Measurement {
                id: 50,
                reservoir_id: 1,
                measured_at: at(7),
                ph: Some(7.1),
                ec: None,
                water_temp: Some(19.0),
                source: MeasurementSource::Manual,
                created_at: at(7),
            },
        );

        let dashboard = summarize(&reservoirs, &alerts, &last);

        let statuses: Vec<(&str, ReservoirStatus)> = dashboard
            .reservoirs
            .iter()
            .map(|r| (r.name.as_str(), r.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("Tank A", ReservoirStatus::Critical),
                ("Tank B", ReservoirStatus::Warn),
                ("Tank C", ReservoirStatus::Ok),
            ]
        );
        assert_eq!(
            dashboard.alerts,
            AlertsSummary {
                total: 5,
                critical: 1,
                warn: 3,
            }
        );

        let tank_a = &dashboard.reservoirs[0];
        assert_eq!(tank_a.last_measurement.as_ref().unwrap().ph, Some(7.1));
        assert!(dashboard.reservoirs[1].last_measurement.is_none());
    }

    #[test]
    fn test_status_serializes_upper_case() {
        // ---
        assert_eq!(serde_json::to_value(ReservoirStatus::Ok).unwrap(), "OK");
        assert_eq!(serde_json::to_value(ReservoirStatus::Critical).unwrap(), "CRITICAL");
    }
}
