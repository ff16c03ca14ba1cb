//! Data models for the hydroponic monitoring pipeline.
//!
//! Entities mirror the persisted tables (`measurement`, `alert`,
//! `culture_profile`, `reservoir`). Values that have not been stored yet use
//! the `New*` variants, which carry no id and get their `created_at` stamped
//! at construction time.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, UnknownVariant};

// ---

/// Provenance of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasurementSource {
    Manual,
    CsvImport,
    ApiIntegration,
}

impl MeasurementSource {
    // ---
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementSource::Manual => "MANUAL",
            MeasurementSource::CsvImport => "CSV_IMPORT",
            MeasurementSource::ApiIntegration => "API_INTEGRATION",
        }
    }
}

/// Which reading of a measurement an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    PhOutOfRange,
    EcOutOfRange,
    TempOutOfRange,
}

impl AlertType {
    // ---
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::PhOutOfRange => "PH_OUT_OF_RANGE",
            AlertType::EcOutOfRange => "EC_OUT_OF_RANGE",
            AlertType::TempOutOfRange => "TEMP_OUT_OF_RANGE",
        }
    }
}

/// Severity tier, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warn,
    Critical,
}

impl Severity {
    // ---
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// Implements `Display`, `FromStr` and `TryFrom<String>` for the text-backed
/// enums so they can round-trip through `TEXT` columns.
macro_rules! text_enum {
    ($ty:ident, $name:literal, [$($variant:ident),+]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s == $ty::$variant.as_str() {
                        return Ok($ty::$variant);
                    }
                )+
                Err(UnknownVariant { kind: $name, value: s.to_string() })
            }
        }

        impl TryFrom<String> for $ty {
            type Error = UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

text_enum!(MeasurementSource, "measurement source", [Manual, CsvImport, ApiIntegration]);
text_enum!(AlertType, "alert type", [PhOutOfRange, EcOutOfRange, TempOutOfRange]);
text_enum!(Severity, "severity", [Info, Warn, Critical]);

// ---

/// One of the three monitored readings of a reservoir.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Ph,
    Ec,
    WaterTemp,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Ph, Channel::Ec, Channel::WaterTemp];

    pub fn alert_type(&self) -> AlertType {
        // ---
        match self {
            Channel::Ph => AlertType::PhOutOfRange,
            Channel::Ec => AlertType::EcOutOfRange,
            Channel::WaterTemp => AlertType::TempOutOfRange,
        }
    }

    /// Column name used in CSV files and log fields.
    pub fn field_name(&self) -> &'static str {
        match self {
            Channel::Ph => "ph",
            Channel::Ec => "ec",
            Channel::WaterTemp => "waterTemp",
        }
    }
}

/// Acceptable `[min, max]` band for one channel. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    // ---
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Distance from the nearest bound, zero when inside the band.
    pub fn deviation(&self, value: f64) -> f64 {
        (self.min - value).max(value - self.max).max(0.0)
    }
}

/// Crop-specific acceptable ranges ("culture profile").
///
/// Only constructible through [`RangeProfile::new`], which rejects
/// non-finite bounds and empty or inverted ranges, so detection code can
/// divide by a band's width without checking it again.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RangeProfile {
    // ---
    name: String,
    ph_min: f64,
    ph_max: f64,
    ec_min: f64,
    ec_max: f64,
    water_temp_min: f64,
    water_temp_max: f64,
}

impl RangeProfile {
    // ---
    pub fn new(
        name: impl Into<String>,
        ph: (f64, f64),
        ec: (f64, f64),
        water_temp: (f64, f64),
    ) -> Result<Self, ProfileError> {
        // ---
        let profile = RangeProfile {
            name: name.into(),
            ph_min: ph.0,
            ph_max: ph.1,
            ec_min: ec.0,
            ec_max: ec.1,
            water_temp_min: water_temp.0,
            water_temp_max: water_temp.1,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Re-checks the range invariants; used for rows read back from storage.
    pub fn validate(&self) -> Result<(), ProfileError> {
        // ---
        if self.name.trim().is_empty() {
            return Err(ProfileError::MissingName);
        }
        for channel in Channel::ALL {
            let band = self.band(channel);
            if !band.min.is_finite() || !band.max.is_finite() {
                return Err(ProfileError::NonFinite {
                    profile: self.name.clone(),
                    field: channel.field_name(),
                });
            }
            if band.min >= band.max {
                return Err(ProfileError::InvalidRange {
                    profile: self.name.clone(),
                    field: channel.field_name(),
                    min: band.min,
                    max: band.max,
                });
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn band(&self, channel: Channel) -> Band {
        // ---
        match channel {
            Channel::Ph => Band { min: self.ph_min, max: self.ph_max },
            Channel::Ec => Band { min: self.ec_min, max: self.ec_max },
            Channel::WaterTemp => Band {
                min: self.water_temp_min,
                max: self.water_temp_max,
            },
        }
    }
}

// ---

/// A measurement that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeasurement {
    // ---
    pub reservoir_id: i64,
    pub measured_at: DateTime<Utc>,
    pub ph: Option<f64>,
    pub ec: Option<f64>,
    pub water_temp: Option<f64>,
    pub source: MeasurementSource,
    pub created_at: DateTime<Utc>,
}

impl NewMeasurement {
    // ---
    pub fn new(
        reservoir_id: i64,
        measured_at: DateTime<Utc>,
        source: MeasurementSource,
    ) -> Self {
        // ---
        NewMeasurement {
            reservoir_id,
            measured_at,
            ph: None,
            ec: None,
            water_temp: None,
            source,
            created_at: Utc::now(),
        }
    }

    pub fn with_readings(mut self, ph: Option<f64>, ec: Option<f64>, water_temp: Option<f64>) -> Self {
        self.ph = ph;
        self.ec = ec;
        self.water_temp = water_temp;
        self
    }

    pub fn has_any_value(&self) -> bool {
        self.ph.is_some() || self.ec.is_some() || self.water_temp.is_some()
    }

    /// Attach the storage-assigned id.
    pub fn into_persisted(self, id: i64) -> Measurement {
        // ---
        Measurement {
            id,
            reservoir_id: self.reservoir_id,
            measured_at: self.measured_at,
            ph: self.ph,
            ec: self.ec,
            water_temp: self.water_temp,
            source: self.source,
            created_at: self.created_at,
        }
    }
}

/// A stored measurement for a reservoir.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    // ---
    pub id: i64,
    pub reservoir_id: i64,
    pub measured_at: DateTime<Utc>,
    pub ph: Option<f64>,
    pub ec: Option<f64>,
    pub water_temp: Option<f64>,
    #[sqlx(try_from = "String")]
    pub source: MeasurementSource,
    pub created_at: DateTime<Utc>,
}

impl Measurement {
    // ---
    pub fn reading(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Ph => self.ph,
            Channel::Ec => self.ec,
            Channel::WaterTemp => self.water_temp,
        }
    }
}

// ---

/// An alert produced by the detector, not stored yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlert {
    // ---
    pub reservoir_id: i64,
    pub measurement_id: i64,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub measured_value: f64,
    pub expected_min: f64,
    pub expected_max: f64,
    pub culture_name: String,
    pub created_at: DateTime<Utc>,
}

impl NewAlert {
    // ---
    pub fn into_persisted(self, id: i64) -> Alert {
        // ---
        Alert {
            id,
            reservoir_id: self.reservoir_id,
            measurement_id: self.measurement_id,
            alert_type: self.alert_type,
            severity: self.severity,
            message: self.message,
            measured_value: self.measured_value,
            expected_min: Some(self.expected_min),
            expected_max: Some(self.expected_max),
            culture_name: self.culture_name,
            created_at: self.created_at,
            resolved_at: None,
        }
    }
}

/// A stored alert. `resolved_at == None` means unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    // ---
    pub id: i64,
    pub reservoir_id: i64,
    pub measurement_id: i64,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub alert_type: AlertType,
    #[sqlx(try_from = "String")]
    pub severity: Severity,
    pub message: String,
    pub measured_value: f64,
    pub expected_min: Option<f64>,
    pub expected_max: Option<f64>,
    pub culture_name: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    // ---
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    /// Mark as resolved. A second call keeps the first timestamp.
    pub fn resolve(&mut self, at: DateTime<Utc>) {
        if self.resolved_at.is_none() {
            self.resolved_at = Some(at);
        }
    }
}

// ---

/// Reservoir as seen by the monitoring core: identity, display names and
/// the owning user, joined from `reservoir` and `farm`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reservoir {
    // ---
    pub id: i64,
    pub name: String,
    pub farm_id: i64,
    pub farm_name: String,
    pub owner_id: i64,
}
