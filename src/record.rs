//! Health records
//!
//! A [`Record`] is one timestamped observation or event taken from a health
//! export. Records are plain values: collections clone them freely and never
//! mutate them after construction.

use chrono::{DateTime, FixedOffset, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{HealthError, Result};

/// Timestamp layout used by health exports, e.g. `2024-01-15 22:30:00 -0500`
pub const EXPORT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Which of a record's instants to use when ordering or bucketing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    Start,
    End,
    Creation,
}

/// A single health observation or event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Raw type identifier, e.g. `HKQuantityTypeIdentifierHeartRate`
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(with = "export_datetime")]
    pub creation_date: DateTime<FixedOffset>,
    #[serde(with = "export_datetime")]
    pub start_date: DateTime<FixedOffset>,
    #[serde(with = "export_datetime")]
    pub end_date: DateTime<FixedOffset>,
    /// Raw value; its meaning depends on the record type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub source_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Opaque side-channel entries carried through untouched
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Record {
    /// Create a record with the required fields; optional fields start empty.
    pub fn new(
        record_type: impl Into<String>,
        start_date: DateTime<FixedOffset>,
        end_date: DateTime<FixedOffset>,
        value: Option<String>,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            creation_date: end_date,
            start_date,
            end_date,
            value,
            source_name: String::new(),
            source_version: String::new(),
            unit: None,
            device: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_source(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.source_name = name.into();
        self.source_version = version.into();
        self
    }

    /// Elapsed time between start and end (may be zero)
    pub fn interval(&self) -> TimeDelta {
        self.end_date - self.start_date
    }

    /// Interval length in seconds, with sub-second precision
    pub fn interval_seconds(&self) -> f64 {
        seconds(self.interval())
    }

    pub fn date(&self, field: DateField) -> DateTime<FixedOffset> {
        match field {
            DateField::Start => self.start_date,
            DateField::End => self.end_date,
            DateField::Creation => self.creation_date,
        }
    }

    /// Parse the value as a number.
    ///
    /// Returns `Ok(None)` for records without a value and a
    /// [`HealthError::MalformedData`] when the value is not a finite number.
    pub fn numeric_value(&self) -> Result<Option<f64>> {
        let Some(raw) = self.value.as_deref() else {
            return Ok(None);
        };
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Some(value)),
            _ => Err(HealthError::MalformedData(format!(
                "{} value {:?} is not a finite number",
                self.record_type, raw
            ))),
        }
    }
}

/// Convert a duration to fractional seconds
pub fn seconds(delta: TimeDelta) -> f64 {
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_seconds() as f64,
    }
}

/// Parse an instant in either export form or RFC 3339
pub fn parse_datetime(raw: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_str(raw, EXPORT_DATETIME_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map_err(|e| HealthError::DateParseError(format!("{raw:?}: {e}")))
}

/// Serde adapter for export timestamps
pub mod export_datetime {
    use super::{parse_datetime, EXPORT_DATETIME_FORMAT};
    use chrono::{DateTime, FixedOffset};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(EXPORT_DATETIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_datetime(&raw).map_err(de::Error::custom)
    }
}
