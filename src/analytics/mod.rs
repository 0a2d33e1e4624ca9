//! Per-type analytics
//!
//! An [`AnalyticCollection`] is a record collection restricted to one record
//! type. The registry decides its [`AnalyticKind`], and that kind alone decides
//! how the records reduce to features:
//!
//! - **array**: time-weighted mean and variance of sampled values
//! - **categorical**: seconds spent in each category
//! - **sleep stage**: categorical over a fixed stage set, reported in hours
//! - **event**: mean event duration, or the event count
//! - **cumulative**: sum of values, with caffeine decay as a special case
//! - **summary kinds**: as their base kind, but forward-filled across dates
//!
//! Every kind-specific call goes through the dispatch in this module.

mod array;
mod categorical;
mod cumulative;
mod event;
pub mod sleep;
mod summary;

pub use array::ArrayStatistics;
pub use cumulative::CAFFEINE_HALF_LIFE_HOURS;
pub use sleep::{SleepEpisode, SleepStage};

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;

use crate::collection::RecordCollection;
use crate::error::{HealthError, Result};
use crate::registry::{AnalyticKind, RecordTypeDescriptor, TypeRegistry};

/// Named scalar metrics; `None` marks a metric that is undefined for the data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSummary(BTreeMap<String, Option<f64>>);

impl FeatureSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Option<f64>) {
        self.0.insert(name.into(), value);
    }

    /// Value of a metric, `None` when missing or undefined
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied().flatten()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Metrics with a defined value
    pub fn defined(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().filter_map(|(k, v)| v.map(|v| (k.as_str(), v)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Records of a single type, with the analytics of that type's kind
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticCollection {
    record_type: String,
    descriptor: RecordTypeDescriptor,
    records: RecordCollection,
    categories: Option<Vec<String>>,
    latest_date: Option<NaiveDate>,
}

impl AnalyticCollection {
    /// Build from records that all share one type; the type is taken from the first record.
    pub fn new(records: RecordCollection, registry: &TypeRegistry) -> Result<Self> {
        let record_type = records
            .get(0)
            .map(|r| r.record_type.clone())
            .ok_or_else(|| {
                HealthError::UnsupportedOperation(
                    "cannot infer the type of an empty collection".to_string(),
                )
            })?;
        Self::with_type(record_type, records, registry)
    }

    /// Build for an explicit type. Fails if any record has another type.
    pub fn with_type(
        record_type: impl Into<String>,
        records: RecordCollection,
        registry: &TypeRegistry,
    ) -> Result<Self> {
        let record_type = record_type.into();
        if let Some(other) = records.iter().find(|r| r.record_type != record_type) {
            return Err(HealthError::MixedTypes {
                expected: record_type,
                found: other.record_type.clone(),
            });
        }
        let descriptor = registry.lookup(&record_type);
        Ok(Self {
            record_type,
            descriptor,
            records,
            categories: None,
            latest_date: None,
        })
    }

    /// Fix the categorical label set instead of inferring it from the values
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = Some(categories);
        self
    }

    /// Last date that forward-filled date splits extend to
    pub fn with_latest_date(mut self, latest_date: NaiveDate) -> Self {
        self.latest_date = Some(latest_date);
        self
    }

    pub fn kind(&self) -> AnalyticKind {
        self.descriptor.kind
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn display_name(&self) -> &str {
        &self.descriptor.display_name
    }

    pub fn descriptor(&self) -> &RecordTypeDescriptor {
        &self.descriptor
    }

    pub fn records(&self) -> &RecordCollection {
        &self.records
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.latest_date
    }

    /// The unit shared by all records.
    ///
    /// Records that disagree on the unit are malformed data.
    pub fn unit(&self) -> Result<Option<String>> {
        let mut units = self.records.iter().map(|r| r.unit.as_deref());
        let Some(first) = units.next() else {
            return Ok(None);
        };
        if let Some(other) = units.find(|u| *u != first) {
            return Err(HealthError::MalformedData(format!(
                "{} records disagree on unit: {:?} vs {:?}",
                self.record_type, first, other
            )));
        }
        Ok(first.map(str::to_string))
    }

    /// A new collection of the same type and settings holding `records`
    pub(crate) fn with_records(&self, records: RecordCollection) -> Self {
        Self {
            record_type: self.record_type.clone(),
            descriptor: self.descriptor.clone(),
            records,
            categories: self.categories.clone(),
            latest_date: self.latest_date,
        }
    }

    /// Ordered feature vector for this kind
    pub fn features(&self) -> Result<Vec<Option<f64>>> {
        match self.kind() {
            AnalyticKind::Array | AnalyticKind::SummaryArray => {
                Ok(array::statistics(self)?.features())
            }
            AnalyticKind::Categorical | AnalyticKind::SummaryCategorical => {
                Ok(categorical::durations(self)
                    .into_iter()
                    .map(|(_, secs)| Some(secs))
                    .collect())
            }
            AnalyticKind::SleepStage => Ok(sleep::stage_durations(self)
                .into_values()
                .map(Some)
                .collect()),
            AnalyticKind::Event => Ok(vec![Some(event::feature(self))]),
            AnalyticKind::Cumulative
            | AnalyticKind::SummaryCumulative
            | AnalyticKind::CaffeineIntake => Ok(vec![Some(cumulative::total(self)?)]),
            AnalyticKind::Invalid => Err(self.invalid_error()),
        }
    }

    /// Named metrics for this kind
    pub fn feature_summary(&self) -> Result<FeatureSummary> {
        match self.kind() {
            AnalyticKind::Array | AnalyticKind::SummaryArray => {
                Ok(array::statistics(self)?.summary())
            }
            AnalyticKind::Categorical | AnalyticKind::SummaryCategorical => {
                Ok(categorical::summary(self))
            }
            AnalyticKind::SleepStage => Ok(sleep::summary(self)),
            AnalyticKind::Event => Ok(event::summary(self)),
            AnalyticKind::Cumulative | AnalyticKind::SummaryCumulative => cumulative::summary(self),
            AnalyticKind::CaffeineIntake => cumulative::caffeine_summary(self),
            AnalyticKind::Invalid => Err(self.invalid_error()),
        }
    }

    /// Time-weighted statistics; array kinds only
    pub fn statistics(&self) -> Result<ArrayStatistics> {
        match self.kind() {
            AnalyticKind::Array | AnalyticKind::SummaryArray => array::statistics(self),
            kind => Err(self.unsupported("statistics", kind)),
        }
    }

    /// Seconds per category; categorical and sleep stage kinds only
    pub fn category_durations(&self) -> Result<BTreeMap<String, f64>> {
        match self.kind() {
            AnalyticKind::Categorical | AnalyticKind::SummaryCategorical => {
                Ok(categorical::durations(self).into_iter().collect())
            }
            AnalyticKind::SleepStage => Ok(sleep::stage_durations(self)
                .into_iter()
                .map(|(stage, secs)| (stage.as_str().to_string(), secs))
                .collect()),
            kind => Err(self.unsupported("category durations", kind)),
        }
    }

    /// Decayed intake level at `reference`; caffeine intake only
    pub fn level_at(&self, reference: DateTime<FixedOffset>) -> Result<f64> {
        match self.kind() {
            AnalyticKind::CaffeineIntake => cumulative::level_at(self, reference),
            kind => Err(self.unsupported("decayed level", kind)),
        }
    }

    /// Merge sleep stage intervals into episodes; sleep stage kind only
    pub fn sleep_episodes(&self) -> Result<Vec<SleepEpisode>> {
        match self.kind() {
            AnalyticKind::SleepStage => Ok(sleep::segment(self)),
            kind => Err(self.unsupported("sleep segmentation", kind)),
        }
    }

    /// Split by start date. Summary kinds forward-fill days without records.
    pub fn split_by_date(&self) -> BTreeMap<NaiveDate, AnalyticCollection> {
        let groups = self.records.split_by_date();
        let groups = if self.kind().is_summary() {
            summary::forward_fill(groups, self.latest_date)
        } else {
            groups
        };
        groups
            .into_iter()
            .map(|(date, records)| (date, self.with_records(records)))
            .collect()
    }

    fn invalid_error(&self) -> HealthError {
        HealthError::UnsupportedOperation(format!(
            "no aggregation semantics for record type {}",
            self.record_type
        ))
    }

    fn unsupported(&self, operation: &str, kind: AnalyticKind) -> HealthError {
        HealthError::UnsupportedOperation(format!(
            "{} is not available for {} ({} collection)",
            operation, self.record_type, kind
        ))
    }
}

impl Deref for AnalyticCollection {
    type Target = RecordCollection;

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}
