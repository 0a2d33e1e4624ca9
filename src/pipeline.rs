//! Pipeline orchestration
//!
//! This module provides the public API for HKTK. It runs the full flow from a
//! heterogeneous record collection to per-type summaries, sleep episodes and
//! ranked predictors of a sleep metric:
//!
//! 1. Split records by type into analytic collections
//! 2. Merge sleep stage records into episodes
//! 3. Summarize each type over each episode's lookback window
//! 4. Score and rank every feature series against the target metric

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analytics::{AnalyticCollection, FeatureSummary, SleepEpisode};
use crate::cache::{ReportCache, SessionId};
use crate::collection::RecordCollection;
use crate::correlation::{CorrelationReport, CorrelationScorer, ScorerConfig};
use crate::error::Result;
use crate::registry::{AnalyticKind, TypeRegistry, SLEEP_ANALYSIS_TYPE};

/// One row of the record-type inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub record_type: String,
    pub display_name: String,
    pub kind: AnalyticKind,
    pub count: usize,
}

/// Per-type summaries keyed by raw type identifier
pub type TypeSummaries = BTreeMap<String, FeatureSummary>;

/// Stateless analysis entry point holding the type vocabulary and scorer settings.
pub struct SleepAnalysis {
    registry: TypeRegistry,
    config: ScorerConfig,
    latest_date: Option<NaiveDate>,
}

impl Default for SleepAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

impl SleepAnalysis {
    /// Create an analysis with the built-in vocabulary and default settings
    pub fn new() -> Self {
        Self::with_config(ScorerConfig::default())
    }

    pub fn with_config(config: ScorerConfig) -> Self {
        Self {
            registry: TypeRegistry::new(),
            config,
            latest_date: None,
        }
    }

    /// Replace the type vocabulary
    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Last date forward-filled summary kinds extend to in date splits
    pub fn with_latest_date(mut self, latest_date: NaiveDate) -> Self {
        self.latest_date = Some(latest_date);
        self
    }

    /// Load scorer configuration from JSON
    pub fn load_config(&mut self, json: &str) -> Result<()> {
        self.config = ScorerConfig::from_json(json)?;
        Ok(())
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Count, display name and kind of every type present, sorted by identifier
    pub fn inventory(&self, records: &RecordCollection) -> Vec<TypeInfo> {
        records
            .type_counts()
            .into_iter()
            .map(|(record_type, count)| {
                let descriptor = self.registry.lookup(&record_type);
                TypeInfo {
                    record_type,
                    display_name: descriptor.display_name,
                    kind: descriptor.kind,
                    count,
                }
            })
            .collect()
    }

    /// Sleep episodes found in the sleep analysis records; empty without any
    pub fn episodes(&self, records: &RecordCollection) -> Result<Vec<SleepEpisode>> {
        let sleep = records.filter(|r| r.record_type == SLEEP_ANALYSIS_TYPE);
        if sleep.is_empty() {
            log::info!("no sleep analysis records found");
            return Ok(Vec::new());
        }
        AnalyticCollection::with_type(SLEEP_ANALYSIS_TYPE, sleep, &self.registry)?.sleep_episodes()
    }

    /// Feature summary of every supported type over the whole collection.
    ///
    /// Types whose data cannot be summarized are logged and left out.
    pub fn type_summaries(&self, records: &RecordCollection) -> Result<TypeSummaries> {
        let mut summaries = BTreeMap::new();
        for (record_type, collection) in records.split_by_type(&self.registry)? {
            if let Some(summary) = summarize(&record_type, &collection) {
                summaries.insert(record_type, summary);
            }
        }
        Ok(summaries)
    }

    /// Feature summaries per calendar date, then per type.
    ///
    /// Summary kinds are forward-filled through the latest date when one is set.
    pub fn daily_summaries(
        &self,
        records: &RecordCollection,
    ) -> Result<BTreeMap<NaiveDate, TypeSummaries>> {
        let mut days: BTreeMap<NaiveDate, TypeSummaries> = BTreeMap::new();
        for (record_type, collection) in records.split_by_type(&self.registry)? {
            let collection = match self.latest_date {
                Some(date) => collection.with_latest_date(date),
                None => collection,
            };
            for (date, day) in collection.split_by_date() {
                if let Some(summary) = summarize(&record_type, &day) {
                    days.entry(date)
                        .or_default()
                        .insert(record_type.clone(), summary);
                }
            }
        }
        Ok(days)
    }

    /// Rank every feature as a predictor of the sleep metric `target`
    pub fn correlate(&self, records: &RecordCollection, target: &str) -> Result<CorrelationReport> {
        let episodes = self.episodes(records)?;
        CorrelationScorer::with_config(&self.registry, self.config.clone())
            .score(records, &episodes, target)
    }

    /// As [`correlate`](Self::correlate), reusing the session's cached report
    pub fn correlate_cached<'c>(
        &self,
        cache: &'c mut ReportCache,
        session: SessionId,
        records: &RecordCollection,
        target: &str,
    ) -> Result<&'c CorrelationReport> {
        cache.get_or_compute(session, target, || self.correlate(records, target))
    }
}

fn summarize(record_type: &str, collection: &AnalyticCollection) -> Option<FeatureSummary> {
    match collection.feature_summary() {
        Ok(summary) => Some(summary),
        Err(e) => {
            log::warn!("skipping summary of {}: {}", record_type, e);
            None
        }
    }
}
