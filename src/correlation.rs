//! Predictor ranking for sleep metrics
//!
//! For every sleep episode the scorer looks back over an adaptive window of
//! records that started before the episode, summarizes each record type in that
//! window, and collects one series per summary metric. Each series is then
//! scored by how well it predicts the chosen sleep metric across episodes.
//!
//! ## Scoring
//!
//! Both variables are standardized, outliers beyond the threshold in the
//! predictor are dropped, and `target ≈ a + b · predictor` is fitted. The score
//! combines the explained variance with the angle of the fitted line:
//!
//! ```text
//! score = (1/√2) · √(R² + (2·atan(b)/π)²)
//! ```

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

use crate::analytics::sleep::summary_keys;
use crate::analytics::SleepEpisode;
use crate::collection::RecordCollection;
use crate::error::{HealthError, Result};
use crate::record::{seconds, Record};
use crate::registry::TypeRegistry;
use crate::stats::{self, LinearFit};

/// Longest lookback window a configuration may ask for (one leap year)
pub const MAX_WINDOW_HOURS: f64 = 8784.0;

/// Tunable scorer parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Lookback for the first episode (hours)
    pub first_window_hours: f64,
    /// Upper bound on the lookback for later episodes (hours)
    pub max_window_hours: f64,
    /// Series with fewer points are not scored
    pub min_points: usize,
    /// Standardized predictor values at or beyond this magnitude are dropped
    pub outlier_threshold: f64,
    /// Fewer distinct predictor values than this score zero
    pub min_distinct_values: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            first_window_hours: 18.0,
            max_window_hours: 24.0,
            min_points: 7,
            outlier_threshold: 3.0,
            min_distinct_values: 3,
        }
    }
}

impl ScorerConfig {
    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every window and threshold is usable
    pub fn validate(&self) -> Result<()> {
        for (name, hours) in [
            ("first_window_hours", self.first_window_hours),
            ("max_window_hours", self.max_window_hours),
        ] {
            if !(0.0..=MAX_WINDOW_HOURS).contains(&hours) {
                return Err(HealthError::InvalidConfig(format!(
                    "{} must be between 0 and {}, got {}",
                    name, MAX_WINDOW_HOURS, hours
                )));
            }
        }
        if !(self.outlier_threshold.is_finite() && self.outlier_threshold > 0.0) {
            return Err(HealthError::InvalidConfig(format!(
                "outlier_threshold must be positive, got {}",
                self.outlier_threshold
            )));
        }
        if self.min_points < 2 {
            return Err(HealthError::InvalidConfig(format!(
                "min_points must be at least 2, got {}",
                self.min_points
            )));
        }
        if self.min_distinct_values == 0 {
            return Err(HealthError::InvalidConfig(
                "min_distinct_values must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One ranked feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub field: String,
    pub score: f64,
}

/// Raw series behind the ranking
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSeries {
    /// Target metric per episode, in episode order
    pub x: Vec<f64>,
    /// Per feature: `(episode index, value)` pairs
    pub y: BTreeMap<String, Vec<(usize, f64)>>,
    /// Episode start dates (ISO 8601)
    pub dates: Vec<String>,
}

/// Raw-value fit of one feature, for plotting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFit {
    /// `(feature value, target value)` pairs kept after pruning
    pub points: Vec<(f64, f64)>,
    /// `target ≈ intercept + slope · feature`; `None` if the fit is undefined
    pub fit: Option<LinearFit>,
}

/// Ranked predictors of a sleep metric
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub table: Vec<ScoreEntry>,
    pub series: ReportSeries,
}

impl CorrelationReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn score_of(&self, field: &str) -> Option<f64> {
        self.table.iter().find(|e| e.field == field).map(|e| e.score)
    }

    /// Refit one feature on raw values.
    ///
    /// Points whose feature value lies more than three standard deviations
    /// from its mean are pruned first.
    pub fn feature_fit(&self, field: &str) -> Option<FeatureFit> {
        let series = self.series.y.get(field)?;
        let pairs: Vec<(f64, f64)> = series
            .iter()
            .filter_map(|(i, y)| self.series.x.get(*i).map(|x| (*y, *x)))
            .collect();

        let ys: Vec<f64> = pairs.iter().map(|(y, _)| *y).collect();
        let mean = stats::mean(&ys);
        let std = stats::std_dev(&ys);
        let points: Vec<(f64, f64)> = pairs
            .into_iter()
            .filter(|(y, _)| std == 0.0 || (y - mean).abs() <= 3.0 * std)
            .collect();

        let (feature, target): (Vec<f64>, Vec<f64>) = points.iter().copied().unzip();
        let fit = LinearFit::fit(&feature, &target);
        Some(FeatureFit { points, fit })
    }
}

/// Composite score of a fitted line
pub fn composite_score(r_squared: f64, slope: f64) -> f64 {
    let angle = 2.0 * slope.atan() / PI;
    FRAC_1_SQRT_2 * (r_squared + angle * angle).sqrt()
}

/// Ranks record-type features against a sleep metric
pub struct CorrelationScorer<'a> {
    registry: &'a TypeRegistry,
    config: ScorerConfig,
}

impl<'a> CorrelationScorer<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self::with_config(registry, ScorerConfig::default())
    }

    pub fn with_config(registry: &'a TypeRegistry, config: ScorerConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Build the ranking of every feature against `target`.
    ///
    /// `target` must be a sleep summary metric such as `total_hours` or
    /// `Deep_percent`. Episodes are processed in chronological order.
    pub fn score(
        &self,
        records: &RecordCollection,
        episodes: &[SleepEpisode],
        target: &str,
    ) -> Result<CorrelationReport> {
        self.config.validate()?;
        if !summary_keys().iter().any(|k| k == target) {
            return Err(HealthError::UnknownFeature(target.to_string()));
        }

        let mut episodes: Vec<&SleepEpisode> = episodes.iter().collect();
        episodes.sort_by_key(|e| e.start);

        let series = self.collect_series(records, &episodes, target)?;
        let table = self.rank(&series);

        log::info!(
            "ranked {} of {} features against {} over {} episodes",
            table.len(),
            series.y.len(),
            target,
            episodes.len()
        );
        Ok(CorrelationReport { table, series })
    }

    fn lookback(&self, episodes: &[&SleepEpisode], i: usize) -> Duration {
        let hours = if i == 0 {
            self.config.first_window_hours
        } else {
            let gap = seconds(episodes[i].start - episodes[i - 1].end) / 3600.0;
            gap.clamp(0.0, self.config.max_window_hours)
        };
        Duration::milliseconds((hours * 3_600_000.0) as i64)
    }

    fn collect_series(
        &self,
        records: &RecordCollection,
        episodes: &[&SleepEpisode],
        target: &str,
    ) -> Result<ReportSeries> {
        // one sort, then each window is a contiguous slice
        let mut timeline: Vec<&Record> = records.iter().collect();
        timeline.sort_by_key(|r| r.start_date);
        let first_at_or_after = |instant: DateTime<FixedOffset>| {
            timeline.partition_point(|r| r.start_date < instant)
        };

        let mut series = ReportSeries::default();
        for (i, episode) in episodes.iter().enumerate() {
            let hi = first_at_or_after(episode.start);
            let lo = episode
                .start
                .checked_sub_signed(self.lookback(episodes, i))
                .map_or(0, |window_start| first_at_or_after(window_start))
                .min(hi);
            let window: RecordCollection = timeline[lo..hi].iter().map(|r| (*r).clone()).collect();

            log::debug!(
                "episode {} ({}): {} records in lookback window",
                i,
                episode.date(),
                window.len()
            );

            for (record_type, collection) in window.split_by_type(self.registry)? {
                let summary = match collection.feature_summary() {
                    Ok(summary) => summary,
                    Err(e) => {
                        log::warn!("skipping {} in episode {}: {}", record_type, i, e);
                        continue;
                    }
                };
                for (name, value) in summary.defined() {
                    series
                        .y
                        .entry(format!("{}_{}", collection.display_name(), name))
                        .or_default()
                        .push((i, value));
                }
            }

            let x = episode
                .feature_summary()
                .get(target)
                .ok_or_else(|| HealthError::UnknownFeature(target.to_string()))?;
            series.x.push(x);
            series.dates.push(episode.date().to_string());
        }
        Ok(series)
    }

    fn rank(&self, series: &ReportSeries) -> Vec<ScoreEntry> {
        let mut table: Vec<ScoreEntry> = series
            .y
            .iter()
            .filter_map(|(field, points)| {
                let score = self.score_series(&series.x, points);
                if score.is_none() {
                    log::debug!("no score for {}", field);
                }
                score.map(|score| ScoreEntry {
                    field: field.clone(),
                    score,
                })
            })
            .collect();

        table.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.field.cmp(&b.field))
        });
        table
    }

    /// Score one feature series; `None` when it cannot be scored
    pub fn score_series(&self, x: &[f64], points: &[(usize, f64)]) -> Option<f64> {
        if points.len() < self.config.min_points {
            return None;
        }

        let (targets, values): (Vec<f64>, Vec<f64>) = points
            .iter()
            .filter_map(|(i, y)| x.get(*i).map(|x| (*x, *y)))
            .unzip();
        let targets = stats::standardize(&targets);
        let values = stats::standardize(&values);

        let (targets, values): (Vec<f64>, Vec<f64>) = targets
            .into_iter()
            .zip(values)
            .filter(|(_, y)| y.abs() < self.config.outlier_threshold)
            .unzip();

        if stats::distinct_count(&values) < self.config.min_distinct_values {
            return Some(0.0);
        }

        let fit = LinearFit::fit(&values, &targets)?;
        Some(composite_score(fit.r_squared, fit.slope))
    }
}
