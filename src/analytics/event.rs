//! Discrete events

use super::{AnalyticCollection, FeatureSummary};

fn mean_duration(collection: &AnalyticCollection) -> Option<f64> {
    if collection.is_empty() {
        return None;
    }
    let total: f64 = collection.iter().map(|r| r.interval_seconds()).sum();
    Some(total / collection.len() as f64)
}

/// Mean duration in seconds, or the event count when every event is instantaneous
pub(super) fn feature(collection: &AnalyticCollection) -> f64 {
    let has_duration = collection.iter().any(|r| r.interval_seconds() > 0.0);
    match mean_duration(collection) {
        Some(mean) if has_duration => mean,
        _ => collection.len() as f64,
    }
}

pub(super) fn summary(collection: &AnalyticCollection) -> FeatureSummary {
    let mut summary = FeatureSummary::new();
    summary.insert("mean_duration", mean_duration(collection));
    summary.insert("count", Some(collection.len() as f64));
    summary
}
