//! Time-weighted statistics for sampled measurements

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::{AnalyticCollection, FeatureSummary};
use crate::error::Result;
use crate::record::seconds;
use crate::stats;

/// Statistics of a sampled measurement
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayStatistics {
    /// Number of samples with a value
    pub count: usize,
    pub mean: Option<f64>,
    pub variance: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ArrayStatistics {
    pub fn features(&self) -> Vec<Option<f64>> {
        vec![self.mean, self.variance, self.min, self.max]
    }

    pub fn summary(&self) -> FeatureSummary {
        let mut summary = FeatureSummary::new();
        summary.insert("mean", self.mean);
        summary.insert("variance", self.variance);
        summary.insert("min", self.min);
        summary.insert("max", self.max);
        summary
    }
}

pub(super) fn statistics(collection: &AnalyticCollection) -> Result<ArrayStatistics> {
    let mut samples: Vec<(DateTime<FixedOffset>, f64)> = Vec::with_capacity(collection.len());
    for record in collection.iter() {
        if let Some(value) = record.numeric_value()? {
            samples.push((record.start_date, value));
        }
    }
    samples.sort_by_key(|(time, _)| *time);

    let count = samples.len();
    if count == 0 {
        return Ok(ArrayStatistics::default());
    }

    let values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();
    let min = values.iter().copied().reduce(f64::min);
    let max = values.iter().copied().reduce(f64::max);

    if count == 1 {
        return Ok(ArrayStatistics {
            count,
            mean: Some(values[0]),
            variance: None,
            min,
            max,
        });
    }

    let points = merge_simultaneous(&samples);
    let (mean, variance) = if points.len() < 2 {
        // no elapsed time to weight by
        (stats::mean(&values), stats::population_variance(&values))
    } else {
        trapezoid_moments(&points)
    };

    Ok(ArrayStatistics {
        count,
        mean: Some(mean),
        variance: Some(variance),
        min,
        max,
    })
}

/// Average samples sharing a timestamp; returns (seconds since first, value)
fn merge_simultaneous(samples: &[(DateTime<FixedOffset>, f64)]) -> Vec<(f64, f64)> {
    let origin = samples[0].0;
    let mut points: Vec<(f64, f64)> = Vec::new();
    let mut i = 0;
    while i < samples.len() {
        let time = samples[i].0;
        let mut j = i;
        let mut sum = 0.0;
        while j < samples.len() && samples[j].0 == time {
            sum += samples[j].1;
            j += 1;
        }
        points.push((seconds(time - origin), sum / (j - i) as f64));
        i = j;
    }
    points
}

/// Mean and variance of a piecewise-linear signal, by trapezoidal integration
fn trapezoid_moments(points: &[(f64, f64)]) -> (f64, f64) {
    let elapsed = points[points.len() - 1].0 - points[0].0;

    let integral: f64 = points
        .windows(2)
        .map(|w| (w[0].1 + w[1].1) / 2.0 * (w[1].0 - w[0].0))
        .sum();
    let mean = integral / elapsed;

    let spread: f64 = points
        .windows(2)
        .map(|w| {
            let a = (w[0].1 - mean).powi(2);
            let b = (w[1].1 - mean).powi(2);
            (a + b) / 2.0 * (w[1].0 - w[0].0)
        })
        .sum();

    (mean, spread / elapsed)
}
