//! Numeric helpers shared by the analytics and the scorer

use serde::{Deserialize, Serialize};

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0_f64
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Variance with divisor `n`
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0_f64;
    }
    let mean = mean(values);
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    population_variance(values).sqrt()
}

/// Rescale to zero mean and unit variance.
///
/// A series without spread maps to all zeros.
pub fn standardize(values: &[f64]) -> Vec<f64> {
    let mean = mean(values);
    let std = std_dev(values);
    if !std.is_finite() || std == 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mean) / std).collect()
}

/// Number of distinct values, compared exactly
pub fn distinct_count(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

/// Ordinary least squares fit of `dependent ≈ intercept + slope · independent`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
    pub r_squared: f64,
}

impl LinearFit {
    /// Fit a line through `(independent, dependent)` pairs.
    ///
    /// Returns `None` when the fit is undefined: fewer than two points, no
    /// spread in either variable, or a non-finite result.
    pub fn fit(independent: &[f64], dependent: &[f64]) -> Option<Self> {
        let n = independent.len();
        if n < 2 || n != dependent.len() {
            return None;
        }

        let mean_x = mean(independent);
        let mean_y = mean(dependent);

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        let mut syy = 0.0;
        for (x, y) in independent.iter().zip(dependent) {
            let dx = x - mean_x;
            let dy = y - mean_y;
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }
        if sxx == 0.0 || syy == 0.0 {
            return None;
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;

        let residual: f64 = independent
            .iter()
            .zip(dependent)
            .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
            .sum();
        let r_squared = 1.0 - residual / syy;

        let fit = Self {
            intercept,
            slope,
            r_squared,
        };
        fit.is_finite().then_some(fit)
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    fn is_finite(&self) -> bool {
        self.intercept.is_finite() && self.slope.is_finite() && self.r_squared.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_variance() {
        assert_eq!(mean(&[]), 0.0);
        assert!((mean(&[1.0, 2.0, 3.0]) - 2.0).abs() < 1e-12);
        assert!((population_variance(&[1.0, 2.0, 3.0]) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_standardize() {
        let z = standardize(&[2.0, 4.0, 6.0]);
        assert!((mean(&z)).abs() < 1e-12);
        assert!((std_dev(&z) - 1.0).abs() < 1e-12);

        assert_eq!(standardize(&[5.0, 5.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_distinct_count() {
        assert_eq!(distinct_count(&[1.0, 1.0, 2.0, 3.0, 3.0]), 3);
        assert_eq!(distinct_count(&[]), 0);
    }

    #[test]
    fn test_perfect_fit() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [3.0, 5.0, 7.0, 9.0];
        let fit = LinearFit::fit(&x, &y).unwrap();

        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert!((fit.predict(5.0) - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_fit() {
        assert!(LinearFit::fit(&[1.0], &[2.0]).is_none());
        assert!(LinearFit::fit(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
        assert!(LinearFit::fit(&[1.0, 2.0, 3.0], &[4.0, 4.0, 4.0]).is_none());
    }
}
