//! Additive quantities and caffeine decay

use chrono::{DateTime, FixedOffset};

use super::{AnalyticCollection, FeatureSummary};
use crate::error::Result;
use crate::record::seconds;

/// Caffeine elimination half-life in hours
pub const CAFFEINE_HALF_LIFE_HOURS: f64 = 4.0;

/// Sum of all values
pub(super) fn total(collection: &AnalyticCollection) -> Result<f64> {
    let mut sum = 0.0;
    for record in collection.iter() {
        sum += record.numeric_value()?.unwrap_or(0.0);
    }
    Ok(sum)
}

/// Total keyed by unit (`total` when the records carry none)
pub(super) fn summary(collection: &AnalyticCollection) -> Result<FeatureSummary> {
    let key = collection.unit()?.unwrap_or_else(|| "total".to_string());
    let mut summary = FeatureSummary::new();
    summary.insert(key, Some(total(collection)?));
    Ok(summary)
}

/// Intake remaining at `reference`; each intake halves every half-life.
///
/// Intake that starts after `reference` does not count.
pub(super) fn level_at(
    collection: &AnalyticCollection,
    reference: DateTime<FixedOffset>,
) -> Result<f64> {
    let mut level = 0.0;
    for record in collection.iter().filter(|r| r.start_date <= reference) {
        let Some(amount) = record.numeric_value()? else {
            continue;
        };
        let hours = seconds(reference - record.start_date) / 3600.0;
        level += amount * 2_f64.powf(-hours / CAFFEINE_HALF_LIFE_HOURS);
    }
    Ok(level)
}

/// Midnight that ends the day of the latest record
fn following_midnight(collection: &AnalyticCollection) -> Option<DateTime<FixedOffset>> {
    let (_, end) = collection.datetime_range()?;
    end.date_naive()
        .succ_opt()?
        .and_hms_opt(0, 0, 0)?
        .and_local_timezone(*end.offset())
        .single()
}

pub(super) fn caffeine_summary(collection: &AnalyticCollection) -> Result<FeatureSummary> {
    let unit = collection.unit()?;
    let mut decayed = summary(collection)?;

    let level = match following_midnight(collection) {
        Some(midnight) => Some(level_at(collection, midnight)?),
        None => None,
    };
    let key = match unit {
        Some(unit) => format!("{unit}_at_midnight"),
        None => "level_at_midnight".to_string(),
    };
    decayed.insert(key, level);
    Ok(decayed)
}
