//! Duration per category label

use std::collections::{BTreeSet, HashMap};

use super::{AnalyticCollection, FeatureSummary};

/// Category labels in effect: the fixed set in declared order if one was given,
/// else the values present in sorted order
fn categories(collection: &AnalyticCollection) -> Vec<String> {
    match &collection.categories {
        Some(fixed) => {
            let mut seen = BTreeSet::new();
            fixed.iter().filter(|c| seen.insert(c.as_str())).cloned().collect()
        }
        None => collection
            .iter()
            .filter_map(|r| r.value.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    }
}

/// Seconds spent in each category, in category order; absent categories count zero
pub(super) fn durations(collection: &AnalyticCollection) -> Vec<(String, f64)> {
    let mut totals: Vec<(String, f64)> = categories(collection)
        .into_iter()
        .map(|c| (c, 0.0))
        .collect();
    let index: HashMap<String, usize> = totals
        .iter()
        .enumerate()
        .map(|(i, (label, _))| (label.clone(), i))
        .collect();

    for record in collection.iter() {
        let Some(label) = record.value.as_deref() else {
            continue;
        };
        if let Some(&i) = index.get(label) {
            totals[i].1 += record.interval_seconds();
        }
    }
    totals
}

pub(super) fn summary(collection: &AnalyticCollection) -> FeatureSummary {
    let mut summary = FeatureSummary::new();
    for (label, secs) in durations(collection) {
        summary.insert(label, Some(secs));
    }
    summary
}
