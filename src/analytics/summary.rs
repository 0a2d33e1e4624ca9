//! Forward-filled date splits for sparsely sampled measurements
//!
//! Body mass and similar values are recorded every few days or weeks. Days
//! without a record carry the most recent earlier group forward.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::collection::RecordCollection;

/// Fill every day from the first group through `latest_date` (default: the last group).
///
/// Days after `latest_date` are dropped.
pub(super) fn forward_fill(
    groups: BTreeMap<NaiveDate, RecordCollection>,
    latest_date: Option<NaiveDate>,
) -> BTreeMap<NaiveDate, RecordCollection> {
    let (Some(first), Some(last_recorded)) = (
        groups.keys().next().copied(),
        groups.keys().next_back().copied(),
    ) else {
        return groups;
    };
    let last = latest_date.unwrap_or(last_recorded);

    let mut filled = BTreeMap::new();
    let mut carried: Option<&RecordCollection> = None;
    for date in first.iter_days().take_while(|d| *d <= last) {
        if let Some(records) = groups.get(&date) {
            carried = Some(records);
        }
        if let Some(records) = carried {
            filled.insert(date, records.clone());
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use crate::analytics::AnalyticCollection;
    use crate::collection::test_support::record;
    use crate::collection::RecordCollection;
    use crate::registry::{AnalyticKind, RecordTypeDescriptor, TypeRegistry};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    const BODY_MASS: &str = "HKQuantityTypeIdentifierBodyMass";
    const STEPS: &str = "HKQuantityTypeIdentifierStepCount";
    const WEEKLY_DISTANCE: &str = "WeeklyDistanceSummary";

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_forward_fill_to_latest_date() {
        // day 15 only, filled through day 18
        let records = RecordCollection::new(vec![record(BODY_MASS, 8.0, 8.0, Some("72.5"))]);
        let collection = AnalyticCollection::new(records, &TypeRegistry::new())
            .unwrap()
            .with_latest_date(day(18));
        assert!(collection.kind().is_summary());

        let by_date = collection.split_by_date();

        assert_eq!(
            by_date.keys().copied().collect::<Vec<_>>(),
            vec![day(15), day(16), day(17), day(18)]
        );
        for group in by_date.values() {
            assert_eq!(group.records(), collection.records());
            assert_eq!(group.latest_date(), Some(day(18)));
        }
    }

    #[test]
    fn test_summary_cumulative_fills_through_latest_date() {
        let registry = TypeRegistry::new().with_entries([(
            WEEKLY_DISTANCE,
            RecordTypeDescriptor::new("WeeklyDistance", AnalyticKind::SummaryCumulative),
        )]);
        let records = RecordCollection::new(vec![
            record(WEEKLY_DISTANCE, 8.0, 9.0, Some("12.5")),
            record(WEEKLY_DISTANCE, 9.0, 10.0, Some("2.5")),
        ]);
        let collection = AnalyticCollection::new(records, &registry)
            .unwrap()
            .with_latest_date(day(18));
        assert_eq!(collection.kind(), AnalyticKind::SummaryCumulative);

        let by_date = collection.split_by_date();
        assert_eq!(
            by_date.keys().copied().collect::<Vec<_>>(),
            vec![day(15), day(16), day(17), day(18)]
        );
        for group in by_date.values() {
            assert_eq!(group.features().unwrap(), vec![Some(15.0)]);
            assert_eq!(group.feature_summary().unwrap().get("total"), Some(15.0));
        }
    }

    #[test]
    fn test_gap_inherits_previous_group() {
        let records = RecordCollection::new(vec![
            record(BODY_MASS, 8.0, 8.0, Some("72.5")),
            record(BODY_MASS, 56.0, 56.0, Some("71.0")),
        ]);
        let collection = AnalyticCollection::new(records, &TypeRegistry::new()).unwrap();
        let by_date = collection.split_by_date();

        assert_eq!(by_date.len(), 3);
        assert_eq!(by_date[&day(16)][0].value.as_deref(), Some("72.5"));
        assert_eq!(by_date[&day(17)][0].value.as_deref(), Some("71.0"));

        let mean = by_date[&day(16)].statistics().unwrap().mean;
        assert_eq!(mean, Some(72.5));
    }

    #[test]
    fn test_regular_kinds_do_not_fill() {
        let records = RecordCollection::new(vec![
            record(STEPS, 8.0, 9.0, Some("100")),
            record(STEPS, 56.0, 57.0, Some("200")),
        ]);
        let collection = AnalyticCollection::new(records, &TypeRegistry::new())
            .unwrap()
            .with_latest_date(day(20));
        assert_eq!(collection.kind(), AnalyticKind::Cumulative);

        let by_date = collection.split_by_date();
        assert_eq!(by_date.keys().copied().collect::<Vec<_>>(), vec![day(15), day(17)]);
    }
}
