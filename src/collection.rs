//! Record collections
//!
//! [`RecordCollection`] is an ordered, possibly heterogeneous list of records.
//! Insertion order is kept until a caller sorts explicitly. Filtering, grouping
//! and splitting all build new collections and leave the receiver untouched.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Index;

use crate::analytics::AnalyticCollection;
use crate::error::{HealthError, Result};
use crate::record::{DateField, Record};
use crate::registry::{AnalyticKind, TypeRegistry};

/// Ordered sequence of records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordCollection {
    records: Vec<Record>,
}

impl RecordCollection {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Records matching `predicate`, in their current order
    pub fn filter<F>(&self, predicate: F) -> RecordCollection
    where
        F: Fn(&Record) -> bool,
    {
        self.records
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    /// Group records by key; each group keeps the receiver's relative order
    pub fn group_by<K, F>(&self, key_fn: F) -> BTreeMap<K, RecordCollection>
    where
        K: Ord,
        F: Fn(&Record) -> K,
    {
        let mut groups: BTreeMap<K, RecordCollection> = BTreeMap::new();
        for record in &self.records {
            groups
                .entry(key_fn(record))
                .or_default()
                .push(record.clone());
        }
        groups
    }

    /// Split into one analytic collection per registered type.
    ///
    /// Types that resolve to [`AnalyticKind::Invalid`] are dropped here, and
    /// only here.
    pub fn split_by_type(
        &self,
        registry: &TypeRegistry,
    ) -> Result<BTreeMap<String, AnalyticCollection>> {
        let mut split = BTreeMap::new();
        for (record_type, records) in self.group_by(|r| r.record_type.clone()) {
            if registry.kind_of(&record_type) == AnalyticKind::Invalid {
                log::debug!(
                    "dropping {} records of unsupported type {}",
                    records.len(),
                    record_type
                );
                continue;
            }
            let collection = AnalyticCollection::with_type(record_type.clone(), records, registry)?;
            split.insert(record_type, collection);
        }
        Ok(split)
    }

    /// Group by the calendar date of each record's start, in its own offset
    pub fn split_by_date(&self) -> BTreeMap<NaiveDate, RecordCollection> {
        self.group_by(|r| r.start_date.date_naive())
    }

    /// Sort in place by the chosen instant; ties keep their relative order
    pub fn sort_by_date(&mut self, field: DateField) {
        self.records.sort_by_key(|r| r.date(field));
    }

    /// Sorted copy; the receiver keeps its order
    pub fn sorted_by_date(&self, field: DateField) -> RecordCollection {
        let mut sorted = self.clone();
        sorted.sort_by_date(field);
        sorted
    }

    /// `(min start, max end)` over all records, or `None` when empty
    pub fn datetime_range(&self) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        let start = self.records.iter().map(|r| r.start_date).min()?;
        let end = self.records.iter().map(|r| r.end_date).max()?;
        Some((start, end))
    }

    /// Records with `start >= from` and `end <= to`.
    ///
    /// A missing bound is taken from [`datetime_range`](Self::datetime_range).
    pub fn between(
        &self,
        from: Option<DateTime<FixedOffset>>,
        to: Option<DateTime<FixedOffset>>,
    ) -> RecordCollection {
        let Some((range_start, range_end)) = self.datetime_range() else {
            return RecordCollection::default();
        };
        let from = from.unwrap_or(range_start);
        let to = to.unwrap_or(range_end);
        self.filter(|r| r.start_date >= from && r.end_date <= to)
    }

    /// Records whose start falls in `[from, to)`
    pub fn starting_within(
        &self,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> RecordCollection {
        self.filter(|r| r.start_date >= from && r.start_date < to)
    }

    /// Distinct type identifiers present
    pub fn record_types(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.record_type.clone()).collect()
    }

    /// Number of records per type identifier
    pub fn type_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.record_type.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn is_single_type(&self) -> bool {
        match self.records.first() {
            Some(first) => self
                .records
                .iter()
                .all(|r| r.record_type == first.record_type),
            None => false,
        }
    }

    /// Mean spacing between consecutive samples, by start time.
    ///
    /// Only defined for single-type collections holding at least two records.
    pub fn average_sampling_period(&self) -> Result<TimeDelta> {
        if !self.is_single_type() {
            return Err(HealthError::UnsupportedOperation(
                "sampling period requires records of a single type".to_string(),
            ));
        }
        if self.records.len() < 2 {
            return Err(HealthError::UnsupportedOperation(
                "sampling period requires at least two records".to_string(),
            ));
        }

        let mut starts: Vec<_> = self.records.iter().map(|r| r.start_date).collect();
        starts.sort();
        let elapsed: TimeDelta = starts.windows(2).map(|w| w[1] - w[0]).sum();
        let intervals = i32::try_from(starts.len() - 1).map_err(|_| {
            HealthError::UnsupportedOperation(format!(
                "sampling period over {} records",
                starts.len()
            ))
        })?;
        Ok(elapsed / intervals)
    }
}

impl FromIterator<Record> for RecordCollection {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Record>> for RecordCollection {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl IntoIterator for RecordCollection {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordCollection {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl Index<usize> for RecordCollection {
    type Output = Record;

    fn index(&self, index: usize) -> &Self::Output {
        &self.records[index]
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use pretty_assertions::assert_eq;

    const HR: &str = "HKQuantityTypeIdentifierHeartRate";
    const STEPS: &str = "HKQuantityTypeIdentifierStepCount";
    const UNKNOWN: &str = "HKQuantityTypeIdentifierNotYetInvented";

    fn mixed() -> RecordCollection {
        RecordCollection::new(vec![
            record(HR, 2.0, 2.0, Some("60")),
            record(STEPS, 1.0, 1.5, Some("100")),
            record(HR, 0.5, 0.5, Some("70")),
            record(UNKNOWN, 3.0, 3.0, Some("1")),
        ])
    }

    #[test]
    fn test_filter_does_not_mutate() {
        let collection = mixed();
        let before = collection.clone();

        let heart = collection.filter(|r| r.record_type == HR);

        assert_eq!(heart.len(), 2);
        assert_eq!(heart[0].value.as_deref(), Some("60"));
        assert_eq!(collection, before);
    }

    #[test]
    fn test_group_by_does_not_mutate() {
        let collection = mixed();
        let before = collection.clone();

        let groups = collection.group_by(|r| r.record_type.clone());

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[HR].len(), 2);
        assert_eq!(collection, before);
    }

    #[test]
    fn test_split_by_type_drops_unknown_only_there() {
        let collection = mixed();
        let split = collection.split_by_type(&TypeRegistry::new()).unwrap();

        assert_eq!(split.len(), 2);
        assert!(split.contains_key(HR));
        assert!(!split.contains_key(UNKNOWN));

        let unknown = collection.filter(|r| r.record_type == UNKNOWN);
        assert_eq!(unknown.len(), 1);
        assert_eq!(collection[3].record_type, UNKNOWN);
    }

    #[test]
    fn test_split_by_date() {
        let collection = RecordCollection::new(vec![
            record(HR, 1.0, 1.0, Some("60")),
            record(HR, 25.0, 25.0, Some("61")),
            record(HR, 26.0, 26.0, Some("62")),
        ]);

        let by_date = collection.split_by_date();
        let dates: Vec<_> = by_date.keys().map(|d| d.to_string()).collect();

        assert_eq!(dates, vec!["2024-01-15", "2024-01-16"]);
        assert_eq!(by_date.values().last().unwrap().len(), 2);
    }

    #[test]
    fn test_sort_by_date() {
        let mut collection = mixed();
        let sorted = collection.sorted_by_date(DateField::Start);

        assert_eq!(sorted[0].value.as_deref(), Some("70"));
        assert_eq!(collection[0].value.as_deref(), Some("60"));

        collection.sort_by_date(DateField::End);
        assert_eq!(collection, sorted);
    }

    #[test]
    fn test_datetime_range() {
        assert_eq!(RecordCollection::default().datetime_range(), None);

        let (start, end) = mixed().datetime_range().unwrap();
        assert_eq!(start, at_hours(0.5));
        assert_eq!(end, at_hours(3.0));
    }

    #[test]
    fn test_between_with_open_bounds() {
        let collection = mixed();

        let tail = collection.between(Some(at_hours(1.0)), None);
        assert_eq!(tail.len(), 3);

        let head = collection.between(None, Some(at_hours(1.5)));
        assert_eq!(head.len(), 2);

        let window = collection.starting_within(at_hours(0.0), at_hours(2.0));
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_average_sampling_period() {
        let collection = RecordCollection::new(vec![
            record(HR, 0.0, 0.0, Some("60")),
            record(HR, 2.0, 2.0, Some("62")),
            record(HR, 1.0, 1.0, Some("61")),
        ]);

        let period = collection.average_sampling_period().unwrap();
        assert_eq!(period, TimeDelta::hours(1));
    }

    #[test]
    fn test_average_sampling_period_uneven_spacing() {
        // one minute apart, with a 1000 minute gap halfway
        let collection: RecordCollection = (0..1000)
            .map(|i| {
                let at = at_minutes(if i < 500 { i } else { i + 999 });
                Record::new(HR, at, at, Some("60".to_string()))
            })
            .collect();

        let period = collection.average_sampling_period().unwrap();
        assert_eq!(period, TimeDelta::minutes(2));
    }

    #[test]
    fn test_average_sampling_period_unsupported() {
        assert!(matches!(
            mixed().average_sampling_period(),
            Err(HealthError::UnsupportedOperation(_))
        ));

        let single = RecordCollection::new(vec![record(HR, 0.0, 0.0, Some("60"))]);
        assert!(matches!(
            single.average_sampling_period(),
            Err(HealthError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_type_inventory() {
        let collection = mixed();

        assert_eq!(collection.record_types().len(), 3);
        assert_eq!(collection.type_counts()[HR], 2);
        assert!(!collection.is_single_type());
    }
}
