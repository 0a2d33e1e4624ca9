//! Sleep stages and episode segmentation
//!
//! Sleep analysis records are labelled intervals. Merging the intervals that
//! touch end-to-start yields sleep episodes, one per night in the usual case.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use super::{AnalyticCollection, FeatureSummary};
use crate::collection::RecordCollection;
use crate::record::{seconds, Record};

/// Prefix of sleep stage values in health exports
const EXPORT_VALUE_PREFIX: &str = "HKCategoryValueSleepAnalysis";

/// Sleep stage classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SleepStage {
    InBed,
    Awake,
    #[serde(rename = "REM")]
    Rem,
    Core,
    Deep,
}

impl SleepStage {
    pub const ALL: [SleepStage; 5] = [
        SleepStage::InBed,
        SleepStage::Awake,
        SleepStage::Rem,
        SleepStage::Core,
        SleepStage::Deep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SleepStage::InBed => "InBed",
            SleepStage::Awake => "Awake",
            SleepStage::Rem => "REM",
            SleepStage::Core => "Core",
            SleepStage::Deep => "Deep",
        }
    }

    /// Parse a short label (`Core`) or an export value (`HKCategoryValueSleepAnalysisAsleepCore`)
    pub fn from_value(raw: &str) -> Option<Self> {
        let label = raw.strip_prefix(EXPORT_VALUE_PREFIX).unwrap_or(raw);
        let label = label.strip_prefix("Asleep").unwrap_or(label);
        match label {
            "InBed" => Some(SleepStage::InBed),
            "Awake" => Some(SleepStage::Awake),
            "REM" => Some(SleepStage::Rem),
            "Core" => Some(SleepStage::Core),
            "Deep" => Some(SleepStage::Deep),
            _ => None,
        }
    }

    fn of(record: &Record) -> Option<Self> {
        record.value.as_deref().and_then(Self::from_value)
    }
}

/// Seconds per stage; every stage is present
pub(super) fn stage_durations(collection: &AnalyticCollection) -> BTreeMap<SleepStage, f64> {
    let mut totals: BTreeMap<SleepStage, f64> =
        SleepStage::ALL.iter().map(|s| (*s, 0.0)).collect();
    for record in collection.iter() {
        if let Some(stage) = SleepStage::of(record) {
            *totals.entry(stage).or_insert(0.0) += record.interval_seconds();
        }
    }
    totals
}

/// Keys produced by the sleep stage summary
pub fn summary_keys() -> Vec<String> {
    let mut keys: Vec<String> = SleepStage::ALL
        .iter()
        .flat_map(|s| [format!("{}_hours", s.as_str()), format!("{}_percent", s.as_str())])
        .collect();
    keys.push("total_hours".to_string());
    keys
}

/// Hours and share of the episode span per stage, plus the total span in hours
pub(super) fn summary(collection: &AnalyticCollection) -> FeatureSummary {
    let total = collection
        .datetime_range()
        .map(|(start, end)| seconds(end - start))
        .unwrap_or(0.0);

    let mut summary = FeatureSummary::new();
    for (stage, secs) in stage_durations(collection) {
        let percent = if total > 0.0 { secs / total * 100.0 } else { 0.0 };
        summary.insert(format!("{}_hours", stage.as_str()), Some(secs / 3600.0));
        summary.insert(format!("{}_percent", stage.as_str()), Some(percent));
    }
    summary.insert("total_hours", Some(total / 3600.0));
    summary
}

/// One contiguous block of sleep
#[derive(Debug, Clone, PartialEq)]
pub struct SleepEpisode {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    stages: AnalyticCollection,
}

impl SleepEpisode {
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Calendar date the episode starts on
    pub fn date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Stage records in episode order
    pub fn stages(&self) -> &AnalyticCollection {
        &self.stages
    }

    pub fn stage_durations(&self) -> BTreeMap<SleepStage, f64> {
        stage_durations(&self.stages)
    }

    pub fn feature_summary(&self) -> FeatureSummary {
        summary(&self.stages)
    }
}

struct Block {
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    records: VecDeque<Record>,
}

/// Merge stage intervals into episodes.
///
/// In-bed records are context only and are skipped. Each record joins the
/// first open block it touches (ending where the block starts, or starting
/// where it ends); otherwise it opens a new block. A record touching two
/// blocks joins only the first, so those blocks stay separate.
pub(super) fn segment(collection: &AnalyticCollection) -> Vec<SleepEpisode> {
    let mut blocks: Vec<Block> = Vec::new();

    for record in collection.iter() {
        if SleepStage::of(record) == Some(SleepStage::InBed) {
            continue;
        }
        let (start, end) = (record.start_date, record.end_date);

        match blocks
            .iter_mut()
            .find(|b| end == b.start || start == b.end)
        {
            Some(block) if end == block.start => {
                block.records.push_front(record.clone());
                block.start = start;
            }
            Some(block) => {
                block.records.push_back(record.clone());
                block.end = end;
            }
            None => blocks.push(Block {
                start,
                end,
                records: VecDeque::from([record.clone()]),
            }),
        }
    }

    blocks.sort_by_key(|b| b.start);
    log::debug!(
        "merged {} sleep records into {} episodes",
        collection.len(),
        blocks.len()
    );

    blocks
        .into_iter()
        .map(|block| SleepEpisode {
            start: block.start,
            end: block.end,
            stages: collection.with_records(block.records.into_iter().collect()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::test_support::{at_hours, record};
    use crate::registry::{TypeRegistry, SLEEP_ANALYSIS_TYPE};
    use pretty_assertions::assert_eq;

    fn sleep(intervals: &[(f64, f64, &str)]) -> AnalyticCollection {
        let records = intervals
            .iter()
            .map(|(s, e, stage)| record(SLEEP_ANALYSIS_TYPE, *s, *e, Some(*stage)))
            .collect::<RecordCollection>();
        AnalyticCollection::with_type(SLEEP_ANALYSIS_TYPE, records, &TypeRegistry::new()).unwrap()
    }

    #[test]
    fn test_stage_parsing() {
        assert_eq!(SleepStage::from_value("REM"), Some(SleepStage::Rem));
        assert_eq!(
            SleepStage::from_value("HKCategoryValueSleepAnalysisAsleepDeep"),
            Some(SleepStage::Deep)
        );
        assert_eq!(
            SleepStage::from_value("HKCategoryValueSleepAnalysisInBed"),
            Some(SleepStage::InBed)
        );
        assert_eq!(
            SleepStage::from_value("HKCategoryValueSleepAnalysisAsleepUnspecified"),
            None
        );
    }

    #[test]
    fn test_two_episodes() {
        let collection = sleep(&[(0.0, 1.0, "Core"), (1.0, 2.0, "REM"), (5.0, 6.0, "Awake")]);
        let episodes = collection.sleep_episodes().unwrap();

        assert_eq!(episodes.len(), 2);

        assert_eq!(episodes[0].start, at_hours(0.0));
        assert_eq!(episodes[0].end, at_hours(2.0));
        let stages: Vec<_> = episodes[0]
            .stages()
            .iter()
            .map(|r| r.value.clone().unwrap())
            .collect();
        assert_eq!(stages, vec!["Core", "REM"]);

        assert_eq!(episodes[1].start, at_hours(5.0));
        assert_eq!(episodes[1].end, at_hours(6.0));
        assert_eq!(episodes[1].stages().len(), 1);
    }

    #[test]
    fn test_in_bed_records_are_skipped() {
        let collection = sleep(&[(0.0, 3.0, "InBed"), (0.5, 1.0, "Core"), (1.0, 2.0, "Deep")]);
        let episodes = collection.sleep_episodes().unwrap();

        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].start, at_hours(0.5));
        assert_eq!(episodes[0].stage_durations()[&SleepStage::InBed], 0.0);
    }

    #[test]
    fn test_record_prepends_to_block() {
        let collection = sleep(&[(1.0, 2.0, "Deep"), (0.0, 1.0, "Core")]);
        let episodes = collection.sleep_episodes().unwrap();

        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].start, at_hours(0.0));
        assert_eq!(episodes[0].stages()[0].value.as_deref(), Some("Core"));
    }

    #[test]
    fn test_first_matching_block_wins() {
        // the bridging record joins the first block only
        let collection = sleep(&[(0.0, 1.0, "Core"), (2.0, 3.0, "Core"), (1.0, 2.0, "REM")]);
        let episodes = collection.sleep_episodes().unwrap();

        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].end, at_hours(2.0));
        assert_eq!(episodes[1].start, at_hours(2.0));
    }

    #[test]
    fn test_episode_summary() {
        let collection = sleep(&[(0.0, 1.0, "Core"), (1.0, 1.5, "REM"), (1.5, 2.0, "Deep")]);
        let episode = &collection.sleep_episodes().unwrap()[0];
        let summary = episode.feature_summary();

        assert_eq!(summary.get("total_hours"), Some(2.0));
        assert_eq!(summary.get("Core_hours"), Some(1.0));
        assert_eq!(summary.get("Core_percent"), Some(50.0));
        assert_eq!(summary.get("REM_percent"), Some(25.0));
        assert_eq!(summary.get("Awake_hours"), Some(0.0));
        assert_eq!(summary.len(), summary_keys().len());
        assert_eq!(episode.duration(), TimeDelta::hours(2));
    }

    #[test]
    fn test_stage_features_order() {
        let collection = sleep(&[(0.0, 1.0, "Core"), (1.0, 1.5, "Awake")]);

        assert_eq!(
            collection.features().unwrap(),
            vec![Some(0.0), Some(1800.0), Some(0.0), Some(3600.0), Some(0.0)]
        );
    }
}
