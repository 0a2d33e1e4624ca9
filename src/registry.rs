//! Record type registry
//!
//! Maps raw record type identifiers to a display name and the [`AnalyticKind`]
//! that decides how records of that type reduce to features. The built-in
//! table can be extended with extra entries before the registry is shared.
//! Identifiers that are not listed resolve to [`AnalyticKind::Invalid`]
//! instead of failing, so exports containing newer types still load.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Aggregation behavior for a record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticKind {
    /// Sampled measurement (heart rate, speed); time-weighted statistics
    Array,
    /// Labelled intervals; duration per category
    Categorical,
    /// Sleep analysis intervals; categorical over a fixed stage set
    SleepStage,
    /// Discrete events; mean duration or count
    Event,
    /// Additive quantity (steps, energy); sum of values
    Cumulative,
    /// Cumulative intake with exponential decay
    CaffeineIntake,
    /// Sparse array measurement, forward-filled across dates
    SummaryArray,
    /// Sparse categorical measurement, forward-filled across dates
    SummaryCategorical,
    /// Sparse cumulative measurement, forward-filled across dates
    SummaryCumulative,
    /// No known aggregation semantics
    Invalid,
}

impl AnalyticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticKind::Array => "array",
            AnalyticKind::Categorical => "categorical",
            AnalyticKind::SleepStage => "sleep_stage",
            AnalyticKind::Event => "event",
            AnalyticKind::Cumulative => "cumulative",
            AnalyticKind::CaffeineIntake => "caffeine_intake",
            AnalyticKind::SummaryArray => "summary_array",
            AnalyticKind::SummaryCategorical => "summary_categorical",
            AnalyticKind::SummaryCumulative => "summary_cumulative",
            AnalyticKind::Invalid => "invalid",
        }
    }

    /// Whether date splits forward-fill missing days
    pub fn is_summary(&self) -> bool {
        matches!(
            self,
            AnalyticKind::SummaryArray
                | AnalyticKind::SummaryCategorical
                | AnalyticKind::SummaryCumulative
        )
    }
}

impl fmt::Display for AnalyticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic description of a record type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTypeDescriptor {
    pub display_name: String,
    pub kind: AnalyticKind,
}

impl RecordTypeDescriptor {
    pub fn new(display_name: impl Into<String>, kind: AnalyticKind) -> Self {
        Self {
            display_name: display_name.into(),
            kind,
        }
    }
}

use AnalyticKind::*;

/// Built-in vocabulary: (identifier, kind)
const BUILTIN_TYPES: &[(&str, AnalyticKind)] = &[
    ("HKQuantityTypeIdentifierActiveEnergyBurned", Cumulative),
    ("HKQuantityTypeIdentifierBasalEnergyBurned", Cumulative),
    ("HKQuantityTypeIdentifierDistanceCycling", Cumulative),
    ("HKQuantityTypeIdentifierDistanceWalkingRunning", Cumulative),
    ("HKQuantityTypeIdentifierStepCount", Cumulative),
    ("HKQuantityTypeIdentifierAppleExerciseTime", Cumulative),
    ("HKQuantityTypeIdentifierAppleStandTime", Cumulative),
    ("HKQuantityTypeIdentifierFlightsClimbed", Cumulative),
    ("HKQuantityTypeIdentifierDietaryCaffeine", CaffeineIntake),
    ("HKQuantityTypeIdentifierNumberOfAlcoholicBeverages", Cumulative),
    ("HKQuantityTypeIdentifierNumberOfTimesFallen", Cumulative),
    ("HKQuantityTypeIdentifierHeartRate", Array),
    ("HKQuantityTypeIdentifierWalkingSpeed", Array),
    ("HKQuantityTypeIdentifierWalkingStepLength", Array),
    ("HKQuantityTypeIdentifierWalkingDoubleSupportPercentage", Array),
    ("HKQuantityTypeIdentifierRespiratoryRate", Array),
    ("HKQuantityTypeIdentifierEnvironmentalAudioExposure", Array),
    ("HKQuantityTypeIdentifierHeadphoneAudioExposure", Array),
    ("HKQuantityTypeIdentifierWalkingAsymmetryPercentage", Array),
    ("HKQuantityTypeIdentifierOxygenSaturation", Array),
    ("HKQuantityTypeIdentifierBloodPressureSystolic", Array),
    ("HKQuantityTypeIdentifierBloodPressureDiastolic", Array),
    ("HKQuantityTypeIdentifierHeartRateVariabilitySDNN", Array),
    ("HKQuantityTypeIdentifierEnvironmentalSoundReduction", Array),
    ("HKQuantityTypeIdentifierStairAscentSpeed", Array),
    ("HKQuantityTypeIdentifierStairDescentSpeed", Array),
    ("HKQuantityTypeIdentifierWalkingHeartRateAverage", Array),
    ("HKQuantityTypeIdentifierAppleSleepingWristTemperature", Array),
    ("HKQuantityTypeIdentifierBodyTemperature", Array),
    ("HKQuantityTypeIdentifierRestingHeartRate", Array),
    ("HKCategoryTypeIdentifierAppleStandHour", Categorical),
    ("HKCategoryTypeIdentifierSleepAnalysis", SleepStage),
    ("HKCategoryTypeIdentifierHandwashingEvent", Event),
    ("HKCategoryTypeIdentifierAudioExposureEvent", Event),
    ("HKCategoryTypeIdentifierMindfulSession", Event),
    ("HKCategoryTypeIdentifierSkippedHeartbeat", Event),
    ("HKCategoryTypeIdentifierLowHeartRateEvent", Event),
    ("HKCategoryTypeIdentifierHighHeartRateEvent", Event),
    ("HKCategoryTypeIdentifierAbdominalCramps", Event),
    ("HKCategoryTypeIdentifierChestTightnessOrPain", Event),
    ("HKCategoryTypeIdentifierLowCardioFitnessEvent", Event),
    ("HKQuantityTypeIdentifierBodyMassIndex", SummaryArray),
    ("HKQuantityTypeIdentifierBodyMass", SummaryArray),
    ("HKQuantityTypeIdentifierBodyFatPercentage", SummaryArray),
    ("HKQuantityTypeIdentifierLeanBodyMass", SummaryArray),
    ("HKQuantityTypeIdentifierAppleWalkingSteadiness", SummaryArray),
    ("HKQuantityTypeIdentifierVO2Max", SummaryArray),
    ("HKQuantityTypeIdentifierHeartRateRecoveryOneMinute", SummaryArray),
    ("HKQuantityTypeIdentifierHeight", SummaryArray),
    ("HKQuantityTypeIdentifierSixMinuteWalkTestDistance", SummaryArray),
    ("HKDataTypeSleepDurationGoal", Invalid),
];

const IDENTIFIER_PREFIXES: &[&str] =
    &["HKQuantityTypeIdentifier", "HKCategoryTypeIdentifier", "HKDataType"];

/// Identifier without its family prefix, e.g. `HeartRate`
fn short_name(id: &str) -> &str {
    IDENTIFIER_PREFIXES
        .iter()
        .find_map(|prefix| id.strip_prefix(prefix))
        .unwrap_or(id)
}

/// Identifier of the sleep analysis type
pub const SLEEP_ANALYSIS_TYPE: &str = "HKCategoryTypeIdentifierSleepAnalysis";

/// Read-only mapping from record type identifier to descriptor.
///
/// Build once and share by reference; nothing mutates it after construction.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    entries: HashMap<String, RecordTypeDescriptor>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Build the registry from the built-in vocabulary
    pub fn new() -> Self {
        let entries = BUILTIN_TYPES
            .iter()
            .map(|(id, kind)| (id.to_string(), RecordTypeDescriptor::new(short_name(id), *kind)))
            .collect();
        Self { entries }
    }

    /// Add entries to the vocabulary; an identifier already present is replaced
    pub fn with_entries<I, K>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, RecordTypeDescriptor)>,
        K: Into<String>,
    {
        self.entries.extend(entries.into_iter().map(|(id, descriptor)| (id.into(), descriptor)));
        self
    }

    /// Process-wide instance, built on first use
    pub fn shared() -> &'static TypeRegistry {
        static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();
        REGISTRY.get_or_init(TypeRegistry::new)
    }

    /// Look up a type identifier.
    ///
    /// Unknown identifiers get an `Invalid` descriptor named after the raw identifier.
    pub fn lookup(&self, record_type: &str) -> RecordTypeDescriptor {
        self.entries
            .get(record_type)
            .cloned()
            .unwrap_or_else(|| RecordTypeDescriptor {
                display_name: record_type.to_string(),
                kind: AnalyticKind::Invalid,
            })
    }

    pub fn kind_of(&self, record_type: &str) -> AnalyticKind {
        self.entries
            .get(record_type)
            .map(|d| d.kind)
            .unwrap_or(AnalyticKind::Invalid)
    }

    pub fn display_name<'a>(&'a self, record_type: &'a str) -> &'a str {
        self.entries
            .get(record_type)
            .map(|d| d.display_name.as_str())
            .unwrap_or(record_type)
    }

    pub fn contains(&self, record_type: &str) -> bool {
        self.entries.contains_key(record_type)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_known_type_lookup() {
        let registry = TypeRegistry::new();
        let descriptor = registry.lookup("HKQuantityTypeIdentifierHeartRate");

        assert_eq!(descriptor.display_name, "HeartRate");
        assert_eq!(descriptor.kind, AnalyticKind::Array);
    }

    #[test]
    fn test_unknown_type_is_invalid() {
        let registry = TypeRegistry::new();
        let descriptor = registry.lookup("HKQuantityTypeIdentifierSomethingNew");

        assert_eq!(descriptor.kind, AnalyticKind::Invalid);
        assert_eq!(descriptor.display_name, "HKQuantityTypeIdentifierSomethingNew");
        assert!(!registry.contains("HKQuantityTypeIdentifierSomethingNew"));
    }

    #[test]
    fn test_special_kinds() {
        let registry = TypeRegistry::shared();

        assert_eq!(registry.kind_of(SLEEP_ANALYSIS_TYPE), AnalyticKind::SleepStage);
        assert_eq!(
            registry.kind_of("HKQuantityTypeIdentifierDietaryCaffeine"),
            AnalyticKind::CaffeineIntake
        );
        assert_eq!(
            registry.kind_of("HKQuantityTypeIdentifierBodyMass"),
            AnalyticKind::SummaryArray
        );
        assert_eq!(registry.kind_of("HKDataTypeSleepDurationGoal"), AnalyticKind::Invalid);
        assert_eq!(registry.display_name("HKDataTypeSleepDurationGoal"), "SleepDurationGoal");
    }

    #[test]
    fn test_with_entries_extends_vocabulary() {
        let registry = TypeRegistry::new().with_entries([
            (
                "WeeklyDistance",
                RecordTypeDescriptor::new("Weekly", AnalyticKind::SummaryCumulative),
            ),
            (
                SLEEP_ANALYSIS_TYPE,
                RecordTypeDescriptor::new("Sleep", AnalyticKind::SleepStage),
            ),
        ]);

        assert_eq!(registry.len(), BUILTIN_TYPES.len() + 1);
        assert_eq!(registry.kind_of("WeeklyDistance"), AnalyticKind::SummaryCumulative);
        assert_eq!(registry.display_name(SLEEP_ANALYSIS_TYPE), "Sleep");
        assert_eq!(
            TypeRegistry::new().display_name(SLEEP_ANALYSIS_TYPE),
            "SleepAnalysis"
        );
    }

    #[test]
    fn test_identifiers_are_unique() {
        assert_eq!(TypeRegistry::new().len(), BUILTIN_TYPES.len());
    }

    #[test]
    fn test_summary_kinds() {
        assert!(AnalyticKind::SummaryCumulative.is_summary());
        assert!(!AnalyticKind::Cumulative.is_summary());
        assert_eq!(AnalyticKind::SleepStage.to_string(), "sleep_stage");
    }
}
