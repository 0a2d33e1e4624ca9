//! HKTK - Health record analytics toolkit
//!
//! HKTK turns exported health records into per-type features, segments sleep
//! into episodes and ranks which measurements best predict a chosen sleep
//! metric: record loading → type split → sleep segmentation → lookback
//! summaries → correlation scoring.
//!
//! ## Modules
//!
//! - **Records**: [`Record`], [`RecordCollection`] and the JSON [`RecordLoader`]
//! - **Analytics**: per-type aggregation driven by the [`TypeRegistry`]
//! - **Correlation**: [`CorrelationScorer`] and the [`CorrelationReport`] artifact
//! - **Pipeline**: the [`SleepAnalysis`] facade tying it all together

pub mod analytics;
pub mod cache;
pub mod collection;
pub mod correlation;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod record;
pub mod registry;
pub mod stats;

pub use analytics::{AnalyticCollection, FeatureSummary, SleepEpisode, SleepStage};
pub use cache::{ReportCache, SessionId};
pub use collection::RecordCollection;
pub use correlation::{CorrelationReport, CorrelationScorer, ScorerConfig};
pub use error::{HealthError, Result};
pub use loader::RecordLoader;
pub use pipeline::SleepAnalysis;
pub use record::{DateField, Record};
pub use registry::{AnalyticKind, RecordTypeDescriptor, TypeRegistry};

/// HKTK version, embedded in CLI reports
pub const HKTK_VERSION: &str = env!("CARGO_PKG_VERSION");
