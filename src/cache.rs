//! Per-session report cache
//!
//! Reports are keyed by `(session, target metric)`. Every session is its own
//! namespace, so concurrent users never see or evict each other's reports.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::correlation::CorrelationReport;
use crate::error::Result;

/// Identifier of one logical session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Fresh random session
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// In-memory store of computed reports
#[derive(Debug, Default)]
pub struct ReportCache {
    sessions: HashMap<SessionId, HashMap<String, CorrelationReport>>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a report, returning the one it replaced
    pub fn insert(
        &mut self,
        session: SessionId,
        target: &str,
        report: CorrelationReport,
    ) -> Option<CorrelationReport> {
        self.sessions
            .entry(session)
            .or_default()
            .insert(target.to_string(), report)
    }

    pub fn get(&self, session: SessionId, target: &str) -> Option<&CorrelationReport> {
        self.sessions.get(&session)?.get(target)
    }

    /// Cached report, computing and storing it on a miss.
    ///
    /// A failed computation leaves the cache unchanged.
    pub fn get_or_compute<F>(
        &mut self,
        session: SessionId,
        target: &str,
        compute: F,
    ) -> Result<&CorrelationReport>
    where
        F: FnOnce() -> Result<CorrelationReport>,
    {
        let reports = self.sessions.entry(session).or_default();
        match reports.entry(target.to_string()) {
            Entry::Occupied(entry) => {
                log::debug!("report cache hit for {} / {}", session, target);
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => Ok(entry.insert(compute()?)),
        }
    }

    /// Targets with a cached report in `session`, sorted
    pub fn targets(&self, session: SessionId) -> Vec<&str> {
        let mut targets: Vec<&str> = self
            .sessions
            .get(&session)
            .map(|reports| reports.keys().map(String::as_str).collect())
            .unwrap_or_default();
        targets.sort_unstable();
        targets
    }

    /// Drop every report of one session; returns how many were removed
    pub fn clear_session(&mut self, session: SessionId) -> usize {
        self.sessions
            .remove(&session)
            .map(|reports| reports.len())
            .unwrap_or(0)
    }

    /// Total number of cached reports
    pub fn len(&self) -> usize {
        self.sessions.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::ScoreEntry;
    use crate::error::HealthError;
    use pretty_assertions::assert_eq;

    fn report(score: f64) -> CorrelationReport {
        CorrelationReport {
            table: vec![ScoreEntry {
                field: "StepCount_count".to_string(),
                score,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_sessions_are_isolated() {
        let mut cache = ReportCache::new();
        let alice = SessionId::new();
        let bob = SessionId::new();

        cache.insert(alice, "total_hours", report(0.5));
        cache.insert(bob, "total_hours", report(0.9));

        assert_eq!(cache.get(alice, "total_hours"), Some(&report(0.5)));
        assert_eq!(cache.get(bob, "total_hours"), Some(&report(0.9)));

        assert_eq!(cache.clear_session(alice), 1);
        assert!(cache.get(alice, "total_hours").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_or_compute_caches() {
        let mut cache = ReportCache::new();
        let session = SessionId::new();
        let mut calls = 0;

        for _ in 0..3 {
            cache
                .get_or_compute(session, "Deep_percent", || {
                    calls += 1;
                    Ok(report(0.4))
                })
                .unwrap();
        }

        assert_eq!(calls, 1);
        assert_eq!(cache.targets(session), vec!["Deep_percent"]);
    }

    #[test]
    fn test_failed_compute_is_not_cached() {
        let mut cache = ReportCache::new();
        let session = SessionId::new();

        let result = cache.get_or_compute(session, "total_hours", || {
            Err(HealthError::UnknownFeature("total_hours".to_string()))
        });

        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_session_id_display() {
        let id = SessionId::from_uuid(Uuid::nil());
        assert_eq!(id.to_string(), "00000000000000000000000000000000");
    }
}
