//! Record loading from JSON exports
//!
//! Records use the export attribute names (`type`, `startDate`, `endDate`,
//! `value`, `unit`, ...) and accept timestamps in either export or RFC 3339
//! form.

use crate::collection::RecordCollection;
use crate::error::{HealthError, Result};
use crate::record::Record;

/// Parses record files into collections
pub struct RecordLoader;

impl RecordLoader {
    /// Parse a JSON string containing an array of records
    pub fn parse_array(json: &str) -> Result<RecordCollection> {
        let records: Vec<Record> = serde_json::from_str(json)?;
        Ok(RecordCollection::new(records))
    }

    /// Parse NDJSON (newline-delimited JSON) containing records
    pub fn parse_ndjson(ndjson: &str) -> Result<RecordCollection> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Record>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(HealthError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        log::debug!("parsed {} records from NDJSON", records.len());
        Ok(RecordCollection::new(records))
    }

    /// Parse either form: a leading `[` selects the array parser
    pub fn parse(input: &str) -> Result<RecordCollection> {
        if input.trim_start().starts_with('[') {
            Self::parse_array(input)
        } else {
            Self::parse_ndjson(input)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_datetime;
    use pretty_assertions::assert_eq;

    const NDJSON: &str = concat!(
        "\n",
        r#"{"type":"HKQuantityTypeIdentifierHeartRate","sourceName":"Watch","#,
        r#""sourceVersion":"10.1","unit":"count/min","#,
        r#""creationDate":"2024-01-15 08:00:05 +0100","#,
        r#""startDate":"2024-01-15 08:00:00 +0100","#,
        r#""endDate":"2024-01-15 08:00:00 +0100","value":"62"}"#,
        "\n\n",
        r#"{"type":"HKCategoryTypeIdentifierSleepAnalysis","#,
        r#""creationDate":"2024-01-15T07:00:00Z","#,
        r#""startDate":"2024-01-15T06:00:00Z","endDate":"2024-01-15T07:00:00Z","#,
        r#""value":"HKCategoryValueSleepAnalysisAsleepCore"}"#,
        "\n",
    );

    #[test]
    fn test_parse_ndjson() {
        let records = RecordLoader::parse_ndjson(NDJSON).unwrap();

        assert_eq!(records.len(), 2);
        let heart = &records[0];
        assert_eq!(heart.record_type, "HKQuantityTypeIdentifierHeartRate");
        assert_eq!(heart.unit.as_deref(), Some("count/min"));
        assert_eq!(heart.source_name, "Watch");
        assert_eq!(heart.start_date, parse_datetime("2024-01-15T08:00:00+01:00").unwrap());

        let sleep = &records[1];
        assert_eq!(sleep.interval_seconds(), 3600.0);
        assert!(sleep.unit.is_none());
        assert!(sleep.metadata.is_empty());
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let input = concat!(
            r#"{"type":"X","creationDate":"2024-01-15T00:00:00Z","#,
            r#""startDate":"2024-01-15T00:00:00Z","endDate":"2024-01-15T00:00:00Z"}"#,
            "\nnot json\n",
        );
        let err = RecordLoader::parse_ndjson(input).unwrap_err();

        match err {
            HealthError::ParseError(msg) => {
                assert!(msg.starts_with("Failed to parse line 2"), "{msg}")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bad_timestamp_is_rejected() {
        let input = concat!(
            r#"{"type":"X","creationDate":"yesterday","#,
            r#""startDate":"2024-01-15T00:00:00Z","endDate":"2024-01-15T00:00:00Z"}"#,
        );
        assert!(RecordLoader::parse_ndjson(input).is_err());
    }

    #[test]
    fn test_parse_detects_array() {
        let array: Vec<serde_json::Value> = NDJSON
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let json = serde_json::to_string_pretty(&array).unwrap();

        let from_array = RecordLoader::parse(&json).unwrap();
        let from_lines = RecordLoader::parse(NDJSON).unwrap();
        assert_eq!(from_array, from_lines);
    }

    #[test]
    fn test_empty_input() {
        assert!(RecordLoader::parse_ndjson("\n  \n").unwrap().is_empty());
        assert!(RecordLoader::parse_array("[]").unwrap().is_empty());
    }
}
