//! CLI output formatting tests.

#[cfg(test)]
mod text_formatter_tests {
    use super::super::text::{TextFormatter, format_age};
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use stanchion_core::{CacheEntry, CacheSource, Category};
    use stanchion_fetch::{
        AttemptRecord, FailureKind, ProbeVerdict, StructuredResponse, ValidationReport,
    };
    use stanchion_providers::{FeedOrigin, FeedResult};
    use stanchion_store::{CacheStats, SweepReport};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(Duration::seconds(45)), "45s");
        assert_eq!(format_age(Duration::minutes(12)), "12m");
        assert_eq!(format_age(Duration::minutes(185)), "3h 5m");
        assert_eq!(format_age(Duration::hours(52)), "2d 4h");
        assert_eq!(format_age(Duration::seconds(-5)), "0s");
    }

    #[test]
    fn test_feed_fallback_header() {
        let entry = CacheEntry::new_at("skincare", "Topic: skincare\n", Vec::new(), CacheSource::Fetched, t0())
            .repurpose_for("sunscreen");
        let result = FeedResult {
            origin: FeedOrigin::Fallback,
            entry,
        };

        let text = TextFormatter::at(t0() + Duration::hours(1)).feed("sunscreen", &result);
        assert!(text.starts_with("sunscreen (fallback from a skincare entry cached 1h 0m ago)\n"));
        assert!(text.ends_with("Topic: sunscreen\n"));
    }

    #[test]
    fn test_structured_lists_failures() {
        let response = StructuredResponse {
            backend_id: "model-b".to_string(),
            value: json!({"title": "t"}).as_object().cloned().unwrap(),
            failed_attempts: vec![AttemptRecord {
                backend_id: "model-a".to_string(),
                index: 0,
                timeout: std::time::Duration::from_secs(60),
                kind: FailureKind::Timeout,
                message: "Timed out".to_string(),
                duration: std::time::Duration::from_secs(60),
            }],
            elapsed: std::time::Duration::from_millis(61_500),
        };

        let text = TextFormatter::at(t0()).structured(&response);
        assert!(text.starts_with("Answered by model-b (2 attempts, 61.5s)\n"));
        assert!(text.contains("model-a #1"));
        assert!(text.contains("\"title\": \"t\""));
    }

    #[test]
    fn test_cache_stats_and_sweep() {
        let mut by_category = BTreeMap::new();
        by_category.insert(Category::Skincare, 2);
        let stats = CacheStats {
            directory: PathBuf::from("/tmp/stanchion"),
            entries: 3,
            fresh: 2,
            expired: 1,
            corrupt: 0,
            by_category,
            memory_entries: 1,
        };

        let formatter = TextFormatter::at(t0());
        let text = formatter.cache_stats(&stats);
        assert!(text.contains("Entries:   3 (2 fresh, 1 expired, 0 corrupt)"));
        assert!(text.contains("skincare"));

        let report = SweepReport {
            expired_removed: 1,
            corrupt_removed: 2,
            kept: 3,
            memory_removed: 0,
        };
        assert_eq!(
            formatter.sweep(&report),
            "Removed 1 expired and 2 corrupt entries, kept 3 (0 dropped from memory)\n"
        );
    }

    #[test]
    fn test_pool_and_validation() {
        let formatter = TextFormatter::at(t0());
        assert!(formatter.pool("search", 0, &[]).contains("no credentials configured"));

        let reports = vec![
            ValidationReport {
                id: "search#1".to_string(),
                verdict: ProbeVerdict::Accepted,
                valid: true,
            },
            ValidationReport {
                id: "search#2".to_string(),
                verdict: ProbeVerdict::Rejected("HTTP 401".to_string()),
                valid: true,
            },
        ];
        let text = formatter.validation("search", &reports);
        assert!(text.contains("search#1   accepted → valid"));
        assert!(text.contains("rejected: HTTP 401"));
    }
}

#[cfg(test)]
mod json_formatter_tests {
    use super::super::json::{FailureOutput, JsonFormatter, ValidationOutput};
    use stanchion_fetch::{ExhaustionReport, OrchestratorError, ProbeVerdict, ValidationReport};
    use std::time::Duration;

    #[test]
    fn test_failure_output_carries_report() {
        let err = anyhow::Error::new(OrchestratorError::BackendsExhausted(ExhaustionReport {
            attempts_per_backend: vec![("model-a".to_string(), 2), ("model-b".to_string(), 2)],
            attempts: Vec::new(),
            last_error: Some("HTTP 503".to_string()),
            elapsed: Duration::from_secs(4),
        }));

        let output = FailureOutput::from_error(&err);
        assert!(output.retryable);
        assert_eq!(output.backends_tried.len(), 2);
        assert_eq!(output.last_error.as_deref(), Some("HTTP 503"));

        let json = JsonFormatter::new(false).format(&output).unwrap();
        assert!(json.contains("\"retryable\":true"));
        assert!(json.contains("\"backendsTried\":[{\"backend\":\"model-a\",\"attempts\":2}"));
        assert!(!json.contains("\"attempts\":[]"));
    }

    #[test]
    fn test_failure_output_plain_error() {
        let output = FailureOutput::from_error(&anyhow::anyhow!("boom"));
        assert!(!output.retryable);
        let json = JsonFormatter::new(false).format(&output).unwrap();
        assert_eq!(json, "{\"error\":\"boom\",\"retryable\":false}");
    }

    #[test]
    fn test_validation_output() {
        let report = ValidationReport {
            id: "search#1".to_string(),
            verdict: ProbeVerdict::Inconclusive("HTTP 500".to_string()),
            valid: true,
        };
        let json = JsonFormatter::new(false)
            .format(&ValidationOutput::new("search", &report))
            .unwrap();
        assert_eq!(
            json,
            "{\"pool\":\"search\",\"id\":\"search#1\",\"verdict\":\"inconclusive\",\"detail\":\"HTTP 500\",\"valid\":true}"
        );
    }
}
