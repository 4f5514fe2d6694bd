//! Plain text output formatting.

use chrono::{DateTime, Duration, Utc};
use std::fmt::Write as _;

use stanchion_fetch::{CredentialStatus, ProbeVerdict, StreamSummary, StructuredResponse, ValidationReport};
use stanchion_providers::{FeedOrigin, FeedResult};
use stanchion_store::{CacheStats, SweepReport};

const RULE_WIDTH: usize = 40;

/// Text formatter.
pub struct TextFormatter {
    now: DateTime<Utc>,
}

impl TextFormatter {
    /// Creates a formatter that measures ages against the current time.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Creates a formatter that measures ages against `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    fn rule() -> String {
        "─".repeat(RULE_WIDTH)
    }

    /// Formats resolved topic content.
    pub fn feed(&self, topic: &str, result: &FeedResult) -> String {
        let entry = &result.entry;
        let age = format_age(entry.age_at(self.now));

        let origin = match result.origin {
            FeedOrigin::Cache => format!("cached {age} ago"),
            FeedOrigin::Fetched => "fetched just now".to_string(),
            FeedOrigin::Fallback => format!("fallback from a {} entry cached {age} ago", entry.category),
        };

        let mut out = format!("{topic} ({origin})\n{}\n", Self::rule());
        out.push_str(&entry.payload);
        if !entry.payload.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    /// Formats a validated structured response.
    pub fn structured(&self, response: &StructuredResponse) -> String {
        let attempts = response.attempt_count();
        let mut out = format!(
            "Answered by {} ({} {}, {})\n",
            response.backend_id,
            attempts,
            if attempts == 1 { "attempt" } else { "attempts" },
            format_elapsed(response.elapsed),
        );
        for failure in &response.failed_attempts {
            let _ = writeln!(
                out,
                "  ✗ {} #{}: {} ({})",
                failure.backend_id,
                failure.index + 1,
                failure.kind,
                failure.message
            );
        }
        out.push_str(&Self::rule());
        out.push('\n');
        let value = serde_json::Value::Object(response.value.clone());
        out.push_str(&serde_json::to_string_pretty(&value).unwrap_or_default());
        out.push('\n');
        out
    }

    /// Formats the trailer printed after streamed text.
    pub fn stream_footer(&self, summary: &StreamSummary) -> String {
        let status = if summary.completed { "complete" } else { "incomplete" };
        format!(
            "[{} · {} chunks · {} chars · {} · {}]",
            summary.backend_id,
            summary.chunks,
            summary.chars,
            status,
            format_elapsed(summary.elapsed),
        )
    }

    /// Formats cache statistics.
    pub fn cache_stats(&self, stats: &CacheStats) -> String {
        let mut out = format!("Cache\n{}\n", Self::rule());
        let _ = writeln!(out, "Directory: {}", stats.directory.display());
        let _ = writeln!(
            out,
            "Entries:   {} ({} fresh, {} expired, {} corrupt)",
            stats.entries, stats.fresh, stats.expired, stats.corrupt
        );
        let _ = writeln!(out, "In memory: {}", stats.memory_entries);
        if !stats.by_category.is_empty() {
            out.push_str("Fresh by category:\n");
            for (category, count) in &stats.by_category {
                let _ = writeln!(out, "  {:<12} {count}", category.to_string());
            }
        }
        out
    }

    /// Formats a sweep report.
    pub fn sweep(&self, report: &SweepReport) -> String {
        format!(
            "Removed {} expired and {} corrupt entries, kept {} ({} dropped from memory)\n",
            report.expired_removed, report.corrupt_removed, report.kept, report.memory_removed
        )
    }

    /// Formats one credential pool.
    pub fn pool(&self, name: &str, usable: usize, credentials: &[CredentialStatus]) -> String {
        let mut out = format!("Pool {name}: {usable}/{} usable\n", credentials.len());
        if credentials.is_empty() {
            out.push_str("  (no credentials configured)\n");
            return out;
        }
        for status in credentials {
            let state = if status.valid { "✓ valid" } else { "✗ quarantined" };
            let _ = write!(
                out,
                "  {:<10} {:<14} {:<14} failures {} (consecutive {})",
                status.id, status.masked_secret, state, status.failure_count, status.consecutive_failures
            );
            if status.last_used.timestamp() > 0 {
                let _ = write!(out, ", used {} ago", format_age(self.now - status.last_used));
            }
            out.push('\n');
        }
        out
    }

    /// Formats probe results.
    pub fn validation(&self, pool: &str, reports: &[ValidationReport]) -> String {
        let mut out = format!("Probed pool {pool}\n");
        for report in reports {
            let verdict = match &report.verdict {
                ProbeVerdict::Accepted => "accepted".to_string(),
                ProbeVerdict::Rejected(reason) => format!("rejected: {reason}"),
                ProbeVerdict::Inconclusive(reason) => format!("inconclusive: {reason}"),
            };
            let state = if report.valid { "valid" } else { "quarantined" };
            let _ = writeln!(out, "  {:<10} {verdict} → {state}", report.id);
        }
        out
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats an age such as `45s`, `12m`, `3h 5m` or `2d 4h`.
pub fn format_age(age: Duration) -> String {
    let secs = age.num_seconds().max(0);
    let (days, hours, minutes) = (secs / 86_400, (secs % 86_400) / 3_600, (secs % 3_600) / 60);

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{secs}s")
    }
}

fn format_elapsed(elapsed: std::time::Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}
