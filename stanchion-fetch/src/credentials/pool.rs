//! Rotating credential pool.
//!
//! The pool hands out credentials in round-robin order over the currently
//! valid subset, quarantines a credential after `max_failures` consecutive
//! auth rejections, and lazily reinstates it once the cooldown has passed.
//! There is no background timer: reinstatement happens as a side effect of
//! the next selection.
//!
//! Penalisation is caller-driven. Only auth-class failures should be
//! reported through [`CredentialPool::mark_invalid`]; transport failures
//! (timeouts, resets, 5xx) must not touch the pool.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

use super::probe::{CredentialProbe, ProbeVerdict};

/// Consecutive failures before a credential is quarantined.
pub const DEFAULT_MAX_FAILURES: u32 = 3;

/// Minimum quarantine time before a credential is reconsidered.
pub const DEFAULT_COOLDOWN_SECS: i64 = 600;

// ============================================================================
// Settings
// ============================================================================

/// Health thresholds for a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Consecutive failures that quarantine a credential.
    pub max_failures: u32,
    /// Quarantine duration, measured from `last_validated`.
    pub cooldown: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_failures: DEFAULT_MAX_FAILURES,
            cooldown: Duration::seconds(DEFAULT_COOLDOWN_SECS),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// Health record for one secret. Owned by the pool.
#[derive(Clone)]
struct CredentialRecord {
    id: String,
    secret: String,
    valid: bool,
    last_used: DateTime<Utc>,
    failure_count: u64,
    consecutive_failures: u32,
    last_validated: DateTime<Utc>,
}

impl CredentialRecord {
    fn new(id: String, secret: String) -> Self {
        Self {
            id,
            secret,
            valid: true,
            last_used: DateTime::<Utc>::UNIX_EPOCH,
            failure_count: 0,
            consecutive_failures: 0,
            last_validated: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn cooldown_elapsed(&self, cooldown: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_validated > cooldown
    }
}

/// A credential handed out by the pool.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    id: String,
    secret: String,
}

impl Credential {
    /// Record identifier, e.g. `search#2`. Safe to log.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The secret value. Never log this.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("secret", &mask_secret(&self.secret))
            .finish()
    }
}

/// Redacted, serialisable view of one credential record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    /// Record identifier.
    pub id: String,
    /// Masked secret preview.
    pub masked_secret: String,
    /// Whether the credential is currently selectable.
    pub valid: bool,
    /// Last time the credential was handed out.
    pub last_used: DateTime<Utc>,
    /// Lifetime auth failures.
    pub failure_count: u64,
    /// Auth failures since the last success.
    pub consecutive_failures: u32,
    /// Last validation verdict time.
    pub last_validated: DateTime<Utc>,
}

impl From<&CredentialRecord> for CredentialStatus {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            id: record.id.clone(),
            masked_secret: mask_secret(&record.secret),
            valid: record.valid,
            last_used: record.last_used,
            failure_count: record.failure_count,
            consecutive_failures: record.consecutive_failures,
            last_validated: record.last_validated,
        }
    }
}

/// Result of probing one credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Record identifier.
    pub id: String,
    /// What the probe concluded.
    pub verdict: ProbeVerdict,
    /// Validity after the verdict was applied.
    pub valid: bool,
}

/// Masks a secret down to its first and last four characters.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

// ============================================================================
// Pool
// ============================================================================

struct PoolState {
    records: Vec<CredentialRecord>,
    /// Record index where the next search for a usable credential starts.
    cursor: usize,
}

/// A rotating pool of interchangeable secrets.
pub struct CredentialPool {
    name: String,
    settings: PoolSettings,
    state: Mutex<PoolState>,
}

impl CredentialPool {
    /// Builds a pool from configured secrets.
    ///
    /// Blank secrets are skipped and duplicates keep their first position.
    /// Every record starts valid with zeroed counters.
    pub fn load<I, S>(name: impl Into<String>, secrets: I, settings: PoolSettings) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let mut records: Vec<CredentialRecord> = Vec::new();

        for secret in secrets {
            let secret = secret.into().trim().to_string();
            if secret.is_empty() || records.iter().any(|r| r.secret == secret) {
                continue;
            }
            let id = format!("{name}#{}", records.len() + 1);
            records.push(CredentialRecord::new(id, secret));
        }

        info!(pool = %name, count = records.len(), "Loaded credential pool");

        Self {
            name,
            settings,
            state: Mutex::new(PoolState { records, cursor: 0 }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pool name used in logs and record identifiers.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Health thresholds in effect.
    pub fn settings(&self) -> PoolSettings {
        self.settings
    }

    /// Number of configured credentials.
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Returns true if no credentials are configured.
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Number of credentials selectable right now.
    pub fn valid_count(&self) -> usize {
        self.valid_count_at(Utc::now())
    }

    /// Number of credentials selectable at `now` (without reinstating any).
    pub fn valid_count_at(&self, now: DateTime<Utc>) -> usize {
        let cooldown = self.settings.cooldown;
        self.lock()
            .records
            .iter()
            .filter(|r| r.valid || r.cooldown_elapsed(cooldown, now))
            .count()
    }

    /// Returns the next usable credential in round-robin order.
    pub fn next_valid(&self) -> Option<Credential> {
        self.next_valid_at(Utc::now())
    }

    /// Returns the next usable credential as of `now`.
    ///
    /// Quarantined records whose cooldown has elapsed are reinstated as a side
    /// effect. Returns `None` when the valid subset is empty.
    pub fn next_valid_at(&self, now: DateTime<Utc>) -> Option<Credential> {
        let cooldown = self.settings.cooldown;
        let mut state = self.lock();

        let mut usable = Vec::with_capacity(state.records.len());
        for (index, record) in state.records.iter_mut().enumerate() {
            if !record.valid && record.cooldown_elapsed(cooldown, now) {
                record.valid = true;
                record.consecutive_failures = 0;
                info!(pool = %self.name, credential = %record.id, "Cooldown elapsed, credential reinstated");
            }
            if record.valid {
                usable.push(index);
            }
        }

        if usable.is_empty() {
            warn!(pool = %self.name, "No usable credentials");
            return None;
        }

        let start = state.cursor;
        let index = usable
            .iter()
            .copied()
            .find(|&i| i >= start)
            .unwrap_or(usable[0]);
        state.cursor = (index + 1) % state.records.len();

        let record = &mut state.records[index];
        record.last_used = now;
        debug!(pool = %self.name, credential = %record.id, "Selected credential");

        Some(Credential {
            id: record.id.clone(),
            secret: record.secret.clone(),
        })
    }

    /// Records an auth-class failure for `secret`.
    ///
    /// Returns true if this call quarantined the credential.
    pub fn mark_invalid(&self, secret: &str, reason: &str) -> bool {
        self.mark_invalid_at(secret, reason, Utc::now())
    }

    /// Records an auth-class failure for `secret` as of `now`.
    ///
    /// The rejection counts as a validation verdict, so `last_validated` is
    /// updated and the cooldown is measured from the latest rejection.
    pub fn mark_invalid_at(&self, secret: &str, reason: &str, now: DateTime<Utc>) -> bool {
        let max_failures = self.settings.max_failures;
        let mut state = self.lock();

        let Some(record) = state.records.iter_mut().find(|r| r.secret == secret) else {
            debug!(pool = %self.name, "mark_invalid for unknown secret ignored");
            return false;
        };

        record.failure_count = record.failure_count.saturating_add(1);
        record.consecutive_failures = record.consecutive_failures.saturating_add(1);
        record.last_validated = now;

        if record.valid && record.consecutive_failures >= max_failures {
            record.valid = false;
            warn!(
                pool = %self.name,
                credential = %record.id,
                failures = record.consecutive_failures,
                reason = %reason,
                "Credential quarantined"
            );
            return true;
        }

        debug!(
            pool = %self.name,
            credential = %record.id,
            failures = record.consecutive_failures,
            reason = %reason,
            "Credential failure recorded"
        );
        false
    }

    /// Records an explicit success for `secret`.
    pub fn mark_valid(&self, secret: &str) {
        self.mark_valid_at(secret, Utc::now());
    }

    /// Records an explicit success for `secret` as of `now`.
    pub fn mark_valid_at(&self, secret: &str, now: DateTime<Utc>) {
        let mut state = self.lock();
        if let Some(record) = state.records.iter_mut().find(|r| r.secret == secret) {
            if !record.valid {
                info!(pool = %self.name, credential = %record.id, "Credential revalidated");
            }
            record.valid = true;
            record.consecutive_failures = 0;
            record.last_validated = now;
        }
    }

    fn apply_verdict(&self, secret: &str, verdict: &ProbeVerdict) {
        match verdict {
            ProbeVerdict::Accepted => self.mark_valid(secret),
            ProbeVerdict::Rejected(reason) => {
                self.mark_invalid(secret, reason);
            }
            ProbeVerdict::Inconclusive(reason) => {
                debug!(pool = %self.name, reason = %reason, "Probe inconclusive, credential untouched");
            }
        }
    }

    /// Probes `secret` against the live service.
    ///
    /// An explicit rejection counts as a failure, an acceptance as a success;
    /// anything else leaves the record untouched. Returns true only when the
    /// service accepted the credential.
    #[instrument(skip(self, secret, probe), fields(pool = %self.name))]
    pub async fn validate(&self, secret: &str, probe: &dyn CredentialProbe) -> bool {
        let verdict = probe.probe(secret).await;
        self.apply_verdict(secret, &verdict);
        verdict.is_accepted()
    }

    /// Probes every configured credential in order.
    pub async fn validate_all(&self, probe: &dyn CredentialProbe) -> Vec<ValidationReport> {
        let secrets: Vec<(String, String)> = self
            .lock()
            .records
            .iter()
            .map(|r| (r.id.clone(), r.secret.clone()))
            .collect();

        let mut reports = Vec::with_capacity(secrets.len());
        for (id, secret) in secrets {
            let verdict = probe.probe(&secret).await;
            self.apply_verdict(&secret, &verdict);
            let valid = self
                .lock()
                .records
                .iter()
                .find(|r| r.secret == secret)
                .is_some_and(|r| r.valid);
            reports.push(ValidationReport { id, verdict, valid });
        }
        reports
    }

    /// Redacted view of every record, in configuration order.
    pub fn snapshot(&self) -> Vec<CredentialStatus> {
        self.lock().records.iter().map(CredentialStatus::from).collect()
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(1_700_000_000 + secs)
    }

    fn pool(secrets: &[&str], max_failures: u32, cooldown_secs: i64) -> CredentialPool {
        CredentialPool::load(
            "search",
            secrets.iter().copied(),
            PoolSettings {
                max_failures,
                cooldown: Duration::seconds(cooldown_secs),
            },
        )
    }

    fn secrets_of(pool: &CredentialPool, n: usize, now: DateTime<Utc>) -> Vec<String> {
        (0..n)
            .map(|_| pool.next_valid_at(now).unwrap().secret().to_string())
            .collect()
    }

    #[test]
    fn test_load_skips_blank_and_duplicates() {
        let pool = pool(&["A", "", "  ", "B", "A"], 3, 600);
        assert_eq!(pool.len(), 2);
        let ids: Vec<String> = pool.snapshot().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["search#1", "search#2"]);
    }

    #[test]
    fn test_round_robin_visits_each_once() {
        let pool = pool(&["A", "B", "C"], 3, 600);
        let picks = secrets_of(&pool, 3, at(0));
        let mut sorted = picks.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["A", "B", "C"]);
        assert_eq!(secrets_of(&pool, 3, at(0)), picks);
    }

    #[test]
    fn test_quarantine_after_max_failures() {
        let pool = pool(&["A", "B", "C"], 3, 600);

        assert!(!pool.mark_invalid_at("A", "token invalid", at(0)));
        assert!(!pool.mark_invalid_at("A", "token invalid", at(1)));
        assert!(pool.mark_invalid_at("A", "token invalid", at(2)));

        assert_eq!(secrets_of(&pool, 3, at(3)), vec!["B", "C", "B"]);
        assert_eq!(pool.valid_count_at(at(3)), 2);
    }

    #[test]
    fn test_quarantine_mid_rotation_keeps_order() {
        let pool = pool(&["A", "B", "C"], 1, 600);

        assert_eq!(secrets_of(&pool, 1, at(0)), vec!["A"]);
        assert!(pool.mark_invalid_at("A", "revoked", at(1)));
        assert_eq!(secrets_of(&pool, 3, at(2)), vec!["B", "C", "B"]);

        assert!(pool.mark_invalid_at("C", "revoked", at(3)));
        assert_eq!(secrets_of(&pool, 2, at(4)), vec!["B", "B"]);
    }

    #[test]
    fn test_reinstated_after_cooldown() {
        let pool = pool(&["A", "B"], 3, 600);
        for i in 0..3 {
            pool.mark_invalid_at("A", "expired", at(i));
        }

        // Exactly at the boundary the cooldown has not elapsed.
        let picks = secrets_of(&pool, 2, at(2 + 600));
        assert!(picks.iter().all(|s| s == "B"));

        let picks = secrets_of(&pool, 2, at(2 + 601));
        assert!(picks.iter().any(|s| s == "A"));

        let status = pool.snapshot().into_iter().find(|s| s.id == "search#1").unwrap();
        assert!(status.valid);
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.failure_count, 3);
    }

    #[test]
    fn test_mark_valid_resets_consecutive_failures() {
        let pool = pool(&["A"], 3, 600);
        pool.mark_invalid_at("A", "token", at(0));
        pool.mark_invalid_at("A", "token", at(1));
        pool.mark_valid_at("A", at(2));
        assert!(!pool.mark_invalid_at("A", "token", at(3)));

        let status = &pool.snapshot()[0];
        assert!(status.valid);
        assert_eq!(status.consecutive_failures, 1);
        assert_eq!(status.failure_count, 3);
    }

    #[test]
    fn test_all_quarantined_returns_none() {
        let pool = pool(&["A"], 1, 600);
        assert!(pool.mark_invalid_at("A", "forbidden", at(0)));
        assert!(pool.next_valid_at(at(10)).is_none());
    }

    #[test]
    fn test_empty_pool() {
        let pool = pool(&[], 3, 600);
        assert!(pool.is_empty());
        assert!(pool.next_valid_at(at(0)).is_none());
    }

    #[test]
    fn test_unknown_secret_is_ignored() {
        let pool = pool(&["A"], 1, 600);
        assert!(!pool.mark_invalid_at("Z", "token", at(0)));
        assert_eq!(pool.valid_count_at(at(0)), 1);
    }

    #[test]
    fn test_snapshot_masks_secrets() {
        let pool = pool(&["sk-1234567890abcdef"], 3, 600);
        let status = &pool.snapshot()[0];
        assert_eq!(status.masked_secret, "sk-1…cdef");
        assert!(!format!("{:?}", pool.next_valid().unwrap()).contains("567890"));
    }

    #[test]
    fn test_mask_short_secret() {
        assert_eq!(mask_secret("abc"), "***");
    }

    struct FixedProbe(ProbeVerdict);

    #[async_trait]
    impl CredentialProbe for FixedProbe {
        async fn probe(&self, _secret: &str) -> ProbeVerdict {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_validate_rejection_counts_as_failure() {
        let pool = pool(&["A"], 1, 600);
        let probe = FixedProbe(ProbeVerdict::Rejected("HTTP 401".to_string()));
        assert!(!pool.validate("A", &probe).await);
        assert!(!pool.snapshot()[0].valid);
    }

    #[tokio::test]
    async fn test_validate_inconclusive_leaves_record_untouched() {
        let pool = pool(&["A"], 1, 600);
        let probe = FixedProbe(ProbeVerdict::Inconclusive("connection reset".to_string()));
        assert!(!pool.validate("A", &probe).await);

        let status = &pool.snapshot()[0];
        assert!(status.valid);
        assert_eq!(status.failure_count, 0);
    }

    #[tokio::test]
    async fn test_validate_all_reports_each() {
        let pool = pool(&["A", "B"], 3, 600);
        let reports = pool.validate_all(&FixedProbe(ProbeVerdict::Accepted)).await;
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.valid && r.verdict.is_accepted()));
    }
}
