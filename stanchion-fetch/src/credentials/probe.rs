//! Live credential probes.
//!
//! A probe performs one cheap authenticated call against the target service
//! and reports a [`ProbeVerdict`]. Only the caller that sees the HTTP
//! response can tell an auth rejection from a transport failure, so the
//! verdict is produced here and applied by the pool.

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

/// Outcome of probing one credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeVerdict {
    /// The service accepted the credential.
    Accepted,
    /// The service explicitly rejected the credential.
    Rejected(String),
    /// Nothing can be concluded (network error, unexpected status).
    Inconclusive(String),
}

impl ProbeVerdict {
    /// Returns true if the credential was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Builds a verdict from an HTTP status and the optional
    /// `success`/`message` pair of a JSON envelope.
    pub fn from_response(status: u16, success: Option<bool>, message: Option<&str>) -> Self {
        if status == 401 || status == 403 {
            return Self::Rejected(format!("HTTP {status}"));
        }
        if !(200..300).contains(&status) {
            return Self::Inconclusive(format!("HTTP {status}"));
        }
        match success {
            Some(false) => {
                let message = message.unwrap_or_default();
                if is_auth_message(message) {
                    Self::Rejected(message.to_string())
                } else {
                    Self::Inconclusive(format!("request unsuccessful: {message}"))
                }
            }
            _ => Self::Accepted,
        }
    }
}

/// A live probe against the service a pool authenticates to.
#[async_trait]
pub trait CredentialProbe: Send + Sync {
    /// Probes a single secret.
    async fn probe(&self, secret: &str) -> ProbeVerdict;
}

fn auth_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)(\bauth\b|authenticat|authori[sz]|forbidden|permission|token|api[ _-]?key|credential|expired|quota exceeded|未授权|权限|令牌|密钥|过期)",
        )
        .unwrap_or_else(|e| panic!("auth message pattern is invalid: {e}"))
    })
}

/// Returns true if an upstream error message describes an auth/permission
/// problem with the credential.
pub fn is_auth_message(message: &str) -> bool {
    !message.is_empty() && auth_pattern().is_match(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_messages() {
        assert!(is_auth_message("Invalid token"));
        assert!(is_auth_message("API key expired"));
        assert!(is_auth_message("permission denied for this resource"));
        assert!(is_auth_message("令牌已过期"));
        assert!(!is_auth_message("keyword is required"));
        assert!(!is_auth_message("internal error"));
        assert!(!is_auth_message("author not found"));
        assert!(!is_auth_message(""));
    }

    #[test]
    fn test_verdict_from_status() {
        assert!(matches!(
            ProbeVerdict::from_response(401, None, None),
            ProbeVerdict::Rejected(_)
        ));
        assert!(matches!(
            ProbeVerdict::from_response(403, None, None),
            ProbeVerdict::Rejected(_)
        ));
        assert!(matches!(
            ProbeVerdict::from_response(502, None, None),
            ProbeVerdict::Inconclusive(_)
        ));
        assert_eq!(
            ProbeVerdict::from_response(200, Some(true), None),
            ProbeVerdict::Accepted
        );
    }

    #[test]
    fn test_verdict_from_envelope() {
        assert!(matches!(
            ProbeVerdict::from_response(200, Some(false), Some("token invalid")),
            ProbeVerdict::Rejected(_)
        ));
        assert!(matches!(
            ProbeVerdict::from_response(200, Some(false), Some("rate limit, slow down")),
            ProbeVerdict::Inconclusive(_)
        ));
    }
}
