//! HTTP client with tracing, per-call timeouts, and domain allowlist.
//!
//! This module provides a wrapped HTTP client that adds:
//! - Request/response tracing
//! - Domain allowlist for outbound calls
//! - Bearer authentication with a per-request timeout

use reqwest::{Client, Response, header};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::error::HttpError;

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent string for stanchion.
const USER_AGENT: &str = concat!("stanchion/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper with tracing and domain allowlist.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    allowed_domains: Option<Vec<String>>,
}

impl HttpClient {
    /// Creates a new HTTP client with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new HTTP client with a custom default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            inner: client,
            allowed_domains: None,
        })
    }

    /// Restricts outbound requests to the given domains (and subdomains).
    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = Some(domains);
        self
    }

    /// Restricts outbound requests to the hosts of the given base URLs.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidUrl`] if a URL does not parse or has no host.
    pub fn with_allowed_base_urls<'a>(
        self,
        base_urls: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, HttpError> {
        let mut hosts: Vec<String> = Vec::new();
        for base in base_urls {
            let parsed = Url::parse(base).map_err(|e| HttpError::InvalidUrl(format!("{base}: {e}")))?;
            let host = parsed
                .host_str()
                .ok_or_else(|| HttpError::InvalidUrl(format!("No host in {base}")))?;
            if !hosts.iter().any(|h| h == host) {
                hosts.push(host.to_string());
            }
        }
        debug!(hosts = ?hosts, "Outbound hosts restricted");
        Ok(self.with_allowed_domains(hosts))
    }

    /// Checks if a URL's domain is allowed.
    fn is_domain_allowed(&self, url: &str) -> Result<(), HttpError> {
        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;

        let Some(ref allowed) = self.allowed_domains else {
            return Ok(());
        };

        let host = parsed
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl("No host in URL".to_string()))?;

        let allowed = allowed
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{domain}")));

        if allowed {
            Ok(())
        } else {
            Err(HttpError::DomainNotAllowed(host.to_string()))
        }
    }

    /// Performs an authenticated GET with query parameters.
    #[instrument(skip(self, query, token), fields(url = %url))]
    pub async fn get_with_auth(
        &self,
        url: &str,
        query: &[(&str, String)],
        token: &str,
        timeout: Duration,
    ) -> Result<Response, HttpError> {
        self.is_domain_allowed(url)?;
        debug!("GET request with auth");

        let response = self
            .inner
            .get(url)
            .query(query)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .timeout(timeout)
            .send()
            .await
            .map_err(HttpError::from_reqwest)?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs an authenticated POST with a JSON body.
    #[instrument(skip(self, body, token), fields(url = %url))]
    pub async fn post_json_with_auth<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Response, HttpError> {
        self.is_domain_allowed(url)?;
        debug!("POST request with JSON");

        let mut request = self.inner.post(url).json(body).timeout(timeout);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(HttpError::from_reqwest)?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }
}

/// Truncates a response body for error messages.
pub fn truncate_body(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(max_chars).collect();
    truncated.push('…');
    truncated
}

// ============================================================================
// Tests
// ============================================================================
