//! Content search API client.
//!
//! # API Endpoint
//!
//! ```text
//! GET {base_url}/api/v1/notes/search?keyword=<topic>&page=<n>&page_size=<m>
//! Authorization: Bearer <api_key>
//! ```
//!
//! # Response Format
//!
//! ```json
//! {
//!   "success": true,
//!   "msg": "ok",
//!   "data": {
//!     "items": [{"note_id": "abc", "display_title": "...", "liked_count": "1.2万"}],
//!     "has_more": true
//!   }
//! }
//! ```

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use stanchion_fetch::credentials::is_auth_message;
use stanchion_fetch::host::http::truncate_body;
use stanchion_fetch::{HttpClient, ProbeVerdict};

use super::error::SearchError;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL.
pub const API_BASE_URL: &str = "https://api.example-notes.com";

/// Search endpoint.
pub const SEARCH_ENDPOINT: &str = "/api/v1/notes/search";

/// Keyword used by credential probes.
const PROBE_KEYWORD: &str = "test";

/// Body characters kept in error messages.
const ERROR_BODY_CHARS: usize = 300;

// ============================================================================
// API Response Structures
// ============================================================================

/// Top-level response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchEnvelope {
    /// Whether the call succeeded. Missing means success.
    #[serde(default)]
    pub success: Option<bool>,
    /// Status message.
    #[serde(default, alias = "message")]
    pub msg: Option<String>,
    /// Result page.
    #[serde(default)]
    pub data: Option<SearchPage>,
}

/// One page of results.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPage {
    /// Raw items.
    #[serde(default, alias = "notes")]
    pub items: Vec<RawNote>,
    /// Whether another page exists.
    #[serde(default, alias = "hasMore")]
    pub has_more: bool,
}

/// A raw search item as returned upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct RawNote {
    /// Identifier (string or number).
    #[serde(default, alias = "note_id", alias = "noteId")]
    pub id: Option<Value>,
    /// Title.
    #[serde(default, alias = "display_title")]
    pub title: Option<String>,
    /// Body text.
    #[serde(default, alias = "desc")]
    pub content: Option<String>,
    /// Author.
    #[serde(default)]
    pub user: Option<RawUser>,
    /// Likes (number or abbreviated string).
    #[serde(default, alias = "liked_count", alias = "likedCount")]
    pub likes: Option<Value>,
    /// Comments.
    #[serde(default, alias = "comment_count", alias = "commentCount")]
    pub comments: Option<Value>,
    /// Collects.
    #[serde(default, alias = "collected_count", alias = "collectedCount")]
    pub collects: Option<Value>,
    /// Link.
    #[serde(default)]
    pub url: Option<String>,
    /// Tags (strings or `{ "name": ... }` objects).
    #[serde(default, alias = "tag_list")]
    pub tags: Vec<Value>,
    /// Publish time.
    #[serde(default, alias = "time", alias = "publish_time")]
    pub published: Option<Value>,
}

/// Raw author info.
#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    /// Display name.
    #[serde(default, alias = "nick_name", alias = "nickName")]
    pub nickname: Option<String>,
}

// ============================================================================
// API Client
// ============================================================================

/// Client for the content search API.
#[derive(Debug, Clone)]
pub struct SearchApiClient {
    http: HttpClient,
    base_url: String,
    page_size: u32,
    timeout: Duration,
}

impl SearchApiClient {
    /// Creates a client for `base_url`.
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size: 20,
            timeout: Duration::from_secs(20),
        }
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn search_url(&self) -> String {
        format!("{}{}", self.base_url, SEARCH_ENDPOINT)
    }

    async fn send(
        &self,
        keyword: &str,
        page: u32,
        page_size: u32,
        token: &str,
    ) -> Result<(StatusCode, String), SearchError> {
        let query = [
            ("keyword", keyword.to_string()),
            ("page", page.to_string()),
            ("page_size", page_size.to_string()),
        ];
        let response = self
            .http
            .get_with_auth(&self.search_url(), &query, token, self.timeout)
            .await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;
        Ok((status, body))
    }

    /// Fetches one page of results for `keyword`.
    ///
    /// # Errors
    ///
    /// 401/403 and `success=false` with an auth-related message are
    /// [`SearchError::Auth`]; everything else keeps its own variant.
    #[instrument(skip(self, token))]
    pub async fn search_page(
        &self,
        keyword: &str,
        page: u32,
        token: &str,
    ) -> Result<SearchPage, SearchError> {
        let (status, body) = self.send(keyword, page, self.page_size, token).await?;

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(SearchError::Auth(format!("HTTP {}", status.as_u16())));
        }

        if !status.is_success() {
            warn!(status = %status, "Search request failed");
            return Err(SearchError::Status {
                status: status.as_u16(),
                body: truncate_body(&body, ERROR_BODY_CHARS),
            });
        }

        let envelope: SearchEnvelope = serde_json::from_str(&body)
            .map_err(|e| SearchError::Decode(format!("Failed to parse response: {e}")))?;

        if envelope.success == Some(false) {
            let msg = envelope.msg.unwrap_or_default();
            return Err(if is_auth_message(&msg) {
                SearchError::Auth(msg)
            } else {
                SearchError::Api(msg)
            });
        }

        let page = envelope.data.unwrap_or_default();
        debug!(items = page.items.len(), has_more = page.has_more, "Received search page");
        Ok(page)
    }

    /// Probes a credential with a one-item search.
    #[instrument(skip(self, token))]
    pub async fn probe(&self, token: &str) -> ProbeVerdict {
        let (status, body) = match self.send(PROBE_KEYWORD, 1, 1, token).await {
            Ok(result) => result,
            Err(e) => return ProbeVerdict::Inconclusive(e.to_string()),
        };

        let envelope = serde_json::from_str::<SearchEnvelope>(&body).ok();
        let success = envelope.as_ref().and_then(|e| e.success);
        let message = envelope.as_ref().and_then(|e| e.msg.as_deref());

        if status.is_success() && envelope.is_none() {
            return ProbeVerdict::Inconclusive("unparseable probe response".to_string());
        }

        ProbeVerdict::from_response(status.as_u16(), success, message)
    }
}
