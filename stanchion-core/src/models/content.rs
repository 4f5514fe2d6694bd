//! Normalized content records.
//!
//! The search API returns loosely shaped items; providers normalize them into
//! [`ContentRecord`]s before they are cached or rendered into prompt text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One normalized post/note returned by the content search API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    /// Upstream identifier.
    pub id: String,
    /// Post title.
    pub title: String,
    /// Body text (may be truncated by the upstream).
    #[serde(default)]
    pub content: String,
    /// Author display name.
    #[serde(default)]
    pub author: Option<String>,
    /// Like count.
    #[serde(default)]
    pub likes: u64,
    /// Comment count.
    #[serde(default)]
    pub comments: u64,
    /// Collect/bookmark count.
    #[serde(default)]
    pub collects: u64,
    /// Canonical link to the post.
    #[serde(default)]
    pub url: Option<String>,
    /// Hashtags attached to the post.
    #[serde(default)]
    pub tags: Vec<String>,
    /// When the post was published.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl ContentRecord {
    /// Creates a record with only the required fields.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: String::new(),
            author: None,
            likes: 0,
            comments: 0,
            collects: 0,
            url: None,
            tags: Vec::new(),
            published_at: None,
        }
    }

    /// Sets the body text.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Sets the engagement counters.
    pub fn with_engagement(mut self, likes: u64, comments: u64, collects: u64) -> Self {
        self.likes = likes;
        self.comments = comments;
        self.collects = collects;
        self
    }

    /// Total engagement used for ranking.
    pub fn engagement(&self) -> u64 {
        self.likes
            .saturating_add(self.comments)
            .saturating_add(self.collects)
    }

    /// Validates the record.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidData` if the id is blank or both title and
    /// content are empty.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.trim().is_empty() {
            return Err(CoreError::InvalidData("record id is empty".to_string()));
        }
        if self.title.trim().is_empty() && self.content.trim().is_empty() {
            return Err(CoreError::InvalidData(format!(
                "record {} has neither title nor content",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engagement_saturates() {
        let record = ContentRecord::new("1", "t").with_engagement(u64::MAX, 5, 5);
        assert_eq!(record.engagement(), u64::MAX);
    }

    #[test]
    fn test_validate() {
        assert!(ContentRecord::new("1", "title").validate().is_ok());
        assert!(ContentRecord::new(" ", "title").validate().is_err());
        assert!(ContentRecord::new("1", "").validate().is_err());
        assert!(ContentRecord::new("1", "").with_content("body").validate().is_ok());
    }
}
