use serde::{Deserialize, Serialize};

use super::key::NormalizedKey;
use crate::error::{FabulaError, Result};

/// A fable as emitted by the crawler.
///
/// Immutable once validated; `word_count` is the whitespace-delimited token
/// count of `content` as computed upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Title as extracted from the page body.
    pub title: String,

    /// Title as listed in the site index.
    pub original_title: String,

    /// Page the record was scraped from.
    #[serde(rename = "url", alias = "source_url")]
    pub source_url: String,

    /// Full page text.
    pub content: String,

    /// Whitespace-delimited token count of `content`.
    pub word_count: usize,
}

impl RawRecord {
    /// Builds a record, deriving `word_count` from `content`.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        source_url: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let content = content.into();
        Self {
            original_title: title.clone(),
            word_count: word_count(&content),
            title,
            source_url: source_url.into(),
            content,
        }
    }
}

/// Whitespace-delimited token count.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Lenient wire form of a crawler record. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecordDraft {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default, rename = "url", alias = "source_url")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub word_count: Option<usize>,
}

impl RawRecordDraft {
    /// Source URL for diagnostics, empty when the crawler did not record one.
    #[must_use]
    pub fn source_url(&self) -> &str {
        self.source_url.as_deref().unwrap_or("")
    }

    /// Validates the draft into a [`RawRecord`].
    ///
    /// # Errors
    ///
    /// Returns `FabulaError::MalformedRecord` naming the first missing field
    /// among `title`, `content` and `word_count`. A blank title counts as missing.
    pub fn validate(self) -> Result<RawRecord> {
        let source_url = self.source_url.unwrap_or_default();
        let missing = |field: &'static str| FabulaError::MalformedRecord {
            source_url: source_url.clone(),
            field,
        };

        let title = match self.title {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(missing("title")),
        };
        let content = self.content.ok_or_else(|| missing("content"))?;
        let word_count = self.word_count.ok_or_else(|| missing("word_count"))?;

        Ok(RawRecord {
            original_title: self.original_title.unwrap_or_else(|| title.clone()),
            title,
            source_url,
            content,
            word_count,
        })
    }
}

impl From<RawRecord> for RawRecordDraft {
    fn from(record: RawRecord) -> Self {
        Self {
            title: Some(record.title),
            original_title: Some(record.original_title),
            source_url: Some(record.source_url),
            content: Some(record.content),
            word_count: Some(record.word_count),
        }
    }
}

/// The surviving representative of a duplicate group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Grouping key the record was selected under.
    pub key: NormalizedKey,

    /// The selected record, unchanged.
    pub record: RawRecord,

    /// Score of the winner, `None` when the group was a singleton.
    pub score: Option<f64>,

    /// Number of candidates the record was selected from.
    pub group_size: usize,
}

/// Audit entry for a candidate that lost to a canonical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedEntry {
    /// Source URL reduced to its audit key.
    pub url_key: String,
    pub title: String,
    pub word_count: usize,
    pub key: NormalizedKey,
    pub score: f64,
}
