// src/models/article.rs

//! Normalized article representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A normalized news article as stored and published by the pipeline.
///
/// `id` is the primary key, synthesized by transformers as
/// `<source>_<external_id>` so it stays stable across fetches of the same
/// upstream entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    /// Globally unique identifier, `<source>_<external_id>`
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    /// Provider label, e.g. "pulselive"
    pub source: String,

    /// Opaque upstream identifier
    pub external_id: String,

    /// Content kind: "text", "video", etc.
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Article title
    pub title: String,

    /// Short description; falls back to summary when the upstream omits it
    #[serde(default)]
    pub description: String,

    /// Upstream summary
    #[serde(default)]
    pub summary: String,

    /// Full body content
    #[serde(default)]
    pub body: String,

    /// Canonical URL of the article
    pub url: String,

    /// Lead image URL (empty when the upstream has none)
    #[serde(default)]
    pub image_url: String,

    /// Content tags for categorization
    #[serde(default)]
    pub tags: Vec<Tag>,

    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,

    /// SHA-256 fingerprint of the content fields, hex-encoded
    #[serde(default)]
    pub content_hash: String,
}

impl Article {
    /// Compute the deterministic content fingerprint.
    ///
    /// Covers exactly source, URL, title, summary, and body, concatenated in
    /// that order with no separator. Timestamps, tags, and media are
    /// intentionally excluded so that metadata-only updates do not register
    /// as content changes.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source.as_bytes());
        hasher.update(self.url.as_bytes());
        hasher.update(self.title.as_bytes());
        hasher.update(self.summary.as_bytes());
        hasher.update(self.body.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A content tag/category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub label: String,
}
