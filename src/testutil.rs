// src/testutil.rs

//! Shared fixtures for unit tests.

use chrono::{TimeZone, Utc};

use crate::models::Article;

/// Build a minimal article for `source` with the given external id.
pub fn article(source: &str, external_id: &str) -> Article {
    Article {
        id: format!("{source}_{external_id}"),
        source: source.to_string(),
        external_id: external_id.to_string(),
        kind: "text".to_string(),
        title: format!("Title {external_id}"),
        description: String::new(),
        summary: format!("Summary {external_id}"),
        body: format!("Body {external_id}"),
        url: format!("https://example.com/{external_id}"),
        image_url: String::new(),
        tags: Vec::new(),
        published_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        fetched_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        content_hash: String::new(),
    }
}
