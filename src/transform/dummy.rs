// src/transform/dummy.rs

//! Minimal parser used by the local mock feed.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use super::Transformer;
use crate::error::{AppError, Result};
use crate::models::{Article, PageInfo};

pub const NAME: &str = "dummy";

#[derive(Debug, Deserialize)]
struct DummyResponse {
    #[serde(default)]
    items: Vec<DummyArticle>,
}

#[derive(Debug, Deserialize)]
struct DummyArticle {
    id: String,
    #[serde(default)]
    headline: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    timestamp: String,
}

pub struct DummyTransformer;

impl Transformer for DummyTransformer {
    fn transform(&self, body: &[u8]) -> Result<(Vec<Article>, Option<PageInfo>)> {
        let resp: DummyResponse = serde_json::from_slice(body)
            .map_err(|e| AppError::parse(NAME, format!("failed to decode response: {e}")))?;

        let articles: Vec<Article> = resp.items.into_iter().map(normalize).collect();

        // The mock feed is a single page
        let page_info = PageInfo {
            page: 0,
            num_pages: 1,
            page_size: 20,
            num_entries: articles.len() as u32,
        };

        Ok((articles, Some(page_info)))
    }
}

fn normalize(item: DummyArticle) -> Article {
    let ts = DateTime::parse_from_rfc3339(&item.timestamp)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc.timestamp_opt(0, 0).unwrap());

    Article {
        id: format!("{NAME}_{}", item.id),
        source: NAME.to_string(),
        external_id: item.id.clone(),
        kind: String::new(),
        title: item.headline,
        description: String::new(),
        summary: truncate_summary(&item.content),
        body: item.content,
        url: format!("http://dummy/{}", item.id),
        image_url: String::new(),
        tags: Vec::new(),
        published_at: ts,
        updated_at: ts,
        fetched_at: Utc::now(),
        content_hash: String::new(),
    }
}

fn truncate_summary(content: &str) -> String {
    let prefix: String = content.chars().take(10).collect();
    if prefix.len() < content.len() {
        format!("{prefix}...")
    } else {
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_items_as_single_page() {
        let body = br#"{"items":[
            {"id":"7","headline":"Headline","content":"A content body long enough","timestamp":"2024-05-01T12:00:00Z"}
        ]}"#;
        let (articles, page_info) = DummyTransformer.transform(body).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(page_info.unwrap().num_pages, 1);

        let a = &articles[0];
        assert_eq!(a.id, "dummy_7");
        assert_eq!(a.source, "dummy");
        assert_eq!(a.summary, "A content ...");
        assert_eq!(a.url, "http://dummy/7");
    }

    #[test]
    fn short_content_is_not_truncated() {
        assert_eq!(truncate_summary("short"), "short");
        assert_eq!(truncate_summary(""), "");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let summary = truncate_summary("날씨가 좋아서 산책을 갔다");
        assert!(summary.ends_with("..."));
    }
}
