// src/transform/pulselive.rs

//! Parser for the PulseLive content API.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use super::Transformer;
use crate::error::{AppError, Result};
use crate::models::{Article, PageInfo, Tag};

pub const NAME: &str = "pulselive";

#[derive(Debug, Deserialize)]
struct PulseLiveResponse {
    #[serde(rename = "pageInfo", default)]
    page_info: Option<PageInfo>,
    #[serde(default)]
    content: Vec<PulseLiveArticle>,
}

#[derive(Debug, Deserialize)]
struct PulseLiveArticle {
    id: i64,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    body: String,
    /// RFC3339 publication date, may be empty
    #[serde(default)]
    date: String,
    /// Millisecond epoch of the last modification
    #[serde(rename = "lastModified", default)]
    last_modified: i64,
    #[serde(rename = "canonicalUrl", default)]
    canonical_url: String,
    #[serde(default)]
    tags: Vec<PulseLiveTag>,
    #[serde(rename = "leadMedia", default)]
    lead_media: LeadMedia,
}

#[derive(Debug, Deserialize)]
struct PulseLiveTag {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    label: String,
}

#[derive(Debug, Default, Deserialize)]
struct LeadMedia {
    #[serde(rename = "imageUrl", default)]
    image_url: String,
}

pub struct PulseLiveTransformer;

impl Transformer for PulseLiveTransformer {
    fn transform(&self, body: &[u8]) -> Result<(Vec<Article>, Option<PageInfo>)> {
        let resp: PulseLiveResponse = serde_json::from_slice(body)
            .map_err(|e| AppError::parse(NAME, format!("failed to decode response: {e}")))?;

        let articles = resp.content.into_iter().map(normalize).collect();
        Ok((articles, resp.page_info))
    }
}

fn normalize(pa: PulseLiveArticle) -> Article {
    // Use description if available, fall back to summary
    let description = if pa.description.is_empty() {
        pa.summary.clone()
    } else {
        pa.description
    };

    let modified_at = millis_to_datetime(pa.last_modified);

    // Prefer the native RFC3339 date over the millisecond epoch
    let published_at = if pa.date.is_empty() {
        modified_at
    } else {
        DateTime::parse_from_rfc3339(&pa.date)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or(modified_at)
    };

    let tags = pa
        .tags
        .into_iter()
        .map(|t| Tag {
            id: t.id,
            label: t.label,
        })
        .collect();

    Article {
        id: format!("{NAME}_{}", pa.id),
        source: NAME.to_string(),
        external_id: pa.id.to_string(),
        kind: pa.kind,
        title: pa.title,
        description,
        summary: pa.summary,
        body: pa.body,
        url: pa.canonical_url,
        image_url: pa.lead_media.image_url,
        tags,
        published_at,
        updated_at: modified_at,
        fetched_at: Utc::now(),
        content_hash: String::new(),
    }
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(millis / 1000, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "pageInfo": {"page": 0, "numPages": 4, "pageSize": 2, "numEntries": 7},
        "content": [
            {
                "id": 101,
                "type": "text",
                "title": "Match report",
                "description": "Short description",
                "summary": "Summary text",
                "body": "<p>Body</p>",
                "date": "2024-05-01T12:00:00Z",
                "lastModified": 1714564800000,
                "canonicalUrl": "https://example.com/match-report",
                "tags": [{"id": 3, "label": "cricket"}],
                "leadMedia": {"imageUrl": "https://example.com/lead.jpg"}
            },
            {
                "id": 102,
                "type": "text",
                "title": "No extras",
                "summary": "Only summary",
                "body": "b",
                "date": "",
                "lastModified": 1714564800000,
                "canonicalUrl": "https://example.com/no-extras"
            }
        ]
    }"#;

    #[test]
    fn parses_page_info_and_articles() {
        let (articles, page_info) = PulseLiveTransformer.transform(SAMPLE.as_bytes()).unwrap();
        let page_info = page_info.unwrap();
        assert_eq!(page_info.num_pages, 4);
        assert_eq!(articles.len(), 2);
    }

    #[test]
    fn synthesizes_prefixed_id() {
        let (articles, _) = PulseLiveTransformer.transform(SAMPLE.as_bytes()).unwrap();
        assert_eq!(articles[0].id, "pulselive_101");
        assert_eq!(articles[0].external_id, "101");
        assert_eq!(articles[0].source, "pulselive");
    }

    #[test]
    fn prefers_native_date_over_epoch() {
        let (articles, _) = PulseLiveTransformer.transform(SAMPLE.as_bytes()).unwrap();
        assert_eq!(
            articles[0].published_at,
            DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z").unwrap()
        );
        // Empty date falls back to lastModified millis
        assert_eq!(articles[1].published_at.timestamp(), 1714564800);
    }

    #[test]
    fn missing_description_falls_back_to_summary() {
        let (articles, _) = PulseLiveTransformer.transform(SAMPLE.as_bytes()).unwrap();
        assert_eq!(articles[0].description, "Short description");
        assert_eq!(articles[1].description, "Only summary");
    }

    #[test]
    fn missing_optional_fields_default_to_empty() {
        let (articles, _) = PulseLiveTransformer.transform(SAMPLE.as_bytes()).unwrap();
        assert!(articles[1].tags.is_empty());
        assert!(articles[1].image_url.is_empty());
    }

    #[test]
    fn malformed_payload_is_a_parse_error() {
        let err = PulseLiveTransformer.transform(b"not json").unwrap_err();
        assert!(matches!(err, AppError::Parse { .. }));
    }
}
