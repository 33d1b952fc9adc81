// src/metrics.rs

//! Metric names and the Prometheus recorder.
//!
//! All series are recorded through the `metrics` facade macros; the handle
//! renders the exposition text for the operator endpoint.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const ARTICLES_INGESTED: &str = "articles_ingested_total";
pub const ARTICLES_DUPLICATES_SKIPPED: &str = "articles_duplicates_skipped_total";
pub const ARTICLES_PUBLISHED: &str = "articles_published_total";
pub const PUBLISH_ERRORS: &str = "publish_errors_total";
pub const ARTICLE_PARSE_ERRORS: &str = "article_parse_errors_total";
pub const INGESTION_DURATION: &str = "ingestion_duration_seconds";
pub const PUBLISH_DURATION: &str = "publish_duration_seconds";
pub const ARTICLE_FRESHNESS: &str = "article_freshness_seconds";
pub const WORKER_ACTIVE_COUNT: &str = "worker_active_count";
pub const CIRCUIT_BREAKER_STATE: &str = "circuit_breaker_state";
pub const CMS_SYNC_DURATION: &str = "cms_sync_duration_seconds";
pub const CMS_SYNC_ERRORS: &str = "cms_sync_errors_total";
pub const CMS_ARTICLES_PROCESSED: &str = "cms_articles_processed_total";
pub const DLQ_MESSAGES_PUBLISHED: &str = "dlq_messages_published_total";

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and register series metadata.
    pub fn init() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_counter!(ARTICLES_INGESTED, "Total number of articles ingested");
        describe_counter!(
            ARTICLES_DUPLICATES_SKIPPED,
            "Total number of articles skipped because their content was unchanged"
        );
        describe_counter!(
            ARTICLES_PUBLISHED,
            "Total number of changed articles published to the event channel"
        );
        describe_counter!(PUBLISH_ERRORS, "Total number of event publish failures");
        describe_counter!(
            ARTICLE_PARSE_ERRORS,
            "Total number of upstream payloads that failed to parse"
        );
        describe_histogram!(INGESTION_DURATION, "Duration of batch processing");
        describe_histogram!(PUBLISH_DURATION, "Duration of event channel publishes");
        describe_histogram!(
            ARTICLE_FRESHNESS,
            "Age of ingested articles relative to their publication time"
        );
        describe_gauge!(
            WORKER_ACTIVE_COUNT,
            "Number of workers currently processing jobs"
        );
        describe_gauge!(
            CIRCUIT_BREAKER_STATE,
            "Breaker state per source: 0 closed, 1 half-open, 2 open"
        );
        describe_histogram!(CMS_SYNC_DURATION, "Duration of CMS synchronization calls");
        describe_counter!(CMS_SYNC_ERRORS, "Total number of CMS sync errors");
        describe_counter!(
            CMS_ARTICLES_PROCESSED,
            "Total number of articles successfully synced to the CMS"
        );
        describe_counter!(
            DLQ_MESSAGES_PUBLISHED,
            "Total number of messages diverted to the dead-letter channel"
        );

        Self { handle }
    }
}
