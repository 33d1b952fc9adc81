// src/queue/consumer.rs

//! Kafka consumer feeding the CMS sync service.
//!
//! Pinned to the durable `cms-sync-group` consumer group with auto-commit
//! disabled: the offset only advances once a message has been handled or
//! safely diverted to the dead-letter topic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{ClientConfig, Offset};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::EventProducer;
use crate::error::Result;
use crate::logging::ErrorSampler;
use crate::metrics::DLQ_MESSAGES_PUBLISHED;
use crate::models::Article;

pub const CMS_SYNC_GROUP: &str = "cms-sync-group";

/// Processes one article event from the main topic.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, article: &Article) -> Result<()>;
}

/// What to do with the consumed message's offset.
#[derive(Debug, PartialEq, Eq)]
enum Disposition {
    /// Commit: the message is handled or permanently diverted
    Advance,
    /// Leave the offset alone so the message is redelivered
    Hold,
}

pub struct KafkaArticleConsumer {
    consumer: StreamConsumer,
    dlq: Arc<dyn EventProducer>,
    sampler: ErrorSampler,
}

impl KafkaArticleConsumer {
    pub fn new(
        brokers: &[String],
        topic: &str,
        group_id: &str,
        dlq: Arc<dyn EventProducer>,
    ) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers.join(","))
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;
        consumer.subscribe(&[topic])?;

        info!(brokers = ?brokers, topic, group = group_id, "kafka consumer initialized");
        Ok(Self {
            consumer,
            dlq,
            sampler: ErrorSampler::new(10),
        })
    }

    /// Consume until shutdown, handing each decoded article to `handler`.
    pub async fn run(&self, cancel: CancellationToken, handler: Arc<dyn EventHandler>) {
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                m = self.consumer.recv() => m,
            };

            let message = match message {
                Ok(m) => m,
                Err(e) => {
                    if self.sampler.should_log("kafka_receive_error") {
                        error!(error = %e, "error reading kafka message");
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            debug!(partition = message.partition(), offset = message.offset(), "received event");

            match dispose(message.payload(), handler.as_ref(), self.dlq.as_ref()).await {
                Disposition::Advance => {
                    if let Err(e) = self.consumer.commit_message(&message, CommitMode::Async) {
                        warn!(error = %e, "failed to commit offset");
                    }
                }
                Disposition::Hold => {
                    // Rewind the in-memory position so the next poll
                    // redelivers this message.
                    if let Err(e) = self.consumer.seek(
                        message.topic(),
                        message.partition(),
                        Offset::Offset(message.offset()),
                        Duration::from_secs(5),
                    ) {
                        error!(error = %e, "failed to rewind to unhandled message");
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
        info!("kafka consumer stopped");
    }
}

/// Decide a single message's fate: decode, handle, and on handler failure
/// divert to the DLQ. The offset may only advance when the message is
/// handled, skipped as malformed, or safely parked on the DLQ.
async fn dispose(
    payload: Option<&[u8]>,
    handler: &dyn EventHandler,
    dlq: &dyn EventProducer,
) -> Disposition {
    let article: Article = match serde_json::from_slice(payload.unwrap_or_default()) {
        Ok(a) => a,
        Err(e) => {
            warn!(error = %e, "skipping malformed event payload");
            return Disposition::Advance;
        }
    };

    if let Err(e) = handler.handle(&article).await {
        error!(id = %article.id, error = %e, "error handling article event");

        info!(id = %article.id, "publishing failed event to DLQ");
        match dlq.publish(&article).await {
            Ok(()) => {
                counter!(DLQ_MESSAGES_PUBLISHED, "source" => article.source.clone()).increment(1);
                Disposition::Advance
            }
            Err(dlq_err) => {
                error!(id = %article.id, error = %dlq_err, "failed to publish to DLQ");
                Disposition::Hold
            }
        }
    } else {
        Disposition::Advance
    }
}
