// src/queue/producer.rs

//! Kafka producer for article events.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use tracing::{debug, info};

use super::EventProducer;
use crate::error::Result;
use crate::models::Article;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct KafkaEventProducer {
    producer: FutureProducer,
    topic: String,
}

impl KafkaEventProducer {
    pub fn new(brokers: &[String], topic: impl Into<String>) -> Result<Self> {
        let topic = topic.into();
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers.join(","))
            .set("message.timeout.ms", "30000")
            .create()?;

        info!(brokers = ?brokers, topic = %topic, "kafka producer initialized");
        Ok(Self { producer, topic })
    }

    /// Block until every in-flight delivery settles; called at shutdown.
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer.flush(Timeout::After(timeout))?;
        Ok(())
    }
}

#[async_trait]
impl EventProducer for KafkaEventProducer {
    async fn publish(&self, article: &Article) -> Result<()> {
        let payload = serde_json::to_vec(article)?;
        let record = FutureRecord::to(&self.topic)
            .key(article.id.as_str())
            .payload(&payload);

        self.producer
            .send(record, Timeout::After(DELIVERY_TIMEOUT))
            .await
            .map_err(|(e, _)| e)?;

        debug!(id = %article.id, source = %article.source, "published article event");
        Ok(())
    }

    async fn publish_batch(&self, articles: &[Article]) -> Result<()> {
        let payloads = articles
            .iter()
            .map(|a| Ok((a.id.clone(), serde_json::to_vec(a)?)))
            .collect::<Result<Vec<_>>>()?;

        let sends = payloads.iter().map(|(key, payload)| {
            self.producer.send(
                FutureRecord::to(&self.topic).key(key).payload(payload),
                Timeout::After(DELIVERY_TIMEOUT),
            )
        });

        let mut first_error = None;
        for result in futures::future::join_all(sends).await {
            if let Err((e, _)) = result {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
