// src/service/readiness.rs

//! Dependency readiness gate.
//!
//! Blocks startup until MongoDB and Kafka answer, polling every couple of
//! seconds. Waiting indefinitely beats crash-looping while a dev compose
//! stack comes up; shutdown still interrupts the wait.

use std::time::Duration;

use mongodb::bson::doc;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::ClientConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{AppError, Result};

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ReadinessWaiter {
    mongo: mongodb::Client,
    brokers: Vec<String>,
    topic: String,
}

impl ReadinessWaiter {
    pub fn new(mongo: mongodb::Client, brokers: Vec<String>, topic: impl Into<String>) -> Self {
        Self {
            mongo,
            brokers,
            topic: topic.into(),
        }
    }

    pub async fn wait_for_dependencies(&self, cancel: &CancellationToken) -> Result<()> {
        self.wait_for_mongo(cancel).await?;
        self.wait_for_kafka(cancel).await?;
        Ok(())
    }

    async fn wait_for_mongo(&self, cancel: &CancellationToken) -> Result<()> {
        info!("waiting for mongodb...");
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                _ = ticker.tick() => {}
            }

            match self
                .mongo
                .database("admin")
                .run_command(doc! { "ping": 1 })
                .await
            {
                Ok(_) => {
                    info!("mongodb is ready");
                    return Ok(());
                }
                Err(e) => warn!(error = %e, "mongodb not ready yet"),
            }
        }
    }

    async fn wait_for_kafka(&self, cancel: &CancellationToken) -> Result<()> {
        info!("waiting for kafka...");
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                _ = ticker.tick() => {}
            }

            let brokers = self.brokers.join(",");
            let topic = self.topic.clone();
            let probe = tokio::task::spawn_blocking(move || -> Result<()> {
                let consumer: BaseConsumer = ClientConfig::new()
                    .set("bootstrap.servers", brokers)
                    .create()?;
                consumer.fetch_metadata(Some(&topic), METADATA_TIMEOUT)?;
                Ok(())
            })
            .await;

            match probe {
                Ok(Ok(())) => {
                    info!("kafka is ready");
                    return Ok(());
                }
                Ok(Err(e)) => warn!(error = %e, "kafka not ready yet"),
                Err(e) => warn!(error = %e, "kafka readiness probe panicked"),
            }
        }
    }
}
