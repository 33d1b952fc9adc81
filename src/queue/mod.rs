// src/queue/mod.rs

//! Event channel integration (main topic and dead-letter topic).

mod consumer;
pub mod memory;
mod producer;

pub use consumer::{EventHandler, KafkaArticleConsumer, CMS_SYNC_GROUP};
pub use memory::MemoryProducer;
pub use producer::KafkaEventProducer;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Article;

/// Publishes article events, keyed by `Article.id` so partitioning spreads
/// load across consumers.
#[async_trait]
pub trait EventProducer: Send + Sync {
    async fn publish(&self, article: &Article) -> Result<()>;

    /// Publish a batch; every message is attempted, the first error is
    /// returned after all deliveries settle.
    async fn publish_batch(&self, articles: &[Article]) -> Result<()>;
}
