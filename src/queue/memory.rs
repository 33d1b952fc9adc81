// src/queue/memory.rs

//! In-memory event producer for tests and local development.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::EventProducer;
use crate::error::{AppError, Result};
use crate::models::Article;

#[derive(Default)]
pub struct MemoryProducer {
    published: Mutex<Vec<Article>>,
    failing: AtomicBool,
}

impl MemoryProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of everything published so far.
    pub async fn published(&self) -> Vec<Article> {
        self.published.lock().await.clone()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::validation("simulated publish failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl EventProducer for MemoryProducer {
    async fn publish(&self, article: &Article) -> Result<()> {
        self.check()?;
        self.published.lock().await.push(article.clone());
        Ok(())
    }

    async fn publish_batch(&self, articles: &[Article]) -> Result<()> {
        self.check()?;
        self.published.lock().await.extend_from_slice(articles);
        Ok(())
    }
}
