// src/store/memory.rs

//! In-memory article store for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::ArticleStore;
use crate::error::Result;
use crate::models::Article;

#[derive(Default)]
pub struct MemoryStore {
    articles: RwLock<HashMap<String, Article>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a stored article by id.
    pub async fn get(&self, id: &str) -> Option<Article> {
        self.articles.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.articles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.articles.read().await.is_empty()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn upsert(&self, article: &Article) -> Result<()> {
        self.articles
            .write()
            .await
            .insert(article.id.clone(), article.clone());
        Ok(())
    }

    async fn bulk_upsert(&self, articles: &[Article]) -> Result<()> {
        let mut guard = self.articles.write().await;
        for article in articles {
            guard.insert(article.id.clone(), article.clone());
        }
        Ok(())
    }

    async fn get_last_fetched(&self, source: &str) -> Result<Option<Article>> {
        let guard = self.articles.read().await;
        Ok(guard
            .values()
            .filter(|a| a.source == source)
            .max_by_key(|a| a.published_at)
            .cloned())
    }

    async fn get_content_hashes(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        let guard = self.articles.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                guard
                    .get(id)
                    .map(|a| (id.clone(), a.content_hash.clone()))
            })
            .collect())
    }
}
