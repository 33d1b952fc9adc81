// src/store/mod.rs

//! Article persistence backends.

pub mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Article;

/// Document store holding the normalized articles, keyed by `Article.id`.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert or replace a single article by id.
    async fn upsert(&self, article: &Article) -> Result<()>;

    /// Unordered batch upsert.
    ///
    /// Every item is attempted; the first error (if any) is returned after
    /// the whole batch has been tried.
    async fn bulk_upsert(&self, articles: &[Article]) -> Result<()>;

    /// Most recent article for `source` by publication time.
    async fn get_last_fetched(&self, source: &str) -> Result<Option<Article>>;

    /// Projection of `{id -> content_hash}` restricted to `ids`.
    ///
    /// Absent ids are omitted; records that fail to decode are skipped.
    async fn get_content_hashes(&self, ids: &[String]) -> Result<HashMap<String, String>>;
}
