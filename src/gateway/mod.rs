// src/gateway/mod.rs

//! Downstream CMS integration.

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::models::Article;

/// The downstream Content Management System.
#[async_trait]
pub trait CmsGateway: Send + Sync {
    async fn sync_article(&self, article: &Article) -> Result<()>;
}

/// Stand-in gateway that acknowledges every article.
///
/// The real CMS is not reachable from development environments; this keeps
/// the sync path exercisable end-to-end.
pub struct CmsMockGateway;

#[async_trait]
impl CmsGateway for CmsMockGateway {
    async fn sync_article(&self, article: &Article) -> Result<()> {
        info!(
            id = %article.id,
            title = %article.title,
            source = %article.source,
            published_at = %article.published_at,
            "cms sync"
        );
        Ok(())
    }
}
