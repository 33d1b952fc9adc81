// src/provider/mod.rs

//! Upstream providers: paginated fetching with retry and breaker discipline.

mod circuit_breaker;
mod generic;

pub use circuit_breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
pub use generic::GenericProvider;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::Article;

/// Per-page callback invoked synchronously with each page's articles.
pub type PageHandler<'a> = dyn FnMut(Vec<Article>) -> BoxFuture<'static, Result<()>> + Send + 'a;

/// An external news feed that can be crawled as a lazy page sequence.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Stream the upstream's pages, handing each page's articles to
    /// `handler`. Returns when the feed is exhausted or the crawl aborts.
    async fn crawl(&self, cancel: &CancellationToken, handler: &mut PageHandler<'_>) -> Result<()>;
}
