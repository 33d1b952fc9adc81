// src/service/sync.rs

//! CMS sync: forwards consumed article events to the downstream CMS.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::Result;
use crate::gateway::CmsGateway;
use crate::metrics::{CMS_ARTICLES_PROCESSED, CMS_SYNC_DURATION, CMS_SYNC_ERRORS};
use crate::models::Article;
use crate::queue::{EventHandler, KafkaArticleConsumer};

pub struct CmsSyncService {
    gateway: Arc<dyn CmsGateway>,
}

impl CmsSyncService {
    pub fn new(gateway: Arc<dyn CmsGateway>) -> Self {
        Self { gateway }
    }

    /// Consume the main topic until shutdown.
    pub async fn run(self: Arc<Self>, consumer: KafkaArticleConsumer, cancel: CancellationToken) {
        info!("starting cms sync service");
        consumer.run(cancel, self).await;
    }
}

#[async_trait]
impl EventHandler for CmsSyncService {
    async fn handle(&self, article: &Article) -> Result<()> {
        info!(id = %article.id, title = %article.title, "consuming event for sync");

        let start = Instant::now();
        let result = self.gateway.sync_article(article).await;
        histogram!(CMS_SYNC_DURATION).record(start.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                counter!(CMS_ARTICLES_PROCESSED, "source" => article.source.clone()).increment(1);
                Ok(())
            }
            Err(e) => {
                error!(id = %article.id, error = %e, "failed to sync article to cms");
                counter!(CMS_SYNC_ERRORS, "source" => article.source.clone()).increment(1);
                Err(e)
            }
        }
    }
}
