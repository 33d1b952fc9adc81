// src/service/crawler.rs

//! The ingestion engine: provider loops, the worker pool, and the
//! change-detection pipeline.
//!
//! One scheduler task per source pushes jobs onto a bounded queue; a fixed
//! pool of workers drains it. Each crawl streams pages through
//! [`process_batch`](CrawlerService::process_batch), which fingerprints the
//! articles, persists the whole page, and publishes only the entries whose
//! content actually changed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::single_flight::SingleFlight;
use crate::error::Result;
use crate::metrics::{
    ARTICLES_DUPLICATES_SKIPPED, ARTICLES_INGESTED, ARTICLES_PUBLISHED, ARTICLE_FRESHNESS,
    INGESTION_DURATION, PUBLISH_DURATION, PUBLISH_ERRORS, WORKER_ACTIVE_COUNT,
};
use crate::models::Article;
use crate::provider::Provider;
use crate::queue::EventProducer;
use crate::store::ArticleStore;

/// A queued unit of work: crawl one provider once.
struct Job {
    provider: Arc<dyn Provider>,
}

pub struct CrawlerService {
    store: Arc<dyn ArticleStore>,
    producer: Arc<dyn EventProducer>,
    providers: Vec<Arc<dyn Provider>>,
    poll_interval: Duration,
    worker_count: usize,
    active_providers: SingleFlight,
}

impl CrawlerService {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        producer: Arc<dyn EventProducer>,
        providers: Vec<Arc<dyn Provider>>,
        poll_interval: Duration,
        worker_count: usize,
    ) -> Self {
        Self {
            store,
            producer,
            providers,
            poll_interval,
            worker_count,
            active_providers: SingleFlight::new(),
        }
    }

    /// Run until `cancel` fires, then drain and stop.
    ///
    /// Shutdown order is load-bearing: provider loops exit first, their
    /// senders drop and close the queue, and only then do workers drain the
    /// remaining jobs and exit. Reordering risks lost jobs or a deadlock on
    /// a full queue.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            workers = self.worker_count,
            providers = self.providers.len(),
            "starting news crawler service"
        );

        // Queue capacity leaves schedulers some slack before backpressure
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>(self.worker_count * 2);
        let jobs_rx = Arc::new(tokio::sync::Mutex::new(jobs_rx));

        let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(self.worker_count);
        for id in 0..self.worker_count {
            let service = self.clone();
            let rx = jobs_rx.clone();
            let cancel = cancel.clone();
            workers.push(tokio::spawn(async move {
                service.worker(id, rx, cancel).await;
            }));
        }

        let mut loops: Vec<JoinHandle<()>> = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            info!(provider = provider.name(), "starting provider loop");
            let service = self.clone();
            let provider = provider.clone();
            let tx = jobs_tx.clone();
            let cancel = cancel.clone();
            loops.push(tokio::spawn(async move {
                service.provider_loop(provider, tx, cancel).await;
            }));
        }
        // Workers observe queue closure only once every sender is gone
        drop(jobs_tx);

        cancel.cancelled().await;
        info!("shutdown requested, stopping news crawler service");

        for handle in loops {
            let _ = handle.await;
        }
        info!("all provider loops stopped");

        for handle in workers {
            let _ = handle.await;
        }
        info!("all workers stopped");
    }

    /// Scheduler for one source: an immediate job, then one per tick.
    /// The bounded send blocks when workers are saturated (backpressure).
    async fn provider_loop(
        &self,
        provider: Arc<dyn Provider>,
        tx: mpsc::Sender<Job>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(self.poll_interval);

        loop {
            // First tick fires immediately
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let job = Job {
                provider: provider.clone(),
            };
            tokio::select! {
                _ = cancel.cancelled() => return,
                sent = tx.send(job) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    }

    async fn worker(
        &self,
        id: usize,
        jobs: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
        cancel: CancellationToken,
    ) {
        info!(worker_id = id, "worker started");

        loop {
            // Hold the receiver lock only for the claim itself
            let job = { jobs.lock().await.recv().await };
            let Some(job) = job else {
                break; // queue closed and drained
            };

            let name = job.provider.name().to_string();
            let Some(_guard) = self.active_providers.try_acquire(&name) else {
                warn!(provider = %name, worker_id = id, "skipping concurrent run");
                continue;
            };

            gauge!(WORKER_ACTIVE_COUNT).increment(1.0);
            self.process_provider(&cancel, job.provider.as_ref()).await;
            gauge!(WORKER_ACTIVE_COUNT).decrement(1.0);
        }

        info!(worker_id = id, "worker stopped");
    }

    async fn process_provider(&self, cancel: &CancellationToken, provider: &dyn Provider) {
        let name = provider.name().to_string();
        let span = info_span!("process_provider", provider = %name);

        async {
            debug!("starting crawl");

            let store = self.store.clone();
            let producer = self.producer.clone();
            let handler_name = name.clone();
            let mut handler = move |articles: Vec<Article>| {
                let store = store.clone();
                let producer = producer.clone();
                let name = handler_name.clone();
                async move {
                    process_batch(store.as_ref(), producer.as_ref(), &name, articles)
                        .instrument(info_span!("process_batch", provider = %name))
                        .await
                }
                .boxed()
            };

            if let Err(e) = provider.crawl(cancel, &mut handler).await {
                error!(error = %e, "crawl failed");
                counter!(ARTICLES_INGESTED, "source" => name.clone(), "status" => "error_crawl")
                    .increment(1);
            }
        }
        .instrument(span)
        .await
    }
}

/// Fingerprint, diff against stored hashes, persist, and emit one page of
/// articles from a single provider.
async fn process_batch(
    store: &dyn ArticleStore,
    producer: &dyn EventProducer,
    source: &str,
    articles: Vec<Article>,
) -> Result<()> {
    let start = std::time::Instant::now();

    // Dedup within the batch; the earlier occurrence wins
    let mut seen = std::collections::HashSet::new();
    let mut articles: Vec<Article> = articles
        .into_iter()
        .filter(|a| seen.insert(a.id.clone()))
        .collect();

    if articles.is_empty() {
        return Ok(());
    }

    let now = Utc::now();
    let mut ids = Vec::with_capacity(articles.len());
    for article in &mut articles {
        article.fetched_at = now;
        article.content_hash = article.compute_hash();
        ids.push(article.id.clone());
    }

    let existing: HashMap<String, String> = store.get_content_hashes(&ids).await?;

    let mut changed: Vec<Article> = Vec::new();
    let mut skipped: u64 = 0;
    for article in &articles {
        match existing.get(&article.id) {
            None => {
                info!(source, id = %article.id, "article new");
                changed.push(article.clone());
            }
            Some(old_hash) if *old_hash != article.content_hash => {
                info!(source, id = %article.id, "article changed");
                changed.push(article.clone());
            }
            Some(_) => skipped += 1,
        }
    }

    if skipped > 0 {
        counter!(ARTICLES_DUPLICATES_SKIPPED, "source" => source.to_string()).increment(skipped);
    }

    histogram!(INGESTION_DURATION, "source" => source.to_string())
        .record(start.elapsed().as_secs_f64());
    counter!(ARTICLES_INGESTED, "source" => source.to_string(), "status" => "success")
        .increment(articles.len() as u64);
    // Touch the publish series so dashboards see them even while 0
    counter!(ARTICLES_PUBLISHED, "source" => source.to_string()).increment(0);
    counter!(PUBLISH_ERRORS, "source" => source.to_string()).increment(0);

    for article in &articles {
        if article.published_at.timestamp() > 0 {
            let age = (now - article.published_at).num_milliseconds() as f64 / 1000.0;
            histogram!(ARTICLE_FRESHNESS, "source" => source.to_string()).record(age.max(0.0));
        }
    }

    // The store is the system of record: persist everything first so
    // fetched_at advances even for unchanged entries.
    store.bulk_upsert(&articles).await?;

    if !changed.is_empty() {
        info!(source, count = changed.len(), "publishing changed articles");

        let publish_start = std::time::Instant::now();
        let published = producer.publish_batch(&changed).await;
        histogram!(PUBLISH_DURATION, "source" => source.to_string())
            .record(publish_start.elapsed().as_secs_f64());

        match published {
            Ok(()) => {
                counter!(ARTICLES_PUBLISHED, "source" => source.to_string())
                    .increment(changed.len() as u64);
            }
            Err(e) => {
                // The batch is persisted; downstream re-converges next tick
                error!(source, count = changed.len(), error = %e, "error publishing article batch");
                counter!(PUBLISH_ERRORS, "source" => source.to_string()).increment(1);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::AppError;
    use crate::models::Tag;
    use crate::provider::PageHandler;
    use crate::queue::MemoryProducer;
    use crate::store::MemoryStore;
    use crate::testutil;

    fn prepared(article: &Article) -> Article {
        let mut a = article.clone();
        a.content_hash = a.compute_hash();
        a
    }

    #[tokio::test]
    async fn new_articles_are_stored_and_published() {
        let store = MemoryStore::new();
        let producer = MemoryProducer::new();
        let article = testutil::article("s", "1");

        process_batch(&store, &producer, "s", vec![article.clone()])
            .await
            .unwrap();

        let stored = store.get("s_1").await.expect("article persisted");
        assert_eq!(stored.content_hash, article.compute_hash());
        assert!(stored.fetched_at > article.fetched_at);

        let events = producer.published().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "s_1");
    }

    #[tokio::test]
    async fn unchanged_refetch_advances_fetched_at_without_event() {
        let store = MemoryStore::new();
        let producer = MemoryProducer::new();
        let article = testutil::article("s", "1");

        process_batch(&store, &producer, "s", vec![article.clone()])
            .await
            .unwrap();
        let first = store.get("s_1").await.unwrap();

        process_batch(&store, &producer, "s", vec![article.clone()])
            .await
            .unwrap();
        let second = store.get("s_1").await.unwrap();

        assert!(second.fetched_at >= first.fetched_at);
        assert_eq!(producer.published().await.len(), 1, "no second event");
    }

    #[tokio::test]
    async fn content_change_emits_event_with_new_hash() {
        let store = MemoryStore::new();
        let producer = MemoryProducer::new();
        let article = testutil::article("s", "1");

        process_batch(&store, &producer, "s", vec![article.clone()])
            .await
            .unwrap();
        let old_hash = store.get("s_1").await.unwrap().content_hash;

        let mut updated = article.clone();
        updated.body = "rewritten".to_string();
        process_batch(&store, &producer, "s", vec![updated.clone()])
            .await
            .unwrap();

        let new_hash = store.get("s_1").await.unwrap().content_hash;
        assert_ne!(new_hash, old_hash);
        assert_eq!(new_hash, updated.compute_hash());
        assert_eq!(producer.published().await.len(), 2);
    }

    #[tokio::test]
    async fn tag_only_change_updates_store_without_event() {
        let store = MemoryStore::new();
        let producer = MemoryProducer::new();
        let article = testutil::article("s", "1");

        process_batch(&store, &producer, "s", vec![article.clone()])
            .await
            .unwrap();

        let mut tagged = article.clone();
        tagged.tags.push(Tag {
            id: 42,
            label: "breaking".to_string(),
        });
        process_batch(&store, &producer, "s", vec![tagged.clone()])
            .await
            .unwrap();

        assert_eq!(store.get("s_1").await.unwrap().tags.len(), 1);
        assert_eq!(producer.published().await.len(), 1, "tags are not content");
    }

    #[tokio::test]
    async fn mixed_batch_publishes_only_new_and_changed() {
        let store = MemoryStore::new();
        let producer = MemoryProducer::new();

        let unchanged = prepared(&testutil::article("s", "1"));
        let mut changed = prepared(&testutil::article("s", "2"));
        store.bulk_upsert(&[unchanged.clone(), changed.clone()]).await.unwrap();

        changed.title = "Edited".to_string();
        let fresh = testutil::article("s", "3");

        process_batch(
            &store,
            &producer,
            "s",
            vec![unchanged.clone(), changed.clone(), fresh.clone()],
        )
        .await
        .unwrap();

        // Everything persisted, including the unchanged entry
        assert_eq!(store.len().await, 3);

        let mut published: Vec<String> =
            producer.published().await.into_iter().map(|a| a.id).collect();
        published.sort();
        assert_eq!(published, vec!["s_2".to_string(), "s_3".to_string()]);
    }

    #[tokio::test]
    async fn in_batch_duplicates_keep_the_first_occurrence() {
        let store = MemoryStore::new();
        let producer = MemoryProducer::new();

        let first = testutil::article("s", "1");
        let mut shadow = testutil::article("s", "1");
        shadow.title = "Later copy".to_string();

        process_batch(&store, &producer, "s", vec![first.clone(), shadow])
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("s_1").await.unwrap().title, first.title);
        assert_eq!(producer.published().await.len(), 1);
    }

    #[tokio::test]
    async fn publish_failure_does_not_fail_the_batch() {
        let store = MemoryStore::new();
        let producer = MemoryProducer::new();
        producer.set_failing(true);

        process_batch(&store, &producer, "s", vec![testutil::article("s", "1")])
            .await
            .unwrap();

        assert_eq!(store.len().await, 1, "store remains the system of record");
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let store = MemoryStore::new();
        let producer = MemoryProducer::new();
        process_batch(&store, &producer, "s", Vec::new()).await.unwrap();
        assert!(store.is_empty().await);
        assert!(producer.published().await.is_empty());
    }

    /// Provider stub that serves a fixed number of single-article pages.
    struct ScriptedProvider {
        name: String,
        pages: u32,
        crawls: AtomicU32,
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn crawl(
            &self,
            _cancel: &CancellationToken,
            handler: &mut PageHandler<'_>,
        ) -> Result<()> {
            self.crawls.fetch_add(1, Ordering::SeqCst);
            for page in 0..self.pages {
                let article = testutil::article(&self.name, &page.to_string());
                handler(vec![article]).await?;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn service_drains_queue_and_shuts_down_cleanly() {
        let store = Arc::new(MemoryStore::new());
        let producer = Arc::new(MemoryProducer::new());
        let provider = Arc::new(ScriptedProvider {
            name: "scripted".to_string(),
            pages: 3,
            crawls: AtomicU32::new(0),
        });

        let service = Arc::new(CrawlerService::new(
            store.clone(),
            producer.clone(),
            vec![provider.clone()],
            Duration::from_secs(3600),
            2,
        ));

        let cancel = CancellationToken::new();
        let run = tokio::spawn(service.clone().run(cancel.clone()));

        // Allow the immediate first job to be processed
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("shutdown must not hang")
            .unwrap();

        assert!(provider.crawls.load(Ordering::SeqCst) >= 1);
        assert_eq!(store.len().await, 3);
        assert_eq!(producer.published().await.len(), 3);
    }

    /// Provider stub that parks until cancelled, to hold the flight slot.
    struct ParkedProvider {
        name: String,
        started: tokio::sync::Notify,
    }

    #[async_trait]
    impl Provider for ParkedProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn crawl(
            &self,
            cancel: &CancellationToken,
            _handler: &mut PageHandler<'_>,
        ) -> Result<()> {
            self.started.notify_one();
            cancel.cancelled().await;
            Err(AppError::Cancelled)
        }
    }

    #[tokio::test]
    async fn overlapping_jobs_for_one_provider_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let producer = Arc::new(MemoryProducer::new());
        let provider = Arc::new(ParkedProvider {
            name: "slow".to_string(),
            started: tokio::sync::Notify::new(),
        });

        // Tick fast so jobs outpace the parked crawl
        let service = Arc::new(CrawlerService::new(
            store,
            producer,
            vec![provider.clone()],
            Duration::from_millis(10),
            2,
        ));

        let cancel = CancellationToken::new();
        let run = tokio::spawn(service.clone().run(cancel.clone()));

        provider.started.notified().await;
        // The first crawl is parked; further ticks must be dropped, not run
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(service.active_providers.is_active("slow"));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("shutdown must not hang")
            .unwrap();
    }
}
