// src/main.rs

//! newswire service entry point.
//!
//! Wires configuration, the store, the event channel, the crawl engine, and
//! the CMS sync consumer, then runs until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use newswire::config::Config;
use newswire::error::Result;
use newswire::gateway::CmsMockGateway;
use newswire::metrics::Metrics;
use newswire::provider::{GenericProvider, Provider};
use newswire::queue::{KafkaArticleConsumer, KafkaEventProducer, CMS_SYNC_GROUP};
use newswire::service::{CmsSyncService, CrawlerService, ReadinessWaiter};
use newswire::store::MongoStore;
use newswire::transform;
use newswire::{logging, server};

#[derive(Parser, Debug)]
#[command(name = "newswire", version, about = "Streaming news ingestion engine")]
struct Cli {
    /// Override SOURCES_FILE_PATH
    #[arg(long)]
    sources: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ingestion engine and sync consumer (default)
    Serve,
    /// Load and validate configuration, then exit
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    if let Some(path) = cli.sources {
        std::env::set_var("SOURCES_FILE_PATH", path);
    }

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return Err(e);
        }
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Validate => validate(&config),
        Command::Serve => serve(config).await,
    }
}

fn validate(config: &Config) -> Result<()> {
    info!(
        poll_interval_secs = config.poll_interval.as_secs(),
        workers = config.worker_pool_size,
        batch_size = config.batch_size,
        kafka_topic = %config.kafka_topic,
        dlq_topic = %config.kafka_dlq_topic,
        "configuration is valid"
    );
    for source in &config.sources {
        info!(name = %source.name, url = %source.url, transformer = %source.transformer, "source");
    }
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    let metrics = Metrics::init();
    let cancel = CancellationToken::new();

    // Infrastructure
    let mongo = mongodb::Client::with_uri_str(&config.mongo_uri).await?;
    let main_producer = Arc::new(KafkaEventProducer::new(
        &config.kafka_brokers,
        &config.kafka_topic,
    )?);
    let dlq_producer = Arc::new(KafkaEventProducer::new(
        &config.kafka_brokers,
        &config.kafka_dlq_topic,
    )?);

    // Block until dependencies answer
    let waiter = ReadinessWaiter::new(
        mongo.clone(),
        config.kafka_brokers.clone(),
        config.kafka_topic.clone(),
    );
    spawn_signal_listener(cancel.clone());
    waiter.wait_for_dependencies(&cancel).await?;

    let store = Arc::new(MongoStore::new(&mongo, &config.mongo_db_name, &config.mongo_collection).await?);

    // Providers from the configured sources
    let mut providers: Vec<Arc<dyn Provider>> = Vec::with_capacity(config.sources.len());
    for source in &config.sources {
        let transformer = match transform::get_transformer(&source.transformer) {
            Ok(t) => t,
            Err(e) => {
                // Already screened at load time; double safety
                error!(name = %source.name, error = %e, "skipping source");
                continue;
            }
        };
        providers.push(Arc::new(GenericProvider::new(
            source.name.clone(),
            source.url.clone(),
            transformer,
            source.pagination.clone(),
        )?));
    }
    if providers.is_empty() {
        warn!("no providers configured, the crawler will idle");
    }

    let crawler = Arc::new(CrawlerService::new(
        store,
        main_producer.clone(),
        providers,
        config.poll_interval,
        config.worker_pool_size,
    ));
    let sync = Arc::new(CmsSyncService::new(Arc::new(CmsMockGateway)));
    let consumer = KafkaArticleConsumer::new(
        &config.kafka_brokers,
        &config.kafka_topic,
        CMS_SYNC_GROUP,
        dlq_producer.clone(),
    )?;

    let server_task = tokio::spawn(server::serve(
        config.server_port,
        metrics.handle.clone(),
        cancel.clone(),
    ));
    let crawler_task = tokio::spawn(crawler.run(cancel.clone()));
    let sync_task = tokio::spawn(sync.run(consumer, cancel.clone()));

    // The crawler joins only after its provider loops and workers drained
    if let Err(e) = crawler_task.await {
        error!(error = %e, "crawler task panicked");
    }
    if let Err(e) = sync_task.await {
        error!(error = %e, "sync task panicked");
    }
    if let Ok(Err(e)) = server_task.await {
        error!(error = %e, "operator endpoint failed");
    }

    if let Err(e) = main_producer.flush(Duration::from_secs(10)) {
        warn!(error = %e, "main producer flush failed");
    }
    if let Err(e) = dlq_producer.flush(Duration::from_secs(10)) {
        warn!(error = %e, "dlq producer flush failed");
    }

    info!("shutdown complete");
    Ok(())
}

/// Cancel the shared token on SIGINT or SIGTERM.
fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("install SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        info!("shutdown signal received");
        cancel.cancel();
    });
}
