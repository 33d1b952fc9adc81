// src/provider/generic.rs

//! Config-driven provider for JSON HTTP feeds.
//!
//! Crawls an upstream page by page, handing each page to the caller's
//! handler. Every page fetch runs through the circuit breaker and an inner
//! retry loop; pagination style (page index vs. offset) comes from the
//! source configuration.

use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CircuitBreaker, PageHandler, Provider};
use crate::config::PaginationConfig;
use crate::error::{AppError, Result};
use crate::metrics::ARTICLE_PARSE_ERRORS;
use crate::models::{Article, PageInfo};
use crate::transform::Transformer;

const MAX_SAFETY_PAGES: u32 = 1000;
const MAX_CONSECUTIVE_HANDLER_ERRORS: u32 = 5;
const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

pub struct GenericProvider {
    name: String,
    url: String,
    client: reqwest::Client,
    transformer: Box<dyn Transformer>,
    pagination: PaginationConfig,
    breaker: CircuitBreaker,
    initial_backoff: Duration,
}

impl GenericProvider {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        transformer: Box<dyn Transformer>,
        pagination: PaginationConfig,
    ) -> Result<Self> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            breaker: CircuitBreaker::new(name.clone()),
            name,
            url: url.into(),
            client,
            transformer,
            pagination,
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    async fn crawl_loop(
        &self,
        cancel: &CancellationToken,
        handler: &mut PageHandler<'_>,
    ) -> Result<()> {
        let mut page: u32 = 0;
        let mut num_pages: Option<u32> = None;
        let mut consecutive_errors: u32 = 0;

        while page < MAX_SAFETY_PAGES {
            // Stop once the reported page count is reached
            if let Some(total) = num_pages {
                if page >= total {
                    debug!(provider = %self.name, page, total, "reached total pages");
                    return Ok(());
                }
            }

            let page_url = self.build_url_with_page(page);
            let (articles, page_info) = self.fetch_single_page(cancel, &page_url, page).await?;

            if articles.is_empty() {
                debug!(provider = %self.name, page, "no articles on page, stopping");
                return Ok(());
            }

            let count = articles.len();
            if let Err(e) = handler(articles).await {
                warn!(provider = %self.name, page, error = %e, "handler failed, continuing");
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_HANDLER_ERRORS {
                    return Err(AppError::crawl(
                        self.name.as_str(),
                        format!("too many consecutive handler errors ({consecutive_errors}): {e}"),
                    ));
                }
            } else {
                consecutive_errors = 0;
                info!(provider = %self.name, page, articles_count = count, "processed page");
            }

            if let Some(info) = page_info {
                num_pages = Some(info.num_pages);
            }

            page += 1;
        }

        warn!(provider = %self.name, max_pages = MAX_SAFETY_PAGES, "reached max safety pages limit");
        Ok(())
    }

    fn build_url_with_page(&self, page: u32) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };

        let page_param = non_empty_or(&self.pagination.page_param, "page");
        let limit_param = non_empty_or(&self.pagination.limit_param, "pageSize");
        let limit = if self.pagination.default_limit > 0 {
            self.pagination.default_limit
        } else {
            20
        };

        let value = if self.pagination.r#type == "offset" {
            page * limit
        } else {
            page
        };

        format!(
            "{}{}{}={}&{}={}",
            self.url, separator, page_param, value, limit_param, limit
        )
    }

    async fn fetch_single_page(
        &self,
        cancel: &CancellationToken,
        url: &str,
        page: u32,
    ) -> Result<(Vec<Article>, Option<PageInfo>)> {
        let body = self.execute_request(cancel, url, page).await?;

        self.transformer.transform(&body).map_err(|e| {
            counter!(ARTICLE_PARSE_ERRORS, "source" => self.name.clone()).increment(1);
            AppError::parse(self.name.as_str(), e)
        })
    }

    /// One breaker-guarded operation: the whole retried fetch of a page.
    async fn execute_request(
        &self,
        cancel: &CancellationToken,
        url: &str,
        page: u32,
    ) -> Result<Vec<u8>> {
        let permit = self.breaker.try_acquire()?;
        let result = self.request_with_retry(cancel, url, page).await;
        self.breaker.on_result(permit, result.is_ok());
        result
    }

    async fn request_with_retry(
        &self,
        cancel: &CancellationToken,
        url: &str,
        page: u32,
    ) -> Result<Vec<u8>> {
        let mut backoff = self.initial_backoff;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                info!(provider = %self.name, page, attempt, max_retries = MAX_RETRIES, "retrying request");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(AppError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff *= 2;
            }

            debug!(provider = %self.name, url, "fetching url");
            let response = tokio::select! {
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                r = self.client.get(url).send() => r,
            };

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    warn!(provider = %self.name, page, error = %e, "request failed");
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() {
                warn!(provider = %self.name, page, status = %status, "server error");
                continue;
            }
            if status != StatusCode::OK {
                // Fail immediately on client errors
                return Err(AppError::UnexpectedStatus {
                    provider: self.name.clone(),
                    status,
                });
            }

            match response.bytes().await {
                Ok(bytes) => return Ok(bytes.to_vec()),
                Err(e) => {
                    warn!(provider = %self.name, page, error = %e, "failed to read response body");
                    continue;
                }
            }
        }

        Err(AppError::crawl(self.name.as_str(), "max retries exceeded"))
    }
}

#[async_trait]
impl Provider for GenericProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn crawl(&self, cancel: &CancellationToken, handler: &mut PageHandler<'_>) -> Result<()> {
        debug!(provider = %self.name, "starting streaming crawl");
        self.crawl_loop(cancel, handler).await
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::extract::State;
    use axum::routing::get;
    use axum::Router;
    use futures::FutureExt;

    use super::*;
    use crate::provider::BreakerState;

    /// Transformer stub: one synthetic article per page, fixed page count.
    struct StubTransformer {
        num_pages: Option<u32>,
        empty: bool,
    }

    impl Transformer for StubTransformer {
        fn transform(&self, body: &[u8]) -> Result<(Vec<Article>, Option<PageInfo>)> {
            if self.empty {
                return Ok((Vec::new(), None));
            }
            let seq = String::from_utf8_lossy(body).trim().to_string();
            let mut article = crate::testutil::article("stub", &seq);
            article.title = format!("page {seq}");
            let info = self.num_pages.map(|num_pages| PageInfo {
                page: 0,
                num_pages,
                page_size: 1,
                num_entries: num_pages,
            });
            Ok((vec![article], info))
        }
    }

    #[derive(Clone)]
    struct Upstream {
        hits: Arc<AtomicU32>,
        status: StatusCode,
    }

    async fn serve(status: StatusCode) -> (String, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let state = Upstream {
            hits: hits.clone(),
            status,
        };
        let app = Router::new()
            .route(
                "/feed",
                get(|State(s): State<Upstream>| async move {
                    let n = s.hits.fetch_add(1, Ordering::SeqCst);
                    (s.status, n.to_string())
                }),
            )
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}/feed"), hits)
    }

    fn provider(url: &str, transformer: StubTransformer) -> GenericProvider {
        let mut p = GenericProvider::new(
            "test-provider",
            url,
            Box::new(transformer),
            PaginationConfig::default(),
        )
        .unwrap();
        p.initial_backoff = Duration::from_millis(1);
        p
    }

    fn collecting_handler(
        seen: Arc<std::sync::Mutex<Vec<String>>>,
    ) -> impl FnMut(Vec<Article>) -> futures::future::BoxFuture<'static, Result<()>> + Send {
        move |articles: Vec<Article>| {
            let seen = seen.clone();
            async move {
                let mut guard = seen.lock().unwrap();
                guard.extend(articles.into_iter().map(|a| a.title));
                Ok(())
            }
            .boxed()
        }
    }

    #[test]
    fn page_url_construction() {
        let p = GenericProvider::new(
            "t",
            "https://example.com/content",
            Box::new(StubTransformer {
                num_pages: None,
                empty: true,
            }),
            PaginationConfig::default(),
        )
        .unwrap();
        assert_eq!(
            p.build_url_with_page(2),
            "https://example.com/content?page=2&pageSize=20"
        );

        let p = GenericProvider::new(
            "t",
            "https://example.com/content?lang=EN",
            Box::new(StubTransformer {
                num_pages: None,
                empty: true,
            }),
            PaginationConfig {
                r#type: "offset".to_string(),
                page_param: "start".to_string(),
                limit_param: "limit".to_string(),
                default_limit: 25,
            },
        )
        .unwrap();
        assert_eq!(
            p.build_url_with_page(3),
            "https://example.com/content?lang=EN&start=75&limit=25"
        );
    }

    #[tokio::test]
    async fn empty_first_page_terminates_with_success() {
        let (url, hits) = serve(StatusCode::OK).await;
        let p = provider(
            &url,
            StubTransformer {
                num_pages: None,
                empty: true,
            },
        );

        let cancel = CancellationToken::new();
        let mut handler = |_articles: Vec<Article>| async { Ok::<(), AppError>(()) }.boxed();
        p.crawl(&cancel, &mut handler).await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_page_feed_is_not_rerequested() {
        let (url, hits) = serve(StatusCode::OK).await;
        let p = provider(
            &url,
            StubTransformer {
                num_pages: Some(1),
                empty: false,
            },
        );

        let cancel = CancellationToken::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut handler = collecting_handler(seen.clone());
        p.crawl(&cancel, &mut handler).await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn endless_feed_stops_at_safety_cap() {
        let (url, hits) = serve(StatusCode::OK).await;
        let p = provider(
            &url,
            StubTransformer {
                num_pages: None,
                empty: false,
            },
        );

        let cancel = CancellationToken::new();
        let mut handler = |_articles: Vec<Article>| async { Ok::<(), AppError>(()) }.boxed();
        p.crawl(&cancel, &mut handler).await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), MAX_SAFETY_PAGES);
    }

    #[tokio::test]
    async fn handler_failure_skips_page_but_crawl_continues() {
        let (url, _hits) = serve(StatusCode::OK).await;
        let p = provider(
            &url,
            StubTransformer {
                num_pages: Some(3),
                empty: false,
            },
        );

        let cancel = CancellationToken::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let mut handler = move |articles: Vec<Article>| {
            let seen = seen2.clone();
            async move {
                if articles[0].title == "page 1" {
                    return Err(AppError::validation("simulated store error"));
                }
                seen.lock().unwrap().push(articles[0].title.clone());
                Ok(())
            }
            .boxed()
        };

        p.crawl(&cancel, &mut handler).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["page 0", "page 2"]);
    }

    #[tokio::test]
    async fn five_consecutive_handler_errors_abort() {
        let (url, _hits) = serve(StatusCode::OK).await;
        let p = provider(
            &url,
            StubTransformer {
                num_pages: Some(10),
                empty: false,
            },
        );

        let cancel = CancellationToken::new();
        let failures = Arc::new(AtomicU32::new(0));
        let failures2 = failures.clone();
        let mut handler = move |_articles: Vec<Article>| {
            let failures = failures2.clone();
            async move {
                failures.fetch_add(1, Ordering::SeqCst);
                Err(AppError::validation("persistent error"))
            }
            .boxed()
        };

        let err = p.crawl(&cancel, &mut handler).await.unwrap_err();
        assert!(matches!(err, AppError::Crawl { .. }));
        assert_eq!(failures.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn persistent_server_errors_trip_the_breaker() {
        let (url, hits) = serve(StatusCode::INTERNAL_SERVER_ERROR).await;
        let p = provider(
            &url,
            StubTransformer {
                num_pages: None,
                empty: false,
            },
        );
        let cancel = CancellationToken::new();

        // Each crawl exhausts the retry budget and counts one breaker failure
        for _ in 0..3 {
            let mut handler = |_a: Vec<Article>| async { Ok::<(), AppError>(()) }.boxed();
            let err = p.crawl(&cancel, &mut handler).await.unwrap_err();
            assert!(matches!(err, AppError::Crawl { .. }));
        }
        // 3 crawls x (1 attempt + 3 retries)
        assert_eq!(hits.load(Ordering::SeqCst), 12);
        assert_eq!(p.breaker.state(), BreakerState::Open);

        // While open the breaker fails fast without touching the upstream
        let mut handler = |_a: Vec<Article>| async { Ok::<(), AppError>(()) }.boxed();
        let err = p.crawl(&cancel, &mut handler).await.unwrap_err();
        assert!(matches!(err, AppError::CircuitOpen { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 12);
    }

    #[tokio::test]
    async fn client_errors_fail_without_retry() {
        let (url, hits) = serve(StatusCode::NOT_FOUND).await;
        let p = provider(
            &url,
            StubTransformer {
                num_pages: None,
                empty: false,
            },
        );

        let cancel = CancellationToken::new();
        let mut handler = |_a: Vec<Article>| async { Ok::<(), AppError>(()) }.boxed();
        let err = p.crawl(&cancel, &mut handler).await.unwrap_err();
        assert!(matches!(err, AppError::UnexpectedStatus { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
