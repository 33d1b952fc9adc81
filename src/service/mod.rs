// src/service/mod.rs

//! Application services: the crawl engine and the CMS sync consumer.

mod crawler;
mod readiness;
mod single_flight;
mod sync;

pub use crawler::CrawlerService;
pub use readiness::ReadinessWaiter;
pub use single_flight::SingleFlight;
pub use sync::CmsSyncService;
