//! Server dependencies for the scraping domain (using traits for testability)
//!
//! This module provides the central dependency container handed to the
//! scraper. External services sit behind trait objects so tests can swap
//! in mocks.

use sqlx::PgPool;
use std::sync::Arc;

use crate::config::QueueConfig;
use crate::kernel::{BaseWebScraper, SourceRateLimiter};

/// Server dependencies accessible to the scraper
#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    pub web_scraper: Arc<dyn BaseWebScraper>,
    /// Claim sizes, lease and retry limits for queue drains
    pub queue: QueueConfig,
    /// Shared by every scrape so a source's rate limit holds process-wide
    pub rate_limiter: Arc<SourceRateLimiter>,
}

impl ServerDeps {
    pub fn new(db_pool: PgPool, web_scraper: Arc<dyn BaseWebScraper>, queue: QueueConfig) -> Self {
        Self {
            db_pool,
            web_scraper,
            queue,
            rate_limiter: Arc::new(SourceRateLimiter::new()),
        }
    }
}
