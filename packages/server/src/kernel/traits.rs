// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Turning pages into job records lives in domains/scraping.
//
// Naming convention: Base* for trait names (e.g., BaseWebScraper)

use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// Web Scraper Trait (Infrastructure - raw page fetching)
// =============================================================================

/// A fetched page, after redirects.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL (relative links resolve against this)
    pub url: String,
    pub status: u16,
    pub html: String,
}

#[async_trait]
pub trait BaseWebScraper: Send + Sync {
    /// Fetch a single page. Non-2xx responses are errors.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}
