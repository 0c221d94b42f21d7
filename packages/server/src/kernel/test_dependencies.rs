// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{BaseWebScraper, FetchedPage};

// =============================================================================
// Mock Web Scraper
// =============================================================================

#[derive(Debug, Clone)]
enum MockResponse {
    Page(String),
    Status(u16),
}

/// Serves canned HTML per URL and records every fetch.
///
/// Unknown URLs fail with `HTTP 404 for <url>`, the same shape the real
/// scraper reports.
#[derive(Clone, Default)]
pub struct MockWebScraper {
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    calls: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl MockWebScraper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for `url`
    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), MockResponse::Page(html.to_string()));
        self
    }

    /// Fail `url` with the given HTTP status
    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), MockResponse::Status(status));
        self
    }

    /// Sleep before answering every fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all URLs that were fetched, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Check if a URL was fetched
    pub fn was_fetched(&self, url: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|u| u == url)
    }
}

#[async_trait]
impl BaseWebScraper for MockWebScraper {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.calls.lock().unwrap().push(url.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.responses.lock().unwrap().get(url).cloned();
        match response {
            Some(MockResponse::Page(html)) => Ok(FetchedPage {
                url: url.to_string(),
                status: 200,
                html,
            }),
            Some(MockResponse::Status(status)) => anyhow::bail!("HTTP {} for {}", status, url),
            None => anyhow::bail!("HTTP 404 for {}", url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_registered_pages_and_records_calls() {
        let mock = MockWebScraper::new().with_page("https://jobs.example/", "<h2>Dev</h2>");

        let page = mock.fetch("https://jobs.example/").await.unwrap();
        assert_eq!(page.html, "<h2>Dev</h2>");
        assert!(mock.was_fetched("https://jobs.example/"));
    }

    #[tokio::test]
    async fn test_unknown_and_failing_urls_error() {
        let mock = MockWebScraper::new().with_status("https://jobs.example/down", 500);

        let err = mock.fetch("https://jobs.example/down").await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500 for https://jobs.example/down");

        let err = mock.fetch("https://jobs.example/missing").await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 404 for https://jobs.example/missing");

        assert_eq!(mock.calls().len(), 2);
    }
}
