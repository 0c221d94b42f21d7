//! Simple web scraper - local HTTP fetching for job listing pages
//!
//! Uses reqwest with browser-like headers. Parsing happens in
//! `domains::scraping::parsing`, this type only moves bytes.
//!
//! Limitations:
//! - No JavaScript rendering (use for static HTML sites only)

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::debug;

use super::{BaseWebScraper, FetchedPage};
use crate::config::ScraperConfig;

/// Simple web scraper using reqwest
pub struct SimpleScraper {
    client: reqwest::Client,
}

impl SimpleScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Normalize URL by adding https:// if no scheme is present
    pub fn normalize_url(url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{}", url)
        }
    }
}

#[async_trait]
impl BaseWebScraper for SimpleScraper {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let url = Self::normalize_url(url);
        debug!(url = %url, "Fetching page");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("HTTP request failed for {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .context("Failed to read response body")?;

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            html,
        })
    }
}
