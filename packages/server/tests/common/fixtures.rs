//! Test fixtures for creating test data.
//!
//! These fixtures use the model methods directly to create test data.

use scraper_core::domains::scraping::{JobSource, NewJobSource, ScrapeQueueItem};
use sqlx::PgPool;

/// Register a source, panicking on duplicates. Its rate limit is high enough
/// not to slow tests down.
pub async fn create_test_source(
    pool: &PgPool,
    name: &str,
    base_url: &str,
    config: Option<serde_json::Value>,
) -> JobSource {
    create_source_with_rate(pool, name, base_url, config, 10_000).await
}

pub async fn create_source_with_rate(
    pool: &PgPool,
    name: &str,
    base_url: &str,
    config: Option<serde_json::Value>,
    rate_limit: i32,
) -> JobSource {
    let input = NewJobSource {
        name: name.to_string(),
        base_url: base_url.to_string(),
        rate_limit,
        config: config.map(|c| c.to_string()),
    };
    JobSource::create(&input, pool)
        .await
        .expect("insert source")
        .expect("source name is unique")
}

pub async fn enqueue_test_item(pool: &PgPool, source: &JobSource, max_attempts: i32) -> ScrapeQueueItem {
    ScrapeQueueItem::enqueue(source.id, max_attempts, pool)
        .await
        .expect("enqueue item")
}

/// A listing page in the shape the default selectors understand.
pub fn listing_html(jobs: &[(&str, &str)]) -> String {
    let items: String = jobs
        .iter()
        .map(|(title, href)| {
            format!(
                r#"<article class="job"><h2>{}</h2><a href="{}">View</a></article>"#,
                title, href
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", items)
}

/// Push every lease on the queue into the past.
pub async fn expire_leases(pool: &PgPool) {
    sqlx::query(
        "UPDATE scrape_queue SET lease_expires_at = NOW() - INTERVAL '1 second' WHERE status = 'processing'",
    )
    .execute(pool)
    .await
    .expect("expire leases");
}

pub async fn count_rows(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("count rows")
}
