//! Job source registry endpoints.

mod common;

use axum::http::StatusCode;
use common::*;
use scraper_core::domains::scraping::JobSource;
use scraper_core::kernel::MockWebScraper;
use serde_json::json;
use test_context::test_context;

#[test_context(TestHarness)]
#[tokio::test]
async fn test_create_source_returns_created(ctx: &TestHarness) {
    let app = ctx.app(MockWebScraper::new()).await;

    let (status, body) = app
        .post(
            "/api/scraping/sources",
            json!({"name": "Remote OK", "baseUrl": "https://remoteok.com/remote-dev-jobs"}),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Remote OK");
    assert_eq!(body["baseUrl"], "https://remoteok.com/remote-dev-jobs");
    assert_eq!(body["rateLimit"], 60);
    assert!(body["config"].is_null());
    assert!(body["id"].is_string());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_duplicate_name_rejected_without_new_row(ctx: &TestHarness) {
    let app = ctx.app(MockWebScraper::new()).await;
    let payload = json!({"name": "indeed", "baseUrl": "https://indeed.com/jobs"});

    let (status, _) = app.post("/api/scraping/sources", payload.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post(
            "/api/scraping/sources",
            json!({"name": "  indeed ", "baseUrl": "https://indeed.com/other"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("already exists"));
    assert_eq!(JobSource::count(&ctx.db_pool).await.unwrap(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_rate_limit_out_of_range_rejected(ctx: &TestHarness) {
    let app = ctx.app(MockWebScraper::new()).await;

    for rate_limit in [0, 10_001] {
        let (status, body) = app
            .post(
                "/api/scraping/sources",
                json!({"name": "dice", "baseUrl": "https://dice.com", "rateLimit": rate_limit}),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "rateLimit {}", rate_limit);
        assert_eq!(body["details"][0]["field"], "rateLimit");
    }

    assert_eq!(JobSource::count(&ctx.db_pool).await.unwrap(), 0);

    let (status, body) = app
        .post(
            "/api/scraping/sources",
            json!({"name": "dice", "baseUrl": "https://dice.com", "rateLimit": 10_000}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["rateLimit"], 10_000);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_invalid_payloads_rejected(ctx: &TestHarness) {
    let app = ctx.app(MockWebScraper::new()).await;

    let (status, body) = app
        .post("/api/scraping/sources", json!({"name": "x", "baseUrl": "dice.com"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "baseUrl");

    let (status, body) = app.post("/api/scraping/sources", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .send(
            axum::http::Method::POST,
            "/api/scraping/sources",
            axum::body::Body::from("{not json"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    assert_eq!(JobSource::count(&ctx.db_pool).await.unwrap(), 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_config_persisted_as_text(ctx: &TestHarness) {
    let app = ctx.app(MockWebScraper::new()).await;

    let (status, body) = app
        .post(
            "/api/scraping/sources",
            json!({
                "name": "weworkremotely",
                "baseUrl": "https://weworkremotely.com",
                "config": {"listingSelector": "li.feature", "maxPages": 2}
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let stored: serde_json::Value =
        serde_json::from_str(body["config"].as_str().expect("config is text")).unwrap();
    assert_eq!(stored["listingSelector"], "li.feature");

    let source = JobSource::find_by_name("weworkremotely", &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source.parsed_config().unwrap().max_pages, 2);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_list_sources_includes_counts(ctx: &TestHarness) {
    let app = ctx.app(MockWebScraper::new()).await;
    create_test_source(&ctx.db_pool, "beta", "https://beta.example/jobs", None).await;
    create_test_source(&ctx.db_pool, "alpha", "https://alpha.example/jobs", None).await;

    let (status, _) = app
        .post("/api/scraping/queue", json!({"source": "alpha"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.get("/api/scraping/sources").await;
    assert_eq!(status, StatusCode::OK);

    let sources = body.as_array().unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0]["name"], "alpha");
    assert_eq!(sources[0]["_count"]["scrapeQueue"], 1);
    assert_eq!(sources[0]["_count"]["scrapingJobs"], 0);
    assert_eq!(sources[0]["_count"]["scrapingSessions"], 0);
    assert_eq!(sources[1]["_count"]["scrapeQueue"], 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_enqueue_unknown_source_not_found(ctx: &TestHarness) {
    let app = ctx.app(MockWebScraper::new()).await;

    let (status, body) = app
        .post("/api/scraping/queue", json!({"source": "nowhere"}))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nowhere"));
    assert_eq!(count_rows(&ctx.db_pool, "scrape_queue").await, 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_enqueue_creates_pending_item(ctx: &TestHarness) {
    let app = ctx.app(MockWebScraper::new()).await;
    create_test_source(&ctx.db_pool, "alpha", "https://alpha.example/jobs", None).await;

    let (status, body) = app
        .post("/api/scraping/queue", json!({"source": "alpha"}))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["attempts"], 0);
    assert_eq!(body["maxAttempts"], TestHarness::queue_config().max_attempts);
}
