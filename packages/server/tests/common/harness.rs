//! Test harness with testcontainers for integration testing.
//!
//! One Postgres container is shared by every test in the binary. Each test
//! gets its own freshly migrated database inside it, so tests can run in
//! parallel and assert on exact row counts.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use scraper_core::config::QueueConfig;
use scraper_core::domains::scraping::Scraper;
use scraper_core::kernel::{
    BackgroundProcessor, BaseWebScraper, DispatcherConfig, RunDispatcher, ServerDeps,
};
use scraper_core::server::{build_app, AxumAppState};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use tower::ServiceExt;
use uuid::Uuid;

/// Shared test infrastructure that persists across all tests.
struct SharedTestInfra {
    /// Base URL without a database name
    server_url: String,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

/// Global shared infrastructure - initialized once, reused by all tests.
static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .with_tag("16")
            .with_cmd(["-c", "max_connections=300"])
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let host = postgres.get_host().await?;
        let port = postgres.get_host_port_ipv4(5432).await?;

        Ok(Self {
            server_url: format!("postgresql://postgres:postgres@{}:{}", host, port),
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// Per-test database, created and migrated in the shared container.
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let app = ctx.app(MockWebScraper::new()).await;
///     // ... test code
/// }
/// ```
pub struct TestHarness {
    /// Database pool - use this for fixtures and assertions.
    pub db_pool: PgPool,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }

    async fn teardown(self) {
        self.db_pool.close().await;
    }
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;

        let database = format!("test_{}", Uuid::new_v4().simple());
        let admin = PgPool::connect(&format!("{}/postgres", infra.server_url))
            .await
            .context("Failed to connect to Postgres")?;
        sqlx::query(&format!("CREATE DATABASE \"{}\"", database))
            .execute(&admin)
            .await
            .context("Failed to create test database")?;
        admin.close().await;

        let db_pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&format!("{}/{}", infra.server_url, database))
            .await
            .context("Failed to connect to test database")?;

        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self { db_pool })
    }

    /// Queue limits used by tests: small batches, short lease, two attempts.
    pub fn queue_config() -> QueueConfig {
        QueueConfig {
            batch_size: 2,
            max_items_per_pass: 20,
            lease_duration: std::time::Duration::from_secs(60),
            max_attempts: 2,
        }
    }

    /// Scraper wired to `web_scraper` and this harness's database.
    pub fn scraper(&self, web_scraper: impl BaseWebScraper + 'static) -> Arc<Scraper> {
        Arc::new(Scraper::new(ServerDeps::new(
            self.db_pool.clone(),
            Arc::new(web_scraper),
            Self::queue_config(),
        )))
    }

    /// Full application (processor not started) backed by `web_scraper`.
    pub async fn app(&self, web_scraper: impl BaseWebScraper + 'static) -> TestApp {
        self.app_with(web_scraper, DispatcherConfig::default()).await
    }

    /// Like `app`, with custom run dispatcher limits.
    pub async fn app_with(
        &self,
        web_scraper: impl BaseWebScraper + 'static,
        dispatcher_config: DispatcherConfig,
    ) -> TestApp {
        let processor = Arc::new(BackgroundProcessor::new(self.scraper(web_scraper)));
        let dispatcher = Arc::new(
            RunDispatcher::spawn(self.db_pool.clone(), processor.clone(), dispatcher_config)
                .await
                .expect("Failed to start run dispatcher"),
        );

        let state = AxumAppState {
            db_pool: self.db_pool.clone(),
            processor: processor.clone(),
            dispatcher: dispatcher.clone(),
            queue: Self::queue_config(),
        };

        TestApp {
            router: build_app(state, &[]),
            processor,
            dispatcher,
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub processor: Arc<BackgroundProcessor>,
    pub dispatcher: Arc<RunDispatcher>,
}

impl TestApp {
    /// Send a request through the router; returns status and parsed JSON
    /// (`Null` for an empty body).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let body = match body {
            Some(json) => Body::from(json.to_string()),
            None => Body::empty(),
        };
        self.send(method, uri, body).await
    }

    /// Like `request`, with a raw body.
    pub async fn send(&self, method: Method, uri: &str, body: Body) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("readable body")
            .to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON response body")
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.request(Method::POST, uri, Some(body)).await
    }
}
