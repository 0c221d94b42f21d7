//! Application setup and server configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::QueueConfig;
use crate::kernel::{BackgroundProcessor, RunDispatcher};
use crate::server::routes::{
    create_source, enqueue_scrape, get_run, health_handler, list_sources, trigger_scraping,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub db_pool: PgPool,
    pub processor: Arc<BackgroundProcessor>,
    pub dispatcher: Arc<RunDispatcher>,
    pub queue: QueueConfig,
}

/// Build the Axum application router
///
/// An empty `allowed_origins` allows any origin.
pub fn build_app(state: AxumAppState, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    let api = Router::new()
        .route("/trigger", post(trigger_scraping))
        .route("/runs/:id", get(get_run))
        .route("/sources", get(list_sources).post(create_source))
        .route("/queue", post(enqueue_scrape));

    Router::new()
        .nest("/api/scraping", api)
        .route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(state))
        .layer(timeout_layer(REQUEST_TIMEOUT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Requests still running after `timeout` get a 408.
fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}
