// Main entry point for the scraping API server

use std::sync::Arc;

use anyhow::{Context, Result};
use scraper_core::domains::scraping::Scraper;
use scraper_core::kernel::{
    BackgroundProcessor, DispatcherConfig, RunDispatcher, ServerDeps, SimpleScraper,
};
use scraper_core::server::{build_app, AxumAppState};
use scraper_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scraper_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting job scraping API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Scraper and its dependencies
    let web_scraper = SimpleScraper::new(&config.scraper)?;
    let deps = ServerDeps::new(pool.clone(), Arc::new(web_scraper), config.queue.clone());
    let scraper = Arc::new(Scraper::new(deps));

    // Background processor
    let processor = Arc::new(BackgroundProcessor::new(scraper));
    if config.processor.enabled {
        processor.start(config.processor.interval_minutes);
    } else {
        tracing::info!("Background processor disabled by configuration");
    }

    // Triggered runs
    let dispatcher = Arc::new(
        RunDispatcher::spawn(pool.clone(), processor.clone(), DispatcherConfig::default())
            .await
            .context("Failed to start run dispatcher")?,
    );

    let state = AxumAppState {
        db_pool: pool,
        processor: processor.clone(),
        dispatcher: dispatcher.clone(),
        queue: config.queue.clone(),
    };
    let app = build_app(state, &config.allowed_origins);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped, shutting down background work");
    processor.shutdown();
    dispatcher.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
