//! Background processor that keeps the scrape queue drained.
//!
//! # Architecture
//!
//! ```text
//! BackgroundProcessor::start(interval)
//!     │
//!     └─► tokio interval (first tick immediate)
//!             └─► each tick spawns process_queue()
//!                     └─► ScrapeService::process_scraping_queue()
//! ```
//!
//! Each pass runs in its own task, so a slow pass never delays the next tick
//! and `stop()` only cancels future ticks. Pass failures are logged and
//! swallowed; the next tick is the retry.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::domains::scraping::{ScrapeService, SourceOutcome};

pub const DEFAULT_INTERVAL_MINUTES: u64 = 15;
/// One week
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Result of an out-of-band scrape. Never an `Err`; failures are carried in `error`.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SourceOutcome>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Periodic queue drainer with an explicit start/stop lifecycle.
///
/// Constructed once in `main` and shared through the app state.
pub struct BackgroundProcessor {
    scraper: Arc<dyn ScrapeService>,
    /// `Some` while running; cancelling the token ends the schedule.
    schedule: Mutex<Option<CancellationToken>>,
}

impl BackgroundProcessor {
    pub fn new(scraper: Arc<dyn ScrapeService>) -> Self {
        Self {
            scraper,
            schedule: Mutex::new(None),
        }
    }

    /// Start draining the queue now and every `interval_minutes` after.
    ///
    /// A second call while running is a no-op. Must be called inside a tokio runtime.
    pub fn start(&self, interval_minutes: u64) {
        let mut schedule = self.lock_schedule();
        if schedule.is_some() {
            info!("Background processor already running, ignoring start");
            return;
        }

        let token = CancellationToken::new();
        *schedule = Some(token.clone());

        let period = Duration::from_secs(interval_minutes.clamp(1, MAX_INTERVAL_MINUTES) * 60);
        let scraper = self.scraper.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::spawn(process_queue(scraper.clone()));
                    }
                }
            }

            debug!("Background processor schedule ended");
        });

        info!(interval_minutes, "Background processor started");
    }

    /// Cancel future passes. Safe to call when not running.
    pub fn stop(&self) {
        if let Some(token) = self.lock_schedule().take() {
            token.cancel();
            info!("Background processor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_schedule().is_some()
    }

    /// Lifecycle hook called by `main` after the server stops.
    pub fn shutdown(&self) {
        self.stop();
    }

    /// Scrape every registered source outside the schedule.
    pub async fn trigger_full_scraping(&self) -> TriggerOutcome {
        self.trigger_scraping(None).await
    }

    /// Scrape the named sources (or all when `None`) outside the schedule.
    pub async fn trigger_scraping(&self, sources: Option<Vec<String>>) -> TriggerOutcome {
        match self.scraper.scrape_from_multiple_sources(sources).await {
            Ok(results) => TriggerOutcome {
                success: true,
                results: Some(results),
                error: None,
            },
            Err(e) => {
                error!(error = %e, "Triggered scraping failed");
                TriggerOutcome {
                    success: false,
                    results: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn lock_schedule(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        // The guarded value is a plain token; a poisoned lock still holds a usable one.
        self.schedule.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for BackgroundProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn process_queue(scraper: Arc<dyn ScrapeService>) {
    match scraper.process_scraping_queue().await {
        Ok(report) => {
            if report.claimed > 0 || report.expired > 0 {
                info!(
                    claimed = report.claimed,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    requeued = report.requeued,
                    expired = report.expired,
                    lost = report.lost,
                    "Scrape queue pass finished"
                );
            } else {
                debug!("Scrape queue pass found nothing to do");
            }
        }
        Err(e) => error!(error = %e, "Scrape queue pass failed"),
    }
}
