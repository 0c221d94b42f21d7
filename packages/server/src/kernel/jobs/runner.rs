//! Run dispatcher for triggered scrapes.
//!
//! The trigger endpoint records a `ScrapingRun` and hands it here; a worker
//! task executes it through the background processor and writes the outcome
//! back onto the run, so callers can poll by id.
//!
//! # Architecture
//!
//! ```text
//! RunDispatcher::submit(sources)
//!     ├─► ScrapingRun::create (pending)
//!     └─► mpsc channel
//!             └─► worker: Semaphore(max_concurrent_runs)
//!                     ├─► mark_running
//!                     ├─► BackgroundProcessor::trigger_scraping
//!                     └─► mark_succeeded / mark_failed
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use sqlx::PgPool;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::common::ScrapingRunId;
use crate::domains::scraping::ScrapingRun;
use crate::kernel::scheduled_tasks::BackgroundProcessor;

/// Recorded on runs that shutdown kept from finishing
pub const SHUTDOWN_ERROR: &str = "dispatcher shut down";

/// Configuration for the run dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Runs executing at the same time; the rest wait their turn
    pub max_concurrent_runs: usize,
    /// Submitted runs buffered before `submit` waits
    pub channel_capacity: usize,
    /// How long shutdown waits for in-flight runs
    pub shutdown_grace: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 2,
            channel_capacity: 64,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct RunRequest {
    run_id: ScrapingRunId,
    sources: Option<Vec<String>>,
}

/// Accepts triggered runs and executes them in the background.
pub struct RunDispatcher {
    db_pool: PgPool,
    sender: mpsc::Sender<RunRequest>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RunDispatcher {
    /// Start the worker task.
    ///
    /// Runs left pending or running by a previous process are failed first,
    /// since nothing will ever pick them up again.
    pub async fn spawn(
        db_pool: PgPool,
        processor: Arc<BackgroundProcessor>,
        config: DispatcherConfig,
    ) -> Result<Self> {
        let abandoned = ScrapingRun::fail_abandoned(&db_pool).await?;
        if abandoned > 0 {
            warn!(count = abandoned, "Failed scraping runs interrupted by restart");
        }

        let (sender, receiver) = mpsc::channel(config.channel_capacity.max(1));
        let shutdown = CancellationToken::new();

        let worker = tokio::spawn(run_worker(
            receiver,
            db_pool.clone(),
            processor,
            config,
            shutdown.clone(),
        ));

        Ok(Self {
            db_pool,
            sender,
            shutdown,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Record a run and queue it for execution. Returns the pending run.
    pub async fn submit(&self, sources: Option<Vec<String>>) -> Result<ScrapingRun> {
        let run = ScrapingRun::create(sources.as_deref(), &self.db_pool).await?;

        let request = RunRequest {
            run_id: run.id,
            sources,
        };
        if self.sender.send(request).await.is_err() {
            ScrapingRun::mark_failed(run.id, SHUTDOWN_ERROR, &self.db_pool).await?;
            return Err(anyhow!("Run dispatcher is shut down"));
        }

        debug!(run_id = %run.id, "Submitted scraping run");
        Ok(run)
    }

    /// Stop accepting runs and wait for in-flight ones (up to the grace period).
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "Run dispatcher worker panicked");
            }
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<RunRequest>,
    db_pool: PgPool,
    processor: Arc<BackgroundProcessor>,
    config: DispatcherConfig,
    shutdown: CancellationToken,
) {
    info!(
        max_concurrent_runs = config.max_concurrent_runs,
        "Run dispatcher starting"
    );

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_runs.max(1)));
    let mut in_flight = JoinSet::new();
    // Runs spawned and not yet reaped
    let mut unfinished: HashSet<ScrapingRunId> = HashSet::new();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            request = receiver.recv() => match request {
                Some(request) => {
                    unfinished.insert(request.run_id);
                    in_flight.spawn(execute_run(
                        request,
                        db_pool.clone(),
                        processor.clone(),
                        semaphore.clone(),
                    ));
                }
                None => break,
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                reap(joined, &mut unfinished);
            }
        }
    }

    // Submitted but never started
    receiver.close();
    let mut dropped = Vec::new();
    while let Ok(request) = receiver.try_recv() {
        dropped.push(request.run_id);
    }
    fail_runs(&dropped, &db_pool).await;

    let drain = async {
        while let Some(joined) = in_flight.join_next().await {
            reap(joined, &mut unfinished);
        }
    };
    if tokio::time::timeout(config.shutdown_grace, drain).await.is_err() {
        warn!(
            remaining = in_flight.len(),
            "Run dispatcher grace period elapsed, aborting runs"
        );
        in_flight.shutdown().await;
    }

    // Aborted, or panicked before recording an outcome
    let unfinished: Vec<ScrapingRunId> = unfinished.into_iter().collect();
    fail_runs(&unfinished, &db_pool).await;

    info!("Run dispatcher stopped");
}

fn reap(joined: Result<ScrapingRunId, JoinError>, unfinished: &mut HashSet<ScrapingRunId>) {
    match joined {
        Ok(run_id) => {
            unfinished.remove(&run_id);
        }
        Err(e) => error!(error = %e, "Scraping run task panicked"),
    }
}

async fn fail_runs(run_ids: &[ScrapingRunId], db_pool: &PgPool) {
    if run_ids.is_empty() {
        return;
    }
    match ScrapingRun::fail_unfinished(run_ids, SHUTDOWN_ERROR, db_pool).await {
        Ok(count) if count > 0 => warn!(count, "Failed runs cut off by dispatcher shutdown"),
        Ok(_) => {}
        Err(e) => error!(error = %e, "Failed to record runs cut off by shutdown"),
    }
}

async fn execute_run(
    request: RunRequest,
    db_pool: PgPool,
    processor: Arc<BackgroundProcessor>,
    semaphore: Arc<Semaphore>,
) -> ScrapingRunId {
    let run_id = request.run_id;
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return run_id;
    };

    if let Err(e) = ScrapingRun::mark_running(run_id, &db_pool).await {
        error!(run_id = %run_id, error = %e, "Failed to mark run running");
    }

    let outcome = processor.trigger_scraping(request.sources).await;

    let recorded = if outcome.success {
        let results = serde_json::to_value(outcome.results.unwrap_or_default()).unwrap_or_default();
        info!(run_id = %run_id, "Scraping run succeeded");
        ScrapingRun::mark_succeeded(run_id, results, &db_pool).await
    } else {
        let message = outcome.error.unwrap_or_else(|| "unknown error".to_string());
        warn!(run_id = %run_id, error = %message, "Scraping run failed");
        ScrapingRun::mark_failed(run_id, &message, &db_pool).await
    };

    if let Err(e) = recorded {
        error!(run_id = %run_id, error = %e, "Failed to record run outcome");
    }

    run_id
}
