//! Scraper: drains the scrape queue and scrapes sources on demand.
//!
//! ```text
//! process_scraping_queue()
//!     ├─► fail_exhausted_stale()
//!     └─► loop: claim_batch() ─► scrape_source() ─► mark_done / mark_failed
//!
//! scrape_from_multiple_sources(names)
//!     └─► resolve sources ─► scrape_source() for each, concurrently
//! ```

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

use super::data::{QueueReport, SessionSummary, SourceOutcome};
use super::models::{
    JobSource, QueueItemStatus, ScrapeQueueItem, ScrapingJob, ScrapingSession, SessionTally,
};
use super::parsing::parse_listing;
use crate::common::{QueueItemId, ScrapingSessionId};
use crate::kernel::ServerDeps;

/// Sources scraped at once by `scrape_from_multiple_sources`
const MAX_CONCURRENT_SOURCES: usize = 4;

/// Queue draining and multi-source scraping, as seen by the background
/// processor and the run dispatcher.
#[async_trait]
pub trait ScrapeService: Send + Sync {
    /// One pass over the scrape queue.
    async fn process_scraping_queue(&self) -> Result<QueueReport>;

    /// Scrape the named sources, or every registered source for `None`.
    ///
    /// A failing source is reported in its outcome and never aborts the batch.
    async fn scrape_from_multiple_sources(
        &self,
        sources: Option<Vec<String>>,
    ) -> Result<Vec<SourceOutcome>>;
}

pub struct Scraper {
    deps: ServerDeps,
}

impl Scraper {
    pub fn new(deps: ServerDeps) -> Self {
        Self { deps }
    }

    /// Scrape one source inside a new session.
    ///
    /// The session ends `completed` with its tallies, or `failed` with the
    /// error, which is also returned. With a queue `claim`, its lease is
    /// renewed before every request and losing it aborts the scrape.
    pub async fn scrape_source(
        &self,
        source: &JobSource,
        claim: Option<&ScrapeQueueItem>,
    ) -> Result<SessionSummary> {
        let pool = &self.deps.db_pool;
        let session = ScrapingSession::start(source.id, claim.map(|c| c.id), pool).await?;
        let mut summary = SessionSummary {
            session_id: Some(session.id),
            ..Default::default()
        };

        match self.collect(source, session.id, claim, &mut summary).await {
            Ok(()) => {
                if let Err(e) = ScrapingSession::complete(session.id, tally(&summary), pool).await {
                    warn!(session_id = %session.id, error = %e, "Failed to record session completion");
                }
                info!(
                    source = %source.name,
                    pages = summary.pages_fetched,
                    found = summary.jobs_found,
                    new = summary.new_jobs,
                    "Scraped source"
                );
                Ok(summary)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                if let Err(record_err) =
                    ScrapingSession::fail(session.id, tally(&summary), &message, pool).await
                {
                    warn!(session_id = %session.id, error = %record_err, "Failed to record session failure");
                }
                Err(e)
            }
        }
    }

    /// Fetch every listing page of `source` and save what it contains.
    async fn collect(
        &self,
        source: &JobSource,
        session_id: ScrapingSessionId,
        claim: Option<&ScrapeQueueItem>,
        summary: &mut SessionSummary,
    ) -> Result<()> {
        let config = source.parsed_config()?;
        let base = Url::parse(&source.base_url)?;

        let mut starts = vec![base.clone()];
        for path in &config.paths {
            match base.join(path) {
                Ok(url) => starts.push(url),
                Err(e) => warn!(source = %source.name, path = %path, error = %e, "Skipping invalid path"),
            }
        }

        let mut visited = HashSet::new();

        for start in starts {
            let mut next = Some(start);
            let mut pages_in_chain = 0;

            while let Some(url) = next.take() {
                if pages_in_chain >= config.page_limit() || !visited.insert(url.to_string()) {
                    break;
                }

                self.deps
                    .rate_limiter
                    .until_ready(source.id, source.rate_limit)
                    .await;
                if let Some(claim) = claim {
                    self.renew_claim(claim).await?;
                }

                let page = match self.deps.web_scraper.fetch(url.as_str()).await {
                    Ok(page) => page,
                    // Nothing fetched yet means the source itself is unreachable
                    Err(e) if summary.pages_fetched == 0 => return Err(e),
                    Err(e) => {
                        warn!(source = %source.name, url = %url, error = %e, "Page fetch failed, skipping");
                        break;
                    }
                };
                summary.pages_fetched += 1;
                pages_in_chain += 1;

                let page_url = Url::parse(&page.url).unwrap_or(url);
                let listing = parse_listing(&page.html, &page_url, &config)?;
                debug!(url = %page_url, postings = listing.postings.len(), "Parsed listing page");

                for posting in &listing.postings {
                    summary.jobs_found += 1;
                    let inserted =
                        ScrapingJob::upsert(source.id, session_id, posting, &self.deps.db_pool)
                            .await?;
                    summary.jobs_saved += 1;
                    if inserted {
                        summary.new_jobs += 1;
                    }
                }

                next = listing.next_page;
            }
        }

        Ok(())
    }

    async fn renew_claim(&self, claim: &ScrapeQueueItem) -> Result<()> {
        let held = ScrapeQueueItem::extend_lease(
            claim.id,
            claim.attempts,
            self.deps.queue.lease_duration,
            &self.deps.db_pool,
        )
        .await?;
        if !held {
            bail!("Queue item {} was claimed by another drain", claim.id);
        }
        Ok(())
    }

    async fn process_item(&self, item: &ScrapeQueueItem) -> Result<SessionSummary> {
        let source = JobSource::find_by_id(item.source_id, &self.deps.db_pool)
            .await?
            .ok_or_else(|| anyhow!("Job source {} not found", item.source_id))?;
        self.scrape_source(&source, Some(item)).await
    }
}

#[async_trait]
impl ScrapeService for Scraper {
    async fn process_scraping_queue(&self) -> Result<QueueReport> {
        let pool = &self.deps.db_pool;
        let limits = &self.deps.queue;
        let mut report = QueueReport::default();

        report.expired = ScrapeQueueItem::fail_exhausted_stale(pool).await? as usize;
        if report.expired > 0 {
            warn!(count = report.expired, "Failed stale queue items with no attempts left");
        }

        let mut handled: Vec<QueueItemId> = Vec::new();

        while report.claimed < limits.max_items_per_pass {
            let remaining = (limits.max_items_per_pass - report.claimed) as i64;
            let batch = ScrapeQueueItem::claim_batch(
                limits.batch_size.min(remaining),
                limits.lease_duration,
                &handled,
                pool,
            )
            .await?;

            if batch.is_empty() {
                break;
            }
            report.claimed += batch.len();

            for item in batch {
                handled.push(item.id);

                match self.process_item(&item).await {
                    Ok(_) => {
                        if ScrapeQueueItem::mark_done(item.id, item.attempts, pool).await? {
                            report.succeeded += 1;
                        } else {
                            warn!(item_id = %item.id, attempt = item.attempts, "Claim lost before completion, leaving item to its new owner");
                            report.lost += 1;
                        }
                    }
                    Err(e) => {
                        let message = format!("{:#}", e);
                        let status =
                            ScrapeQueueItem::mark_failed(item.id, item.attempts, &message, pool)
                                .await?;
                        warn!(
                            item_id = %item.id,
                            attempt = item.attempts,
                            status = ?status,
                            error = %message,
                            "Queue item failed"
                        );
                        match status {
                            Some(QueueItemStatus::Failed) => report.failed += 1,
                            Some(_) => report.requeued += 1,
                            None => report.lost += 1,
                        }
                    }
                }
            }
        }

        Ok(report)
    }

    async fn scrape_from_multiple_sources(
        &self,
        sources: Option<Vec<String>>,
    ) -> Result<Vec<SourceOutcome>> {
        let pool = &self.deps.db_pool;

        let (resolved, mut outcomes) = match sources {
            None => (JobSource::find_all(pool).await?, Vec::new()),
            Some(names) => {
                let found = JobSource::find_by_names(&names, pool).await?;
                let missing = names
                    .iter()
                    .filter(|name| !found.iter().any(|s| &s.name == *name))
                    .map(|name| SourceOutcome::failed(name.clone(), "unknown source"))
                    .collect::<Vec<_>>();
                (found, missing)
            }
        };

        info!(sources = resolved.len(), unknown = outcomes.len(), "Scraping sources");

        let scraped: Vec<SourceOutcome> = stream::iter(resolved)
            .map(|source| async move {
                match self.scrape_source(&source, None).await {
                    Ok(summary) => SourceOutcome::succeeded(source.name, summary),
                    Err(e) => {
                        warn!(source = %source.name, error = %e, "Source scrape failed");
                        SourceOutcome::failed(source.name, format!("{:#}", e))
                    }
                }
            })
            .buffer_unordered(MAX_CONCURRENT_SOURCES)
            .collect()
            .await;

        outcomes.extend(scraped);
        outcomes.sort_by(|a, b| a.source.cmp(&b.source));
        Ok(outcomes)
    }
}

fn tally(summary: &SessionSummary) -> SessionTally {
    SessionTally {
        pages_fetched: summary.pages_fetched,
        jobs_found: summary.jobs_found,
        jobs_saved: summary.jobs_saved,
    }
}
