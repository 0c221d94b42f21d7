//! Typed ID definitions for the scraping entities.

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for registered job sources.
pub struct JobSourceEntity;

/// Marker type for scrape queue items.
pub struct QueueItemEntity;

/// Marker type for per-source scraping sessions.
pub struct ScrapingSessionEntity;

/// Marker type for scraped job postings.
pub struct ScrapingJobEntity;

/// Marker type for triggered scraping runs.
pub struct ScrapingRunEntity;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

pub type JobSourceId = Id<JobSourceEntity>;

pub type QueueItemId = Id<QueueItemEntity>;

pub type ScrapingSessionId = Id<ScrapingSessionEntity>;

pub type ScrapingJobId = Id<ScrapingJobEntity>;

/// Correlation id handed back by the trigger endpoint.
pub type ScrapingRunId = Id<ScrapingRunEntity>;
