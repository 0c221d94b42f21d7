//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod jobs;
pub mod rate_limit;
pub mod scheduled_tasks;
pub mod simple_scraper;
pub mod test_dependencies;
pub mod traits;

pub use deps::ServerDeps;
pub use jobs::{DispatcherConfig, RunDispatcher};
pub use rate_limit::{request_interval, SourceRateLimiter};
pub use scheduled_tasks::{
    BackgroundProcessor, TriggerOutcome, DEFAULT_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES,
};
pub use simple_scraper::SimpleScraper;
pub use test_dependencies::MockWebScraper;
pub use traits::*;
