// Job Board Scraping Core
//
// Registry of job sources, a persisted scrape queue, the scraper that turns
// listing pages into job records, a periodic background processor draining
// the queue, and the HTTP surface that triggers and observes scraping runs.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
