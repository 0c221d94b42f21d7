//! Scraping domain - job sources, the scrape queue, and the scraper itself.

pub mod data;
pub mod models;
pub mod parsing;
pub mod scraper;

pub use data::*;
pub use models::*;
pub use parsing::{parse_listing, JobPosting, ParsedListing, SourceConfig};
pub use scraper::{ScrapeService, Scraper};
