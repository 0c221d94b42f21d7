// HTTP routes
pub mod health;
pub mod scraping;

pub use health::*;
pub use scraping::*;
