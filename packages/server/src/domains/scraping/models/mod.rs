pub mod job_source;
pub mod queue_item;
pub mod scraping_job;
pub mod scraping_run;
pub mod scraping_session;

pub use job_source::*;
pub use queue_item::*;
pub use scraping_job::*;
pub use scraping_run::*;
pub use scraping_session::*;
