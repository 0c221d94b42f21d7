//! Background execution of triggered scraping runs.
//!
//! Runs are recorded in the database before they execute, so their status
//! can be polled while the worker processes them.

mod runner;

pub use runner::{DispatcherConfig, RunDispatcher};
