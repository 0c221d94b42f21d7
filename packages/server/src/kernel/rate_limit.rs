//! Per-source request rate limiting.
//!
//! One governor limiter per job source, shared by every scrape in the
//! process: queue drains, scheduled passes and triggered runs all wait on
//! the same limiter before fetching from a source.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::common::JobSourceId;

#[derive(Default)]
pub struct SourceRateLimiter {
    limiters: Mutex<HashMap<JobSourceId, (i32, Arc<DefaultDirectRateLimiter>)>>,
}

impl SourceRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `source_id` may be requested again at `rate_limit`
    /// requests per minute.
    pub async fn until_ready(&self, source_id: JobSourceId, rate_limit: i32) {
        self.limiter(source_id, rate_limit).until_ready().await;
    }

    fn limiter(&self, source_id: JobSourceId, rate_limit: i32) -> Arc<DefaultDirectRateLimiter> {
        let mut limiters = self.limiters.lock().unwrap_or_else(|e| e.into_inner());

        match limiters.get(&source_id) {
            Some((rate, limiter)) if *rate == rate_limit => limiter.clone(),
            // New source, or its rate limit was changed
            _ => {
                let limiter = Arc::new(RateLimiter::direct(quota(rate_limit)));
                limiters.insert(source_id, (rate_limit, limiter.clone()));
                limiter
            }
        }
    }
}

/// Spacing between requests for a per-minute rate limit.
pub fn request_interval(rate_limit: i32) -> Duration {
    Duration::from_millis(60_000 / rate_limit.max(1) as u64)
}

/// One request per `request_interval`, no bursts.
fn quota(rate_limit: i32) -> Quota {
    Quota::with_period(request_interval(rate_limit).max(Duration::from_millis(1)))
        .unwrap_or_else(|| Quota::per_second(std::num::NonZeroU32::MIN))
}
