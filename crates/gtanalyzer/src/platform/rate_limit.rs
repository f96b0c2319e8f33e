use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default request pacing per upstream (requests per second).
pub mod rate_limits {
    /// GitHub: 5000 requests/hour for a token; 10/sec allows short bursts.
    pub const GITHUB_DEFAULT_RPS: u32 = 10;
    /// Taiga: undocumented limits on the hosted service, conservative default.
    pub const TAIGA_DEFAULT_RPS: u32 = 5;
}

/// A shared token-bucket limiter used by the upstream clients.
///
/// Clones share the same bucket, so one limiter can pace every request a
/// client makes across all entities of a batch.
///
/// # Example
///
/// ```ignore
/// use gtanalyzer::platform::ApiRateLimiter;
///
/// let limiter = ApiRateLimiter::new(10);
/// limiter.wait().await;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Create a new rate limiter with the specified requests per second.
    ///
    /// A value of 0 is treated as 1.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rps));

        Self {
            inner: Arc::new(rate_limiter),
        }
    }

    /// Wait until a request is allowed.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter").finish_non_exhaustive()
    }
}
