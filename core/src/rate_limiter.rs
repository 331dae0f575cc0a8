//! Fixed-window rate limiting over the persisted counter table.
//!
//! This is the sole defense against brute-force PIN guessing and payment
//! spam, which is why the counter lives in the store rather than in
//! process memory. Known imprecision, accepted by design: contiguous
//! windows admit up to 2×max requests across a window seam (a burst at
//! the end of one window plus a burst at the start of the next). The
//! rate_limiter integration test pins this property down.

use crate::clock::Clock;
use crate::config::RateLimitRule;
use crate::error::WalletResult;
use crate::store::WalletStore;
use std::sync::Arc;

pub struct RateLimiter {
    store: WalletStore,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: WalletStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// True when the request fits the key's current window. Counting is a
    /// single atomic check-and-increment at the store; at the cap the
    /// count stays put.
    ///
    /// Store errors propagate — rate limiting guards authorization paths,
    /// so it fails closed, never open.
    pub fn check(&self, key: &str, rule: RateLimitRule) -> WalletResult<bool> {
        let allowed = self.store.rate_limit_check(
            key,
            rule.max_requests,
            rule.window_ms,
            self.clock.now_millis(),
        )?;
        if !allowed {
            log::warn!("rate limit hit for key {key}");
        }
        Ok(allowed)
    }
}
