use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::domain::models::RateLimitConfig;

/// Token bucket rate limiter for outbound API calls
///
/// The bucket holds at most `capacity` tokens and is refilled continuously
/// at `refill_rate` tokens per second. Every call consumes one token.
/// `acquire` never rejects a caller, it only delays it; callers are
/// admitted in arrival order because the bucket lock is held while waiting.
#[derive(Clone, Debug)]
pub struct TokenBucketRateLimiter {
    state: Arc<Mutex<BucketState>>,
    /// Maximum token capacity (burst limit)
    capacity: f64,
    /// Tokens added per second
    refill_rate: f64,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucketRateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `rate_limit` - Tokens refilled per second (e.g., 5.0)
    /// * `burst_limit` - Bucket capacity; the bucket starts full
    ///
    /// # Example
    /// ```
    /// use notion_issues::services::rate_limiter::TokenBucketRateLimiter;
    ///
    /// let rate_limiter = TokenBucketRateLimiter::new(5.0, 35);
    /// ```
    pub fn new(rate_limit: f64, burst_limit: u32) -> Self {
        assert!(rate_limit > 0.0, "Rate limit must be positive");
        assert!(burst_limit > 0, "Burst limit must be at least 1");

        let capacity = f64::from(burst_limit);
        Self {
            state: Arc::new(Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            })),
            capacity,
            refill_rate: rate_limit,
        }
    }

    /// Create a rate limiter from configuration
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst_size)
    }

    /// Acquire a token from the bucket, waiting if necessary
    ///
    /// Tokens are refilled from the wall-clock time elapsed since the last
    /// refill, capped at the burst limit.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        loop {
            let now = Instant::now();
            let elapsed = now.duration_since(state.last_refill).as_secs_f64();
            state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
            state.last_refill = now;

            if state.tokens >= 1.0 {
                state.tokens -= 1.0;
                return;
            }

            let tokens_needed = 1.0 - state.tokens;
            let wait = Duration::from_secs_f64(tokens_needed / self.refill_rate);
            tracing::trace!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            sleep(wait).await;
        }
    }

    /// Current number of available tokens (for testing/monitoring)
    pub async fn available_tokens(&self) -> f64 {
        let state = self.state.lock().await;
        let elapsed = Instant::now()
            .duration_since(state.last_refill)
            .as_secs_f64();
        (state.tokens + elapsed * self.refill_rate).min(self.capacity)
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }
}
