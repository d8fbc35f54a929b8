//! Sync machinery that sits between the ports and the adapters.

pub mod concurrent_fetcher;
pub mod paginated;
pub mod rate_limiter;
pub mod reconciliation;

pub use concurrent_fetcher::{ConcurrentFetcher, FetchJob, FetchOutcome, DEFAULT_PAGE_WORKERS};
pub use paginated::{PaginatedSequence, PaginatedSlice};
pub use rate_limiter::TokenBucketRateLimiter;
pub use reconciliation::{is_aged, update_direction, ReconciliationEngine, UpdateDirection};
