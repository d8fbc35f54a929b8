//! notion-issues - Notion issue board sync
//!
//! Keeps a Notion database of issues in sync with an external tracker
//! (GitHub, Jira or Bitbucket). Newer edits win on either side; new
//! external issues are created on the board and stale closed ones are
//! archived.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Issue model, sync policy and the ports every tracker implements
//! - **Service Layer** (`services`): Rate limiting, pagination, concurrent fetching and reconciliation
//! - **Adapters** (`adapters`): Tracker plugins implementing the ports
//! - **Infrastructure Layer** (`infrastructure`): Configuration, logging and HTTP transport
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use notion_issues::{ReconciliationEngine, SyncPolicy};
//!
//! let engine = ReconciliationEngine::new(SyncPolicy::default());
//! let report = engine.run(&board, &tracker).await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::plugins::AnySource;
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, IssueMap, KeyIdMap, MutationResult, NormalizedIssue, SyncPolicy, SyncReport,
};
pub use domain::ports::{IssueQuery, IssueSource, Page, PageRequest, PageSource};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ConcurrentFetcher, PaginatedSequence, ReconciliationEngine, TokenBucketRateLimiter};
