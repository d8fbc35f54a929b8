//! Domain models.

pub mod config;
pub mod issue;
pub mod key_id_map;
pub mod mutation;
pub mod sync;

pub use config::{
    BitbucketConfig, Config, FetchConfig, GithubConfig, JiraConfig, LoggingConfig, NotionConfig,
    RateLimitConfig, RetryConfig, SyncConfig,
};
pub use issue::{Granularity, IssueMap, NormalizedIssue, UNASSIGNED_USER};
pub use key_id_map::KeyIdMap;
pub use mutation::MutationResult;
pub use sync::{SyncPolicy, SyncReport};
