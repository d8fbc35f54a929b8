//! GitHub Issues adapter.
//!
//! Enumerates repository issues (pull requests excluded) and pushes
//! title, state and assignee changes back.

pub mod client;
pub mod models;
pub mod source;

pub use client::GitHubClient;
pub use source::GithubSource;
