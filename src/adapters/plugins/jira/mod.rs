//! Jira adapter.
//!
//! Statuses are compared in lowercase; writes map them back to the
//! server's spelling and move the issue through its workflow.

pub mod client;
pub mod models;
pub mod source;

pub use client::JiraClient;
pub use source::JiraSource;
