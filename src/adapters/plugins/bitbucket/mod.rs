//! Bitbucket Cloud issues adapter.

pub mod client;
pub mod models;
pub mod source;

pub use client::BitbucketClient;
pub use source::BitbucketSource;
