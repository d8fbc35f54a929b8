//! Notion board adapter (the record of truth).
//!
//! Pages of one database are the issue records. Property values are not
//! inlined in query results, so every page fans out into one request per
//! property.

pub mod client;
pub mod models;
pub mod source;

pub use client::NotionClient;
pub use source::NotionSource;
