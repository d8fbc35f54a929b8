//! Infrastructure layer module
//!
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - Rate-limited REST transport shared by every tracker client

pub mod config;
pub mod http;
pub mod logging;
