//! Ports (trait interfaces) for the hexagonal architecture.

pub mod issue_source;
pub mod page_source;

pub use issue_source::{status_set, IssueQuery, IssueSource};
pub use page_source::{Page, PageMethod, PageRequest, PageSource};
