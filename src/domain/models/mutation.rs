//! Outcome of a create/update/archive call against a source.

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Result of a mutation against an issue source.
///
/// Mutations report failure through `success`/`error` rather than an
/// `Err`, because the engine treats every per-record write failure as a
/// logged, recoverable event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResult {
    /// Whether the remote accepted the mutation.
    pub success: bool,
    /// Native id of the created/updated record, when the source returns one.
    pub external_id: Option<String>,
    /// Error message if the mutation failed.
    pub error: Option<String>,
}

impl MutationResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            external_id: None,
            error: None,
        }
    }

    pub fn ok_with_id(external_id: impl Into<String>) -> Self {
        Self {
            success: true,
            external_id: Some(external_id.into()),
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            external_id: None,
            error: Some(error.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.success
    }
}

impl From<DomainError> for MutationResult {
    fn from(err: DomainError) -> Self {
        Self::fail(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert!(MutationResult::ok().success);
        assert_eq!(
            MutationResult::ok_with_id("abc").external_id.as_deref(),
            Some("abc")
        );
        let failed = MutationResult::fail("boom");
        assert!(failed.is_failure());
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_from_domain_error() {
        let result: MutationResult = DomainError::IssueNotFound("K#1".to_string()).into();
        assert!(result.is_failure());
        assert!(result.error.unwrap().contains("K#1"));
    }
}
