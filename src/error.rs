use std::fmt;

/// Error taxonomy for ledger operations.
///
/// `Validation` means the input itself was malformed and retrying the same
/// call can never succeed. `Storage` wraps an I/O or constraint failure from
/// the backend; callers may retry those for transient causes. Lookups that
/// miss (an account or transaction not owned by the requesting user) are not
/// errors at all: the operation reports zero rows affected.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("validation failed for {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("storage failure")]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Message safe to surface through the presentation boundary.
    ///
    /// Storage detail (paths, serde messages) is only included when the
    /// process runs with `debug_errors` enabled.
    pub fn user_message(&self, debug: bool) -> String {
        match self {
            Self::Validation { .. } => self.to_string(),
            Self::Storage(inner) if debug => format!("storage failure: {inner:#}"),
            Self::Storage(_) => "internal storage error".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Outcome of a best-effort batch operation.
///
/// Individual item failures are collected rather than aborting the batch, so
/// callers and tests can assert on partial-failure counts.
pub struct BatchResult<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<(T, LedgerError)>,
}

impl<T> BatchResult<T> {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for BatchResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchResult")
            .field("succeeded", &self.succeeded.len())
            .field("failed", &self.failed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_detail_is_hidden_without_debug() {
        let err = LedgerError::Storage(anyhow::anyhow!("open /secret/path: permission denied"));
        assert_eq!(err.user_message(false), "internal storage error");
        assert!(err.user_message(true).contains("permission denied"));
    }

    #[test]
    fn validation_message_is_always_surfaced() {
        let err = LedgerError::validation("account_id", "must not be empty");
        assert!(err.user_message(false).contains("account_id"));
        assert!(err.is_validation());
    }
}
