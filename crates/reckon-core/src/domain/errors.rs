//! Errors - エラー型と分類
//!
//! - [`ValidationError`]: malformed `TaskOutcome` input. Never retried.
//! - [`StoreError`]: raised by a pluggable outcome store, passed through
//!   unchanged.
//! - [`ReckonError`]: what public async operations return.
//!
//! Assessment algorithms themselves have no error type: they degrade to
//! low-confidence defaults instead of failing.

use thiserror::Error;

/// A `TaskOutcome` field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid task outcome: `{field}` {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Failure reported by an [`OutcomeStore`](crate::ports::OutcomeStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("outcome store unavailable: {0}")]
    Unavailable(String),

    #[error("outcome store rejected operation: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ReckonError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ReckonError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ReckonError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_the_field() {
        let err: ReckonError = ValidationError::new("approach", "must not be empty").into();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "invalid task outcome: `approach` must not be empty"
        );
    }
}
