//! Outcome types of validation
//!
//! A rejected request is an expected outcome carrying NETCONF rpc-errors; an
//! internal error means the schema or the engine itself is broken. Keeping
//! them apart lets the RPC layer answer the client in the first case and
//! log loudly in the second.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use yang_core::error::YangError;
use yang_core::rpc_error::RpcError;

/// Ordered rpc-errors of a rejected request, first failure first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RpcErrors(Vec<RpcError>);

impl RpcErrors {
    /// Wrap a list of errors
    #[must_use]
    pub fn new(errors: Vec<RpcError>) -> Self {
        Self(errors)
    }

    /// Single error
    #[must_use]
    pub fn single(error: RpcError) -> Self {
        Self(vec![error])
    }

    /// The error clients see first
    #[must_use]
    pub fn first(&self) -> Option<&RpcError> {
        self.0.first()
    }

    /// Iterate in report order
    pub fn iter(&self) -> std::slice::Iter<'_, RpcError> {
        self.0.iter()
    }

    /// Number of errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no errors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Take the errors
    #[must_use]
    pub fn into_vec(self) -> Vec<RpcError> {
        self.0
    }
}

impl From<RpcError> for RpcErrors {
    fn from(error: RpcError) -> Self {
        Self::single(error)
    }
}

impl<'a> IntoIterator for &'a RpcErrors {
    type Item = &'a RpcError;
    type IntoIter = std::slice::Iter<'a, RpcError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for RpcErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

/// Failure of a validated operation
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The request violates the schema
    #[error("request rejected: {0}")]
    Rejected(RpcErrors),

    /// The schema or the engine is broken
    #[error(transparent)]
    Internal(#[from] YangError),
}

impl ValidationError {
    /// Rejection with a single error
    #[must_use]
    pub fn rejected(error: RpcError) -> Self {
        ValidationError::Rejected(RpcErrors::single(error))
    }

    /// The rpc-errors of a rejection
    #[must_use]
    pub fn rpc_errors(&self) -> Option<&RpcErrors> {
        match self {
            ValidationError::Rejected(errors) => Some(errors),
            ValidationError::Internal(_) => None,
        }
    }

    /// First rpc-error of a rejection
    #[must_use]
    pub fn first_rpc_error(&self) -> Option<&RpcError> {
        self.rpc_errors().and_then(RpcErrors::first)
    }
}

impl From<RpcErrors> for ValidationError {
    fn from(errors: RpcErrors) -> Self {
        ValidationError::Rejected(errors)
    }
}

/// Result type for validated operations
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use yang_core::rpc_error::ErrorTag;

    #[test]
    fn test_rejections_expose_first_error() {
        let error = ValidationError::from(RpcErrors::new(vec![
            RpcError::new(ErrorTag::OperationFailed, "first"),
            RpcError::new(ErrorTag::DataMissing, "second"),
        ]));
        assert_eq!(error.first_rpc_error().map(|e| e.message.as_str()), Some("first"));
        assert_eq!(error.rpc_errors().map(RpcErrors::len), Some(2));

        let internal = ValidationError::from(YangError::schema("broken"));
        assert!(internal.rpc_errors().is_none());
    }
}
