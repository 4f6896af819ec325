//! Error types for YANG validation operations
//!
//! These are internal failures: a malformed schema, an inconsistent data
//! tree, an evaluator bug or a bad configuration. Constraint violations found
//! while validating an edit are reported as [`crate::rpc_error::RpcError`]
//! values instead and never travel through this type.

use thiserror::Error;

/// Main error type for YANG validation operations
#[derive(Error, Debug)]
pub enum YangError {
    /// The schema model is inconsistent or a lookup failed
    #[error("Schema error: {message}")]
    SchemaError {
        /// Error message
        message: String,
        /// Schema path involved, if known
        path: Option<String>,
    },

    /// The data tree is inconsistent with the operation requested
    #[error("Data tree error: {message}")]
    DataTreeError {
        /// Error message
        message: String,
        /// Instance path involved, if known
        path: Option<String>,
    },

    /// An expression could not be parsed or evaluated
    #[error("Expression error in '{expression}': {message}")]
    EvaluationError {
        /// Expression text
        expression: String,
        /// Error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic errors with context
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for YANG validation operations
pub type Result<T> = std::result::Result<T, YangError>;

impl YangError {
    /// Create a new schema error
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaError {
            message: message.into(),
            path: None,
        }
    }

    /// Create a new schema error attached to a schema path
    #[must_use]
    pub fn schema_at(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::SchemaError {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create a new data tree error
    #[must_use]
    pub fn data_tree(message: impl Into<String>) -> Self {
        Self::DataTreeError {
            message: message.into(),
            path: None,
        }
    }

    /// Create a new data tree error attached to an instance path
    #[must_use]
    pub fn data_tree_at(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::DataTreeError {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create a new expression evaluation error
    #[must_use]
    pub fn evaluation(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EvaluationError {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError(message.into())
    }

    /// Create a generic error
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            source: None,
        }
    }

    /// Create a generic error with source
    #[must_use]
    pub fn other_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<serde_json::Error> for YangError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for YangError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<regex::Error> for YangError {
    fn from(err: regex::Error) -> Self {
        Self::SchemaError {
            message: format!("invalid pattern: {err}"),
            path: None,
        }
    }
}

impl From<anyhow::Error> for YangError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            message: err.to_string(),
            source: Some(Box::new(std::io::Error::other(err))),
        }
    }
}
