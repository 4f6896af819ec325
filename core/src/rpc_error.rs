//! NETCONF `rpc-error` records
//!
//! An [`RpcError`] is the user-facing outcome of a rejected request. It is an
//! immutable value object: the reporter builds it once from a validation
//! failure and the RPC layer serializes it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known `error-app-tag` values
pub mod app_tags {
    /// A must expression evaluated to false
    pub const MUST_VIOLATION: &str = "must-violation";
    /// A when expression evaluated to false for user data
    pub const WHEN_VIOLATION: &str = "when-violation";
    /// A mandatory leaf, leafref target or instance-identifier target is missing
    pub const INSTANCE_REQUIRED: &str = "instance-required";
    /// A mandatory choice has no case with data
    pub const MISSING_CHOICE: &str = "missing-choice";
    /// Fewer instances than min-elements
    pub const TOO_FEW_ELEMENTS: &str = "too-few-elements";
    /// More instances than max-elements
    pub const TOO_MANY_ELEMENTS: &str = "too-many-elements";
    /// Duplicate keys, leaf-list values or unique tuples
    pub const DATA_NOT_UNIQUE: &str = "data-not-unique";
    /// Value outside a length restriction
    pub const LENGTH_OUT_OF_BOUNDS: &str = "length-out-of-specified-bounds";
    /// Value outside a range restriction
    pub const RANGE_OUT_OF_BOUNDS: &str = "range-out-of-specified-bounds";
    /// The anchor of an `insert` before/after does not exist
    pub const MISSING_INSTANCE: &str = "missing-instance";
}

/// `error-type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    /// Secure transport layer
    Transport,
    /// Messages layer
    Rpc,
    /// Operations layer
    Protocol,
    /// Content layer
    Application,
}

impl ErrorType {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::Transport => "transport",
            ErrorType::Rpc => "rpc",
            ErrorType::Protocol => "protocol",
            ErrorType::Application => "application",
        }
    }
}

/// `error-severity`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// error
    #[default]
    Error,
    /// warning
    Warning,
}

/// `error-tag` vocabulary of RFC 6241 appendix A
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorTag {
    /// in-use
    InUse,
    /// invalid-value
    InvalidValue,
    /// too-big
    TooBig,
    /// missing-attribute
    MissingAttribute,
    /// bad-attribute
    BadAttribute,
    /// unknown-attribute
    UnknownAttribute,
    /// missing-element
    MissingElement,
    /// bad-element
    BadElement,
    /// unknown-element
    UnknownElement,
    /// unknown-namespace
    UnknownNamespace,
    /// access-denied
    AccessDenied,
    /// lock-denied
    LockDenied,
    /// resource-denied
    ResourceDenied,
    /// rollback-failed
    RollbackFailed,
    /// data-exists
    DataExists,
    /// data-missing
    DataMissing,
    /// operation-not-supported
    OperationNotSupported,
    /// operation-failed
    OperationFailed,
    /// malformed-message
    MalformedMessage,
}

impl ErrorTag {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorTag::InUse => "in-use",
            ErrorTag::InvalidValue => "invalid-value",
            ErrorTag::TooBig => "too-big",
            ErrorTag::MissingAttribute => "missing-attribute",
            ErrorTag::BadAttribute => "bad-attribute",
            ErrorTag::UnknownAttribute => "unknown-attribute",
            ErrorTag::MissingElement => "missing-element",
            ErrorTag::BadElement => "bad-element",
            ErrorTag::UnknownElement => "unknown-element",
            ErrorTag::UnknownNamespace => "unknown-namespace",
            ErrorTag::AccessDenied => "access-denied",
            ErrorTag::LockDenied => "lock-denied",
            ErrorTag::ResourceDenied => "resource-denied",
            ErrorTag::RollbackFailed => "rollback-failed",
            ErrorTag::DataExists => "data-exists",
            ErrorTag::DataMissing => "data-missing",
            ErrorTag::OperationNotSupported => "operation-not-supported",
            ErrorTag::OperationFailed => "operation-failed",
            ErrorTag::MalformedMessage => "malformed-message",
        }
    }
}

impl fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single NETCONF `rpc-error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    /// error-tag
    pub tag: ErrorTag,
    /// error-type
    pub error_type: ErrorType,
    /// error-severity
    pub severity: ErrorSeverity,
    /// error-app-tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_tag: Option<String>,
    /// error-message
    pub message: String,
    /// error-path rendered with registered prefixes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Prefix to namespace bindings used by `path`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_namespaces: Option<IndexMap<String, String>>,
}

impl RpcError {
    /// Create an application level error
    pub fn new(tag: ErrorTag, message: impl Into<String>) -> Self {
        Self {
            tag,
            error_type: ErrorType::Application,
            severity: ErrorSeverity::Error,
            app_tag: None,
            message: message.into(),
            path: None,
            path_namespaces: None,
        }
    }

    /// Create a protocol level error
    pub fn protocol(tag: ErrorTag, message: impl Into<String>) -> Self {
        Self {
            error_type: ErrorType::Protocol,
            ..Self::new(tag, message)
        }
    }

    /// Set the app-tag
    #[must_use]
    pub fn with_app_tag(mut self, app_tag: impl Into<String>) -> Self {
        self.app_tag = Some(app_tag.into());
        self
    }

    /// Set the error path and its namespace bindings
    #[must_use]
    pub fn with_path(
        mut self,
        path: impl Into<String>,
        namespaces: IndexMap<String, String>,
    ) -> Self {
        self.path = Some(path.into());
        self.path_namespaces = Some(namespaces);
        self
    }

    /// Downgrade to a warning
    #[must_use]
    pub fn as_warning(mut self) -> Self {
        self.severity = ErrorSeverity::Warning;
        self
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}", self.error_type, self.tag)?;
        if let Some(app_tag) = &self.app_tag {
            write!(f, "/{app_tag}")?;
        }
        write!(f, "] {}", self.message)?;
        if let Some(path) = &self.path {
            write!(f, " at {path}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_display() {
        let err = RpcError::new(ErrorTag::OperationFailed, "Violate must constraints: ../a = 'a'")
            .with_app_tag(app_tags::MUST_VIOLATION)
            .with_path(
                "/validation:validation/validation:b",
                IndexMap::from([(
                    "validation".to_string(),
                    "urn:org:bbf:pma:validation".to_string(),
                )]),
            );

        assert_eq!(err.error_type, ErrorType::Application);
        assert_eq!(
            err.to_string(),
            "[application/operation-failed/must-violation] Violate must constraints: ../a = 'a' at /validation:validation/validation:b"
        );
    }

    #[test]
    fn test_protocol_error_has_no_path() {
        let err = RpcError::protocol(ErrorTag::BadElement, "No matched action found on the models");
        assert_eq!(err.error_type, ErrorType::Protocol);
        assert!(err.path.is_none());
        let json = serde_json::to_value(&err).expect("serialize");
        assert_eq!(json["tag"], "bad-element");
        assert!(json.get("path").is_none());
    }
}
