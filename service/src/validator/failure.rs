//! Internal validation failures
//!
//! Checks produce a [`ValidationFailure`]; only the
//! [`super::reporter::ErrorReporter`] turns it into the NETCONF wire shape.

use indexmap::IndexMap;
use yang_core::types::InstancePath;

/// What went wrong
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Fewer list entries or leaf-list values than min-elements
    TooFewElements {
        /// List or leaf-list name
        name: String,
        /// min-elements
        min: u32,
    },
    /// More list entries or leaf-list values than max-elements
    TooManyElements {
        /// List or leaf-list name
        name: String,
        /// max-elements
        max: u32,
    },
    /// A must expression is false
    MustViolation {
        /// Expression text
        expression: String,
        /// Custom error-message
        error_message: Option<String>,
        /// Custom error-app-tag
        error_app_tag: Option<String>,
    },
    /// A when expression is false for data the request wrote
    WhenViolation {
        /// Expression text
        expression: String,
    },
    /// A mandatory leaf is absent
    MissingMandatoryLeaf {
        /// Leaf name
        name: String,
    },
    /// A mandatory choice has no case with data
    MissingChoice {
        /// Choice name
        name: String,
    },
    /// A leafref or instance-identifier target is absent
    DependencyViolated {
        /// Referencing value
        value: String,
    },
    /// The same list entry or leaf-list value appears twice in one payload
    DuplicateElements {
        /// List or leaf-list name
        name: String,
    },
    /// Two list entries share the values of a unique group
    NotUnique {
        /// List name
        name: String,
        /// Unique leaves and the shared values
        values: IndexMap<String, String>,
    },
    /// Keys of a list entry are missing or not in declaration order
    MissingKeys {
        /// Key names in declaration order
        keys: Vec<String>,
    },
    /// The payload names a node the schema does not have
    UnknownElement {
        /// Element name
        name: String,
    },
    /// A value does not match its type
    InvalidValue {
        /// Type specific message
        message: String,
        /// Custom or restriction specific app-tag
        app_tag: Option<String>,
    },
    /// The anchor of an insert before/after does not exist
    MissingInsertAnchor,
    /// `create` on existing data
    DataExists,
    /// `delete` on missing data
    DataMissing,
    /// The rpc is not in the schema
    UnknownRpc,
    /// The action or its target is not in the schema or datastore
    UnknownAction,
}

/// A failure located in the data tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// What went wrong
    pub kind: FailureKind,
    /// Where, `None` for protocol level failures
    pub path: Option<InstancePath>,
}

impl ValidationFailure {
    /// Failure at `path`
    #[must_use]
    pub fn at(kind: FailureKind, path: InstancePath) -> Self {
        Self {
            kind,
            path: Some(path),
        }
    }

    /// Failure with no location
    #[must_use]
    pub fn unlocated(kind: FailureKind) -> Self {
        Self { kind, path: None }
    }
}
