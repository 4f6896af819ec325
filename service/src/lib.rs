//! # YANG Validation Service
//!
//! Constraint validation for NETCONF edit-config requests, RPCs and actions
//! against YANG schemas.
//!
//! ## Overview
//!
//! An edit-config request runs through a fixed pipeline on a staged copy of
//! the datastore:
//!
//! 1. **Apply**: operations are applied and every touched node is recorded
//!    in a change set
//! 2. **Defaults**: schema defaults are materialized under existing parents
//! 3. **Validate**: `when` conditions are evaluated to a fixpoint, then
//!    structure and values, then `must` expressions, then referential
//!    integrity (`leafref`, `instance-identifier`)
//! 4. **Commit**: only a fully valid copy replaces the datastore
//!
//! Every rejection carries NETCONF rpc-errors with the exact tag, app-tag,
//! message and instance path clients rely on.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use yang_core::prelude::*;
//! use yang_service::datastore::DatastoreService;
//! use yang_service::validator::ConstraintValidator;
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let ns = "urn:org:bbf:pma:validation";
//! let registry = SchemaRegistry::builder()
//!     .module(ModuleDefinition::new("validation", ns, "validation").with_node(
//!         NodeDefinition::container("validation").with_children([
//!             NodeDefinition::leaf("leaf1", LeafType::string()),
//!             NodeDefinition::leaf("leaf2", LeafType::integer(IntegerKind::Uint8))
//!                 .with_must("../leaf1 = 'leaf1'"),
//!         ]),
//!     ))
//!     .build()?;
//! let validator = ConstraintValidator::new(Arc::new(registry), ValidatorConfig::default())?;
//! let service = DatastoreService::in_memory(Arc::new(validator));
//!
//! let edit = EditContainmentNode::new(QName::new(ns, "validation"))
//!     .with_leaf(QName::new(ns, "leaf2"), "1");
//! let err = service.edit_config(&EditConfigRequest::single(edit)).unwrap_err();
//! assert_eq!(
//!     err.first_rpc_error().map(|e| e.message.as_str()),
//!     Some("Violate must constraints: ../leaf1 = 'leaf1'")
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`edit`]: edit application, change tracking and defaults
//! - [`validator`]: the phased constraint validator
//! - [`expression`]: the XPath engine behind `must`, `when` and `path`
//! - [`integrity`]: `leafref` and `instance-identifier` checks
//! - [`rpc`]: RPC and action payloads
//! - [`datastore`]: atomic edit-config over a datastore
//! - [`json`]: RFC 7951 JSON read and write

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

/// Mounted schema resolution
pub mod mount;

/// XSD regular expressions
pub mod patterns;

/// XPath expression engine
pub mod expression;

/// Validation outcome types
pub mod error;

/// Constraint validation
pub mod validator;

/// Referential integrity
pub mod integrity;

/// Edit application and defaults
pub mod edit;

/// RPC and action validation
pub mod rpc;

/// Atomic datastore edits
pub mod datastore;

/// RFC 7951 JSON encoding
pub mod json;

/// Command-line interface
pub mod cli;

// Re-export commonly used types
pub use datastore::{DatastoreService, InMemoryDataStore};
pub use edit::{ChangeSet, EditApplier, WithDefaults};
pub use error::{RpcErrors, ValidationError, ValidationResult};
pub use expression::ExpressionEngine;
pub use mount::SchemaContext;
pub use rpc::{RpcValidator, TargetStep};
pub use validator::ConstraintValidator;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::datastore::{DatastoreService, InMemoryDataStore};
    pub use crate::edit::{Change, ChangeKind, ChangeSet, WithDefaults};
    pub use crate::error::{RpcErrors, ValidationError, ValidationResult};
    pub use crate::expression::ExpressionEngine;
    pub use crate::rpc::{RpcValidator, TargetStep};
    pub use crate::validator::ConstraintValidator;
    pub use yang_core::prelude::*;
}
