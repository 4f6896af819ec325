//! # YANG Validation Core
//!
//! Core types for validating NETCONF edit-config requests against YANG
//! schemas.
//!
//! This crate provides the building blocks shared by every layer of the
//! validation engine: qualified names and paths, the compiled schema
//! registry, the arena data tree, edit-config payloads, NETCONF rpc-errors,
//! error handling and configuration.
//!
//! ## Design Principles
//!
//! - **Immutable schema**: a [`SchemaRegistry`] is compiled once and shared
//!   read-only across requests
//! - **Closed node kinds**: schema node and type variants are enums matched
//!   exhaustively
//! - **Arena ownership**: data nodes refer to their parent by index, the tree
//!   owns every node

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Error types for internal failures
pub mod error;

/// Qualified names, schema paths and instance paths
pub mod types;

/// Compiled schema node model
pub mod schema;

/// Serializable schema definition documents
pub mod definition;

/// Compiled schema registry with mount support
pub mod registry;

/// Arena data tree
pub mod data;

/// edit-config payload types
pub mod edit;

/// NETCONF rpc-error records
pub mod rpc_error;

/// Engine configuration
pub mod config;

/// Collaborator traits
pub mod traits;

// Re-export commonly used types
pub use config::ValidatorConfig;
pub use data::{DataNode, DataNodeKind, DataTree, NodeId, Placement};
pub use definition::{ModuleDefinition, NodeDefinition};
pub use edit::{EditChangeNode, EditConfigRequest, EditContainmentNode, EditMatchNode, EditOperation};
pub use error::{Result, YangError};
pub use registry::SchemaRegistry;
pub use rpc_error::{ErrorSeverity, ErrorTag, ErrorType, RpcError};
pub use schema::{LeafType, SchemaNode, SchemaNodeKind};
pub use traits::DataStoreManager;
pub use types::{InstancePath, ModuleIdentifier, QName, SchemaPath};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::ValidatorConfig;
    pub use crate::data::{DataNode, DataNodeKind, DataTree, NodeId, Placement};
    pub use crate::definition::{ModuleDefinition, NodeDefinition};
    pub use crate::edit::{
        EditChangeNode, EditConfigRequest, EditContainmentNode, EditMatchNode, EditOperation,
        InsertAnchor, InsertPosition,
    };
    pub use crate::error::{Result, YangError};
    pub use crate::registry::SchemaRegistry;
    pub use crate::rpc_error::{ErrorTag, ErrorType, RpcError, app_tags};
    pub use crate::schema::{IntegerKind, LeafType, SchemaNode, SchemaNodeKind};
    pub use crate::types::{QName, SchemaPath};
}
