//! Schema default materialization and with-defaults reporting modes

use super::change_set::{ChangeKind, ChangeSet};
use crate::mount::SchemaContext;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::trace;
use yang_core::data::{DataNode, DataNodeKind, DataTree, NodeId, Placement};
use yang_core::error::Result;
use yang_core::registry::SchemaRegistry;
use yang_core::schema::{SchemaNode, SchemaNodeKind};
use yang_core::types::SchemaPath;

/// How read-back treats default values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WithDefaults {
    /// Report every value, defaults included
    #[default]
    ReportAll,
    /// Omit values equal to their schema default
    Trim,
    /// Omit values that were not set by a client
    Explicit,
}

/// Fill in schema defaults below every existing interior node
///
/// Leaf defaults are added where the leaf is absent, leaf-list defaults
/// where the leaf-list has no entries, and the default case of a choice is
/// filled when no case holds data. Absent containers are not created.
/// Every added node is flagged as default and recorded as created.
///
/// # Errors
///
/// Returns an error when the tree rejects an insertion.
pub fn materialize(schema: &SchemaContext, tree: &mut DataTree, changes: &mut ChangeSet) -> Result<()> {
    let root = tree.root();
    materialize_under(schema, tree, root, changes)
}

/// [`materialize`] restricted to `top` and the nodes below it
///
/// # Errors
///
/// Returns an error when the tree rejects an insertion.
pub fn materialize_under(schema: &SchemaContext, tree: &mut DataTree, top: NodeId, changes: &mut ChangeSet) -> Result<()> {
    let interior: Vec<NodeId> = tree
        .descendants(top)
        .into_iter()
        .filter(|node| {
            tree.get(*node).is_some_and(|data| {
                matches!(
                    data.kind,
                    DataNodeKind::Root | DataNodeKind::Container | DataNodeKind::ListEntry { .. }
                )
            })
        })
        .collect();
    for node in interior {
        let Some(data) = tree.get(node) else {
            continue;
        };
        let schema_parent = if data.mount_point {
            SchemaPath::root()
        } else {
            data.schema_path.clone()
        };
        let registry = schema.child_registry(tree, node);
        fill(schema, tree, node, registry, &schema_parent, changes)?;
    }
    Ok(())
}

fn fill(
    schema: &SchemaContext,
    tree: &mut DataTree,
    parent: NodeId,
    registry: &SchemaRegistry,
    schema_parent: &SchemaPath,
    changes: &mut ChangeSet,
) -> Result<()> {
    for child in registry.children(schema_parent) {
        match &child.kind {
            SchemaNodeKind::Leaf {
                default: Some(default), ..
            } => {
                if tree.get_child(parent, &child.qname).is_none() {
                    let node = DataNode::leaf(child.qname.clone(), child.path.clone(), default.clone()).defaulted();
                    let id = tree.insert_child(parent, node, Placement::Last)?;
                    trace!(leaf = %child.path, default = %default, "materialized default");
                    changes.record(ChangeKind::Created, tree, schema, id);
                }
            }
            SchemaNodeKind::LeafList { defaults, .. } if !defaults.is_empty() => {
                if tree.get_children_named(parent, &child.qname).is_empty() {
                    for default in defaults {
                        let node =
                            DataNode::leaf_list_entry(child.qname.clone(), child.path.clone(), default.clone())
                                .defaulted();
                        let id = tree.insert_child(parent, node, Placement::Last)?;
                        changes.record(ChangeKind::Created, tree, schema, id);
                    }
                }
            }
            SchemaNodeKind::Choice { default_case, .. } => {
                let case_path = match active_case(tree, parent, registry, child) {
                    Some(case) => Some(case.path.clone()),
                    None => default_case.as_ref().map(|case| child.path.child(case.clone())),
                };
                if let Some(case_path) = case_path {
                    fill(schema, tree, parent, registry, &case_path, changes)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Case of `choice` holding data under `parent`
#[must_use]
pub fn active_case<'r>(
    tree: &DataTree,
    parent: NodeId,
    registry: &'r SchemaRegistry,
    choice: &SchemaNode,
) -> Option<&'r SchemaNode> {
    registry.children(&choice.path).into_iter().find(|case| {
        registry
            .data_children(&case.path)
            .iter()
            .any(|child| tree.get_child(parent, &child.qname).is_some())
    })
}
