//! Record of the mutations an edit made to a staged tree

use crate::mount::{SchemaContext, SchemaKey};
use serde::Serialize;
use std::collections::HashSet;
use yang_core::data::{DataTree, NodeId};
use yang_core::types::InstancePath;

/// Kind of mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Node inserted
    Created,
    /// Leaf value replaced, or children replaced
    Modified,
    /// Subtree removed
    Deleted,
}

/// One mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    /// Kind of mutation
    pub kind: ChangeKind,
    /// Affected node; dead after a deletion
    #[serde(skip)]
    pub node: NodeId,
    /// Parent at the time of the change
    #[serde(skip)]
    pub parent: Option<NodeId>,
    /// Schema identity of the node
    #[serde(skip)]
    pub schema_key: SchemaKey,
    /// Instance path at the time of the change
    pub path: InstancePath,
    /// Whether the node was materialized from a schema default
    pub defaulted: bool,
}

/// Ordered mutations of one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Empty change set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mutation of `node`
    ///
    /// Deletions must be recorded before the subtree is removed, while the
    /// node still resolves.
    pub fn record(&mut self, kind: ChangeKind, tree: &DataTree, schema: &SchemaContext, node: NodeId) {
        let defaulted = tree.get(node).is_some_and(|n| n.is_default);
        self.changes.push(Change {
            kind,
            node,
            parent: tree.parent(node),
            schema_key: schema.schema_key(tree, node),
            path: schema.instance_path(tree, node),
            defaulted,
        });
    }

    /// Drop every change recorded for `node`
    pub fn forget(&mut self, node: NodeId) {
        self.changes.retain(|change| change.node != node);
    }

    /// Append the changes of `other`
    pub fn extend(&mut self, other: ChangeSet) {
        self.changes.extend(other.changes);
    }

    /// Changes in the order they were made
    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    /// Number of changes
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether nothing changed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Nodes the client wrote: created or modified, defaults excluded
    #[must_use]
    pub fn written_nodes(&self) -> HashSet<NodeId> {
        self.changes
            .iter()
            .filter(|change| change.kind != ChangeKind::Deleted && !change.defaulted)
            .map(|change| change.node)
            .collect()
    }

    /// Schema identities of every changed node
    #[must_use]
    pub fn schema_keys(&self) -> HashSet<&SchemaKey> {
        self.changes.iter().map(|change| &change.schema_key).collect()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}
