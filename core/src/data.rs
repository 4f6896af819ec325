//! Arena data tree
//!
//! Nodes live in a vector owned by [`DataTree`] and refer to each other by
//! [`NodeId`]. The parent link is a plain index, so the tree is the sole owner
//! of every node. Removed nodes leave a tombstone; ids are never reused, which
//! keeps ids stable across a [`DataTree::deep_clone`] used for staging.

use crate::error::{Result, YangError};
use crate::types::{InstancePath, KeyPredicate, PathSegment, QName, SchemaPath};
use serde::{Deserialize, Serialize};

/// Index of a node in a [`DataTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Raw arena index
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a data node instantiates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataNodeKind {
    /// Datastore root, or the input/output node of an RPC tree
    Root,
    /// Container instance
    Container,
    /// List entry with its key leaf names in declaration order
    ListEntry {
        /// Key leaves
        keys: Vec<QName>,
    },
    /// Leaf
    Leaf,
    /// Leaf-list entry
    LeafListEntry,
    /// Anydata, value holds the JSON text
    Anydata,
}

/// A live data node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataNode {
    /// Qualified name
    pub qname: QName,
    /// Schema path in the registry that owns this node
    pub schema_path: SchemaPath,
    /// Node kind
    pub kind: DataNodeKind,
    /// Canonical value for leaves and leaf-list entries
    pub value: Option<String>,
    /// Whether the value was materialized from a schema default
    pub is_default: bool,
    /// Whether children of this container belong to a mounted schema
    pub mount_point: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl DataNode {
    fn new(qname: QName, schema_path: SchemaPath, kind: DataNodeKind, value: Option<String>) -> Self {
        Self {
            qname,
            schema_path,
            kind,
            value,
            is_default: false,
            mount_point: false,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Container instance
    #[must_use]
    pub fn container(qname: QName, schema_path: SchemaPath) -> Self {
        Self::new(qname, schema_path, DataNodeKind::Container, None)
    }

    /// List entry; key leaves are added as children
    #[must_use]
    pub fn list_entry(qname: QName, schema_path: SchemaPath, keys: Vec<QName>) -> Self {
        Self::new(qname, schema_path, DataNodeKind::ListEntry { keys }, None)
    }

    /// Leaf with a value
    pub fn leaf(qname: QName, schema_path: SchemaPath, value: impl Into<String>) -> Self {
        Self::new(qname, schema_path, DataNodeKind::Leaf, Some(value.into()))
    }

    /// Leaf-list entry with a value
    pub fn leaf_list_entry(qname: QName, schema_path: SchemaPath, value: impl Into<String>) -> Self {
        Self::new(qname, schema_path, DataNodeKind::LeafListEntry, Some(value.into()))
    }

    /// Anydata holding JSON text
    pub fn anydata(qname: QName, schema_path: SchemaPath, json: impl Into<String>) -> Self {
        Self::new(qname, schema_path, DataNodeKind::Anydata, Some(json.into()))
    }

    /// Mark as materialized from a default
    #[must_use]
    pub fn defaulted(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Mark as a schema mount point
    #[must_use]
    pub fn with_mount_point(mut self) -> Self {
        self.mount_point = true;
        self
    }

    /// Parent node, `None` for the root
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in document order
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether the node carries a value
    #[must_use]
    pub fn is_value_node(&self) -> bool {
        matches!(
            self.kind,
            DataNodeKind::Leaf | DataNodeKind::LeafListEntry | DataNodeKind::Anydata
        )
    }
}

/// Where to insert a child among its same-named siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// After the last sibling of the same name, or at the end
    Last,
    /// Before the first sibling of the same name, or at the end
    First,
    /// Immediately before the given sibling
    Before(NodeId),
    /// Immediately after the given sibling
    After(NodeId),
}

/// Arena-backed configuration tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTree {
    nodes: Vec<Option<DataNode>>,
}

impl Default for DataTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DataTree {
    /// Empty tree rooted at the datastore root
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(QName::new("", ""), SchemaPath::root())
    }

    /// Empty tree whose root stands for a schema node (RPC input or output)
    #[must_use]
    pub fn with_root(qname: QName, schema_path: SchemaPath) -> Self {
        Self {
            nodes: vec![Some(DataNode::new(qname, schema_path, DataNodeKind::Root, None))],
        }
    }

    /// Root node id
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Node by id, `None` if it was removed
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&DataNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut DataNode> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    fn require(&self, id: NodeId) -> Result<&DataNode> {
        self.get(id)
            .ok_or_else(|| YangError::data_tree(format!("node {} does not exist", id.0)))
    }

    /// Whether `id` refers to a live node
    #[must_use]
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes, root included
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Parent of `id`
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(DataNode::parent)
    }

    /// Children of `id` in document order
    #[must_use]
    pub fn get_children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], DataNode::children)
    }

    /// Children of `id` with the given name
    #[must_use]
    pub fn get_children_named(&self, id: NodeId, qname: &QName) -> Vec<NodeId> {
        self.get_children(id)
            .iter()
            .copied()
            .filter(|child| self.get(*child).is_some_and(|n| &n.qname == qname))
            .collect()
    }

    /// First child of `id` with the given name
    #[must_use]
    pub fn get_child(&self, id: NodeId, qname: &QName) -> Option<NodeId> {
        self.get_children(id)
            .iter()
            .copied()
            .find(|child| self.get(*child).is_some_and(|n| &n.qname == qname))
    }

    /// Value of a leaf, leaf-list entry or anydata
    #[must_use]
    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| n.value.as_deref())
    }

    /// Replace the value of a value node
    ///
    /// # Errors
    ///
    /// Fails when the node does not exist or carries no value.
    pub fn set_value(&mut self, id: NodeId, value: impl Into<String>, is_default: bool) -> Result<()> {
        let node = self
            .get_mut(id)
            .ok_or_else(|| YangError::data_tree(format!("node {} does not exist", id.0)))?;
        if !node.is_value_node() {
            return Err(YangError::data_tree(format!(
                "node '{}' cannot hold a value",
                node.qname.local()
            )));
        }
        node.value = Some(value.into());
        node.is_default = is_default;
        Ok(())
    }

    /// Set the `is_default` flag
    pub fn set_default_flag(&mut self, id: NodeId, is_default: bool) {
        if let Some(node) = self.get_mut(id) {
            node.is_default = is_default;
        }
    }

    /// Insert `node` under `parent`
    ///
    /// # Errors
    ///
    /// Fails when `parent` does not exist or an anchor is not a child of it.
    pub fn insert_child(&mut self, parent: NodeId, mut node: DataNode, placement: Placement) -> Result<NodeId> {
        let index = self.position_for(parent, &node.qname, placement)?;
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(Some(node));
        if let Some(parent_node) = self.get_mut(parent) {
            parent_node.children.insert(index, id);
        }
        Ok(id)
    }

    /// Move an existing child among its siblings
    ///
    /// # Errors
    ///
    /// Fails when `id` has no parent or the anchor is not a sibling.
    pub fn reposition(&mut self, id: NodeId, placement: Placement) -> Result<()> {
        if matches!(placement, Placement::Before(anchor) | Placement::After(anchor) if anchor == id) {
            return Ok(());
        }
        let node = self.require(id)?;
        let qname = node.qname.clone();
        let parent = node
            .parent
            .ok_or_else(|| YangError::data_tree("cannot reposition the root"))?;
        if let Some(parent_node) = self.get_mut(parent) {
            parent_node.children.retain(|child| *child != id);
        }
        let index = self.position_for(parent, &qname, placement)?;
        if let Some(parent_node) = self.get_mut(parent) {
            parent_node.children.insert(index, id);
        }
        Ok(())
    }

    fn position_for(&self, parent: NodeId, qname: &QName, placement: Placement) -> Result<usize> {
        let children = self.require(parent)?.children();
        let anchor_index = |anchor: NodeId| {
            children.iter().position(|c| *c == anchor).ok_or_else(|| {
                YangError::data_tree(format!("anchor {} is not a child of {}", anchor.0, parent.0))
            })
        };
        let same_name = |c: &NodeId| self.get(*c).is_some_and(|n| &n.qname == qname);
        Ok(match placement {
            Placement::Before(anchor) => anchor_index(anchor)?,
            Placement::After(anchor) => anchor_index(anchor)? + 1,
            Placement::First => children
                .iter()
                .position(same_name)
                .unwrap_or(children.len()),
            Placement::Last => children
                .iter()
                .rposition(same_name)
                .map_or(children.len(), |i| i + 1),
        })
    }

    /// Detach and tombstone `id` and its descendants, returning the removed ids
    ///
    /// # Errors
    ///
    /// Fails for the root or a node that does not exist.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        let parent = self
            .require(id)?
            .parent
            .ok_or_else(|| YangError::data_tree("cannot remove the root"))?;
        let removed = self.descendants(id);
        if let Some(parent_node) = self.get_mut(parent) {
            parent_node.children.retain(|child| *child != id);
        }
        for node in &removed {
            if let Some(slot) = self.nodes.get_mut(node.0) {
                *slot = None;
            }
        }
        Ok(removed)
    }

    /// `id` and every descendant in pre-order
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Ancestors of `id`, nearest first, root included
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            out.push(node);
            current = self.parent(node);
        }
        out
    }

    /// Key values of a list entry in key declaration order
    #[must_use]
    pub fn key_values(&self, entry: NodeId) -> Vec<(QName, String)> {
        let Some(DataNode {
            kind: DataNodeKind::ListEntry { keys },
            ..
        }) = self.get(entry)
        else {
            return Vec::new();
        };
        keys.iter()
            .map(|key| {
                let value = self
                    .get_child(entry, key)
                    .and_then(|leaf| self.value(leaf))
                    .unwrap_or_default()
                    .to_string();
                (key.clone(), value)
            })
            .collect()
    }

    /// Entry of list `qname` under `parent` whose keys equal `keys`
    #[must_use]
    pub fn find_list_entry(&self, parent: NodeId, qname: &QName, keys: &[(QName, String)]) -> Option<NodeId> {
        self.get_children_named(parent, qname).into_iter().find(|entry| {
            keys.iter().all(|(key, value)| {
                self.get_child(*entry, key)
                    .and_then(|leaf| self.value(leaf))
                    .is_some_and(|v| v == value)
            })
        })
    }

    /// Entry of leaf-list `qname` under `parent` holding `value`
    #[must_use]
    pub fn find_leaf_list_entry(&self, parent: NodeId, qname: &QName, value: &str) -> Option<NodeId> {
        self.get_children_named(parent, qname)
            .into_iter()
            .find(|entry| self.value(*entry) == Some(value))
    }

    /// Instance identifier of `id`
    ///
    /// `prefix_for` maps a node and a namespace to the prefix registered in
    /// the schema that owns the node.
    pub fn instance_path(&self, id: NodeId, prefix_for: impl Fn(NodeId, &str) -> String) -> InstancePath {
        let mut chain: Vec<NodeId> = self.ancestors(id).into_iter().rev().collect();
        chain.push(id);
        let mut path = InstancePath::root();
        for node_id in chain {
            let Some(node) = self.get(node_id) else {
                continue;
            };
            if node.kind == DataNodeKind::Root {
                continue;
            }
            let namespace = node.qname.namespace.to_string();
            let keys = self
                .key_values(node_id)
                .into_iter()
                .map(|(key, value)| KeyPredicate {
                    prefix: prefix_for(node_id, &key.namespace),
                    name: key.local().to_string(),
                    value,
                })
                .collect();
            let value = match node.kind {
                DataNodeKind::LeafListEntry => node.value.clone(),
                _ => None,
            };
            path.push(PathSegment {
                prefix: prefix_for(node_id, &namespace),
                namespace,
                name: node.qname.local().to_string(),
                keys,
                value,
            });
        }
        path
    }

    /// Copy of the whole tree with identical node ids
    #[must_use]
    pub fn deep_clone(&self) -> Self {
        self.clone()
    }
}
