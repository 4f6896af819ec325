//! Schema-mount resolution over a data tree
//!
//! A data node's schema path is relative to the registry that owns it. For
//! nodes below a mount point that is the mounted registry. The owning
//! registry is found by walking the node's ancestors up to the root and
//! following each mount point from the top down.

use std::sync::Arc;
use yang_core::data::{DataNode, DataTree, NodeId};
use yang_core::registry::SchemaRegistry;
use yang_core::schema::SchemaNode;
use yang_core::types::{InstancePath, SchemaPath};

/// Schema identity of a data node across mounts
///
/// `mounts` lists the schema paths of the enclosing mount points, outermost
/// first, each relative to the registry of the previous one. `path` is
/// relative to the innermost registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaKey {
    /// Enclosing mount point paths, outermost first
    pub mounts: Vec<SchemaPath>,
    /// Path in the owning registry
    pub path: SchemaPath,
}

impl SchemaKey {
    /// Key of a node of the top-level registry
    #[must_use]
    pub fn top_level(path: SchemaPath) -> Self {
        Self {
            mounts: Vec::new(),
            path,
        }
    }

    /// Whether both keys live in the same registry and one path contains
    /// the other
    #[must_use]
    pub fn overlaps(&self, other: &SchemaKey) -> bool {
        self.mounts == other.mounts && (self.path.contains(&other.path) || other.path.contains(&self.path))
    }
}

/// Root registry plus mount-aware lookups for data nodes
#[derive(Debug, Clone)]
pub struct SchemaContext {
    registry: Arc<SchemaRegistry>,
}

impl SchemaContext {
    /// Wrap the top-level registry
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// Top-level registry
    #[must_use]
    pub fn root_registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Shared handle to the top-level registry
    #[must_use]
    pub fn registry_handle(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Mount points strictly above `node`, outermost first
    fn mount_chain(&self, tree: &DataTree, node: NodeId) -> Vec<NodeId> {
        let mut chain: Vec<NodeId> = tree
            .ancestors(node)
            .into_iter()
            .filter(|id| tree.get(*id).is_some_and(|n| n.mount_point))
            .collect();
        chain.reverse();
        chain
    }

    /// Schema identity of `node`
    #[must_use]
    pub fn schema_key(&self, tree: &DataTree, node: NodeId) -> SchemaKey {
        let mounts = self
            .mount_chain(tree, node)
            .into_iter()
            .filter_map(|mount| tree.get(mount).map(|n| n.schema_path.clone()))
            .collect();
        let path = tree.get(node).map(|n| n.schema_path.clone()).unwrap_or_default();
        SchemaKey { mounts, path }
    }

    /// Registry that owns the schema of `node`
    #[must_use]
    pub fn registry_for(&self, tree: &DataTree, node: NodeId) -> &SchemaRegistry {
        let mut registry: &SchemaRegistry = &self.registry;
        for mount in self.mount_chain(tree, node) {
            let Some(point) = tree.get(mount) else {
                break;
            };
            match registry.mounted_registry(&point.schema_path) {
                Some(mounted) => registry = mounted.as_ref(),
                None => break,
            }
        }
        registry
    }

    /// Registry that owns the schema of the children of `node`
    #[must_use]
    pub fn child_registry(&self, tree: &DataTree, node: NodeId) -> &SchemaRegistry {
        let registry = self.registry_for(tree, node);
        match tree.get(node) {
            Some(DataNode {
                mount_point: true,
                schema_path,
                ..
            }) => registry
                .mounted_registry(schema_path)
                .map_or(registry, |mounted| mounted.as_ref()),
            _ => registry,
        }
    }

    /// Schema node of `node`
    #[must_use]
    pub fn schema_node(&self, tree: &DataTree, node: NodeId) -> Option<&SchemaNode> {
        let data = tree.get(node)?;
        self.registry_for(tree, node)
            .get_data_schema_node(&data.schema_path)
    }

    /// Root for absolute paths of expressions declared on `owner`
    ///
    /// Inside a mount the nearest mount point acts as the root; everywhere
    /// else it is the tree root.
    #[must_use]
    pub fn path_root(&self, tree: &DataTree, owner: NodeId) -> NodeId {
        tree.ancestors(owner)
            .into_iter()
            .find(|id| tree.get(*id).is_some_and(|n| n.mount_point))
            .unwrap_or_else(|| tree.root())
    }

    /// Prefix of `namespace` as registered by the registry owning `node`
    #[must_use]
    pub fn prefix_for(&self, tree: &DataTree, node: NodeId, namespace: &str) -> String {
        self.registry_for(tree, node)
            .prefix_for(namespace)
            .or_else(|| self.registry.prefix_for(namespace))
            .map_or_else(|| namespace.to_string(), str::to_string)
    }

    /// Instance identifier of `node` using local prefixes
    #[must_use]
    pub fn instance_path(&self, tree: &DataTree, node: NodeId) -> InstancePath {
        tree.instance_path(node, |id, namespace| self.prefix_for(tree, id, namespace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_core::data::Placement;
    use yang_core::definition::{ModuleDefinition, NodeDefinition};
    use yang_core::schema::LeafType;
    use yang_core::types::QName;

    const NS: &str = "urn:org:bbf:pma:validation";
    const INNER: &str = "urn:inner";

    fn context() -> SchemaContext {
        let inner = SchemaRegistry::builder()
            .module(
                ModuleDefinition::new("inner", INNER, "in").with_node(
                    NodeDefinition::container("inner-root")
                        .with_child(NodeDefinition::leaf("value", LeafType::string())),
                ),
            )
            .build()
            .unwrap();
        let registry = SchemaRegistry::builder()
            .module(
                ModuleDefinition::new("validation", NS, "validation").with_node(
                    NodeDefinition::container("validation")
                        .with_child(NodeDefinition::container("xml-subtree").mount_point("inner")),
                ),
            )
            .mount("inner", inner)
            .build()
            .unwrap();
        SchemaContext::new(Arc::new(registry))
    }

    #[test]
    fn test_mounted_nodes_resolve_against_mounted_registry() {
        let context = context();
        let mut tree = DataTree::new();
        let validation_path = SchemaPath::root().child(QName::new(NS, "validation"));
        let mount_path = validation_path.child(QName::new(NS, "xml-subtree"));
        let validation = tree
            .insert_child(
                tree.root(),
                DataNode::container(QName::new(NS, "validation"), validation_path),
                Placement::Last,
            )
            .unwrap();
        let mount = tree
            .insert_child(
                validation,
                DataNode::container(QName::new(NS, "xml-subtree"), mount_path.clone()).with_mount_point(),
                Placement::Last,
            )
            .unwrap();
        let inner_root_path = SchemaPath::root().child(QName::new(INNER, "inner-root"));
        let inner_root = tree
            .insert_child(
                mount,
                DataNode::container(QName::new(INNER, "inner-root"), inner_root_path.clone()),
                Placement::Last,
            )
            .unwrap();
        let leaf = tree
            .insert_child(
                inner_root,
                DataNode::leaf(
                    QName::new(INNER, "value"),
                    inner_root_path.child(QName::new(INNER, "value")),
                    "x",
                ),
                Placement::Last,
            )
            .unwrap();

        assert!(context.schema_node(&tree, mount).is_some());
        assert_eq!(context.schema_node(&tree, leaf).map(SchemaNode::name), Some("value"));
        assert_eq!(context.path_root(&tree, leaf), mount);
        assert_eq!(context.path_root(&tree, mount), tree.root());
        let key = context.schema_key(&tree, leaf);
        assert_eq!(key.mounts, vec![mount_path.clone()]);
        assert!(key.overlaps(&SchemaKey {
            mounts: vec![mount_path],
            path: inner_root_path,
        }));
        assert!(!key.overlaps(&SchemaKey::top_level(SchemaPath::root())));
        assert_eq!(
            context.instance_path(&tree, leaf).to_string(),
            "/validation:validation/validation:xml-subtree/in:inner-root/in:value"
        );
    }
}
