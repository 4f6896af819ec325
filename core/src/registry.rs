//! Compiled schema registry
//!
//! The registry is built once from [`ModuleDefinition`]s and is immutable
//! afterwards; validators share it behind an `Arc`. Schema-mounted registries
//! are owned by their parent and keyed by the mount-point container path.

use crate::definition::{ModuleDefinition, NodeDefinition, NodeKindDefinition};
use crate::error::{Result, YangError};
use crate::schema::{LeafType, SchemaNode, SchemaNodeKind, xsd_regex};
use crate::types::{ModuleIdentifier, QName, SchemaPath};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Loaded module with its registered prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Name, namespace and revision
    pub identifier: ModuleIdentifier,
    /// Registered prefix
    pub prefix: String,
}

/// Immutable, queryable schema model
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    modules: IndexMap<String, ModuleInfo>,
    by_prefix: HashMap<String, String>,
    by_namespace: HashMap<String, String>,
    nodes: HashMap<SchemaPath, SchemaNode>,
    root_children: Vec<QName>,
    identities: HashMap<QName, Vec<QName>>,
    mounts: IndexMap<SchemaPath, Arc<SchemaRegistry>>,
    mount_path: Option<SchemaPath>,
    parent_prefixes: IndexMap<String, String>,
}

/// Builder compiling module definitions into a [`SchemaRegistry`]
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    modules: Vec<ModuleDefinition>,
    mounts: Vec<(String, SchemaRegistry)>,
}

impl SchemaRegistryBuilder {
    /// Add a module
    #[must_use]
    pub fn module(mut self, module: ModuleDefinition) -> Self {
        self.modules.push(module);
        self
    }

    /// Add several modules
    #[must_use]
    pub fn modules(mut self, modules: impl IntoIterator<Item = ModuleDefinition>) -> Self {
        self.modules.extend(modules);
        self
    }

    /// Mount `registry` at every mount point declared with `label`
    #[must_use]
    pub fn mount(mut self, label: &str, registry: SchemaRegistry) -> Self {
        self.mounts.push((label.to_string(), registry));
        self
    }

    /// Compile the registry
    ///
    /// # Errors
    ///
    /// Returns [`YangError::SchemaError`] for duplicate modules, unknown
    /// module references, dangling keys, default cases, identity bases,
    /// invalid patterns or a mount label with no mount point.
    pub fn build(self) -> Result<SchemaRegistry> {
        let mut registry = SchemaRegistry::default();

        for module in &self.modules {
            if registry.modules.contains_key(&module.name) {
                return Err(YangError::schema(format!(
                    "module '{}' registered twice",
                    module.name
                )));
            }
            registry.by_prefix.insert(module.prefix.clone(), module.name.clone());
            registry
                .by_namespace
                .insert(module.namespace.clone(), module.name.clone());
            registry.modules.insert(
                module.name.clone(),
                ModuleInfo {
                    identifier: ModuleIdentifier {
                        name: module.name.clone(),
                        namespace: module.namespace.clone(),
                        revision: module.revision.clone(),
                    },
                    prefix: module.prefix.clone(),
                },
            );
        }

        for module in &self.modules {
            for identity in &module.identities {
                let name = QName::new(module.namespace.as_str(), identity.name.as_str());
                let mut bases = Vec::with_capacity(identity.bases.len());
                for base in &identity.bases {
                    bases.push(registry.qualify(base, &module.namespace)?);
                }
                registry.identities.insert(name, bases);
            }
        }

        for module in &self.modules {
            for node in &module.nodes {
                let mut compiled = Vec::new();
                registry.compile_node(&SchemaPath::root(), &module.namespace, true, node, &mut compiled)?;
                for name in compiled {
                    registry.attach_child(&SchemaPath::root(), name);
                }
            }
        }

        registry.check_references()?;

        for (label, child) in self.mounts {
            let points: Vec<SchemaPath> = registry
                .nodes
                .values()
                .filter(|node| node.mount_point() == Some(label.as_str()))
                .map(|node| node.path.clone())
                .collect();
            if points.is_empty() {
                return Err(YangError::schema(format!(
                    "no mount point declared with label '{label}'"
                )));
            }
            let prefixes: IndexMap<String, String> = registry
                .modules
                .values()
                .map(|m| (m.prefix.clone(), m.identifier.namespace.clone()))
                .collect();
            for path in points {
                let mut mounted = child.clone();
                mounted.set_mount_path(path.clone());
                mounted.set_parent_prefixes(prefixes.clone());
                registry.mounts.insert(path, Arc::new(mounted));
            }
        }

        debug!(
            modules = registry.modules.len(),
            nodes = registry.nodes.len(),
            mounts = registry.mounts.len(),
            "compiled schema registry"
        );
        Ok(registry)
    }
}

impl SchemaRegistry {
    /// Start building a registry
    #[must_use]
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Schema node at `path`
    #[must_use]
    pub fn get_data_schema_node(&self, path: &SchemaPath) -> Option<&SchemaNode> {
        self.nodes.get(path)
    }

    /// Every compiled node, in no particular order
    pub fn nodes(&self) -> impl Iterator<Item = &SchemaNode> {
        self.nodes.values()
    }

    /// Names of the top-level nodes in declaration order
    #[must_use]
    pub fn root_children(&self) -> &[QName] {
        &self.root_children
    }

    /// Direct schema children of `path`, choices and cases included
    #[must_use]
    pub fn children(&self, path: &SchemaPath) -> Vec<&SchemaNode> {
        let names: &[QName] = if path.is_root() {
            &self.root_children
        } else {
            match self.nodes.get(path) {
                Some(node) => &node.children,
                None => return Vec::new(),
            }
        };
        names
            .iter()
            .filter_map(|name| self.nodes.get(&path.child(name.clone())))
            .collect()
    }

    /// Data node children of `path`, looking through choices and cases
    #[must_use]
    pub fn data_children(&self, path: &SchemaPath) -> Vec<&SchemaNode> {
        let mut out = Vec::new();
        self.collect_data_children(path, &mut out);
        out
    }

    fn collect_data_children<'a>(&'a self, path: &SchemaPath, out: &mut Vec<&'a SchemaNode>) {
        for child in self.children(path) {
            if child.is_choice_or_case() {
                self.collect_data_children(&child.path, out);
            } else if child.is_data_node() {
                out.push(child);
            }
        }
    }

    /// Data child `name` of `parent`, resolving through choices and cases
    #[must_use]
    pub fn data_child(&self, parent: &SchemaPath, name: &QName) -> Option<&SchemaNode> {
        self.data_children(parent)
            .into_iter()
            .find(|child| &child.qname == name)
    }

    /// Data child matched by local name and, when given, namespace
    #[must_use]
    pub fn find_data_child(
        &self,
        parent: &SchemaPath,
        namespace: Option<&str>,
        local_name: &str,
    ) -> Option<&SchemaNode> {
        self.data_children(parent).into_iter().find(|child| {
            child.qname.local() == local_name
                && namespace.is_none_or(|ns| &*child.qname.namespace == ns)
        })
    }

    /// Choice/case pairs between `path` and its data parent, innermost first
    #[must_use]
    pub fn enclosing_choices(&self, path: &SchemaPath) -> Vec<(&SchemaNode, &SchemaNode)> {
        let mut out = Vec::new();
        let mut current = path.parent();
        while let Some(case_path) = current {
            let Some(case) = self.nodes.get(&case_path) else {
                break;
            };
            if !matches!(case.kind, SchemaNodeKind::Case) {
                break;
            }
            let Some(choice_path) = case_path.parent() else {
                break;
            };
            let Some(choice) = self.nodes.get(&choice_path) else {
                break;
            };
            out.push((choice, case));
            current = choice_path.parent();
        }
        out
    }

    /// Nearest ancestor path that is not a choice or case
    #[must_use]
    pub fn data_parent(&self, path: &SchemaPath) -> SchemaPath {
        let mut current = path.parent().unwrap_or_default();
        while let Some(node) = self.nodes.get(&current) {
            if !node.is_choice_or_case() {
                break;
            }
            current = current.parent().unwrap_or_default();
        }
        current
    }

    /// Top-level RPC by name
    #[must_use]
    pub fn rpc(&self, name: &QName) -> Option<&SchemaNode> {
        self.nodes
            .get(&SchemaPath::root().child(name.clone()))
            .filter(|node| matches!(node.kind, SchemaNodeKind::Rpc))
    }

    /// Action `name` declared on the node at `parent`
    #[must_use]
    pub fn action(&self, parent: &SchemaPath, name: &QName) -> Option<&SchemaNode> {
        self.nodes
            .get(&parent.child(name.clone()))
            .filter(|node| matches!(node.kind, SchemaNodeKind::Action))
    }

    /// Module owning `namespace`
    #[must_use]
    pub fn module_by_namespace(&self, namespace: &str) -> Option<&ModuleInfo> {
        self.by_namespace
            .get(namespace)
            .and_then(|name| self.modules.get(name))
    }

    /// Module registered with `prefix`
    #[must_use]
    pub fn module_by_prefix(&self, prefix: &str) -> Option<&ModuleInfo> {
        self.by_prefix.get(prefix).and_then(|name| self.modules.get(name))
    }

    /// Module by name
    #[must_use]
    pub fn module_by_name(&self, name: &str) -> Option<&ModuleInfo> {
        self.modules.get(name)
    }

    /// Prefix registered for `namespace`, falling back to the parent's prefixes
    #[must_use]
    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        self.module_by_namespace(namespace)
            .map(|module| module.prefix.as_str())
            .or_else(|| {
                self.parent_prefixes
                    .iter()
                    .find(|(_, ns)| ns.as_str() == namespace)
                    .map(|(prefix, _)| prefix.as_str())
            })
    }

    /// Namespace bound to `prefix`, falling back to the parent's prefixes
    #[must_use]
    pub fn namespace_for(&self, prefix: &str) -> Option<&str> {
        self.module_by_prefix(prefix)
            .map(|module| module.identifier.namespace.as_str())
            .or_else(|| self.parent_prefixes.get(prefix).map(String::as_str))
    }

    /// Identifiers of every loaded module
    #[must_use]
    pub fn all_module_identifiers(&self) -> Vec<ModuleIdentifier> {
        self.modules.values().map(|m| m.identifier.clone()).collect()
    }

    /// Resolve `prefix:name` or a bare name against `default_namespace`
    ///
    /// Returns `None` when the prefix is unknown or no such identity exists.
    #[must_use]
    pub fn resolve_identity(&self, value: &str, default_namespace: &str) -> Option<QName> {
        let name = match value.split_once(':') {
            Some((prefix, local)) => QName::new(self.namespace_for(prefix)?, local),
            None => QName::new(default_namespace, value),
        };
        self.identities.contains_key(&name).then_some(name)
    }

    /// Whether `identity` is derived from `base`
    #[must_use]
    pub fn identity_derived_from(&self, identity: &QName, base: &QName, or_self: bool) -> bool {
        if or_self && identity == base {
            return true;
        }
        let mut stack: Vec<&QName> = vec![identity];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            for parent in self.identities.get(current).into_iter().flatten() {
                if parent == base {
                    return true;
                }
                stack.push(parent);
            }
        }
        false
    }

    /// Mount point label of the container at `path`
    #[must_use]
    pub fn mount_point(&self, path: &SchemaPath) -> Option<&str> {
        self.nodes.get(path).and_then(SchemaNode::mount_point)
    }

    /// Registry mounted at the container at `path`
    #[must_use]
    pub fn mounted_registry(&self, path: &SchemaPath) -> Option<&Arc<SchemaRegistry>> {
        self.mounts.get(path)
    }

    /// Path of the mount point in the parent registry, for mounted registries
    #[must_use]
    pub fn mount_path(&self) -> Option<&SchemaPath> {
        self.mount_path.as_ref()
    }

    /// Prefixes of the parent registry, for mounted registries
    #[must_use]
    pub fn parent_prefixes(&self) -> &IndexMap<String, String> {
        &self.parent_prefixes
    }

    fn set_mount_path(&mut self, path: SchemaPath) {
        self.mount_path = Some(path);
    }

    fn set_parent_prefixes(&mut self, prefixes: IndexMap<String, String>) {
        self.parent_prefixes = prefixes;
    }

    fn qualify(&self, name: &str, default_namespace: &str) -> Result<QName> {
        match name.split_once(':') {
            Some((prefix, local)) => {
                let module = self.module_by_prefix(prefix).ok_or_else(|| {
                    YangError::schema(format!("unknown prefix '{prefix}' in '{name}'"))
                })?;
                Ok(QName::new(module.identifier.namespace.as_str(), local))
            }
            None => Ok(QName::new(default_namespace, name)),
        }
    }

    fn attach_child(&mut self, parent: &SchemaPath, name: QName) {
        if parent.is_root() {
            if !self.root_children.contains(&name) {
                self.root_children.push(name);
            }
        } else if let Some(node) = self.nodes.get_mut(parent) {
            if !node.children.contains(&name) {
                node.children.push(name);
            }
        }
    }

    fn compile_node(
        &mut self,
        parent: &SchemaPath,
        inherited_namespace: &str,
        inherited_config: bool,
        definition: &NodeDefinition,
        compiled: &mut Vec<QName>,
    ) -> Result<()> {
        let namespace = match &definition.module {
            Some(module) => self
                .modules
                .get(module)
                .map(|m| m.identifier.namespace.clone())
                .ok_or_else(|| {
                    YangError::schema_at(format!("unknown module '{module}'"), parent.to_string())
                })?,
            None => inherited_namespace.to_string(),
        };
        let qname = QName::new(namespace.as_str(), definition.name.as_str());
        let path = parent.child(qname.clone());

        // Augments of an existing node only contribute children.
        if let Some(existing) = self.nodes.get(&path) {
            let config = existing.config;
            for child in &definition.children {
                let mut names = Vec::new();
                self.compile_node(&path, inherited_namespace, config, child, &mut names)?;
                for name in names {
                    self.attach_child(&path, name);
                }
            }
            return Ok(());
        }

        let parent_is_choice = self
            .nodes
            .get(parent)
            .is_some_and(|node| matches!(node.kind, SchemaNodeKind::Choice { .. }));
        if parent_is_choice && !matches!(definition.kind, NodeKindDefinition::Case) {
            // Shorthand case: wrap the node in an implicit case of the same name.
            let case = NodeDefinition::case(&definition.name).with_child(definition.clone());
            let case = NodeDefinition {
                module: definition.module.clone(),
                ..case
            };
            return self.compile_node(parent, inherited_namespace, inherited_config, &case, compiled);
        }

        let config = definition.config.unwrap_or(inherited_config);
        let kind = match &definition.kind {
            NodeKindDefinition::Container {
                presence,
                mount_point,
            } => SchemaNodeKind::Container {
                presence: *presence,
                mount_point: mount_point.clone(),
            },
            NodeKindDefinition::List {
                keys,
                min_elements,
                max_elements,
                ordered_by,
                unique,
            } => SchemaNodeKind::List {
                keys: keys.iter().map(|k| qname.sibling(k)).collect(),
                min_elements: *min_elements,
                max_elements: *max_elements,
                ordered_by: *ordered_by,
                unique: unique.clone(),
            },
            NodeKindDefinition::Leaf {
                leaf_type,
                mandatory,
                default,
            } => SchemaNodeKind::Leaf {
                leaf_type: leaf_type.clone(),
                mandatory: *mandatory,
                default: default.clone(),
            },
            NodeKindDefinition::LeafList {
                leaf_type,
                min_elements,
                max_elements,
                ordered_by,
                defaults,
            } => SchemaNodeKind::LeafList {
                leaf_type: leaf_type.clone(),
                min_elements: *min_elements,
                max_elements: *max_elements,
                ordered_by: *ordered_by,
                defaults: defaults.clone(),
            },
            NodeKindDefinition::Choice {
                mandatory,
                default_case,
            } => SchemaNodeKind::Choice {
                mandatory: *mandatory,
                default_case: default_case.as_deref().map(|case| qname.sibling(case)),
            },
            NodeKindDefinition::Case => SchemaNodeKind::Case,
            NodeKindDefinition::Anydata => SchemaNodeKind::Anydata,
            NodeKindDefinition::Rpc => SchemaNodeKind::Rpc,
            NodeKindDefinition::Action => SchemaNodeKind::Action,
            NodeKindDefinition::Input => SchemaNodeKind::Input,
            NodeKindDefinition::Output => SchemaNodeKind::Output,
        };

        self.nodes.insert(
            path.clone(),
            SchemaNode {
                path: path.clone(),
                qname: qname.clone(),
                kind,
                config,
                must: definition.must.clone(),
                when: definition.when.clone(),
                children: Vec::new(),
            },
        );
        compiled.push(qname);

        for child in &definition.children {
            let mut names = Vec::new();
            self.compile_node(&path, &namespace, config, child, &mut names)?;
            for name in names {
                self.attach_child(&path, name);
            }
        }
        Ok(())
    }

    fn check_references(&self) -> Result<()> {
        for node in self.nodes.values() {
            match &node.kind {
                SchemaNodeKind::List { keys, unique, .. } => {
                    for key in keys {
                        let is_leaf = self
                            .data_child(&node.path, key)
                            .is_some_and(|child| matches!(child.kind, SchemaNodeKind::Leaf { .. }));
                        if !is_leaf {
                            return Err(YangError::schema_at(
                                format!("list key '{}' is not a leaf child", key.local()),
                                node.path.to_string(),
                            ));
                        }
                    }
                    for group in unique {
                        for leaf in &group.leaves {
                            if self.resolve_descendant(&node.path, leaf).is_none() {
                                return Err(YangError::schema_at(
                                    format!("unique leaf '{leaf}' not found"),
                                    node.path.to_string(),
                                ));
                            }
                        }
                    }
                }
                SchemaNodeKind::Choice {
                    default_case: Some(case),
                    ..
                } => {
                    if !self.nodes.contains_key(&node.path.child(case.clone())) {
                        return Err(YangError::schema_at(
                            format!("default case '{}' not found", case.local()),
                            node.path.to_string(),
                        ));
                    }
                }
                SchemaNodeKind::Leaf { leaf_type, .. } | SchemaNodeKind::LeafList { leaf_type, .. } => {
                    self.check_type(node, leaf_type)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_type(&self, node: &SchemaNode, leaf_type: &LeafType) -> Result<()> {
        match leaf_type {
            LeafType::String { patterns, .. } => {
                for pattern in patterns {
                    regex::Regex::new(&xsd_regex(&pattern.pattern)).map_err(|err| {
                        YangError::schema_at(
                            format!("invalid pattern '{}': {err}", pattern.pattern),
                            node.path.to_string(),
                        )
                    })?;
                }
            }
            LeafType::IdentityRef { bases } => {
                for base in bases {
                    let name = self.qualify(base, &node.qname.namespace)?;
                    if !self.identities.contains_key(&name) {
                        return Err(YangError::schema_at(
                            format!("unknown identity base '{base}'"),
                            node.path.to_string(),
                        ));
                    }
                }
            }
            LeafType::Union { members } => {
                for member in members {
                    self.check_type(node, member)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Resolve a `/` separated descendant path of local names below `from`
    #[must_use]
    pub fn resolve_descendant(&self, from: &SchemaPath, relative: &str) -> Option<&SchemaNode> {
        let mut current: Option<&SchemaNode> = None;
        let mut path = from.clone();
        for step in relative.split('/').filter(|s| !s.is_empty()) {
            let local = step.split_once(':').map_or(step, |(_, local)| local);
            let node = self.find_data_child(&path, None, local)?;
            path = node.path.clone();
            current = Some(node);
        }
        current
    }
}
