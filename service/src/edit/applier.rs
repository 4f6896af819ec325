//! Staging of edit-config payloads
//!
//! The applier mutates a staged copy of the datastore tree and records what
//! it did in a [`ChangeSet`]. Request errors NETCONF defines for the edit
//! itself (data-exists, data-missing, unknown elements, bad keys, invalid
//! values) are raised here; everything that depends on the resulting tree as
//! a whole is left to the validator.

use super::change_set::{ChangeKind, ChangeSet};
use crate::error::{ValidationError, ValidationResult};
use crate::expression::ExpressionEngine;
use crate::mount::SchemaContext;
use crate::validator::failure::{FailureKind, ValidationFailure};
use crate::validator::reporter::ErrorReporter;
use crate::validator::types::{TypeValidator, compare_values};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, trace};
use yang_core::data::{DataNode, DataNodeKind, DataTree, NodeId, Placement};
use yang_core::edit::{EditChangeNode, EditConfigRequest, EditContainmentNode, EditOperation, InsertPosition};
use yang_core::registry::SchemaRegistry;
use yang_core::schema::{OrderedBy, SchemaNode, SchemaNodeKind};
use yang_core::types::{InstancePath, KeyPredicate, PathSegment, QName, SchemaPath};

/// Applies edit payloads to staged trees
#[derive(Debug, Clone, Copy)]
pub struct EditApplier<'a> {
    schema: &'a SchemaContext,
    expressions: &'a ExpressionEngine,
    reporter: &'a ErrorReporter,
}

/// Where edit children land: a data parent and the schema its children
/// belong to
#[derive(Clone, Copy)]
struct Target<'r> {
    parent: NodeId,
    registry: &'r SchemaRegistry,
    schema_parent: &'r SchemaPath,
}

impl<'a> EditApplier<'a> {
    /// Applier for `schema`
    #[must_use]
    pub fn new(schema: &'a SchemaContext, expressions: &'a ExpressionEngine, reporter: &'a ErrorReporter) -> Self {
        Self {
            schema,
            expressions,
            reporter,
        }
    }

    /// Apply `request` to the staged `tree`
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Rejected`] with the first edit error; the
    /// staged tree is left partially modified and must be discarded.
    pub fn apply(&self, tree: &mut DataTree, request: &EditConfigRequest) -> ValidationResult<ChangeSet> {
        let root = tree.root();
        self.apply_at(tree, root, &request.config, request.default_operation)
    }

    /// Apply the children of `edit` below the data node `parent`
    ///
    /// `parent` may be the datastore root, an RPC input root or any interior
    /// node, for instance the target of an action.
    ///
    /// # Errors
    ///
    /// Same as [`EditApplier::apply`].
    pub fn apply_at(
        &self,
        tree: &mut DataTree,
        parent: NodeId,
        edit: &EditContainmentNode,
        default_operation: EditOperation,
    ) -> ValidationResult<ChangeSet> {
        debug!(parent = %self.schema.instance_path(tree, parent), "applying edit");
        let mut changes = ChangeSet::new();
        let operation = edit.operation.unwrap_or(default_operation);
        self.apply_children(tree, parent, edit, operation, &mut changes)?;
        trace!(changes = changes.len(), "edit applied");
        Ok(changes)
    }

    fn apply_children(
        &self,
        tree: &mut DataTree,
        parent: NodeId,
        edit: &EditContainmentNode,
        inherited: EditOperation,
        changes: &mut ChangeSet,
    ) -> ValidationResult<()> {
        let schema_parent = match tree.get(parent) {
            Some(node) if node.mount_point => SchemaPath::root(),
            Some(node) => node.schema_path.clone(),
            None => return Ok(()),
        };
        let target = Target {
            parent,
            registry: self.schema.child_registry(tree, parent),
            schema_parent: &schema_parent,
        };
        self.check_duplicates(tree, target, edit)?;

        for change in &edit.change_nodes {
            let Some(schema_node) = target.registry.data_child(target.schema_parent, &change.qname) else {
                return Err(self.unknown(tree, target, &change.qname));
            };
            let operation = change.operation.unwrap_or(inherited);
            match &schema_node.kind {
                SchemaNodeKind::Leaf { .. } | SchemaNodeKind::Anydata => {
                    self.apply_leaf(tree, target, schema_node, change, operation, changes)?;
                }
                SchemaNodeKind::LeafList { .. } => {
                    self.apply_leaf_list(tree, target, schema_node, change, operation, changes)?;
                }
                _ => return Err(self.unknown(tree, target, &change.qname)),
            }
        }

        for child in &edit.children {
            let Some(schema_node) = target.registry.data_child(target.schema_parent, &child.qname) else {
                return Err(self.unknown(tree, target, &child.qname));
            };
            let operation = child.operation.unwrap_or(inherited);
            match &schema_node.kind {
                SchemaNodeKind::Container { .. } => {
                    self.apply_container(tree, target, schema_node, child, operation, changes)?;
                }
                SchemaNodeKind::List { .. } => {
                    self.apply_list_entry(tree, target, schema_node, child, operation, changes)?;
                }
                _ => return Err(self.unknown(tree, target, &child.qname)),
            }
        }
        Ok(())
    }

    fn apply_container(
        &self,
        tree: &mut DataTree,
        target: Target<'_>,
        schema_node: &SchemaNode,
        edit: &EditContainmentNode,
        operation: EditOperation,
        changes: &mut ChangeSet,
    ) -> ValidationResult<()> {
        let existing = tree.get_child(target.parent, &schema_node.qname);
        match (operation, existing) {
            (EditOperation::Delete, None) => {
                Err(self.fail(FailureKind::DataMissing, self.member_path(tree, target, schema_node, &[], None)))
            }
            (EditOperation::Delete | EditOperation::Remove, Some(node)) => self.delete(tree, node, changes),
            (EditOperation::Remove, None) => Ok(()),
            (EditOperation::Create, Some(_)) => {
                Err(self.fail(FailureKind::DataExists, self.member_path(tree, target, schema_node, &[], None)))
            }
            (EditOperation::Replace, Some(node)) => {
                self.clear_children(tree, node, &[], changes)?;
                changes.record(ChangeKind::Modified, tree, self.schema, node);
                self.apply_children(tree, node, edit, operation, changes)
            }
            (EditOperation::None, None) => {
                let node = self.create_container(tree, target, schema_node, changes)?;
                self.apply_children(tree, node, edit, operation, changes)?;
                if tree.get_children(node).is_empty() {
                    tree.remove_subtree(node)?;
                    changes.forget(node);
                }
                Ok(())
            }
            (_, Some(node)) => self.apply_children(tree, node, edit, operation, changes),
            (_, None) => {
                let node = self.create_container(tree, target, schema_node, changes)?;
                self.apply_children(tree, node, edit, operation, changes)
            }
        }
    }

    fn create_container(
        &self,
        tree: &mut DataTree,
        target: Target<'_>,
        schema_node: &SchemaNode,
        changes: &mut ChangeSet,
    ) -> ValidationResult<NodeId> {
        self.clear_other_cases(tree, target, schema_node, changes)?;
        let mut node = DataNode::container(schema_node.qname.clone(), schema_node.path.clone());
        if schema_node.mount_point().is_some() {
            node = node.with_mount_point();
        }
        let id = tree.insert_child(target.parent, node, Placement::Last)?;
        changes.record(ChangeKind::Created, tree, self.schema, id);
        Ok(id)
    }

    fn apply_list_entry(
        &self,
        tree: &mut DataTree,
        target: Target<'_>,
        list: &SchemaNode,
        edit: &EditContainmentNode,
        operation: EditOperation,
        changes: &mut ChangeSet,
    ) -> ValidationResult<()> {
        let keys = self.entry_keys(tree, target, list, edit)?;
        let existing = tree.find_list_entry(target.parent, &list.qname, &keys);
        match (operation, existing) {
            (EditOperation::Delete, None) => {
                Err(self.fail(FailureKind::DataMissing, self.member_path(tree, target, list, &keys, None)))
            }
            (EditOperation::Delete | EditOperation::Remove, Some(entry)) => self.delete(tree, entry, changes),
            (EditOperation::Remove, None) => Ok(()),
            (EditOperation::Create, Some(_)) => {
                Err(self.fail(FailureKind::DataExists, self.member_path(tree, target, list, &keys, None)))
            }
            (EditOperation::Replace, Some(entry)) => {
                let key_names: Vec<QName> = keys.iter().map(|(key, _)| key.clone()).collect();
                self.clear_children(tree, entry, &key_names, changes)?;
                self.move_existing(tree, target, list, entry, edit.insert.as_ref(), &keys)?;
                changes.record(ChangeKind::Modified, tree, self.schema, entry);
                self.apply_children(tree, entry, edit, operation, changes)
            }
            (EditOperation::None, None) => {
                let entry = self.create_list_entry(tree, target, list, edit.insert.as_ref(), &keys, changes)?;
                self.apply_children(tree, entry, edit, operation, changes)?;
                if tree.get_children(entry).len() <= keys.len() {
                    tree.remove_subtree(entry)?;
                    changes.forget(entry);
                }
                Ok(())
            }
            (_, Some(entry)) => {
                self.move_existing(tree, target, list, entry, edit.insert.as_ref(), &keys)?;
                self.apply_children(tree, entry, edit, operation, changes)
            }
            (_, None) => {
                let entry = self.create_list_entry(tree, target, list, edit.insert.as_ref(), &keys, changes)?;
                self.apply_children(tree, entry, edit, operation, changes)
            }
        }
    }

    /// Canonical key values of a list entry edit in key declaration order
    fn entry_keys(
        &self,
        tree: &DataTree,
        target: Target<'_>,
        list: &SchemaNode,
        edit: &EditContainmentNode,
    ) -> ValidationResult<Vec<(QName, String)>> {
        let declared = list.list_keys();
        let in_order = edit.match_nodes.len() == declared.len()
            && edit
                .match_nodes
                .iter()
                .zip(declared)
                .all(|(given, key)| &given.qname == key);
        if !in_order {
            let keys = declared.iter().map(|key| key.local().to_string()).collect();
            return Err(self.fail(
                FailureKind::MissingKeys { keys },
                self.member_path(tree, target, list, &[], None),
            ));
        }
        let types = TypeValidator::new(target.registry, self.expressions);
        let mut keys = Vec::with_capacity(declared.len());
        for given in &edit.match_nodes {
            let value = match target.registry.data_child(&list.path, &given.qname) {
                Some(leaf) => types.canonicalize(leaf, &given.value).map_err(|violation| {
                    self.fail(
                        FailureKind::InvalidValue {
                            message: violation.message,
                            app_tag: violation.app_tag,
                        },
                        self.member_path(tree, target, list, &[], None),
                    )
                })?,
                None => given.value.clone(),
            };
            keys.push((given.qname.clone(), value));
        }
        Ok(keys)
    }

    fn create_list_entry(
        &self,
        tree: &mut DataTree,
        target: Target<'_>,
        list: &SchemaNode,
        insert: Option<&InsertPosition>,
        keys: &[(QName, String)],
        changes: &mut ChangeSet,
    ) -> ValidationResult<NodeId> {
        self.clear_other_cases(tree, target, list, changes)?;
        let sort_key: Vec<&str> = keys.iter().map(|(_, value)| value.as_str()).collect();
        let placement = self.placement(tree, target, list, insert, &sort_key, keys, None)?;
        let key_names = keys.iter().map(|(key, _)| key.clone()).collect();
        let entry = tree.insert_child(
            target.parent,
            DataNode::list_entry(list.qname.clone(), list.path.clone(), key_names),
            placement,
        )?;
        for (key, value) in keys {
            tree.insert_child(
                entry,
                DataNode::leaf(key.clone(), list.path.child(key.clone()), value.clone()),
                Placement::Last,
            )?;
        }
        changes.record(ChangeKind::Created, tree, self.schema, entry);
        Ok(entry)
    }

    fn move_existing(
        &self,
        tree: &mut DataTree,
        target: Target<'_>,
        list: &SchemaNode,
        entry: NodeId,
        insert: Option<&InsertPosition>,
        keys: &[(QName, String)],
    ) -> ValidationResult<()> {
        if insert.is_none() || list.ordered_by() != OrderedBy::User {
            return Ok(());
        }
        let sort_key: Vec<&str> = keys.iter().map(|(_, value)| value.as_str()).collect();
        let placement = self.placement(tree, target, list, insert, &sort_key, keys, Some(entry))?;
        tree.reposition(entry, placement)?;
        Ok(())
    }

    fn apply_leaf(
        &self,
        tree: &mut DataTree,
        target: Target<'_>,
        schema_node: &SchemaNode,
        change: &EditChangeNode,
        operation: EditOperation,
        changes: &mut ChangeSet,
    ) -> ValidationResult<()> {
        let existing = tree.get_child(target.parent, &schema_node.qname);
        let explicit = existing.filter(|node| tree.get(*node).is_some_and(|n| !n.is_default));
        let path = || self.member_path(tree, target, schema_node, &[], None);

        if self.is_key_of_parent(tree, target.parent, &schema_node.qname) {
            let value = self.canonical(target, schema_node, change, &path)?;
            if explicit.and_then(|node| tree.value(node)) == Some(value.as_str()) && !operation.is_removal() {
                return Ok(());
            }
            return Err(self.fail(
                FailureKind::InvalidValue {
                    message: format!("Key leaf '{}' cannot be modified", schema_node.name()),
                    app_tag: None,
                },
                path(),
            ));
        }

        match operation {
            EditOperation::None => Ok(()),
            EditOperation::Delete if explicit.is_none() => Err(self.fail(FailureKind::DataMissing, path())),
            EditOperation::Delete | EditOperation::Remove => match explicit {
                Some(node) => self.delete(tree, node, changes),
                None => Ok(()),
            },
            EditOperation::Create if explicit.is_some() => Err(self.fail(FailureKind::DataExists, path())),
            EditOperation::Create | EditOperation::Merge | EditOperation::Replace => {
                let value = if matches!(schema_node.kind, SchemaNodeKind::Anydata) {
                    change.value.clone().unwrap_or_default()
                } else {
                    self.canonical(target, schema_node, change, &path)?
                };
                match existing {
                    Some(node) => {
                        let unchanged = tree.get(node).is_some_and(|n| !n.is_default && n.value.as_deref() == Some(&value));
                        if !unchanged {
                            tree.set_value(node, value, false)?;
                            changes.record(ChangeKind::Modified, tree, self.schema, node);
                        }
                    }
                    None => {
                        self.clear_other_cases(tree, target, schema_node, changes)?;
                        let node = if matches!(schema_node.kind, SchemaNodeKind::Anydata) {
                            DataNode::anydata(schema_node.qname.clone(), schema_node.path.clone(), value)
                        } else {
                            DataNode::leaf(schema_node.qname.clone(), schema_node.path.clone(), value)
                        };
                        let node = tree.insert_child(target.parent, node, Placement::Last)?;
                        changes.record(ChangeKind::Created, tree, self.schema, node);
                    }
                }
                Ok(())
            }
        }
    }

    fn apply_leaf_list(
        &self,
        tree: &mut DataTree,
        target: Target<'_>,
        schema_node: &SchemaNode,
        change: &EditChangeNode,
        operation: EditOperation,
        changes: &mut ChangeSet,
    ) -> ValidationResult<()> {
        if operation == EditOperation::None {
            return Ok(());
        }
        let all_path = || self.member_path(tree, target, schema_node, &[], None);

        if operation.is_removal() && change.value.is_none() {
            let entries: Vec<NodeId> = tree
                .get_children_named(target.parent, &schema_node.qname)
                .into_iter()
                .filter(|entry| tree.get(*entry).is_some_and(|n| !n.is_default))
                .collect();
            if entries.is_empty() && operation == EditOperation::Delete {
                return Err(self.fail(FailureKind::DataMissing, all_path()));
            }
            for entry in entries {
                self.delete(tree, entry, changes)?;
            }
            return Ok(());
        }

        let value = self.canonical(target, schema_node, change, &all_path)?;
        let existing = tree.find_leaf_list_entry(target.parent, &schema_node.qname, &value);
        let explicit = existing.filter(|node| tree.get(*node).is_some_and(|n| !n.is_default));
        let entry_path = || self.member_path(tree, target, schema_node, &[], Some(&value));
        match operation {
            EditOperation::Delete if explicit.is_none() => Err(self.fail(FailureKind::DataMissing, entry_path())),
            EditOperation::Delete | EditOperation::Remove => match explicit {
                Some(entry) => self.delete(tree, entry, changes),
                None => Ok(()),
            },
            EditOperation::Create if explicit.is_some() => Err(self.fail(FailureKind::DataExists, entry_path())),
            _ => {
                self.drop_defaulted_entries(tree, target.parent, schema_node, existing, changes)?;
                match existing {
                    Some(entry) => {
                        if tree.get(entry).is_some_and(|n| n.is_default) {
                            tree.set_default_flag(entry, false);
                            changes.record(ChangeKind::Modified, tree, self.schema, entry);
                        }
                        if change.insert.is_some() && schema_node.ordered_by() == OrderedBy::User {
                            let placement = self.placement(
                                tree,
                                target,
                                schema_node,
                                change.insert.as_ref(),
                                &[value.as_str()],
                                &[],
                                Some(entry),
                            )?;
                            tree.reposition(entry, placement)?;
                        }
                    }
                    None => {
                        self.clear_other_cases(tree, target, schema_node, changes)?;
                        let placement = self.placement(
                            tree,
                            target,
                            schema_node,
                            change.insert.as_ref(),
                            &[value.as_str()],
                            &[],
                            None,
                        )?;
                        let entry = tree.insert_child(
                            target.parent,
                            DataNode::leaf_list_entry(schema_node.qname.clone(), schema_node.path.clone(), value.clone()),
                            placement,
                        )?;
                        changes.record(ChangeKind::Created, tree, self.schema, entry);
                    }
                }
                Ok(())
            }
        }
    }

    /// Leaf-list defaults stop applying once the client writes an entry
    fn drop_defaulted_entries(
        &self,
        tree: &mut DataTree,
        parent: NodeId,
        schema_node: &SchemaNode,
        keep: Option<NodeId>,
        changes: &mut ChangeSet,
    ) -> ValidationResult<()> {
        let defaulted: Vec<NodeId> = tree
            .get_children_named(parent, &schema_node.qname)
            .into_iter()
            .filter(|entry| Some(*entry) != keep && tree.get(*entry).is_some_and(|n| n.is_default))
            .collect();
        for entry in defaulted {
            self.delete(tree, entry, changes)?;
        }
        Ok(())
    }

    /// Placement of a new or moved list or leaf-list entry
    ///
    /// System ordered entries go before the first sibling that sorts after
    /// them. User ordered entries follow the `insert` attribute, appending
    /// when it is absent.
    #[allow(clippy::too_many_arguments)]
    fn placement(
        &self,
        tree: &DataTree,
        target: Target<'_>,
        schema_node: &SchemaNode,
        insert: Option<&InsertPosition>,
        sort_key: &[&str],
        keys: &[(QName, String)],
        moving: Option<NodeId>,
    ) -> ValidationResult<Placement> {
        let siblings: Vec<NodeId> = tree
            .get_children_named(target.parent, &schema_node.qname)
            .into_iter()
            .filter(|sibling| Some(*sibling) != moving)
            .collect();

        if schema_node.ordered_by() == OrderedBy::System {
            let key_types: Vec<_> = if keys.is_empty() {
                vec![schema_node.leaf_type()]
            } else {
                keys.iter()
                    .map(|(key, _)| {
                        target
                            .registry
                            .data_child(&schema_node.path, key)
                            .and_then(SchemaNode::leaf_type)
                    })
                    .collect()
            };
            let after = siblings.into_iter().find(|sibling| {
                let other = sort_key_of(tree, *sibling);
                compare_keys(&key_types, sort_key, &other) == Ordering::Less
            });
            return Ok(after.map_or(Placement::Last, Placement::Before));
        }

        let anchored = |anchor: &[String]| {
            let types = TypeValidator::new(target.registry, self.expressions);
            let anchor: Vec<String> = if keys.is_empty() {
                anchor
                    .iter()
                    .map(|value| types.canonicalize(schema_node, value).unwrap_or_else(|_| value.clone()))
                    .collect()
            } else {
                anchor
                    .iter()
                    .zip(keys)
                    .map(|(value, (key, _))| {
                        target
                            .registry
                            .data_child(&schema_node.path, key)
                            .and_then(|leaf| types.canonicalize(leaf, value).ok())
                            .unwrap_or_else(|| value.clone())
                    })
                    .collect()
            };
            siblings
                .iter()
                .copied()
                .find(|sibling| sort_key_of(tree, *sibling) == anchor)
        };
        let missing_anchor = || {
            let value = keys.is_empty().then(|| sort_key.first().copied()).flatten();
            self.fail(
                FailureKind::MissingInsertAnchor,
                self.member_path(tree, target, schema_node, keys, value),
            )
        };
        Ok(match insert {
            None | Some(InsertPosition::Last) => Placement::Last,
            Some(InsertPosition::First) => Placement::First,
            Some(InsertPosition::Before(anchor)) => Placement::Before(anchored(&anchor.0).ok_or_else(missing_anchor)?),
            Some(InsertPosition::After(anchor)) => Placement::After(anchored(&anchor.0).ok_or_else(missing_anchor)?),
        })
    }

    /// Remove data of every other case of the choices enclosing `schema_node`
    fn clear_other_cases(
        &self,
        tree: &mut DataTree,
        target: Target<'_>,
        schema_node: &SchemaNode,
        changes: &mut ChangeSet,
    ) -> ValidationResult<()> {
        for (choice, case) in target.registry.enclosing_choices(&schema_node.path) {
            for other in target.registry.children(&choice.path) {
                if other.path == case.path {
                    continue;
                }
                for member in target.registry.data_children(&other.path) {
                    for node in tree.get_children_named(target.parent, &member.qname) {
                        debug!(
                            choice = choice.name(),
                            from = other.name(),
                            to = case.name(),
                            "switching choice case, removing '{}'",
                            member.name()
                        );
                        self.delete(tree, node, changes)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Remove every child of `node` except the key leaves
    fn clear_children(
        &self,
        tree: &mut DataTree,
        node: NodeId,
        keep: &[QName],
        changes: &mut ChangeSet,
    ) -> ValidationResult<()> {
        let children: Vec<NodeId> = tree
            .get_children(node)
            .iter()
            .copied()
            .filter(|child| tree.get(*child).is_some_and(|c| !keep.contains(&c.qname)))
            .collect();
        for child in children {
            self.delete(tree, child, changes)?;
        }
        Ok(())
    }

    fn delete(&self, tree: &mut DataTree, node: NodeId, changes: &mut ChangeSet) -> ValidationResult<()> {
        changes.record(ChangeKind::Deleted, tree, self.schema, node);
        tree.remove_subtree(node)?;
        Ok(())
    }

    fn is_key_of_parent(&self, tree: &DataTree, parent: NodeId, qname: &QName) -> bool {
        matches!(
            tree.get(parent).map(|node| &node.kind),
            Some(DataNodeKind::ListEntry { keys }) if keys.contains(qname)
        )
    }

    fn canonical(
        &self,
        target: Target<'_>,
        schema_node: &SchemaNode,
        change: &EditChangeNode,
        path: &dyn Fn() -> InstancePath,
    ) -> ValidationResult<String> {
        let raw = change.value.as_deref().unwrap_or_default();
        TypeValidator::new(target.registry, self.expressions)
            .canonicalize(schema_node, raw)
            .map_err(|violation| {
                self.fail(
                    FailureKind::InvalidValue {
                        message: violation.message,
                        app_tag: violation.app_tag,
                    },
                    path(),
                )
            })
    }

    /// Reject the request when two entries of one payload name the same
    /// list entry or leaf-list value once both are in canonical form
    fn check_duplicates(&self, tree: &DataTree, target: Target<'_>, edit: &EditContainmentNode) -> ValidationResult<()> {
        let types = TypeValidator::new(target.registry, self.expressions);
        let canonical = |node: Option<&SchemaNode>, value: &str| {
            node.and_then(|node| types.canonicalize(node, value).ok())
                .unwrap_or_else(|| value.to_string())
        };

        let mut seen_entries: HashSet<(&QName, Vec<(QName, String)>)> = HashSet::new();
        for child in &edit.children {
            let Some(list) = target
                .registry
                .data_child(target.schema_parent, &child.qname)
                .filter(|node| matches!(node.kind, SchemaNodeKind::List { .. }))
            else {
                continue;
            };
            let keys: Vec<(QName, String)> = child
                .match_nodes
                .iter()
                .map(|key| {
                    let leaf = target.registry.data_child(&list.path, &key.qname);
                    (key.qname.clone(), canonical(leaf, &key.value))
                })
                .collect();
            if seen_entries.contains(&(&child.qname, keys.clone())) {
                return Err(self.fail(
                    FailureKind::DuplicateElements {
                        name: list.name().to_string(),
                    },
                    self.member_path(tree, target, list, &keys, None),
                ));
            }
            seen_entries.insert((&child.qname, keys));
        }

        let mut seen_values: HashSet<(&QName, String)> = HashSet::new();
        for change in &edit.change_nodes {
            let Some(leaf_list) = target
                .registry
                .data_child(target.schema_parent, &change.qname)
                .filter(|node| matches!(node.kind, SchemaNodeKind::LeafList { .. }))
            else {
                continue;
            };
            let Some(value) = change.value.as_deref() else {
                continue;
            };
            let value = canonical(Some(leaf_list), value);
            if seen_values.contains(&(&change.qname, value.clone())) {
                return Err(self.fail(
                    FailureKind::DuplicateElements {
                        name: leaf_list.name().to_string(),
                    },
                    self.member_path(tree, target, leaf_list, &[], Some(&value)),
                ));
            }
            seen_values.insert((&change.qname, value));
        }
        Ok(())
    }

    /// Instance path of a member of `target.parent`, present or not
    fn member_path(
        &self,
        tree: &DataTree,
        target: Target<'_>,
        schema_node: &SchemaNode,
        keys: &[(QName, String)],
        value: Option<&str>,
    ) -> InstancePath {
        let prefix = |namespace: &str| {
            target
                .registry
                .prefix_for(namespace)
                .map_or_else(|| self.schema.prefix_for(tree, target.parent, namespace), str::to_string)
        };
        let namespace = schema_node.qname.namespace.to_string();
        let mut path = self.schema.instance_path(tree, target.parent);
        path.push(PathSegment {
            prefix: prefix(&namespace),
            name: schema_node.name().to_string(),
            keys: keys
                .iter()
                .map(|(key, value)| KeyPredicate {
                    prefix: prefix(&key.namespace),
                    name: key.local().to_string(),
                    value: value.clone(),
                })
                .collect(),
            value: value.map(str::to_string),
            namespace,
        });
        path
    }

    fn unknown(&self, tree: &DataTree, target: Target<'_>, qname: &QName) -> ValidationError {
        let namespace = qname.namespace.to_string();
        let prefix = target
            .registry
            .prefix_for(&namespace)
            .map_or_else(|| self.schema.prefix_for(tree, target.parent, &namespace), str::to_string);
        let path = self
            .schema
            .instance_path(tree, target.parent)
            .child(&prefix, &namespace, qname.local());
        self.fail(
            FailureKind::UnknownElement {
                name: qname.local().to_string(),
            },
            path,
        )
    }

    fn fail(&self, kind: FailureKind, path: InstancePath) -> ValidationError {
        trace!(?kind, path = %path, "edit rejected");
        ValidationError::rejected(self.reporter.to_rpc_error(&ValidationFailure::at(kind, path)))
    }
}

/// Key values of a list entry, or the value of a leaf-list entry
fn sort_key_of(tree: &DataTree, node: NodeId) -> Vec<String> {
    match tree.get(node).map(|n| &n.kind) {
        Some(DataNodeKind::ListEntry { .. }) => tree.key_values(node).into_iter().map(|(_, value)| value).collect(),
        _ => tree.value(node).map(str::to_string).into_iter().collect(),
    }
}

fn compare_keys(types: &[Option<&yang_core::schema::LeafType>], left: &[&str], right: &[String]) -> Ordering {
    for (index, (a, b)) in left.iter().zip(right).enumerate() {
        let leaf_type = types.get(index).copied().flatten();
        match compare_values(leaf_type, a, b) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    left.len().cmp(&right.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use yang_core::definition::{ModuleDefinition, NodeDefinition};
    use yang_core::edit::InsertAnchor;
    use yang_core::registry::SchemaRegistry;
    use yang_core::rpc_error::{ErrorTag, app_tags};
    use yang_core::schema::{IntegerKind, LeafType};

    const NS: &str = "urn:org:bbf:pma:validation";

    fn q(name: &str) -> QName {
        QName::new(NS, name)
    }

    fn context() -> SchemaContext {
        let registry = SchemaRegistry::builder()
            .module(
                ModuleDefinition::new("validation", NS, "validation").with_node(
                    NodeDefinition::container("validation").with_children([
                        NodeDefinition::list("list1", &["id"]).with_children([
                            NodeDefinition::leaf("id", LeafType::integer(IntegerKind::Int32)),
                            NodeDefinition::leaf("name", LeafType::string()),
                        ]),
                        NodeDefinition::leaf_list("ordered", LeafType::string()).ordered_by_user(),
                        NodeDefinition::leaf_list("sorted", LeafType::integer(IntegerKind::Uint8)),
                        NodeDefinition::leaf("mybits", LeafType::bits(&["firstBit", "secondBit", "thirdBit"])),
                        NodeDefinition::choice("transport").with_children([
                            NodeDefinition::case("tcp")
                                .with_child(NodeDefinition::leaf("tcp-port", LeafType::integer(IntegerKind::Uint16))),
                            NodeDefinition::case("udp")
                                .with_child(NodeDefinition::leaf("udp-port", LeafType::integer(IntegerKind::Uint16))),
                        ]),
                    ]),
                ),
            )
            .build()
            .unwrap();
        SchemaContext::new(Arc::new(registry))
    }

    struct Fixture {
        schema: SchemaContext,
        expressions: ExpressionEngine,
        reporter: ErrorReporter,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                schema: context(),
                expressions: ExpressionEngine::new(),
                reporter: ErrorReporter::default(),
            }
        }

        fn apply(&self, tree: &mut DataTree, edit: EditContainmentNode) -> ValidationResult<ChangeSet> {
            EditApplier::new(&self.schema, &self.expressions, &self.reporter)
                .apply(tree, &EditConfigRequest::single(edit))
        }
    }

    fn values(tree: &DataTree, name: &str) -> Vec<String> {
        let validation = tree.get_child(tree.root(), &q("validation")).unwrap();
        tree.get_children_named(validation, &q(name))
            .into_iter()
            .map(|id| sort_key_of(tree, id).join(","))
            .collect()
    }

    #[test]
    fn test_bits_are_stored_in_position_order() {
        let fixture = Fixture::new();
        let mut tree = DataTree::new();
        fixture
            .apply(
                &mut tree,
                EditContainmentNode::new(q("validation")).with_leaf(q("mybits"), "secondBit thirdBit firstBit"),
            )
            .unwrap();
        assert_eq!(values(&tree, "mybits"), vec!["firstBit secondBit thirdBit"]);
    }

    #[test]
    fn test_system_order_sorts_numerically() {
        let fixture = Fixture::new();
        let mut tree = DataTree::new();
        let mut edit = EditContainmentNode::new(q("validation"));
        for id in ["10", "9", "100"] {
            edit = edit.with_child(EditContainmentNode::new(q("list1")).with_key(q("id"), id));
            edit = edit.with_change(EditChangeNode::new(q("sorted"), id));
        }
        fixture.apply(&mut tree, edit).unwrap();
        assert_eq!(values(&tree, "list1"), vec!["9", "10", "100"]);
        assert_eq!(values(&tree, "sorted"), vec!["9", "10", "100"]);
    }

    #[test]
    fn test_user_order_honors_insert() {
        let fixture = Fixture::new();
        let mut tree = DataTree::new();
        let edit = EditContainmentNode::new(q("validation"))
            .with_change(EditChangeNode::new(q("ordered"), "b"))
            .with_change(EditChangeNode::new(q("ordered"), "a"))
            .with_change(EditChangeNode::new(q("ordered"), "c").with_insert(InsertPosition::First))
            .with_change(
                EditChangeNode::new(q("ordered"), "d")
                    .with_insert(InsertPosition::After(InsertAnchor(vec!["b".to_string()]))),
            );
        fixture.apply(&mut tree, edit).unwrap();
        assert_eq!(values(&tree, "ordered"), vec!["c", "b", "d", "a"]);

        let missing = EditContainmentNode::new(q("validation")).with_change(
            EditChangeNode::new(q("ordered"), "e").with_insert(InsertPosition::Before(InsertAnchor(vec!["zz".to_string()]))),
        );
        let err = fixture.apply(&mut tree, missing).unwrap_err();
        let error = err.first_rpc_error().unwrap();
        assert_eq!(error.tag, ErrorTag::BadAttribute);
        assert_eq!(error.app_tag.as_deref(), Some(app_tags::MISSING_INSTANCE));
    }

    #[test]
    fn test_create_existing_and_delete_missing() {
        let fixture = Fixture::new();
        let mut tree = DataTree::new();
        let entry = || EditContainmentNode::new(q("list1")).with_key(q("id"), "1");
        fixture
            .apply(&mut tree, EditContainmentNode::new(q("validation")).with_child(entry()))
            .unwrap();

        let err = fixture
            .apply(
                &mut tree,
                EditContainmentNode::new(q("validation")).with_child(entry().with_operation(EditOperation::Create)),
            )
            .unwrap_err();
        assert_eq!(err.first_rpc_error().unwrap().tag, ErrorTag::DataExists);

        let missing = EditContainmentNode::new(q("list1"))
            .with_key(q("id"), "2")
            .with_operation(EditOperation::Delete);
        let err = fixture
            .apply(&mut tree, EditContainmentNode::new(q("validation")).with_child(missing))
            .unwrap_err();
        let error = err.first_rpc_error().unwrap();
        assert_eq!(error.tag, ErrorTag::DataMissing);
        assert_eq!(
            error.path.as_deref(),
            Some("/validation:validation/validation:list1[validation:id='2']")
        );
    }

    #[test]
    fn test_duplicate_entries_in_one_payload() {
        let fixture = Fixture::new();
        let mut tree = DataTree::new();
        let edit = EditContainmentNode::new(q("validation"))
            .with_child(EditContainmentNode::new(q("list1")).with_key(q("id"), "1"))
            .with_child(EditContainmentNode::new(q("list1")).with_key(q("id"), "1"));
        let err = fixture.apply(&mut tree, edit).unwrap_err();
        let error = err.first_rpc_error().unwrap();
        assert_eq!(error.app_tag.as_deref(), Some(app_tags::DATA_NOT_UNIQUE));
        assert_eq!(error.message, "Duplicate elements in node list1");
    }

    #[test]
    fn test_unknown_element_and_missing_keys() {
        let fixture = Fixture::new();
        let mut tree = DataTree::new();
        let err = fixture
            .apply(
                &mut tree,
                EditContainmentNode::new(q("validation")).with_leaf(q("nope"), "x"),
            )
            .unwrap_err();
        assert_eq!(
            err.first_rpc_error().unwrap().message,
            "An unexpected element 'nope' is present"
        );

        let err = fixture
            .apply(
                &mut tree,
                EditContainmentNode::new(q("validation")).with_child(EditContainmentNode::new(q("list1"))),
            )
            .unwrap_err();
        let error = err.first_rpc_error().unwrap();
        assert_eq!(error.tag, ErrorTag::MissingElement);
        assert_eq!(error.message, "Expected list key(s) [id] is missing");
    }

    #[test]
    fn test_choice_case_switch_clears_other_case() {
        let fixture = Fixture::new();
        let mut tree = DataTree::new();
        fixture
            .apply(
                &mut tree,
                EditContainmentNode::new(q("validation")).with_leaf(q("tcp-port"), "80"),
            )
            .unwrap();
        let changes = fixture
            .apply(
                &mut tree,
                EditContainmentNode::new(q("validation")).with_leaf(q("udp-port"), "53"),
            )
            .unwrap();
        assert!(values(&tree, "tcp-port").is_empty());
        assert_eq!(values(&tree, "udp-port"), vec!["53"]);
        assert!(changes.iter().any(|change| change.kind == ChangeKind::Deleted));
    }

    #[test]
    fn test_replace_and_none_operations() {
        let fixture = Fixture::new();
        let mut tree = DataTree::new();
        fixture
            .apply(
                &mut tree,
                EditContainmentNode::new(q("validation")).with_child(
                    EditContainmentNode::new(q("list1"))
                        .with_key(q("id"), "1")
                        .with_leaf(q("name"), "old"),
                ),
            )
            .unwrap();
        fixture
            .apply(
                &mut tree,
                EditContainmentNode::new(q("validation")).with_child(
                    EditContainmentNode::new(q("list1"))
                        .with_key(q("id"), "1")
                        .with_operation(EditOperation::Replace),
                ),
            )
            .unwrap();
        let validation = tree.get_child(tree.root(), &q("validation")).unwrap();
        let entry = tree.get_child(validation, &q("list1")).unwrap();
        assert!(tree.get_child(entry, &q("name")).is_none());

        let changes = fixture
            .apply(
                &mut tree,
                EditContainmentNode::new(q("validation")).with_child(
                    EditContainmentNode::new(q("list1"))
                        .with_key(q("id"), "5")
                        .with_operation(EditOperation::None),
                ),
            )
            .unwrap();
        assert!(changes.is_empty());
        assert_eq!(values(&tree, "list1"), vec!["1"]);
    }

    #[test]
    fn test_invalid_value_is_rejected() {
        let fixture = Fixture::new();
        let mut tree = DataTree::new();
        let err = fixture
            .apply(
                &mut tree,
                EditContainmentNode::new(q("validation")).with_change(EditChangeNode::new(q("sorted"), "300")),
            )
            .unwrap_err();
        let error = err.first_rpc_error().unwrap();
        assert_eq!(error.tag, ErrorTag::InvalidValue);
        assert_eq!(error.path.as_deref(), Some("/validation:validation/validation:sorted"));
    }
}
