//! JSON encoding of data trees and edit payloads
//!
//! Trees render in the RFC 7951 style: members appear in schema order, a
//! member name carries its module (`module:name`) at the top level and
//! wherever the namespace changes, lists and leaf-lists are arrays, 64-bit
//! integers and decimal64 are strings and `empty` is `[null]`.

use crate::edit::defaults::WithDefaults;
use crate::mount::SchemaContext;
use serde_json::{Map, Value};
use yang_core::data::{DataNode, DataTree, NodeId};
use yang_core::edit::{EditChangeNode, EditContainmentNode, EditMatchNode, EditOperation};
use yang_core::error::{Result, YangError};
use yang_core::registry::SchemaRegistry;
use yang_core::schema::{LeafType, SchemaNode, SchemaNodeKind};
use yang_core::types::{QName, SchemaPath};

/// Render `tree` as a JSON object
#[must_use]
pub fn render(schema: &SchemaContext, tree: &DataTree, mode: WithDefaults) -> Value {
    Value::Object(render_children(schema, tree, tree.root(), None, mode))
}

fn render_children(
    schema: &SchemaContext,
    tree: &DataTree,
    node: NodeId,
    parent_namespace: Option<&str>,
    mode: WithDefaults,
) -> Map<String, Value> {
    let mut out = Map::new();
    let Some(data) = tree.get(node) else {
        return out;
    };
    let schema_parent = if data.mount_point {
        SchemaPath::root()
    } else {
        data.schema_path.clone()
    };
    let registry = schema.child_registry(tree, node);
    // inside a mount the namespace context restarts
    let parent_namespace = if data.mount_point { None } else { parent_namespace };

    for child in registry.data_children(&schema_parent) {
        let instances: Vec<NodeId> = tree
            .get_children_named(node, &child.qname)
            .into_iter()
            .filter(|id| tree.get(*id).is_some_and(|n| reported(child, n, mode)))
            .collect();
        if instances.is_empty() {
            continue;
        }
        let namespace: &str = &child.qname.namespace;
        let name = member_name(registry, &child.qname, parent_namespace);
        let value = match &child.kind {
            SchemaNodeKind::Leaf { leaf_type, .. } => {
                leaf_json(leaf_type, tree.value(instances[0]).unwrap_or_default())
            }
            SchemaNodeKind::LeafList { leaf_type, .. } => Value::Array(
                instances
                    .iter()
                    .map(|id| leaf_json(leaf_type, tree.value(*id).unwrap_or_default()))
                    .collect(),
            ),
            SchemaNodeKind::List { .. } => Value::Array(
                instances
                    .iter()
                    .map(|id| Value::Object(render_children(schema, tree, *id, Some(namespace), mode)))
                    .collect(),
            ),
            SchemaNodeKind::Container { presence, .. } => {
                let members = render_children(schema, tree, instances[0], Some(namespace), mode);
                if members.is_empty() && !presence && mode != WithDefaults::ReportAll {
                    continue;
                }
                Value::Object(members)
            }
            SchemaNodeKind::Anydata => {
                let text = tree.value(instances[0]).unwrap_or_default();
                serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
            }
            _ => continue,
        };
        out.insert(name, value);
    }
    out
}

/// Whether a node is shown under `mode`
fn reported(schema_node: &SchemaNode, node: &DataNode, mode: WithDefaults) -> bool {
    match mode {
        WithDefaults::ReportAll => true,
        WithDefaults::Explicit => !node.is_default,
        WithDefaults::Trim => {
            if node.is_default {
                return false;
            }
            let value = node.value.as_deref();
            match &schema_node.kind {
                SchemaNodeKind::Leaf { default, .. } => default.is_none() || default.as_deref() != value,
                SchemaNodeKind::LeafList { defaults, .. } => !value.is_some_and(|v| defaults.iter().any(|d| d == v)),
                _ => true,
            }
        }
    }
}

fn member_name(registry: &SchemaRegistry, qname: &QName, parent_namespace: Option<&str>) -> String {
    let namespace: &str = &qname.namespace;
    if parent_namespace == Some(namespace) {
        return qname.local().to_string();
    }
    match registry.module_by_namespace(namespace) {
        Some(module) => format!("{}:{}", module.identifier.name, qname.local()),
        None => qname.local().to_string(),
    }
}

fn leaf_json(leaf_type: &LeafType, value: &str) -> Value {
    match leaf_type {
        LeafType::Integer { kind, .. } if kind.is_json_number() => value
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(value.to_string())),
        LeafType::Boolean => Value::Bool(value == "true"),
        LeafType::Empty => Value::Array(vec![Value::Null]),
        _ => Value::String(value.to_string()),
    }
}

/// Build an edit from an RFC 7951 style JSON object
///
/// Objects become containers, arrays of objects list entries (keys taken
/// from the entry's members) and scalars or arrays of scalars leaf and
/// leaf-list changes. Operations are given as metadata: `"@": {"operation":
/// "delete"}` inside an object applies to that container or entry, and
/// `"@name": {"operation": "remove"}` next to a leaf applies to the leaf.
/// Members the schema does not know are kept so the edit reports them.
///
/// # Errors
///
/// Returns an error when the document is not an object, a module prefix
/// is unknown or an operation annotation is malformed.
pub fn json_to_edit(schema: &SchemaContext, value: &Value) -> Result<EditContainmentNode> {
    let Value::Object(members) = value else {
        return Err(YangError::serialization("edit document must be a JSON object"));
    };
    let mut root = EditContainmentNode::root();
    convert_members(schema.root_registry(), &SchemaPath::root(), None, members, &mut root)?;
    Ok(root)
}

fn convert_members(
    registry: &SchemaRegistry,
    schema_parent: &SchemaPath,
    parent_namespace: Option<&str>,
    members: &Map<String, Value>,
    target: &mut EditContainmentNode,
) -> Result<()> {
    let mut annotations = Vec::new();
    for (key, value) in members {
        if let Some(annotated) = key.strip_prefix('@') {
            annotations.push((annotated, value));
            continue;
        }
        let (namespace, local) = resolve_member(registry, key, parent_namespace)?;
        let schema_node = registry.find_data_child(schema_parent, namespace.as_deref(), local);
        let qname = match (schema_node, namespace) {
            (Some(node), _) => node.qname.clone(),
            (None, Some(namespace)) => QName::new(namespace, local),
            (None, None) => QName::new("", local),
        };
        match (schema_node.map(|node| &node.kind), value) {
            (Some(SchemaNodeKind::List { keys, .. }), Value::Array(entries)) => {
                for entry in entries {
                    target
                        .children
                        .push(convert_entry(registry, schema_node, &qname, keys, entry)?);
                }
            }
            (Some(SchemaNodeKind::Anydata), value) => {
                target.change_nodes.push(EditChangeNode::new(qname, value.to_string()));
            }
            (_, Value::Object(inner)) => {
                let mut child = EditContainmentNode::new(qname.clone());
                match schema_node.and_then(|node| registry.mounted_registry(&node.path)) {
                    Some(mounted) => convert_members(mounted, &SchemaPath::root(), None, inner, &mut child)?,
                    None => {
                        let path =
                            schema_node.map_or_else(|| schema_parent.child(qname.clone()), |node| node.path.clone());
                        convert_members(registry, &path, Some(&*qname.namespace), inner, &mut child)?;
                    }
                }
                target.children.push(child);
            }
            (_, Value::Array(items)) if is_empty_marker(items) => {
                target.change_nodes.push(EditChangeNode::empty(qname));
            }
            (_, Value::Array(items)) => {
                for item in items {
                    match item {
                        Value::Object(inner) => {
                            let mut child = EditContainmentNode::new(qname.clone());
                            convert_members(registry, schema_parent, Some(&*qname.namespace), inner, &mut child)?;
                            target.children.push(child);
                        }
                        scalar => target.change_nodes.push(EditChangeNode::new(qname.clone(), scalar_text(scalar))),
                    }
                }
            }
            (_, scalar) => target.change_nodes.push(EditChangeNode::new(qname, scalar_text(scalar))),
        }
    }

    for (annotated, value) in annotations {
        let operation = annotation_operation(value)?;
        if annotated.is_empty() {
            target.operation = Some(operation);
            continue;
        }
        let local = annotated.split_once(':').map_or(annotated, |(_, local)| local);
        for change in target.change_nodes.iter_mut().filter(|change| change.qname.local() == local) {
            change.operation = Some(operation);
        }
        if !target.change_nodes.iter().any(|change| change.qname.local() == local)
            && let Some(node) = registry.find_data_child(schema_parent, None, local)
        {
            // annotation on a leaf that has no value, e.g. a delete
            target
                .change_nodes
                .push(EditChangeNode::empty(node.qname.clone()).with_operation(operation));
        }
    }
    Ok(())
}

fn convert_entry(
    registry: &SchemaRegistry,
    list: Option<&SchemaNode>,
    qname: &QName,
    keys: &[QName],
    entry: &Value,
) -> Result<EditContainmentNode> {
    let Value::Object(members) = entry else {
        return Err(YangError::serialization(format!(
            "entry of list '{}' must be a JSON object",
            qname.local()
        )));
    };
    let mut child = EditContainmentNode::new(qname.clone());
    let mut rest = Map::new();
    for (member, value) in members {
        let local = member.split_once(':').map_or(member.as_str(), |(_, local)| local);
        match keys.iter().find(|key| key.local() == local) {
            Some(key) => child.match_nodes.push(EditMatchNode {
                qname: key.clone(),
                value: scalar_text(value),
            }),
            None => {
                rest.insert(member.clone(), value.clone());
            }
        }
    }
    child
        .match_nodes
        .sort_by_key(|matched| keys.iter().position(|key| key == &matched.qname));
    let path = list.map_or_else(|| SchemaPath::root().child(qname.clone()), |node| node.path.clone());
    convert_members(registry, &path, Some(&*qname.namespace), &rest, &mut child)?;
    Ok(child)
}

/// Namespace and local name of a member name
fn resolve_member<'k>(
    registry: &SchemaRegistry,
    key: &'k str,
    parent_namespace: Option<&str>,
) -> Result<(Option<String>, &'k str)> {
    match key.split_once(':') {
        Some((module, local)) => {
            let module = registry
                .module_by_name(module)
                .ok_or_else(|| YangError::serialization(format!("unknown module '{module}' in member '{key}'")))?;
            Ok((Some(module.identifier.namespace.clone()), local))
        }
        None => Ok((parent_namespace.map(str::to_string), key)),
    }
}

fn annotation_operation(value: &Value) -> Result<EditOperation> {
    let operation = value
        .get("operation")
        .cloned()
        .ok_or_else(|| YangError::serialization("annotation without an 'operation' member"))?;
    Ok(serde_json::from_value(operation)?)
}

fn is_empty_marker(items: &[Value]) -> bool {
    matches!(items, [Value::Null])
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Array(items) if is_empty_marker(items) => String::new(),
        other => other.to_string(),
    }
}
