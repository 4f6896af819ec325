//! YANG 1.1 XPath functions (RFC 7950 section 10)

use super::error::EvaluationError;
use super::functions::{BuiltinFunction, FunctionContext, FunctionRegistry, node_set_arg};
use super::value::XPathValue;
use crate::patterns::compile_xsd;
use yang_core::schema::LeafType;

pub(super) fn register(registry: &mut FunctionRegistry) {
    let functions = [
        BuiltinFunction::new("current", 0, Some(0), current),
        BuiltinFunction::new("re-match", 2, Some(2), re_match),
        BuiltinFunction::new("deref", 1, Some(1), deref),
        BuiltinFunction::new("derived-from", 2, Some(2), derived_from),
        BuiltinFunction::new("derived-from-or-self", 2, Some(2), derived_from_or_self),
        BuiltinFunction::new("enum-value", 1, Some(1), enum_value),
        BuiltinFunction::new("bit-is-set", 2, Some(2), bit_is_set),
    ];
    for function in functions {
        registry.register(Box::new(function));
    }
}

fn current(context: &FunctionContext<'_>, _args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    Ok(XPathValue::NodeSet(vec![context.current]))
}

fn re_match(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let value = context.string(&args[0]);
    let pattern = context.string(&args[1]);
    let regex = compile_xsd(&pattern).map_err(|_| EvaluationError::InvalidRegex {
        pattern: pattern.clone(),
    })?;
    Ok(XPathValue::Boolean(regex.is_match(&value)))
}

fn deref(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let nodes = node_set_arg("deref", &args[0])?;
    match nodes.first() {
        Some(node) => Ok(XPathValue::NodeSet(context.dereference.deref_node(*node)?)),
        None => Ok(XPathValue::empty()),
    }
}

fn derived_from_impl(
    function: &str,
    context: &FunctionContext<'_>,
    args: &[XPathValue],
    or_self: bool,
) -> Result<XPathValue, EvaluationError> {
    let nodes = node_set_arg(function, &args[0])?;
    let identity = context.string(&args[1]);
    let default_namespace = context
        .tree
        .get(context.current)
        .map(|node| node.qname.namespace.to_string())
        .unwrap_or_default();
    let Some(base) = context.registry.resolve_identity(&identity, &default_namespace) else {
        return Ok(XPathValue::Boolean(false));
    };
    let derived = nodes.iter().any(|node| {
        let Some(data) = context.tree.get(*node) else {
            return false;
        };
        let Some(value) = data.value.as_deref() else {
            return false;
        };
        let registry = context.schema.registry_for(context.tree, *node);
        registry
            .resolve_identity(value, &data.qname.namespace)
            .is_some_and(|id| registry.identity_derived_from(&id, &base, or_self))
    });
    Ok(XPathValue::Boolean(derived))
}

fn derived_from(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    derived_from_impl("derived-from", context, &args, false)
}

fn derived_from_or_self(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    derived_from_impl("derived-from-or-self", context, &args, true)
}

fn enum_member_value(leaf_type: &LeafType, name: &str) -> Option<i32> {
    match leaf_type {
        LeafType::Enumeration { members } => members.iter().find(|m| m.name == name).map(|m| m.value),
        LeafType::Union { members } => members.iter().find_map(|member| enum_member_value(member, name)),
        _ => None,
    }
}

fn enum_value(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let nodes = node_set_arg("enum-value", &args[0])?;
    let value = nodes.first().and_then(|node| {
        let name = context.tree.value(*node)?;
        let leaf_type = context.schema.schema_node(context.tree, *node)?.leaf_type()?;
        enum_member_value(leaf_type, name)
    });
    Ok(XPathValue::Number(value.map_or(f64::NAN, f64::from)))
}

fn bit_is_set(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let nodes = node_set_arg("bit-is-set", &args[0])?;
    let bit = context.string(&args[1]);
    let set = nodes
        .first()
        .and_then(|node| context.tree.value(*node))
        .is_some_and(|value| value.split_whitespace().any(|name| name == bit));
    Ok(XPathValue::Boolean(set))
}
