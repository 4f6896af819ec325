//! Function library for YANG XPath expressions
//!
//! The registry holds the XPath 1.0 core library plus the YANG 1.1
//! extensions. Callers can register custom functions; their arity is checked
//! at parse time like the built-ins.

use super::error::EvaluationError;
use super::value::{XPathValue, string_value};
use crate::mount::SchemaContext;
use std::collections::HashMap;
use yang_core::data::{DataNodeKind, DataTree, NodeId};
use yang_core::registry::SchemaRegistry;

/// Resolution of `deref()` targets, provided by the evaluator
pub trait NodeDereference {
    /// Nodes referenced by the leafref or instance-identifier `node`
    ///
    /// # Errors
    ///
    /// Returns an error if evaluating the reference path fails.
    fn deref_node(&self, node: NodeId) -> Result<Vec<NodeId>, EvaluationError>;
}

/// Evaluation state visible to a function
pub struct FunctionContext<'a> {
    /// Tree being evaluated
    pub tree: &'a DataTree,
    /// Mount-aware schema lookups
    pub schema: &'a SchemaContext,
    /// Registry of the expression, used for prefixes in arguments
    pub registry: &'a SchemaRegistry,
    /// Context node
    pub node: NodeId,
    /// Context position, 1-based
    pub position: usize,
    /// Context size
    pub size: usize,
    /// Node bound to `current()`
    pub current: NodeId,
    /// `deref()` resolver
    pub dereference: &'a dyn NodeDereference,
}

impl FunctionContext<'_> {
    /// `string()` of a value
    #[must_use]
    pub fn string(&self, value: &XPathValue) -> String {
        value.to_string_value(self.tree)
    }

    /// `number()` of a value
    #[must_use]
    pub fn number(&self, value: &XPathValue) -> f64 {
        value.to_number(self.tree)
    }

    /// String argument at `index`, or the context node's string-value
    #[must_use]
    pub fn string_or_context(&self, args: &[XPathValue], index: usize) -> String {
        args.get(index)
            .map_or_else(|| string_value(self.tree, self.node), |arg| self.string(arg))
    }
}

/// Node-set argument of `function`
///
/// # Errors
///
/// Returns a type error if `value` is not a node-set.
pub fn node_set_arg<'v>(function: &str, value: &'v XPathValue) -> Result<&'v [NodeId], EvaluationError> {
    value
        .as_node_set()
        .ok_or_else(|| EvaluationError::expected_node_set(function))
}

/// Signature of built-in function bodies
pub type FunctionHandler =
    fn(&FunctionContext<'_>, Vec<XPathValue>) -> Result<XPathValue, EvaluationError>;

/// Function signature trait
pub trait XPathFunction: Send + Sync {
    /// Function name
    fn name(&self) -> &str;

    /// `(min, max)` argument count, `None` for variadic
    fn arity(&self) -> (usize, Option<usize>);

    /// Validate argument count
    ///
    /// # Errors
    ///
    /// Returns an error if the number of arguments is invalid for this function
    fn validate_arity(&self, count: usize) -> Result<(), EvaluationError> {
        let (min, max) = self.arity();
        if count < min || max.is_some_and(|max| count > max) {
            return Err(EvaluationError::function(
                self.name(),
                format!("expects {} arguments, got {count}", describe_arity(min, max)),
            ));
        }
        Ok(())
    }

    /// Execute the function
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments have the wrong type or a resource
    /// limit is exceeded.
    fn call(&self, context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError>;
}

/// Human readable arity such as `1`, `2 to 3` or `at least 2`
#[must_use]
pub fn describe_arity(min: usize, max: Option<usize>) -> String {
    match max {
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{min} to {max}"),
        None => format!("at least {min}"),
    }
}

/// Built-in function backed by a plain function pointer
pub(super) struct BuiltinFunction {
    name: &'static str,
    min_args: usize,
    max_args: Option<usize>,
    handler: FunctionHandler,
}

impl BuiltinFunction {
    pub(super) const fn new(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        handler: FunctionHandler,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            handler,
        }
    }
}

impl XPathFunction for BuiltinFunction {
    fn name(&self) -> &str {
        self.name
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (self.min_args, self.max_args)
    }

    fn call(&self, context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
        (self.handler)(context, args)
    }
}

type CustomHandler =
    dyn Fn(&FunctionContext<'_>, Vec<XPathValue>) -> Result<XPathValue, EvaluationError> + Send + Sync;

/// Custom function implementation wrapper
pub struct CustomFunction {
    name: String,
    min_args: usize,
    max_args: Option<usize>,
    handler: Box<CustomHandler>,
}

impl CustomFunction {
    /// Create a new custom function
    pub fn new(
        name: impl Into<String>,
        min_args: usize,
        max_args: Option<usize>,
        handler: impl Fn(&FunctionContext<'_>, Vec<XPathValue>) -> Result<XPathValue, EvaluationError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            min_args,
            max_args,
            handler: Box::new(handler),
        }
    }
}

impl XPathFunction for CustomFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (self.min_args, self.max_args)
    }

    fn call(&self, context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
        (self.handler)(context, args)
    }
}

/// Registry of available functions
pub struct FunctionRegistry {
    functions: HashMap<String, Box<dyn XPathFunction>>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = self.function_names();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry").field("functions", &names).finish()
    }
}

impl FunctionRegistry {
    /// Create a new function registry with all built-in functions
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        for function in CORE_FUNCTIONS {
            registry.register(Box::new(function));
        }
        super::string_functions::register(&mut registry);
        super::yang_functions::register(&mut registry);

        registry
    }

    /// Register a function, replacing any function of the same name
    pub(super) fn register(&mut self, function: Box<dyn XPathFunction>) {
        self.functions.insert(function.name().to_string(), function);
    }

    /// Register a custom function
    ///
    /// # Errors
    ///
    /// Returns an error if a function with the same name already exists.
    pub fn register_custom(&mut self, function: CustomFunction) -> Result<(), EvaluationError> {
        if self.functions.contains_key(&function.name) {
            return Err(EvaluationError::function(&function.name, "function is already registered"));
        }
        self.register(Box::new(function));
        Ok(())
    }

    /// Argument bounds of `name`
    #[must_use]
    pub fn arity(&self, name: &str) -> Option<(usize, Option<usize>)> {
        self.functions.get(name).map(|function| function.arity())
    }

    /// Call a function by name
    ///
    /// # Errors
    ///
    /// Returns an error if the function is not found, argument count is incorrect,
    /// or the function execution fails
    pub fn call(
        &self,
        name: &str,
        context: &FunctionContext<'_>,
        args: Vec<XPathValue>,
    ) -> Result<XPathValue, EvaluationError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| EvaluationError::function(name, "unknown function"))?;
        function.validate_arity(args.len())?;
        function.call(context, args)
    }

    /// Check if a function exists
    #[must_use]
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Get list of registered function names
    #[must_use]
    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Node-set, boolean and number functions of the XPath 1.0 core library

const CORE_FUNCTIONS: [BuiltinFunction; 16] = [
    BuiltinFunction::new("last", 0, Some(0), last),
    BuiltinFunction::new("position", 0, Some(0), position),
    BuiltinFunction::new("count", 1, Some(1), count),
    BuiltinFunction::new("local-name", 0, Some(1), local_name),
    BuiltinFunction::new("name", 0, Some(1), qualified_name),
    BuiltinFunction::new("namespace-uri", 0, Some(1), namespace_uri),
    BuiltinFunction::new("boolean", 1, Some(1), boolean),
    BuiltinFunction::new("not", 1, Some(1), not),
    BuiltinFunction::new("true", 0, Some(0), true_fn),
    BuiltinFunction::new("false", 0, Some(0), false_fn),
    BuiltinFunction::new("number", 0, Some(1), number),
    BuiltinFunction::new("sum", 1, Some(1), sum),
    BuiltinFunction::new("floor", 1, Some(1), floor),
    BuiltinFunction::new("ceiling", 1, Some(1), ceiling),
    BuiltinFunction::new("round", 1, Some(1), round),
    BuiltinFunction::new("lang", 1, Some(1), false_fn),
];

#[allow(clippy::cast_precision_loss)]
fn last(context: &FunctionContext<'_>, _args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    Ok(XPathValue::Number(context.size as f64))
}

#[allow(clippy::cast_precision_loss)]
fn position(context: &FunctionContext<'_>, _args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    Ok(XPathValue::Number(context.position as f64))
}

#[allow(clippy::cast_precision_loss)]
fn count(_context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let nodes = node_set_arg("count", &args[0])?;
    Ok(XPathValue::Number(nodes.len() as f64))
}

fn target_node(
    function: &str,
    context: &FunctionContext<'_>,
    args: &[XPathValue],
) -> Result<Option<NodeId>, EvaluationError> {
    match args.first() {
        Some(arg) => Ok(node_set_arg(function, arg)?.first().copied()),
        None => Ok(Some(context.node)),
    }
}

fn local_name(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let name = target_node("local-name", context, &args)?
        .and_then(|node| context.tree.get(node))
        .filter(|node| node.kind != DataNodeKind::Root)
        .map(|node| node.qname.local().to_string())
        .unwrap_or_default();
    Ok(XPathValue::String(name))
}

fn qualified_name(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let Some(node) = target_node("name", context, &args)? else {
        return Ok(XPathValue::String(String::new()));
    };
    let name = match context.tree.get(node) {
        Some(data) if data.kind != DataNodeKind::Root => {
            let prefix = context
                .schema
                .prefix_for(context.tree, node, &data.qname.namespace);
            format!("{prefix}:{}", data.qname.local())
        }
        _ => String::new(),
    };
    Ok(XPathValue::String(name))
}

fn namespace_uri(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let uri = target_node("namespace-uri", context, &args)?
        .and_then(|node| context.tree.get(node))
        .map(|node| node.qname.namespace.to_string())
        .unwrap_or_default();
    Ok(XPathValue::String(uri))
}

fn boolean(_context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    Ok(XPathValue::Boolean(args[0].to_boolean()))
}

fn not(_context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    Ok(XPathValue::Boolean(!args[0].to_boolean()))
}

fn true_fn(_context: &FunctionContext<'_>, _args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    Ok(XPathValue::Boolean(true))
}

fn false_fn(_context: &FunctionContext<'_>, _args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    Ok(XPathValue::Boolean(false))
}

fn floor(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    Ok(XPathValue::Number(context.number(&args[0]).floor()))
}

fn ceiling(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    Ok(XPathValue::Number(context.number(&args[0]).ceil()))
}

fn number(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let value = match args.first() {
        Some(arg) => context.number(arg),
        None => context.number(&XPathValue::NodeSet(vec![context.node])),
    };
    Ok(XPathValue::Number(value))
}

fn sum(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let nodes = node_set_arg("sum", &args[0])?;
    let total = nodes
        .iter()
        .map(|node| super::value::string_to_number(&string_value(context.tree, *node)))
        .sum();
    Ok(XPathValue::Number(total))
}

fn round(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let value = context.number(&args[0]);
    if value.is_nan() || value.is_infinite() {
        return Ok(XPathValue::Number(value));
    }
    Ok(XPathValue::Number((value + 0.5).floor()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_arity() {
        let registry = FunctionRegistry::new();
        assert_eq!(registry.arity("count"), Some((1, Some(1))));
        assert_eq!(registry.arity("concat"), Some((2, None)));
        assert_eq!(registry.arity("current"), Some((0, Some(0))));
        assert_eq!(registry.arity("bit-is-set"), Some((2, Some(2))));
        assert!(registry.arity("upper").is_none());
        assert!(registry.has_function("derived-from-or-self"));
    }

    #[test]
    fn test_register_custom_rejects_duplicates() {
        let mut registry = FunctionRegistry::new();
        registry
            .register_custom(CustomFunction::new("always", 0, Some(0), |_, _| {
                Ok(XPathValue::Boolean(true))
            }))
            .unwrap();
        assert_eq!(registry.arity("always"), Some((0, Some(0))));
        let err = registry
            .register_custom(CustomFunction::new("count", 1, Some(1), |_, _| {
                Ok(XPathValue::Number(0.0))
            }))
            .unwrap_err();
        assert!(matches!(err, EvaluationError::FunctionError { .. }));
    }

    #[test]
    fn test_describe_arity() {
        assert_eq!(describe_arity(1, Some(1)), "1");
        assert_eq!(describe_arity(2, Some(3)), "2 to 3");
        assert_eq!(describe_arity(2, None), "at least 2");
    }
}
