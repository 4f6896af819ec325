//! XPath evaluation over the arena data tree
//!
//! Evaluation is read-only and bounded: every node examined on an axis counts
//! against `max_node_visits`, recursion is capped at `max_call_depth` and the
//! wall clock is checked on entry to every sub-expression.

use super::ExpressionEngine;
use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::error::EvaluationError;
use super::functions::{FunctionContext, NodeDereference};
use super::value::{XPathValue, compare};
use crate::mount::SchemaContext;
use std::cell::Cell;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use yang_core::config::ExpressionConfig;
use yang_core::data::{DataNodeKind, DataTree, NodeId};
use yang_core::registry::SchemaRegistry;
use yang_core::schema::LeafType;

/// Resource limits of one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Maximum data nodes examined
    pub max_node_visits: usize,
    /// Wall clock limit
    pub timeout: Duration,
    /// Maximum recursion depth across sub-expressions and `deref()`
    pub max_call_depth: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self::from(&ExpressionConfig::default())
    }
}

impl From<&ExpressionConfig> for EvaluatorConfig {
    fn from(config: &ExpressionConfig) -> Self {
        Self {
            max_node_visits: config.max_node_visits,
            timeout: config.timeout,
            max_call_depth: config.max_depth.saturating_mul(2),
        }
    }
}

/// Where an expression is evaluated
#[derive(Debug, Clone, Copy)]
pub struct EvaluationEnv<'a> {
    /// Tree being evaluated
    pub tree: &'a DataTree,
    /// Mount-aware schema lookups
    pub schema: &'a SchemaContext,
    /// Initial context node
    pub context: NodeId,
    /// Node bound to `current()`
    pub current: NodeId,
    /// Node absolute paths start from
    pub root: NodeId,
    /// Registry resolving prefixes used in the expression
    pub registry: &'a SchemaRegistry,
}

impl<'a> EvaluationEnv<'a> {
    /// Environment for an expression declared on `node`
    #[must_use]
    pub fn for_node(tree: &'a DataTree, schema: &'a SchemaContext, node: NodeId) -> Self {
        Self {
            tree,
            schema,
            context: node,
            current: node,
            root: schema.path_root(tree, node),
            registry: schema.registry_for(tree, node),
        }
    }

    /// Replace the context node, keeping `current()`
    #[must_use]
    pub fn with_context(mut self, context: NodeId) -> Self {
        self.context = context;
        self
    }

    /// Replace the registry used for prefixes
    #[must_use]
    pub fn with_registry(mut self, registry: &'a SchemaRegistry) -> Self {
        self.registry = registry;
        self
    }
}

/// Evaluate `expr` in `env`
pub(super) fn evaluate(
    engine: &ExpressionEngine,
    expr: &Expr,
    env: &EvaluationEnv<'_>,
) -> Result<XPathValue, EvaluationError> {
    let context = EvalContext {
        tree: env.tree,
        schema: env.schema,
        engine,
        config: engine.evaluator_config(),
        visits: Cell::new(0),
        depth: Cell::new(0),
        started: Instant::now(),
    };
    let frame = Frame {
        node: env.context,
        position: 1,
        size: 1,
        current: env.current,
        root: env.root,
        registry: env.registry,
    };
    context.eval(expr, &frame)
}

/// Dynamic context of one sub-expression
#[derive(Clone, Copy)]
struct Frame<'a> {
    node: NodeId,
    position: usize,
    size: usize,
    current: NodeId,
    root: NodeId,
    registry: &'a SchemaRegistry,
}

impl Frame<'_> {
    fn at(&self, node: NodeId, position: usize, size: usize) -> Self {
        Self {
            node,
            position,
            size,
            ..*self
        }
    }
}

struct EvalContext<'a> {
    tree: &'a DataTree,
    schema: &'a SchemaContext,
    engine: &'a ExpressionEngine,
    config: &'a EvaluatorConfig,
    visits: Cell<usize>,
    depth: Cell<usize>,
    started: Instant,
}

impl<'a> EvalContext<'a> {
    fn check_deadline(&self) -> Result<(), EvaluationError> {
        if self.started.elapsed() > self.config.timeout {
            return Err(EvaluationError::Timeout {
                millis: self.config.timeout.as_millis(),
            });
        }
        Ok(())
    }

    fn visit(&self, count: usize) -> Result<(), EvaluationError> {
        let visits = self.visits.get().saturating_add(count);
        self.visits.set(visits);
        if visits > self.config.max_node_visits {
            return Err(EvaluationError::TooManyNodeVisits {
                max: self.config.max_node_visits,
            });
        }
        Ok(())
    }

    fn eval(&self, expr: &Expr, frame: &Frame<'a>) -> Result<XPathValue, EvaluationError> {
        let depth = self.depth.get() + 1;
        if depth > self.config.max_call_depth {
            return Err(EvaluationError::CallStackTooDeep {
                max: self.config.max_call_depth,
            });
        }
        self.check_deadline()?;
        self.depth.set(depth);
        let result = self.eval_inner(expr, frame);
        self.depth.set(depth - 1);
        result
    }

    fn eval_inner(&self, expr: &Expr, frame: &Frame<'a>) -> Result<XPathValue, EvaluationError> {
        match expr {
            Expr::Number(n) => Ok(XPathValue::Number(*n)),
            Expr::Literal(s) => Ok(XPathValue::String(s.clone())),
            Expr::Path(path) => {
                let start = if path.absolute { frame.root } else { frame.node };
                Ok(XPathValue::NodeSet(self.eval_steps(vec![start], &path.steps, frame)?))
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let value = self.eval(primary, frame)?;
                if predicates.is_empty() && steps.is_empty() {
                    return Ok(value);
                }
                let nodes = value
                    .as_node_set()
                    .ok_or_else(|| EvaluationError::TypeError {
                        message: format!("cannot apply a predicate or path to a {}", value.type_name()),
                    })?
                    .to_vec();
                let filtered = self.apply_predicates(nodes, predicates, frame)?;
                Ok(XPathValue::NodeSet(self.eval_steps(filtered, steps, frame)?))
            }
            Expr::FunctionCall { name, args } => {
                let values = args
                    .iter()
                    .map(|arg| self.eval(arg, frame))
                    .collect::<Result<Vec<_>, _>>()?;
                let context = FunctionContext {
                    tree: self.tree,
                    schema: self.schema,
                    registry: frame.registry,
                    node: frame.node,
                    position: frame.position,
                    size: frame.size,
                    current: frame.current,
                    dereference: self,
                };
                self.engine.functions().call(name, &context, values)
            }
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, frame),
            Expr::Negate(inner) => Ok(XPathValue::Number(-self.eval(inner, frame)?.to_number(self.tree))),
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        frame: &Frame<'a>,
    ) -> Result<XPathValue, EvaluationError> {
        match op {
            BinaryOp::Or => {
                if self.eval(left, frame)?.to_boolean() {
                    return Ok(XPathValue::Boolean(true));
                }
                Ok(XPathValue::Boolean(self.eval(right, frame)?.to_boolean()))
            }
            BinaryOp::And => {
                if !self.eval(left, frame)?.to_boolean() {
                    return Ok(XPathValue::Boolean(false));
                }
                Ok(XPathValue::Boolean(self.eval(right, frame)?.to_boolean()))
            }
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Less
            | BinaryOp::LessOrEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterOrEqual => {
                let left = self.eval(left, frame)?;
                let right = self.eval(right, frame)?;
                Ok(XPathValue::Boolean(compare(op, &left, &right, self.tree)))
            }
            BinaryOp::Union => {
                let left = self.eval(left, frame)?;
                let right = self.eval(right, frame)?;
                match (left, right) {
                    (XPathValue::NodeSet(mut nodes), XPathValue::NodeSet(more)) => {
                        nodes.extend(more);
                        let mut nodes = dedupe(nodes);
                        self.sort_document_order(&mut nodes);
                        Ok(XPathValue::NodeSet(nodes))
                    }
                    (left, right) => Err(EvaluationError::TypeError {
                        message: format!("cannot form the union of {} and {}", left.type_name(), right.type_name()),
                    }),
                }
            }
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Modulo => {
                let a = self.eval(left, frame)?.to_number(self.tree);
                let b = self.eval(right, frame)?.to_number(self.tree);
                Ok(XPathValue::Number(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Subtract => a - b,
                    BinaryOp::Multiply => a * b,
                    BinaryOp::Divide => a / b,
                    _ => a % b,
                }))
            }
        }
    }

    fn eval_steps(
        &self,
        mut nodes: Vec<NodeId>,
        steps: &[Step],
        frame: &Frame<'a>,
    ) -> Result<Vec<NodeId>, EvaluationError> {
        for step in steps {
            let mut next = Vec::new();
            for node in &nodes {
                let mut candidates = self.axis_nodes(*node, step)?;
                candidates.retain(|candidate| self.matches(*candidate, &step.test, frame));
                let mut selected = self.apply_predicates(candidates, &step.predicates, frame)?;
                if step.axis.is_reverse() {
                    selected.reverse();
                }
                next.extend(selected);
            }
            nodes = dedupe(next);
            if nodes.is_empty() {
                break;
            }
        }
        Ok(nodes)
    }

    /// Nodes on `step.axis` from `node`, nearest first for reverse axes
    fn axis_nodes(&self, node: NodeId, step: &Step) -> Result<Vec<NodeId>, EvaluationError> {
        let tree = self.tree;
        let nodes = match step.axis {
            Axis::Child if step.test == NodeTest::Text => {
                if tree.get(node).is_some_and(|n| n.is_value_node()) {
                    vec![node]
                } else {
                    Vec::new()
                }
            }
            Axis::Child => tree.get_children(node).to_vec(),
            Axis::Parent => tree.parent(node).into_iter().collect(),
            Axis::SelfAxis => vec![node],
            Axis::Descendant => tree.descendants(node).into_iter().skip(1).collect(),
            Axis::DescendantOrSelf => tree.descendants(node),
            Axis::Ancestor => tree.ancestors(node),
            Axis::AncestorOrSelf => {
                let mut nodes = vec![node];
                nodes.extend(tree.ancestors(node));
                nodes
            }
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                let Some(parent) = tree.parent(node) else {
                    return Ok(Vec::new());
                };
                let siblings = tree.get_children(parent);
                let index = siblings.iter().position(|s| *s == node).unwrap_or(0);
                if step.axis == Axis::FollowingSibling {
                    siblings[index + 1..].to_vec()
                } else {
                    siblings[..index].iter().rev().copied().collect()
                }
            }
        };
        self.visit(nodes.len())?;
        if self.visits.get() % 256 == 0 {
            self.check_deadline()?;
        }
        Ok(nodes)
    }

    fn matches(&self, candidate: NodeId, test: &NodeTest, frame: &Frame<'a>) -> bool {
        let Some(node) = self.tree.get(candidate) else {
            return false;
        };
        match test {
            NodeTest::Node => true,
            NodeTest::Text => node.is_value_node(),
            NodeTest::Name { prefix, local } => {
                node.kind != DataNodeKind::Root
                    && node.qname.local() == local
                    && self.prefix_matches(candidate, prefix.as_deref(), frame)
            }
            NodeTest::Wildcard { prefix } => {
                node.kind != DataNodeKind::Root && self.prefix_matches(candidate, prefix.as_deref(), frame)
            }
        }
    }

    fn prefix_matches(&self, candidate: NodeId, prefix: Option<&str>, frame: &Frame<'a>) -> bool {
        let Some(prefix) = prefix else {
            return true;
        };
        let Some(node) = self.tree.get(candidate) else {
            return false;
        };
        match frame.registry.namespace_for(prefix) {
            Some(namespace) => *node.qname.namespace == *namespace,
            None => self.schema.prefix_for(self.tree, candidate, &node.qname.namespace) == prefix,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn apply_predicates(
        &self,
        mut nodes: Vec<NodeId>,
        predicates: &[Expr],
        frame: &Frame<'a>,
    ) -> Result<Vec<NodeId>, EvaluationError> {
        for predicate in predicates {
            let size = nodes.len();
            let mut kept = Vec::with_capacity(size);
            for (index, node) in nodes.into_iter().enumerate() {
                let position = index + 1;
                let keep = match self.eval(predicate, &frame.at(node, position, size))? {
                    XPathValue::Number(n) => n == position as f64,
                    other => other.to_boolean(),
                };
                if keep {
                    kept.push(node);
                }
            }
            nodes = kept;
        }
        Ok(nodes)
    }

    fn sort_document_order(&self, nodes: &mut [NodeId]) {
        let tree = self.tree;
        nodes.sort_by_cached_key(|node| {
            let mut chain: Vec<NodeId> = tree.ancestors(*node);
            chain.reverse();
            chain.push(*node);
            chain
                .windows(2)
                .map(|pair| {
                    tree.get_children(pair[0])
                        .iter()
                        .position(|child| *child == pair[1])
                        .unwrap_or(usize::MAX)
                })
                .collect::<Vec<_>>()
        });
    }

    fn dereference(&self, leaf_type: &LeafType, node: NodeId, value: &str) -> Result<Vec<NodeId>, EvaluationError> {
        match leaf_type {
            LeafType::LeafRef { path, .. } => {
                let expr = self
                    .engine
                    .compile(path)
                    .map_err(|err| EvaluationError::function("deref", err.to_string()))?;
                let frame = Frame {
                    node,
                    position: 1,
                    size: 1,
                    current: node,
                    root: self.schema.path_root(self.tree, node),
                    registry: self.schema.registry_for(self.tree, node),
                };
                let targets = self.eval(&expr, &frame)?;
                Ok(targets
                    .as_node_set()
                    .unwrap_or_default()
                    .iter()
                    .copied()
                    .filter(|target| self.tree.value(*target) == Some(value))
                    .collect())
            }
            LeafType::InstanceIdentifier { .. } => {
                let Ok(expr) = self.engine.compile(value) else {
                    return Ok(Vec::new());
                };
                let root = self.schema.path_root(self.tree, node);
                let frame = Frame {
                    node: root,
                    position: 1,
                    size: 1,
                    current: node,
                    root,
                    registry: self.schema.registry_for(self.tree, node),
                };
                Ok(self
                    .eval(&expr, &frame)?
                    .as_node_set()
                    .map(<[NodeId]>::to_vec)
                    .unwrap_or_default())
            }
            LeafType::Union { members } => {
                for member in members.iter().filter(|m| m.has_references()) {
                    let targets = self.dereference(member, node, value)?;
                    if !targets.is_empty() {
                        return Ok(targets);
                    }
                }
                Ok(Vec::new())
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl NodeDereference for EvalContext<'_> {
    fn deref_node(&self, node: NodeId) -> Result<Vec<NodeId>, EvaluationError> {
        let Some(leaf_type) = self
            .schema
            .schema_node(self.tree, node)
            .and_then(|schema_node| schema_node.leaf_type())
        else {
            return Ok(Vec::new());
        };
        let value = self.tree.value(node).unwrap_or_default();
        self.dereference(leaf_type, node, value)
    }
}

/// Remove repeated ids, keeping the first occurrence
fn dedupe(nodes: Vec<NodeId>) -> Vec<NodeId> {
    let mut seen = HashSet::with_capacity(nodes.len());
    nodes.into_iter().filter(|node| seen.insert(*node)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::error::ExpressionError;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use yang_core::data::{DataNode, Placement};
    use yang_core::definition::{ModuleDefinition, NodeDefinition};
    use yang_core::schema::IntegerKind;
    use yang_core::types::{QName, SchemaPath};

    const NS: &str = "urn:org:bbf:pma:validation";

    fn q(name: &str) -> QName {
        QName::new(NS, name)
    }

    fn p(names: &[&str]) -> SchemaPath {
        SchemaPath::from_segments(names.iter().map(|n| q(n)).collect())
    }

    struct Fixture {
        schema: SchemaContext,
        tree: DataTree,
        validation: NodeId,
        ref_leaf: NodeId,
        entries: Vec<NodeId>,
    }

    fn fixture() -> Fixture {
        let registry = SchemaRegistry::builder()
            .module(
                ModuleDefinition::new("validation", NS, "validation")
                    .with_identity("base-id", &[])
                    .with_identity("derived-id", &["base-id"])
                    .with_node(
                        NodeDefinition::container("validation").with_children([
                            NodeDefinition::list("list1", &["id"]).with_children([
                                NodeDefinition::leaf("id", LeafType::string()),
                                NodeDefinition::leaf("value", LeafType::integer(IntegerKind::Int32)),
                            ]),
                            NodeDefinition::leaf("ref", LeafType::leafref("../list1/id")),
                            NodeDefinition::leaf("color", LeafType::enumeration(&["red", "green"])),
                            NodeDefinition::leaf("flags", LeafType::bits(&["up", "down"])),
                            NodeDefinition::leaf(
                                "kind",
                                LeafType::IdentityRef {
                                    bases: vec!["base-id".to_string()],
                                },
                            ),
                        ]),
                    ),
            )
            .build()
            .unwrap();
        let schema = SchemaContext::new(Arc::new(registry));
        let mut tree = DataTree::new();
        let validation = tree
            .insert_child(tree.root(), DataNode::container(q("validation"), p(&["validation"])), Placement::Last)
            .unwrap();
        let mut entries = Vec::new();
        for (id, value) in [("a", "1"), ("b", "2"), ("c", "3")] {
            let entry = tree
                .insert_child(
                    validation,
                    DataNode::list_entry(q("list1"), p(&["validation", "list1"]), vec![q("id")]),
                    Placement::Last,
                )
                .unwrap();
            tree.insert_child(entry, DataNode::leaf(q("id"), p(&["validation", "list1", "id"]), id), Placement::Last)
                .unwrap();
            tree.insert_child(
                entry,
                DataNode::leaf(q("value"), p(&["validation", "list1", "value"]), value),
                Placement::Last,
            )
            .unwrap();
            entries.push(entry);
        }
        let ref_leaf = tree
            .insert_child(validation, DataNode::leaf(q("ref"), p(&["validation", "ref"]), "b"), Placement::Last)
            .unwrap();
        for (name, value) in [("color", "green"), ("flags", "up down"), ("kind", "validation:derived-id")] {
            tree.insert_child(validation, DataNode::leaf(q(name), p(&["validation", name]), value), Placement::Last)
                .unwrap();
        }
        Fixture {
            schema,
            tree,
            validation,
            ref_leaf,
            entries,
        }
    }

    fn eval(fixture: &Fixture, node: NodeId, text: &str) -> Result<XPathValue, ExpressionError> {
        let engine = ExpressionEngine::new();
        engine.evaluate(text, &EvaluationEnv::for_node(&fixture.tree, &fixture.schema, node))
    }

    fn eval_bool(fixture: &Fixture, node: NodeId, text: &str) -> bool {
        eval(fixture, node, text).unwrap().to_boolean()
    }

    #[test]
    fn test_paths_and_predicates() {
        let f = fixture();
        assert_eq!(
            eval(&f, f.validation, "list1[id = 'b']").unwrap(),
            XPathValue::NodeSet(vec![f.entries[1]])
        );
        assert_eq!(eval(&f, f.validation, "count(list1)").unwrap(), XPathValue::Number(3.0));
        assert_eq!(eval(&f, f.validation, "list1[2]").unwrap(), XPathValue::NodeSet(vec![f.entries[1]]));
        assert_eq!(eval(&f, f.validation, "list1[last()]").unwrap(), XPathValue::NodeSet(vec![f.entries[2]]));
        assert!(eval_bool(&f, f.ref_leaf, "/validation:validation/list1[id = current()]"));
        assert!(eval_bool(&f, f.ref_leaf, "sum(../list1/value) = 6"));
        assert!(!eval_bool(&f, f.ref_leaf, "../list1[value > 3]"));
    }

    #[test]
    fn test_reverse_axes_count_from_nearest() {
        let f = fixture();
        let id = f.tree.get_children(f.entries[2])[0];
        let result = eval(&f, id, "ancestor::*[1]").unwrap();
        assert_eq!(result, XPathValue::NodeSet(vec![f.entries[2]]));
        let result = eval(&f, f.entries[2], "preceding-sibling::list1[1]/id").unwrap();
        assert_eq!(result.to_string_value(&f.tree), "b");
    }

    #[test]
    fn test_union_is_in_document_order() {
        let f = fixture();
        let result = eval(&f, f.validation, "list1[3] | list1[1]").unwrap();
        assert_eq!(result, XPathValue::NodeSet(vec![f.entries[0], f.entries[2]]));
    }

    #[test]
    fn test_text_and_unknown_prefix() {
        let f = fixture();
        assert!(eval_bool(&f, f.ref_leaf, "text() = 'b'"));
        assert!(!eval_bool(&f, f.validation, "other:list1"));
    }

    #[test]
    fn test_yang_functions() {
        let f = fixture();
        assert!(eval_bool(&f, f.validation, "deref(ref)/../value = 2"));
        assert!(eval_bool(&f, f.validation, "enum-value(color) = 1"));
        assert!(eval_bool(&f, f.validation, "bit-is-set(flags, 'down')"));
        assert!(!eval_bool(&f, f.validation, "bit-is-set(flags, 'left')"));
        assert!(eval_bool(&f, f.validation, "derived-from(kind, 'validation:base-id')"));
        assert!(!eval_bool(&f, f.validation, "derived-from(kind, 'validation:derived-id')"));
        assert!(eval_bool(&f, f.validation, "derived-from-or-self(kind, 'derived-id')"));
        assert!(eval_bool(&f, f.validation, "re-match(ref, '[a-c]')"));
        assert!(!eval_bool(&f, f.validation, "re-match(ref, 'b.')"));
    }

    #[test]
    fn test_arithmetic_and_strings() {
        let f = fixture();
        assert_eq!(eval(&f, f.validation, "7 mod 3 + 10 div 4").unwrap(), XPathValue::Number(3.5));
        assert_eq!(
            eval(&f, f.validation, "concat(substring('abcdef', 2, 3), '-', translate('abc', 'b', 'B'))").unwrap(),
            XPathValue::String("bcd-aBc".to_string())
        );
        assert_eq!(eval(&f, f.validation, "-list1[1]/value").unwrap(), XPathValue::Number(-1.0));
    }

    #[test]
    fn test_node_visit_limit() {
        let f = fixture();
        let config = ExpressionConfig {
            max_node_visits: 3,
            ..ExpressionConfig::default()
        };
        let engine = ExpressionEngine::from_config(&config);
        let err = engine
            .evaluate("count(//*)", &EvaluationEnv::for_node(&f.tree, &f.schema, f.validation))
            .unwrap_err();
        assert!(matches!(
            err,
            ExpressionError::Evaluation(EvaluationError::TooManyNodeVisits { max: 3 })
        ));
    }

    #[test]
    fn test_type_errors() {
        let f = fixture();
        assert!(eval(&f, f.validation, "count('x')").is_err());
        assert!(eval(&f, f.validation, "1 | list1").is_err());
        assert!(eval(&f, f.validation, "re-match('a', '(')").is_err());
    }
}
