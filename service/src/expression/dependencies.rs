//! Static dependencies of `must`, `when` and `leafref` expressions
//!
//! The index maps every schema node that owns an expression to the schema
//! nodes the expression reads. After an edit, owners whose targets overlap a
//! changed node are re-validated even when the owner itself was untouched.
//! Paths that cannot be resolved statically (`deref()`, ancestor and sibling
//! axes, crossing a mount root upwards) mark the owner as dynamic; dynamic
//! owners are re-validated after every edit.

use super::ExpressionEngine;
use super::ast::{Axis, Expr, NodeTest, Step};
use crate::mount::SchemaKey;
use std::collections::HashSet;
use tracing::warn;
use yang_core::registry::SchemaRegistry;
use yang_core::schema::{LeafType, SchemaNode, SchemaNodeKind};
use yang_core::types::SchemaPath;

/// Expressions of one owner and what they read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Schema node the constraint is checked on
    pub owner: SchemaKey,
    /// Schema nodes read by the expressions
    pub targets: Vec<SchemaKey>,
    /// Whether some expression could not be resolved statically
    pub dynamic: bool,
}

/// Reverse index from read schema nodes to constraint owners
#[derive(Debug, Clone, Default)]
pub struct DependencyIndex {
    dependencies: Vec<Dependency>,
}

impl DependencyIndex {
    /// Analyse every expression of `registry` and its mounted registries
    #[must_use]
    pub fn build(registry: &SchemaRegistry, engine: &ExpressionEngine) -> Self {
        let mut index = Self::default();
        index.collect(registry, &[], engine);
        index
    }

    fn collect(&mut self, registry: &SchemaRegistry, mounts: &[SchemaPath], engine: &ExpressionEngine) {
        let mut nodes: Vec<&SchemaNode> = registry.nodes().collect();
        nodes.sort_by(|a, b| a.path.cmp(&b.path));
        let resolver = Resolver { registry, mounts };
        for node in nodes {
            if let (SchemaNodeKind::Container { .. }, Some(mounted)) =
                (&node.kind, registry.mounted_registry(&node.path))
            {
                let mut inner = mounts.to_vec();
                inner.push(node.path.clone());
                self.collect(mounted, &inner, engine);
            }

            let mut analysis = Analysis::default();
            let context = if node.is_choice_or_case() {
                registry.data_parent(&node.path)
            } else {
                node.path.clone()
            };
            for must in &node.must {
                resolver.analyse_text(engine, &must.expression, &context, &mut analysis);
            }
            for when in &node.when {
                let when_context = if when.on_parent {
                    registry.data_parent(&node.path)
                } else {
                    context.clone()
                };
                resolver.analyse_text(engine, &when.expression, &when_context, &mut analysis);
            }
            if let Some(leaf_type) = node.leaf_type() {
                resolver.analyse_type(engine, leaf_type, &node.path, &mut analysis);
            }
            if analysis.is_empty() {
                continue;
            }

            let owners = if node.is_choice_or_case() {
                registry
                    .data_children(&node.path)
                    .into_iter()
                    .map(|child| child.path.clone())
                    .collect()
            } else {
                vec![node.path.clone()]
            };
            for owner in owners {
                self.dependencies.push(Dependency {
                    owner: SchemaKey {
                        mounts: mounts.to_vec(),
                        path: owner,
                    },
                    targets: analysis.targets.clone(),
                    dynamic: analysis.dynamic,
                });
            }
        }
    }

    /// Owners whose expressions read `changed`, dynamic owners included
    pub fn owners_affected_by<'a>(&'a self, changed: &'a SchemaKey) -> impl Iterator<Item = &'a SchemaKey> + 'a {
        self.dependencies
            .iter()
            .filter(move |dependency| {
                dependency.dynamic || dependency.targets.iter().any(|target| target.overlaps(changed))
            })
            .map(|dependency| &dependency.owner)
    }

    /// Dependencies recorded for `owner`
    pub fn dependencies_of<'a>(&'a self, owner: &'a SchemaKey) -> impl Iterator<Item = &'a Dependency> + 'a {
        self.dependencies
            .iter()
            .filter(move |dependency| &dependency.owner == owner)
    }

    /// Schema paths that own at least one expression
    #[must_use]
    pub fn owner_paths(&self) -> HashSet<&SchemaPath> {
        self.dependencies.iter().map(|dependency| &dependency.owner.path).collect()
    }

    /// Number of owners
    #[must_use]
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Whether no expression was indexed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

#[derive(Debug, Default)]
struct Analysis {
    targets: Vec<SchemaKey>,
    dynamic: bool,
}

impl Analysis {
    fn is_empty(&self) -> bool {
        self.targets.is_empty() && !self.dynamic
    }

    fn add(&mut self, target: SchemaKey) {
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
    }
}

/// Position reached while walking a path over the schema
#[derive(Debug, Clone)]
struct Position<'r> {
    mounts: Vec<SchemaPath>,
    registry: &'r SchemaRegistry,
    path: SchemaPath,
}

struct Resolver<'r, 'm> {
    registry: &'r SchemaRegistry,
    mounts: &'m [SchemaPath],
}

impl<'r> Resolver<'r, '_> {
    fn start(&self, path: SchemaPath) -> Position<'r> {
        Position {
            mounts: self.mounts.to_vec(),
            registry: self.registry,
            path,
        }
    }

    fn analyse_text(&self, engine: &ExpressionEngine, text: &str, context: &SchemaPath, analysis: &mut Analysis) {
        match engine.compile(text) {
            Ok(expr) => {
                let start = self.start(context.clone());
                self.analyse(&expr, &start, &start, analysis);
            }
            Err(err) => {
                warn!(expression = text, error = %err, "expression cannot be analysed");
                analysis.dynamic = true;
            }
        }
    }

    fn analyse_type(&self, engine: &ExpressionEngine, leaf_type: &LeafType, owner: &SchemaPath, analysis: &mut Analysis) {
        match leaf_type {
            LeafType::LeafRef { path, .. } => self.analyse_text(engine, path, owner, analysis),
            LeafType::InstanceIdentifier { .. } => analysis.dynamic = true,
            LeafType::Union { members } => {
                for member in members {
                    self.analyse_type(engine, member, owner, analysis);
                }
            }
            _ => {}
        }
    }

    fn analyse(&self, expr: &Expr, context: &Position<'r>, current: &Position<'r>, analysis: &mut Analysis) {
        match expr {
            Expr::Number(_) | Expr::Literal(_) => {}
            Expr::Path(path) => {
                let start = if path.absolute {
                    self.start(SchemaPath::root())
                } else {
                    context.clone()
                };
                self.analyse_steps(start, &path.steps, current, analysis);
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let start = match primary.as_ref() {
                    Expr::FunctionCall { name, args } if name == "current" && args.is_empty() => {
                        Some(current.clone())
                    }
                    other => {
                        self.analyse(other, context, current, analysis);
                        None
                    }
                };
                match start {
                    Some(start) => {
                        for predicate in predicates {
                            self.analyse(predicate, &start, current, analysis);
                        }
                        self.analyse_steps(start, steps, current, analysis);
                    }
                    None if predicates.is_empty() && steps.is_empty() => {}
                    None => analysis.dynamic = true,
                }
            }
            Expr::FunctionCall { name, args } => {
                if name == "deref" {
                    analysis.dynamic = true;
                }
                for arg in args {
                    self.analyse(arg, context, current, analysis);
                }
            }
            Expr::Binary { left, right, .. } => {
                self.analyse(left, context, current, analysis);
                self.analyse(right, context, current, analysis);
            }
            Expr::Negate(inner) => self.analyse(inner, context, current, analysis),
        }
    }

    fn analyse_steps(&self, start: Position<'r>, steps: &[Step], current: &Position<'r>, analysis: &mut Analysis) {
        let mut position = start;
        for step in steps {
            match resolve_step(&position, step) {
                Some(next) => position = next,
                None => {
                    analysis.dynamic = true;
                    return;
                }
            }
            for predicate in &step.predicates {
                self.analyse(predicate, &position, current, analysis);
            }
        }
        analysis.add(SchemaKey {
            mounts: position.mounts,
            path: position.path,
        });
    }
}

/// Schema position after `step`, `None` when it cannot be known statically
fn resolve_step<'r>(position: &Position<'r>, step: &Step) -> Option<Position<'r>> {
    match (step.axis, &step.test) {
        (Axis::SelfAxis, NodeTest::Node | NodeTest::Text) | (Axis::Child, NodeTest::Text) => Some(position.clone()),
        (Axis::Parent, NodeTest::Node) => {
            if position.path.is_root() {
                return None;
            }
            Some(Position {
                path: position.registry.data_parent(&position.path),
                ..position.clone()
            })
        }
        // Any descendant change lies below the context node
        (Axis::Child | Axis::Descendant | Axis::DescendantOrSelf, NodeTest::Wildcard { .. } | NodeTest::Node) => {
            Some(position.clone())
        }
        (Axis::Descendant | Axis::DescendantOrSelf, NodeTest::Name { .. }) => Some(position.clone()),
        (Axis::Child, NodeTest::Name { prefix, local }) => {
            let (registry, mounts, parent) = match position.registry.mounted_registry(&position.path) {
                Some(mounted) => {
                    let mut mounts = position.mounts.clone();
                    mounts.push(position.path.clone());
                    (mounted.as_ref(), mounts, SchemaPath::root())
                }
                None => (position.registry, position.mounts.clone(), position.path.clone()),
            };
            let namespace = prefix
                .as_deref()
                .and_then(|prefix| position.registry.namespace_for(prefix));
            let child = registry.find_data_child(&parent, namespace, local)?;
            Some(Position {
                mounts,
                registry,
                path: child.path.clone(),
            })
        }
        _ => None,
    }
}

/// Schema node a leafref `path` on the leaf at `owner` points to
///
/// Only paths made of parent and child steps inside one registry resolve.
#[must_use]
pub fn leafref_target<'r>(registry: &'r SchemaRegistry, owner: &SchemaPath, expr: &Expr) -> Option<&'r SchemaNode> {
    let (absolute, steps) = match expr {
        Expr::Path(path) => (path.absolute, path.steps.as_slice()),
        Expr::Filter { primary, steps, .. }
            if matches!(primary.as_ref(), Expr::FunctionCall { name, .. } if name == "current") =>
        {
            (false, steps.as_slice())
        }
        _ => return None,
    };
    let mut position = Position {
        mounts: Vec::new(),
        registry,
        path: if absolute { SchemaPath::root() } else { owner.clone() },
    };
    for step in steps {
        if !matches!(step.axis, Axis::Parent | Axis::Child) {
            return None;
        }
        position = resolve_step(&position, step)?;
        if !position.mounts.is_empty() {
            return None;
        }
    }
    registry.get_data_schema_node(&position.path)
}
