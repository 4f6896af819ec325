//! Referential integrity of leafref and instance-identifier values
//!
//! Runs after the structural and expression phases on the staged tree, so a
//! deleted list entry is caught at the leaf that still refers to it even
//! when the request never touched that leaf.

use crate::expression::{EvaluationEnv, ExpressionEngine};
use crate::mount::SchemaContext;
use crate::validator::context::{NodeState, ValidationContext};
use crate::validator::failure::{FailureKind, ValidationFailure};
use crate::validator::types::TypeValidator;
use tracing::trace;
use yang_core::config::IntegrityConfig;
use yang_core::data::{DataTree, NodeId};
use yang_core::error::Result;
use yang_core::schema::{LeafType, SchemaNode};

/// Checks that referenced instances exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityService {
    enabled: bool,
}

impl Default for IntegrityService {
    fn default() -> Self {
        Self::new(&IntegrityConfig::default())
    }
}

/// Shared inputs of one integrity check
struct Scope<'a> {
    tree: &'a DataTree,
    schema: &'a SchemaContext,
    expressions: &'a ExpressionEngine,
    types: TypeValidator<'a>,
    owner: &'a SchemaNode,
    node: NodeId,
}

impl IntegrityService {
    /// Service following `config`
    #[must_use]
    pub fn new(config: &IntegrityConfig) -> Self {
        Self {
            enabled: config.enabled,
        }
    }

    /// Whether checks run at all
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check every reference value among `nodes`, recording failures
    ///
    /// # Errors
    ///
    /// Returns an error when a leafref path cannot be evaluated.
    pub fn check(
        &self,
        tree: &DataTree,
        schema: &SchemaContext,
        expressions: &ExpressionEngine,
        nodes: &[NodeId],
        context: &mut ValidationContext,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        for &node in nodes {
            if context.should_stop() {
                break;
            }
            if !tree.is_alive(node) || context.state(node) == NodeState::Failed {
                continue;
            }
            match self.check_node(tree, schema, expressions, node)? {
                Some(failure) => context.fail(Some(node), failure),
                None => context.advance(node, NodeState::Valid),
            }
        }
        Ok(())
    }

    /// Failure for `node` when its reference target is missing
    ///
    /// # Errors
    ///
    /// Returns an error when a leafref path cannot be evaluated.
    pub fn check_node(
        &self,
        tree: &DataTree,
        schema: &SchemaContext,
        expressions: &ExpressionEngine,
        node: NodeId,
    ) -> Result<Option<ValidationFailure>> {
        let Some(data) = tree.get(node).filter(|data| data.is_value_node()) else {
            return Ok(None);
        };
        let Some(owner) = schema.schema_node(tree, node) else {
            return Ok(None);
        };
        let Some(leaf_type) = owner.leaf_type().filter(|leaf_type| leaf_type.has_references()) else {
            return Ok(None);
        };
        let value = data.value.as_deref().unwrap_or_default();
        let scope = Scope {
            tree,
            schema,
            expressions,
            types: TypeValidator::new(schema.registry_for(tree, node), expressions),
            owner,
            node,
        };
        if satisfied(&scope, leaf_type, value)? {
            return Ok(None);
        }
        trace!(value, leaf = %owner.path, "reference target missing");
        Ok(Some(ValidationFailure::at(
            FailureKind::DependencyViolated {
                value: value.to_string(),
            },
            schema.instance_path(tree, node),
        )))
    }
}

fn satisfied(scope: &Scope<'_>, leaf_type: &LeafType, value: &str) -> Result<bool> {
    match leaf_type {
        LeafType::LeafRef { path, require_instance } => {
            if !require_instance {
                return Ok(true);
            }
            let env = EvaluationEnv::for_node(scope.tree, scope.schema, scope.node);
            let targets = scope
                .expressions
                .evaluate(path, &env)
                .map_err(|err| err.into_yang_error(path))?;
            Ok(targets
                .as_node_set()
                .is_some_and(|nodes| nodes.iter().any(|target| scope.tree.value(*target) == Some(value))))
        }
        LeafType::InstanceIdentifier { require_instance } => {
            if !require_instance {
                return Ok(true);
            }
            let root = scope.schema.path_root(scope.tree, scope.node);
            let env = EvaluationEnv::for_node(scope.tree, scope.schema, scope.node).with_context(root);
            Ok(scope
                .expressions
                .evaluate(value, &env)
                .is_ok_and(|targets| targets.as_node_set().is_some_and(|nodes| !nodes.is_empty())))
        }
        LeafType::Union { members } => {
            for member in members {
                let accepted = if member.has_references() {
                    satisfied(scope, member, value)?
                } else {
                    scope.types.accepts(scope.owner, member, value)
                };
                if accepted {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Ok(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use yang_core::data::{DataNode, Placement};
    use yang_core::definition::{ModuleDefinition, NodeDefinition};
    use yang_core::registry::SchemaRegistry;
    use yang_core::schema::IntegerKind;
    use yang_core::types::{QName, SchemaPath};

    const NS: &str = "urn:org:bbf:pma:validation";

    fn q(name: &str) -> QName {
        QName::new(NS, name)
    }

    fn p(names: &[&str]) -> SchemaPath {
        SchemaPath::from_segments(names.iter().map(|n| q(n)).collect())
    }

    fn schema() -> SchemaContext {
        let registry = SchemaRegistry::builder()
            .module(
                ModuleDefinition::new("validation", NS, "validation").with_node(
                    NodeDefinition::container("validation").with_children([
                        NodeDefinition::list("list1", &["id"])
                            .with_child(NodeDefinition::leaf("id", LeafType::string())),
                        NodeDefinition::list("list2", &["id"])
                            .with_child(NodeDefinition::leaf("id", LeafType::string())),
                        NodeDefinition::leaf("ref", LeafType::leafref("../list1/id")),
                        NodeDefinition::leaf_list(
                            "refs",
                            LeafType::Union {
                                members: vec![
                                    LeafType::leafref("../list1/id"),
                                    LeafType::leafref("../list2/id"),
                                    LeafType::integer(IntegerKind::Uint8),
                                ],
                            },
                        ),
                        NodeDefinition::leaf("target", LeafType::InstanceIdentifier { require_instance: true }),
                    ]),
                ),
            )
            .build()
            .unwrap();
        SchemaContext::new(Arc::new(registry))
    }

    fn entry(tree: &mut DataTree, parent: NodeId, list: &str, id: &str) {
        let entry = tree
            .insert_child(
                parent,
                DataNode::list_entry(q(list), p(&["validation", list]), vec![q("id")]),
                Placement::Last,
            )
            .unwrap();
        tree.insert_child(entry, DataNode::leaf(q("id"), p(&["validation", list, "id"]), id), Placement::Last)
            .unwrap();
    }

    fn value(tree: &mut DataTree, parent: NodeId, name: &str, value: &str) -> NodeId {
        let node = if name == "refs" {
            DataNode::leaf_list_entry(q(name), p(&["validation", name]), value)
        } else {
            DataNode::leaf(q(name), p(&["validation", name]), value)
        };
        tree.insert_child(parent, node, Placement::Last).unwrap()
    }

    #[test]
    fn test_missing_leafref_target() {
        let schema = schema();
        let engine = ExpressionEngine::new();
        let service = IntegrityService::default();
        let mut tree = DataTree::new();
        let validation = tree
            .insert_child(tree.root(), DataNode::container(q("validation"), p(&["validation"])), Placement::Last)
            .unwrap();
        entry(&mut tree, validation, "list1", "a");
        let good = value(&mut tree, validation, "ref", "a");
        assert_eq!(service.check_node(&tree, &schema, &engine, good).unwrap(), None);

        tree.set_value(good, "b", false).unwrap();
        let failure = service.check_node(&tree, &schema, &engine, good).unwrap().unwrap();
        assert_eq!(
            failure.kind,
            FailureKind::DependencyViolated {
                value: "b".to_string()
            }
        );
        assert_eq!(
            failure.path.map(|path| path.to_string()).as_deref(),
            Some("/validation:validation/validation:ref")
        );
    }

    #[test]
    fn test_union_accepts_any_alternative() {
        let schema = schema();
        let engine = ExpressionEngine::new();
        let service = IntegrityService::default();
        let mut tree = DataTree::new();
        let validation = tree
            .insert_child(tree.root(), DataNode::container(q("validation"), p(&["validation"])), Placement::Last)
            .unwrap();
        entry(&mut tree, validation, "list2", "x");
        let via_second = value(&mut tree, validation, "refs", "x");
        let via_integer = value(&mut tree, validation, "refs", "7");
        let dangling = value(&mut tree, validation, "refs", "y");

        assert!(service.check_node(&tree, &schema, &engine, via_second).unwrap().is_none());
        assert!(service.check_node(&tree, &schema, &engine, via_integer).unwrap().is_none());
        assert!(service.check_node(&tree, &schema, &engine, dangling).unwrap().is_some());
    }

    #[test]
    fn test_instance_identifier_target() {
        let schema = schema();
        let engine = ExpressionEngine::new();
        let service = IntegrityService::default();
        let mut tree = DataTree::new();
        let validation = tree
            .insert_child(tree.root(), DataNode::container(q("validation"), p(&["validation"])), Placement::Last)
            .unwrap();
        entry(&mut tree, validation, "list1", "a");
        let present = value(
            &mut tree,
            validation,
            "target",
            "/validation:validation/validation:list1[validation:id='a']",
        );
        assert!(service.check_node(&tree, &schema, &engine, present).unwrap().is_none());
        tree.set_value(present, "/validation:validation/validation:list1[validation:id='z']", false)
            .unwrap();
        assert!(service.check_node(&tree, &schema, &engine, present).unwrap().is_some());
    }

    #[test]
    fn test_disabled_service_records_nothing() {
        let schema = schema();
        let engine = ExpressionEngine::new();
        let service = IntegrityService::new(&IntegrityConfig { enabled: false });
        let mut tree = DataTree::new();
        let validation = tree
            .insert_child(tree.root(), DataNode::container(q("validation"), p(&["validation"])), Placement::Last)
            .unwrap();
        let dangling = value(&mut tree, validation, "ref", "missing");
        let mut context = ValidationContext::new(1, &yang_core::config::ValidationConfig::default());
        service.check(&tree, &schema, &engine, &[dangling], &mut context).unwrap();
        assert!(!context.has_failures());
    }
}
