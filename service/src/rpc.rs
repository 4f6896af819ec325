//! RPC and action payload validation
//!
//! An RPC input or output is staged in a tree of its own whose root stands
//! for the `input`/`output` node, so absolute paths in its expressions
//! resolve from there. Action input is grafted below the action's target in
//! a staged copy of the datastore; relative paths can then reach the
//! surrounding configuration.

use crate::edit::defaults::materialize_under;
use crate::error::ValidationResult;
use crate::validator::ConstraintValidator;
use crate::validator::failure::{FailureKind, ValidationFailure};
use std::sync::Arc;
use tracing::{debug, debug_span};
use yang_core::data::{DataNode, DataTree, NodeId, Placement};
use yang_core::edit::{EditContainmentNode, EditOperation};
use yang_core::types::QName;

/// One step from the datastore root to an action's target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStep {
    /// Container or list name
    pub qname: QName,
    /// Key values for a list entry, empty for a container
    pub keys: Vec<(QName, String)>,
}

impl TargetStep {
    /// Step into a container
    #[must_use]
    pub fn container(qname: QName) -> Self {
        Self { qname, keys: Vec::new() }
    }

    /// Step into a list entry
    #[must_use]
    pub fn entry(qname: QName, keys: Vec<(QName, String)>) -> Self {
        Self { qname, keys }
    }
}

/// Validates RPC and action payloads with the datastore validator
#[derive(Debug, Clone)]
pub struct RpcValidator {
    validator: Arc<ConstraintValidator>,
}

impl RpcValidator {
    /// Validator sharing the schema and expression engine of `validator`
    #[must_use]
    pub fn new(validator: Arc<ConstraintValidator>) -> Self {
        Self { validator }
    }

    /// Validate the input of `rpc`, returning the staged input tree
    ///
    /// # Errors
    ///
    /// Rejects unknown RPCs with a protocol `bad-element` error, and invalid
    /// input like an edit.
    pub fn validate_rpc(&self, rpc: &QName, input: &EditContainmentNode) -> ValidationResult<DataTree> {
        self.validate_payload(rpc, "input", input)
    }

    /// Validate the output of `rpc`, returning the staged output tree
    ///
    /// # Errors
    ///
    /// Same as [`RpcValidator::validate_rpc`].
    pub fn validate_rpc_output(&self, rpc: &QName, output: &EditContainmentNode) -> ValidationResult<DataTree> {
        self.validate_payload(rpc, "output", output)
    }

    fn validate_payload(&self, rpc: &QName, direction: &str, payload: &EditContainmentNode) -> ValidationResult<DataTree> {
        let span = debug_span!("rpc", rpc = rpc.local(), direction);
        let _guard = span.enter();
        let registry = self.validator.schema().root_registry();
        let Some(rpc_node) = registry.rpc(rpc) else {
            debug!("unknown rpc");
            return Err(self.validator.reject(&ValidationFailure::unlocated(FailureKind::UnknownRpc)));
        };
        let name = rpc.sibling(direction);
        let mut tree = DataTree::with_root(name.clone(), rpc_node.path.child(name));
        let root = tree.root();
        self.stage(&mut tree, root, payload)?;
        Ok(tree)
    }

    /// Validate the input of `action` invoked on the node reached by
    /// `target` in `datastore`
    ///
    /// The datastore is not modified.
    ///
    /// # Errors
    ///
    /// Rejects a missing target or an action the target's schema does not
    /// declare with a protocol `bad-element` error carrying no path, and
    /// invalid input like an edit.
    pub fn validate_action(
        &self,
        datastore: &DataTree,
        target: &[TargetStep],
        action: &QName,
        input: &EditContainmentNode,
    ) -> ValidationResult<()> {
        let span = debug_span!("action", action = action.local());
        let _guard = span.enter();
        let unknown = || self.validator.reject(&ValidationFailure::unlocated(FailureKind::UnknownAction));

        let mut staged = datastore.deep_clone();
        let Some(node) = locate(&staged, target) else {
            debug!("action target does not exist");
            return Err(unknown());
        };
        let Some(action_node) = staged
            .get(node)
            .and_then(|data| self.validator.schema().registry_for(&staged, node).action(&data.schema_path, action))
        else {
            debug!("no such action on the target");
            return Err(unknown());
        };
        let name = action.sibling("input");
        let input_path = action_node.path.child(name.clone());
        let input_root = staged.insert_child(node, DataNode::container(name, input_path), Placement::Last)?;
        self.stage(&mut staged, input_root, input)
    }

    fn stage(&self, tree: &mut DataTree, top: NodeId, payload: &EditContainmentNode) -> ValidationResult<()> {
        let mut changes = self
            .validator
            .applier()
            .apply_at(tree, top, payload, EditOperation::Merge)?;
        if self.validator.config().defaults.materialize_on_write {
            materialize_under(self.validator.schema(), tree, top, &mut changes)?;
        }
        self.validator.validate_subtree(tree, top)
    }
}

/// Node reached by walking `steps` from the root
fn locate(tree: &DataTree, steps: &[TargetStep]) -> Option<NodeId> {
    steps.iter().try_fold(tree.root(), |node, step| {
        if step.keys.is_empty() {
            tree.get_child(node, &step.qname)
        } else {
            tree.find_list_entry(node, &step.qname, &step.keys)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use yang_core::config::ValidatorConfig;
    use yang_core::definition::{ModuleDefinition, NodeDefinition};
    use yang_core::registry::SchemaRegistry;
    use yang_core::rpc_error::{ErrorTag, ErrorType};
    use yang_core::schema::{IntegerKind, LeafType};
    use yang_core::types::SchemaPath;

    const NS: &str = "urn:org:bbf:pma:validation";

    fn q(name: &str) -> QName {
        QName::new(NS, name)
    }

    fn rpc_validator() -> RpcValidator {
        let registry = SchemaRegistry::builder()
            .module(
                ModuleDefinition::new("validation", NS, "validation")
                    .with_node(
                        NodeDefinition::rpc("reset").with_child(
                            NodeDefinition::input().with_children([
                                NodeDefinition::leaf("delay", LeafType::integer(IntegerKind::Uint8)).mandatory(),
                                NodeDefinition::leaf("mode", LeafType::enumeration(&["soft", "hard"]))
                                    .default_value("soft"),
                                NodeDefinition::leaf("reason", LeafType::string())
                                    .with_when("/validation:mode = 'hard'"),
                            ]),
                        ),
                    )
                    .with_node(
                        NodeDefinition::container("validation").with_child(
                            NodeDefinition::list("device", &["name"]).with_children([
                                NodeDefinition::leaf("name", LeafType::string()),
                                NodeDefinition::leaf("limit", LeafType::integer(IntegerKind::Uint8)),
                                NodeDefinition::action("reboot").with_child(
                                    NodeDefinition::input().with_child(
                                        NodeDefinition::leaf("after", LeafType::integer(IntegerKind::Uint8))
                                            .with_must("current() <= ../../limit"),
                                    ),
                                ),
                            ]),
                        ),
                    ),
            )
            .build()
            .unwrap();
        let validator = ConstraintValidator::new(Arc::new(registry), ValidatorConfig::default()).unwrap();
        RpcValidator::new(Arc::new(validator))
    }

    fn datastore() -> DataTree {
        let mut tree = DataTree::new();
        let validation_path = SchemaPath::root().child(q("validation"));
        let device_path = validation_path.child(q("device"));
        let validation = tree
            .insert_child(tree.root(), DataNode::container(q("validation"), validation_path), Placement::Last)
            .unwrap();
        let device = tree
            .insert_child(
                validation,
                DataNode::list_entry(q("device"), device_path.clone(), vec![q("name")]),
                Placement::Last,
            )
            .unwrap();
        tree.insert_child(device, DataNode::leaf(q("name"), device_path.child(q("name")), "edge"), Placement::Last)
            .unwrap();
        tree.insert_child(device, DataNode::leaf(q("limit"), device_path.child(q("limit")), "10"), Placement::Last)
            .unwrap();
        tree
    }

    fn edge() -> Vec<TargetStep> {
        vec![
            TargetStep::container(q("validation")),
            TargetStep::entry(q("device"), vec![(q("name"), "edge".to_string())]),
        ]
    }

    #[test]
    fn test_rpc_input_gets_defaults_and_mandatory_checks() {
        let validator = rpc_validator();
        let tree = validator
            .validate_rpc(&q("reset"), &EditContainmentNode::root().with_leaf(q("delay"), "5"))
            .unwrap();
        let mode = tree.get_child(tree.root(), &q("mode")).unwrap();
        assert_eq!(tree.value(mode), Some("soft"));

        let err = validator
            .validate_rpc(&q("reset"), &EditContainmentNode::root().with_leaf(q("mode"), "hard"))
            .unwrap_err();
        let error = err.first_rpc_error().unwrap();
        assert_eq!(error.tag, ErrorTag::DataMissing);
        assert_eq!(error.message, "Missing mandatory node - delay");
    }

    #[test]
    fn test_rpc_when_resolves_from_input_root() {
        let validator = rpc_validator();
        let err = validator
            .validate_rpc(
                &q("reset"),
                &EditContainmentNode::root()
                    .with_leaf(q("delay"), "1")
                    .with_leaf(q("reason"), "maintenance"),
            )
            .unwrap_err();
        assert_eq!(err.first_rpc_error().unwrap().app_tag.as_deref(), Some("when-violation"));

        validator
            .validate_rpc(
                &q("reset"),
                &EditContainmentNode::root()
                    .with_leaf(q("delay"), "1")
                    .with_leaf(q("mode"), "hard")
                    .with_leaf(q("reason"), "maintenance"),
            )
            .unwrap();
    }

    #[test]
    fn test_unknown_rpc() {
        let err = rpc_validator()
            .validate_rpc(&q("explode"), &EditContainmentNode::root())
            .unwrap_err();
        let error = err.first_rpc_error().unwrap();
        assert_eq!(error.error_type, ErrorType::Protocol);
        assert_eq!(error.tag, ErrorTag::BadElement);
        assert_eq!(error.message, "No matched rpc found on the models");
    }

    #[test]
    fn test_action_input_sees_target() {
        let validator = rpc_validator();
        let store = datastore();
        validator
            .validate_action(&store, &edge(), &q("reboot"), &EditContainmentNode::root().with_leaf(q("after"), "3"))
            .unwrap();
        let err = validator
            .validate_action(&store, &edge(), &q("reboot"), &EditContainmentNode::root().with_leaf(q("after"), "30"))
            .unwrap_err();
        assert_eq!(err.first_rpc_error().unwrap().app_tag.as_deref(), Some("must-violation"));
        assert_eq!(store, datastore());
    }

    #[test]
    fn test_action_on_missing_node() {
        let validator = rpc_validator();
        let missing = vec![
            TargetStep::container(q("validation")),
            TargetStep::entry(q("device"), vec![(q("name"), "core".to_string())]),
        ];
        for (target, action) in [(missing, "reboot"), (edge(), "shutdown")] {
            let err = validator
                .validate_action(&datastore(), &target, &q(action), &EditContainmentNode::root())
                .unwrap_err();
            let error = err.first_rpc_error().unwrap();
            assert_eq!(error.error_type, ErrorType::Protocol);
            assert_eq!(error.tag, ErrorTag::BadElement);
            assert_eq!(error.message, "No matched action found on the models");
            assert_eq!(error.path, None);
        }
    }
}
