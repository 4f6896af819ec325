//! Constraint validator
//!
//! Validation of one request runs four phases over the staged tree:
//!
//! 1. **when**: nodes whose `when` is false are removed when the client did
//!    not write them and reported otherwise; removal can falsify further
//!    `when`s, so the phase repeats until nothing changes.
//! 2. **structural**: mandatory leaves and choices, min/max-elements, unique
//!    groups and leaf types, parents before children.
//! 3. **must**: in declaration order, only on structurally valid nodes.
//! 4. **integrity**: leafref and instance-identifier targets.
//!
//! With `fail_fast` the first failure ends validation between checks.

use super::context::{ConstraintClass, NodeState, ValidationContext};
use super::failure::{FailureKind, ValidationFailure};
use super::reporter::ErrorReporter;
use super::types::TypeValidator;
use crate::edit::applier::EditApplier;
use crate::edit::change_set::{ChangeKind, ChangeSet};
use crate::edit::defaults::active_case;
use crate::error::{RpcErrors, ValidationError, ValidationResult};
use crate::expression::{DependencyIndex, EvaluationEnv, ExpressionEngine};
use crate::integrity::IntegrityService;
use crate::mount::{SchemaContext, SchemaKey};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, debug_span, trace, warn};
use yang_core::config::ValidatorConfig;
use yang_core::data::{DataNode, DataNodeKind, DataTree, NodeId, Placement};
use yang_core::error::Result;
use yang_core::registry::SchemaRegistry;
use yang_core::schema::{SchemaNode, SchemaNodeKind, UniqueConstraint};
use yang_core::types::{InstancePath, SchemaPath};

/// What a validation run covers
#[derive(Debug, Clone, Copy)]
enum Scope<'c> {
    /// Nodes affected by the recorded changes
    Changes(&'c ChangeSet),
    /// Every node below and including the given node
    Subtree(NodeId),
}

/// Validates staged data trees against the schema
#[derive(Debug)]
pub struct ConstraintValidator {
    schema: SchemaContext,
    expressions: Arc<ExpressionEngine>,
    dependencies: DependencyIndex,
    integrity: IntegrityService,
    reporter: ErrorReporter,
    config: ValidatorConfig,
    next_request: AtomicU64,
}

impl ConstraintValidator {
    /// Validator for `registry`
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `config` has invalid limits.
    pub fn new(registry: Arc<SchemaRegistry>, config: ValidatorConfig) -> Result<Self> {
        config.validate()?;
        let expressions = Arc::new(ExpressionEngine::from_config(&config.expression));
        let dependencies = DependencyIndex::build(&registry, &expressions);
        debug!(owners = dependencies.len(), "built expression dependency index");
        Ok(Self {
            schema: SchemaContext::new(registry),
            expressions,
            dependencies,
            integrity: IntegrityService::new(&config.integrity),
            reporter: ErrorReporter::new(&config.reporting),
            config,
            next_request: AtomicU64::new(1),
        })
    }

    /// Replace the expression engine, for custom XPath functions
    #[must_use]
    pub fn with_expressions(mut self, expressions: ExpressionEngine) -> Self {
        self.dependencies = DependencyIndex::build(self.schema.root_registry(), &expressions);
        self.expressions = Arc::new(expressions);
        self
    }

    /// Mount-aware schema lookups
    #[must_use]
    pub fn schema(&self) -> &SchemaContext {
        &self.schema
    }

    /// Expression engine
    #[must_use]
    pub fn expressions(&self) -> &ExpressionEngine {
        &self.expressions
    }

    /// Dependency index of the schema's expressions
    #[must_use]
    pub fn dependencies(&self) -> &DependencyIndex {
        &self.dependencies
    }

    /// Reporter turning failures into rpc-errors
    #[must_use]
    pub fn reporter(&self) -> &ErrorReporter {
        &self.reporter
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Applier staging edits against this validator's schema
    #[must_use]
    pub fn applier(&self) -> EditApplier<'_> {
        EditApplier::new(&self.schema, &self.expressions, &self.reporter)
    }

    /// Allocate a request id for logging
    pub fn next_request_id(&self) -> u64 {
        self.next_request.fetch_add(1, Ordering::Relaxed)
    }

    /// Turn a single failure into a rejection
    #[must_use]
    pub fn reject(&self, failure: &ValidationFailure) -> ValidationError {
        ValidationError::rejected(self.reporter.to_rpc_error(failure))
    }

    /// Validate the nodes affected by `changes`
    ///
    /// `tree` is the staged tree the changes were applied to. Nodes whose
    /// `when` turned false without the client writing them are removed.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Rejected`] for constraint violations and
    /// [`ValidationError::Internal`] for broken schema expressions.
    pub fn validate(&self, tree: &mut DataTree, changes: &ChangeSet) -> ValidationResult<()> {
        self.run(tree, Scope::Changes(changes))
    }

    /// Validate every node of `tree`
    ///
    /// # Errors
    ///
    /// Same as [`ConstraintValidator::validate`].
    pub fn validate_full(&self, tree: &mut DataTree) -> ValidationResult<()> {
        let root = tree.root();
        self.run(tree, Scope::Subtree(root))
    }

    /// Validate `root` and every node below it
    ///
    /// # Errors
    ///
    /// Same as [`ConstraintValidator::validate`].
    pub fn validate_subtree(&self, tree: &mut DataTree, root: NodeId) -> ValidationResult<()> {
        self.run(tree, Scope::Subtree(root))
    }

    fn run(&self, tree: &mut DataTree, scope: Scope<'_>) -> ValidationResult<()> {
        let request_id = self.next_request_id();
        let span = debug_span!("validate", request = request_id);
        let _guard = span.enter();
        let mut context = ValidationContext::new(request_id, &self.config.validation);

        let written = written_closure(tree, scope);
        let mut changed: HashSet<SchemaKey> = match scope {
            Scope::Changes(changes) => changes.schema_keys().into_iter().cloned().collect(),
            Scope::Subtree(_) => HashSet::new(),
        };
        let mut cleaned_parents = Vec::new();

        debug!("when phase");
        self.when_phase(tree, scope, &written, &mut changed, &mut cleaned_parents, &mut context)?;
        if context.should_stop() {
            return Err(self.rejection(context));
        }

        let candidates = self.candidates(tree, scope, &changed, &cleaned_parents);
        debug!(candidates = candidates.len(), "structural phase");
        for &node in &candidates {
            if context.should_stop() {
                break;
            }
            if !tree.is_alive(node) || context.state(node) == NodeState::Failed {
                continue;
            }
            self.check_structure(tree, node, &mut context)?;
            context.advance(node, NodeState::StructurallyValidated);
        }
        if context.should_stop() {
            return Err(self.rejection(context));
        }

        debug!("must phase");
        self.must_phase(tree, &candidates, &mut context)?;
        if context.should_stop() {
            return Err(self.rejection(context));
        }

        if self.integrity.is_enabled() {
            debug!("integrity phase");
            self.integrity
                .check(tree, &self.schema, &self.expressions, &candidates, &mut context)?;
        }
        if context.has_failures() {
            return Err(self.rejection(context));
        }
        for &node in &candidates {
            context.advance(node, NodeState::Valid);
        }
        trace!(
            cache_hits = context.cache_hits(),
            parse_cache = ?self.expressions.cache_stats(),
            "validation passed"
        );
        Ok(())
    }

    fn rejection(&self, context: ValidationContext) -> ValidationError {
        let errors: Vec<_> = context
            .into_failures()
            .iter()
            .map(|failure| self.reporter.to_rpc_error(failure))
            .collect();
        if let Some(first) = errors.first() {
            debug!(errors = errors.len(), first = %first, "validation rejected the request");
        }
        ValidationError::Rejected(RpcErrors::new(errors))
    }

    /// Nodes to validate, in document order
    fn candidates(
        &self,
        tree: &DataTree,
        scope: Scope<'_>,
        changed: &HashSet<SchemaKey>,
        cleaned_parents: &[NodeId],
    ) -> Vec<NodeId> {
        let changes = match scope {
            Scope::Subtree(root) => return tree.descendants(root),
            Scope::Changes(_) if !self.config.validation.incremental => return tree.descendants(tree.root()),
            Scope::Changes(changes) => changes,
        };

        let mut selected: HashSet<NodeId> = HashSet::new();
        let select_with_ancestors = |node: NodeId, selected: &mut HashSet<NodeId>| {
            selected.insert(node);
            selected.extend(tree.ancestors(node));
        };
        for change in changes {
            match change.kind {
                ChangeKind::Created | ChangeKind::Modified if tree.is_alive(change.node) => {
                    select_with_ancestors(change.node, &mut selected);
                    selected.extend(tree.descendants(change.node));
                }
                ChangeKind::Deleted => {
                    if let Some(parent) = change.parent.filter(|parent| tree.is_alive(*parent)) {
                        select_with_ancestors(parent, &mut selected);
                    }
                }
                _ => {}
            }
        }
        for parent in cleaned_parents.iter().filter(|parent| tree.is_alive(**parent)) {
            select_with_ancestors(*parent, &mut selected);
        }

        let affected: HashSet<&SchemaKey> = changed
            .iter()
            .flat_map(|key| self.dependencies.owners_affected_by(key))
            .collect();
        let all = tree.descendants(tree.root());
        if !affected.is_empty() {
            let owner_paths = self.dependencies.owner_paths();
            for &node in &all {
                let Some(data) = tree.get(node) else {
                    continue;
                };
                if owner_paths.contains(&data.schema_path) && affected.contains(&self.schema.schema_key(tree, node)) {
                    selected.insert(node);
                }
            }
        }
        all.into_iter().filter(|node| selected.contains(node)).collect()
    }

    fn when_phase(
        &self,
        tree: &mut DataTree,
        scope: Scope<'_>,
        written: &HashSet<NodeId>,
        changed: &mut HashSet<SchemaKey>,
        cleaned_parents: &mut Vec<NodeId>,
        context: &mut ValidationContext,
    ) -> ValidationResult<()> {
        let passes = self.config.validation.max_when_cleanup_passes.max(1);
        let mut reported: HashSet<NodeId> = HashSet::new();
        for pass in 0..passes {
            let mut removed_any = false;
            for node in self.candidates(tree, scope, changed, cleaned_parents) {
                if !tree.is_alive(node) || reported.contains(&node) {
                    continue;
                }
                let Some(expression) = self.first_false_when(tree, node, Some(&mut *context))? else {
                    continue;
                };
                let path = self.schema.instance_path(tree, node);
                let is_default = tree.get(node).is_some_and(|data| data.is_default);
                if written.contains(&node) && !is_default {
                    reported.insert(node);
                    context.fail(
                        Some(node),
                        ValidationFailure::at(FailureKind::WhenViolation { expression }, path),
                    );
                    if context.should_stop() {
                        return Ok(());
                    }
                } else {
                    debug!(path = %path, expression = %expression, "removing data whose when is false");
                    changed.insert(self.schema.schema_key(tree, node));
                    if let Some(parent) = tree.parent(node) {
                        cleaned_parents.push(parent);
                    }
                    tree.remove_subtree(node)?;
                    context.invalidate();
                    removed_any = true;
                }
            }
            if !removed_any {
                return Ok(());
            }
            trace!(pass, "when cleanup removed data, re-evaluating");
        }
        warn!(passes, "when cleanup did not settle");
        Ok(())
    }

    /// Text of the first false `when` governing `node`
    ///
    /// Covers the node's own `when`s and those of enclosing choices and
    /// cases, outermost first. Choice and case conditions, and `when`s
    /// inherited from an augment or uses, are evaluated on the data parent.
    fn first_false_when(
        &self,
        tree: &DataTree,
        node: NodeId,
        mut context: Option<&mut ValidationContext>,
    ) -> ValidationResult<Option<String>> {
        let Some(data) = tree.get(node).filter(|data| data.kind != DataNodeKind::Root) else {
            return Ok(None);
        };
        let registry = self.schema.registry_for(tree, node);
        let Some(schema_node) = registry.get_data_schema_node(&data.schema_path) else {
            return Ok(None);
        };
        let choices = registry.enclosing_choices(&schema_node.path);
        if schema_node.when.is_empty() && choices.iter().all(|(choice, case)| choice.when.is_empty() && case.when.is_empty())
        {
            return Ok(None);
        }

        let key = self.schema.schema_key(tree, node);
        let instance = self.schema.instance_path(tree, node).to_string();
        if let Some(context) = context.as_deref_mut()
            && context.cached(&key, &instance, ConstraintClass::When) == Some(true)
        {
            return Ok(None);
        }

        let parent = tree.parent(node).unwrap_or(node);
        for (choice, case) in choices.iter().rev() {
            for when in choice.when.iter().chain(&case.when) {
                if !self.evaluate(tree, node, parent, &when.expression)? {
                    return Ok(Some(when.expression.clone()));
                }
            }
        }
        for when in &schema_node.when {
            let at = if when.on_parent { parent } else { node };
            if !self.evaluate(tree, node, at, &when.expression)? {
                return Ok(Some(when.expression.clone()));
            }
        }
        if let Some(context) = context {
            context.remember(key, instance, ConstraintClass::When, true);
        }
        Ok(None)
    }

    /// Evaluate an expression declared on `owner` with `at` as context and
    /// `current()` node
    fn evaluate(&self, tree: &DataTree, owner: NodeId, at: NodeId, expression: &str) -> ValidationResult<bool> {
        let env = EvaluationEnv {
            context: at,
            current: at,
            ..EvaluationEnv::for_node(tree, &self.schema, owner)
        };
        trace!(expression, "evaluating");
        self.expressions
            .evaluate_boolean(expression, &env)
            .map_err(|err| ValidationError::Internal(err.into_yang_error(expression)))
    }

    fn check_structure(&self, tree: &mut DataTree, node: NodeId, context: &mut ValidationContext) -> ValidationResult<()> {
        let Some(data) = tree.get(node) else {
            return Ok(());
        };
        match data.kind {
            DataNodeKind::Leaf | DataNodeKind::LeafListEntry => {
                self.check_value(tree, node, context);
                Ok(())
            }
            DataNodeKind::Anydata => Ok(()),
            DataNodeKind::Root | DataNodeKind::Container | DataNodeKind::ListEntry { .. } => {
                let schema_parent = if data.mount_point {
                    SchemaPath::root()
                } else {
                    data.schema_path.clone()
                };
                let registry = self.schema.child_registry(tree, node);
                self.check_children(tree, node, registry, &schema_parent, context)
            }
        }
    }

    fn check_value(&self, tree: &DataTree, node: NodeId, context: &mut ValidationContext) {
        let Some(schema_node) = self.schema.schema_node(tree, node) else {
            return;
        };
        let value = tree.value(node).unwrap_or_default();
        let types = TypeValidator::new(self.schema.registry_for(tree, node), &self.expressions);
        if let Err(violation) = types.canonicalize(schema_node, value) {
            context.fail(
                Some(node),
                ValidationFailure::at(
                    FailureKind::InvalidValue {
                        message: violation.message,
                        app_tag: violation.app_tag,
                    },
                    self.schema.instance_path(tree, node),
                ),
            );
        }
    }

    /// Structural checks of the schema children of `schema_parent` under
    /// the data node `parent`
    fn check_children(
        &self,
        tree: &mut DataTree,
        parent: NodeId,
        registry: &SchemaRegistry,
        schema_parent: &SchemaPath,
        context: &mut ValidationContext,
    ) -> ValidationResult<()> {
        for child in registry.children(schema_parent) {
            if context.should_stop() {
                return Ok(());
            }
            match &child.kind {
                SchemaNodeKind::Leaf { mandatory: true, .. } => {
                    if tree.get_child(parent, &child.qname).is_none()
                        && self.exists_conditionally(tree, parent, child)?
                    {
                        context.fail(
                            Some(parent),
                            ValidationFailure::at(
                                FailureKind::MissingMandatoryLeaf {
                                    name: child.name().to_string(),
                                },
                                self.child_path(tree, parent, registry, child),
                            ),
                        );
                    }
                }
                SchemaNodeKind::Container {
                    presence: false,
                    mount_point: None,
                } => {
                    if tree.get_child(parent, &child.qname).is_none() && has_mandatory_descendants(registry, &child.path) {
                        self.check_absent_container(tree, parent, registry, child, context)?;
                    }
                }
                SchemaNodeKind::List { unique, .. } => {
                    let instances = tree.get_children_named(parent, &child.qname);
                    self.check_cardinality(tree, parent, registry, child, &instances, context)?;
                    self.check_duplicate_keys(tree, child, &instances, context);
                    for group in unique {
                        self.check_unique(tree, parent, registry, child, group, &instances, context);
                    }
                }
                SchemaNodeKind::LeafList { .. } => {
                    let instances = tree.get_children_named(parent, &child.qname);
                    self.check_cardinality(tree, parent, registry, child, &instances, context)?;
                }
                SchemaNodeKind::Choice { mandatory, .. } => match active_case(tree, parent, registry, child) {
                    Some(case) => {
                        let case_path = case.path.clone();
                        self.check_children(tree, parent, registry, &case_path, context)?;
                    }
                    None if *mandatory => {
                        let mut applies = true;
                        for when in &child.when {
                            if !self.evaluate(tree, parent, parent, &when.expression)? {
                                applies = false;
                                break;
                            }
                        }
                        if applies {
                            context.fail(
                                Some(parent),
                                ValidationFailure::at(
                                    FailureKind::MissingChoice {
                                        name: child.name().to_string(),
                                    },
                                    self.schema.instance_path(tree, parent),
                                ),
                            );
                        }
                    }
                    None => {}
                },
                _ => {}
            }
        }
        Ok(())
    }

    /// Descend into an absent non-presence container with a temporary
    /// instance so mandatory descendants and their `when`s can be checked
    fn check_absent_container(
        &self,
        tree: &mut DataTree,
        parent: NodeId,
        registry: &SchemaRegistry,
        container: &SchemaNode,
        context: &mut ValidationContext,
    ) -> ValidationResult<()> {
        let temporary = tree.insert_child(
            parent,
            DataNode::container(container.qname.clone(), container.path.clone()),
            Placement::Last,
        )?;
        let result = match self.first_false_when(tree, temporary, None) {
            Ok(None) => self.check_children(tree, temporary, registry, &container.path, context),
            Ok(Some(_)) => Ok(()),
            Err(err) => Err(err),
        };
        tree.remove_subtree(temporary)?;
        result
    }

    /// Whether `child` would be allowed under `parent` by its `when`s
    fn exists_conditionally(&self, tree: &mut DataTree, parent: NodeId, child: &SchemaNode) -> ValidationResult<bool> {
        let registry = self.schema.child_registry(tree, parent);
        let conditional = !child.when.is_empty()
            || registry
                .enclosing_choices(&child.path)
                .iter()
                .any(|(choice, case)| !choice.when.is_empty() || !case.when.is_empty());
        if !conditional {
            return Ok(true);
        }
        let qname = child.qname.clone();
        let path = child.path.clone();
        let temporary = match &child.kind {
            SchemaNodeKind::Leaf { default, .. } => DataNode::leaf(qname, path, default.clone().unwrap_or_default()),
            SchemaNodeKind::LeafList { .. } => DataNode::leaf_list_entry(qname, path, ""),
            SchemaNodeKind::List { keys, .. } => DataNode::list_entry(qname, path, keys.clone()),
            SchemaNodeKind::Container { .. } => DataNode::container(qname, path),
            _ => return Ok(true),
        };
        let temporary = tree.insert_child(parent, temporary, Placement::Last)?;
        let result = self.first_false_when(tree, temporary, None);
        tree.remove_subtree(temporary)?;
        Ok(result?.is_none())
    }

    fn check_cardinality(
        &self,
        tree: &mut DataTree,
        parent: NodeId,
        registry: &SchemaRegistry,
        child: &SchemaNode,
        instances: &[NodeId],
        context: &mut ValidationContext,
    ) -> ValidationResult<()> {
        let Some((min, max)) = child.cardinality() else {
            return Ok(());
        };
        let count = instances.len();
        if count < min as usize {
            if count == 0 && !self.exists_conditionally(tree, parent, child)? {
                return Ok(());
            }
            context.fail(
                Some(parent),
                ValidationFailure::at(
                    FailureKind::TooFewElements {
                        name: child.name().to_string(),
                        min,
                    },
                    self.child_path(tree, parent, registry, child),
                ),
            );
        } else if let Some(max) = max
            && count > max as usize
        {
            context.fail(
                Some(parent),
                ValidationFailure::at(
                    FailureKind::TooManyElements {
                        name: child.name().to_string(),
                        max,
                    },
                    self.child_path(tree, parent, registry, child),
                ),
            );
        }
        Ok(())
    }

    fn check_duplicate_keys(
        &self,
        tree: &DataTree,
        list: &SchemaNode,
        instances: &[NodeId],
        context: &mut ValidationContext,
    ) {
        let mut seen = HashSet::with_capacity(instances.len());
        for &entry in instances {
            if !seen.insert(tree.key_values(entry)) {
                context.fail(
                    Some(entry),
                    ValidationFailure::at(
                        FailureKind::DuplicateElements {
                            name: list.name().to_string(),
                        },
                        self.schema.instance_path(tree, entry),
                    ),
                );
                return;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn check_unique(
        &self,
        tree: &DataTree,
        parent: NodeId,
        registry: &SchemaRegistry,
        list: &SchemaNode,
        group: &UniqueConstraint,
        instances: &[NodeId],
        context: &mut ValidationContext,
    ) {
        let mut seen: HashMap<Vec<String>, NodeId> = HashMap::with_capacity(instances.len());
        for &entry in instances {
            let values: Option<Vec<String>> = group
                .leaves
                .iter()
                .map(|leaf| descendant_value(tree, entry, leaf))
                .collect();
            // entries missing one of the leaves take no part
            let Some(values) = values else {
                continue;
            };
            if seen.contains_key(&values) {
                let values: IndexMap<String, String> = group.leaves.iter().cloned().zip(values).collect();
                context.fail(
                    Some(entry),
                    ValidationFailure::at(
                        FailureKind::NotUnique {
                            name: list.name().to_string(),
                            values,
                        },
                        self.child_path(tree, parent, registry, list),
                    ),
                );
                return;
            }
            seen.insert(values, entry);
        }
    }

    fn must_phase(&self, tree: &DataTree, candidates: &[NodeId], context: &mut ValidationContext) -> ValidationResult<()> {
        for &node in candidates {
            if context.should_stop() {
                break;
            }
            if !tree.is_alive(node) || context.state(node) == NodeState::Failed {
                continue;
            }
            let Some(schema_node) = self.schema.schema_node(tree, node).filter(|n| !n.must.is_empty()) else {
                context.advance(node, NodeState::ExpressionValidated);
                continue;
            };
            let key = self.schema.schema_key(tree, node);
            let path = self.schema.instance_path(tree, node);
            let instance = path.to_string();
            if context.cached(&key, &instance, ConstraintClass::Must) == Some(true) {
                context.advance(node, NodeState::ExpressionValidated);
                continue;
            }
            let mut passed = true;
            for must in &schema_node.must {
                trace!(expression = %must.expression, path = %instance, "evaluating must");
                if !self.evaluate(tree, node, node, &must.expression)? {
                    context.fail(
                        Some(node),
                        ValidationFailure::at(
                            FailureKind::MustViolation {
                                expression: must.expression.clone(),
                                error_message: must.error_message.clone(),
                                error_app_tag: must.error_app_tag.clone(),
                            },
                            path.clone(),
                        ),
                    );
                    passed = false;
                    break;
                }
            }
            if passed {
                context.remember(key, instance, ConstraintClass::Must, true);
                context.advance(node, NodeState::ExpressionValidated);
            }
        }
        Ok(())
    }

    /// Instance path of a possibly absent child of `parent`
    fn child_path(&self, tree: &DataTree, parent: NodeId, registry: &SchemaRegistry, child: &SchemaNode) -> InstancePath {
        let namespace = &child.qname.namespace;
        let prefix = registry
            .prefix_for(namespace)
            .map_or_else(|| self.schema.prefix_for(tree, parent, namespace), str::to_string);
        self.schema
            .instance_path(tree, parent)
            .child(&prefix, namespace, child.name())
    }
}

/// Nodes the client wrote plus their descendants and ancestors
fn written_closure(tree: &DataTree, scope: Scope<'_>) -> HashSet<NodeId> {
    let mut closure = HashSet::new();
    match scope {
        Scope::Subtree(root) => closure.extend(tree.descendants(root)),
        Scope::Changes(changes) => {
            for node in changes.written_nodes() {
                if tree.is_alive(node) {
                    closure.extend(tree.descendants(node));
                    closure.extend(tree.ancestors(node));
                }
            }
        }
    }
    closure.remove(&tree.root());
    closure
}

/// Whether an absent non-presence container at `path` could hide a
/// mandatory leaf, a mandatory choice or a min-elements constraint
fn has_mandatory_descendants(registry: &SchemaRegistry, path: &SchemaPath) -> bool {
    registry.children(path).into_iter().any(|child| match &child.kind {
        SchemaNodeKind::Leaf { mandatory, .. } => *mandatory,
        SchemaNodeKind::Choice { mandatory, .. } => *mandatory,
        SchemaNodeKind::List { min_elements, .. } | SchemaNodeKind::LeafList { min_elements, .. } => {
            *min_elements > 0
        }
        SchemaNodeKind::Container {
            presence: false,
            mount_point: None,
        } => has_mandatory_descendants(registry, &child.path),
        _ => false,
    })
}

/// Value of the leaf at a `/` separated relative path of local names
fn descendant_value(tree: &DataTree, from: NodeId, relative: &str) -> Option<String> {
    let mut current = from;
    for step in relative.split('/').filter(|step| !step.is_empty()) {
        let local = step.split_once(':').map_or(step, |(_, local)| local);
        current = tree
            .get_children(current)
            .iter()
            .copied()
            .find(|child| tree.get(*child).is_some_and(|node| node.qname.local() == local))?;
    }
    tree.value(current).map(str::to_string)
}
