//! Request scoped validation state
//!
//! A [`ValidationContext`] lives for exactly one request. Nothing in it is
//! shared between requests, so concurrent validations never observe each
//! other's cache entries or failures.

use super::failure::ValidationFailure;
use crate::mount::SchemaKey;
use std::collections::HashMap;
use tracing::trace;
use yang_core::config::ValidationConfig;
use yang_core::data::NodeId;

/// Progress of one data node through the validation phases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Not looked at yet
    #[default]
    Unvisited,
    /// Cardinality, mandatory, unique and type checks passed
    StructurallyValidated,
    /// must expressions passed
    ExpressionValidated,
    /// Referential integrity passed
    Valid,
    /// Some check failed
    Failed,
}

/// Which constraints a cached outcome covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintClass {
    /// when statements, including those of enclosing choices and cases
    When,
    /// must statements
    Must,
}

/// Key of the validated child cache: schema identity plus instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    schema: SchemaKey,
    instance: String,
    class: ConstraintClass,
}

/// Per-request state passed through every phase
#[derive(Debug)]
pub struct ValidationContext {
    request_id: u64,
    states: HashMap<NodeId, NodeState>,
    validated: HashMap<CacheKey, bool>,
    cache_enabled: bool,
    failures: Vec<ValidationFailure>,
    fail_fast: bool,
    max_errors: usize,
    cache_hits: u64,
}

impl ValidationContext {
    /// Fresh context for request `request_id`
    #[must_use]
    pub fn new(request_id: u64, config: &ValidationConfig) -> Self {
        Self {
            request_id,
            states: HashMap::new(),
            validated: HashMap::new(),
            cache_enabled: config.validated_child_cache,
            failures: Vec::new(),
            fail_fast: config.fail_fast,
            max_errors: config.max_errors.max(1),
            cache_hits: 0,
        }
    }

    /// Request id, for logging
    #[must_use]
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Current state of `node`
    #[must_use]
    pub fn state(&self, node: NodeId) -> NodeState {
        self.states.get(&node).copied().unwrap_or_default()
    }

    /// Move `node` to `state`; a failed node stays failed
    pub fn advance(&mut self, node: NodeId, state: NodeState) {
        let entry = self.states.entry(node).or_default();
        if *entry != NodeState::Failed {
            *entry = state;
        }
    }

    /// Cached outcome for a node's constraints
    pub fn cached(&mut self, schema: &SchemaKey, instance: &str, class: ConstraintClass) -> Option<bool> {
        if !self.cache_enabled {
            return None;
        }
        let key = CacheKey {
            schema: schema.clone(),
            instance: instance.to_string(),
            class,
        };
        let outcome = self.validated.get(&key).copied();
        if outcome.is_some() {
            self.cache_hits += 1;
        }
        outcome
    }

    /// Remember the outcome for a node's constraints
    pub fn remember(&mut self, schema: SchemaKey, instance: String, class: ConstraintClass, outcome: bool) {
        if self.cache_enabled {
            self.validated.insert(
                CacheKey {
                    schema,
                    instance,
                    class,
                },
                outcome,
            );
        }
    }

    /// Drop cached outcomes after the tree was mutated
    pub fn invalidate(&mut self) {
        if !self.validated.is_empty() {
            trace!(request = self.request_id, entries = self.validated.len(), "invalidating validated child cache");
        }
        self.validated.clear();
    }

    /// Number of cache hits so far
    #[must_use]
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    /// Record a failure; `node` is marked failed when given
    pub fn fail(&mut self, node: Option<NodeId>, failure: ValidationFailure) {
        if let Some(node) = node {
            self.states.insert(node, NodeState::Failed);
        }
        if self.failures.len() < self.max_errors {
            self.failures.push(failure);
        }
    }

    /// Whether no further checks should run
    #[must_use]
    pub fn should_stop(&self) -> bool {
        (self.fail_fast && !self.failures.is_empty()) || self.failures.len() >= self.max_errors
    }

    /// Whether any failure was recorded
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Failures in the order they were found
    #[must_use]
    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    /// Take the failures
    #[must_use]
    pub fn into_failures(self) -> Vec<ValidationFailure> {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::failure::FailureKind;
    use yang_core::types::SchemaPath;

    fn failure() -> ValidationFailure {
        ValidationFailure::unlocated(FailureKind::DataExists)
    }

    #[test]
    fn test_fail_fast_stops_after_first_failure() {
        let mut context = ValidationContext::new(1, &ValidationConfig::default());
        assert!(!context.should_stop());
        context.fail(None, failure());
        assert!(context.should_stop());
    }

    #[test]
    fn test_aggregation_is_capped() {
        let config = ValidationConfig {
            fail_fast: false,
            max_errors: 2,
            ..ValidationConfig::default()
        };
        let mut context = ValidationContext::new(1, &config);
        context.fail(None, failure());
        assert!(!context.should_stop());
        context.fail(None, failure());
        context.fail(None, failure());
        assert!(context.should_stop());
        assert_eq!(context.failures().len(), 2);
    }

    #[test]
    fn test_cache_is_cleared_on_invalidate() {
        let mut context = ValidationContext::new(7, &ValidationConfig::default());
        let key = SchemaKey::top_level(SchemaPath::root());
        context.remember(key.clone(), "/a".to_string(), ConstraintClass::Must, true);
        assert_eq!(context.cached(&key, "/a", ConstraintClass::Must), Some(true));
        assert_eq!(context.cached(&key, "/a", ConstraintClass::When), None);
        context.invalidate();
        assert_eq!(context.cached(&key, "/a", ConstraintClass::Must), None);
        assert_eq!(context.cache_hits(), 1);
    }

    #[test]
    fn test_failed_nodes_stay_failed() {
        let mut context = ValidationContext::new(1, &ValidationConfig::default());
        let node = yang_core::data::DataTree::new().root();
        context.fail(Some(node), failure());
        context.advance(node, NodeState::Valid);
        assert_eq!(context.state(node), NodeState::Failed);
    }
}
