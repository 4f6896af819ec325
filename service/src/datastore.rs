//! Datastore service
//!
//! Makes an edit-config atomic: the committed tree is copied, the edit is
//! applied and validated on the copy, and only a fully valid copy replaces
//! the committed tree. A failed request leaves the datastore untouched.

use crate::edit::change_set::ChangeSet;
use crate::edit::defaults::{WithDefaults, materialize};
use crate::error::ValidationResult;
use crate::json;
use crate::rpc::RpcValidator;
use crate::validator::ConstraintValidator;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, debug_span, info};
use yang_core::data::DataTree;
use yang_core::edit::{EditConfigRequest, TestOption};
use yang_core::error::Result;
use yang_core::traits::DataStoreManager;

/// Datastore kept in memory
#[derive(Debug, Default)]
pub struct InMemoryDataStore {
    tree: RwLock<DataTree>,
}

impl InMemoryDataStore {
    /// Empty datastore
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Datastore holding `tree`
    #[must_use]
    pub fn with_tree(tree: DataTree) -> Self {
        Self {
            tree: RwLock::new(tree),
        }
    }
}

impl DataStoreManager for InMemoryDataStore {
    fn load(&self) -> Result<DataTree> {
        Ok(self.tree.read().deep_clone())
    }

    fn commit(&self, tree: DataTree) -> Result<()> {
        *self.tree.write() = tree;
        Ok(())
    }
}

/// Validating front of a datastore
pub struct DatastoreService {
    store: Arc<dyn DataStoreManager>,
    validator: Arc<ConstraintValidator>,
    // one edit at a time; reads go straight to the store
    edit_lock: Mutex<()>,
}

impl std::fmt::Debug for DatastoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatastoreService")
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl DatastoreService {
    /// Service over `store`
    #[must_use]
    pub fn new(store: Arc<dyn DataStoreManager>, validator: Arc<ConstraintValidator>) -> Self {
        Self {
            store,
            validator,
            edit_lock: Mutex::new(()),
        }
    }

    /// Service over an empty in-memory datastore
    #[must_use]
    pub fn in_memory(validator: Arc<ConstraintValidator>) -> Self {
        Self::new(Arc::new(InMemoryDataStore::new()), validator)
    }

    /// The validator
    #[must_use]
    pub fn validator(&self) -> &Arc<ConstraintValidator> {
        &self.validator
    }

    /// RPC and action validation against this datastore's schema
    #[must_use]
    pub fn rpc_validator(&self) -> RpcValidator {
        RpcValidator::new(Arc::clone(&self.validator))
    }

    /// Apply, validate and commit an edit-config request
    ///
    /// With `test-only` nothing is committed; with `set` validation is
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ValidationError::Rejected`] when the edit or
    /// the resulting datastore is invalid, and an internal error when the
    /// store fails.
    pub fn edit_config(&self, request: &EditConfigRequest) -> ValidationResult<ChangeSet> {
        let request_id = self.validator.next_request_id();
        let span = debug_span!("edit_config", request = request_id);
        let _guard = span.enter();
        let _lock = self.edit_lock.lock();

        let mut staged = self.store.load()?;
        debug!("apply phase");
        let mut changes = self
            .validator
            .applier()
            .apply(&mut staged, request)
            .inspect_err(|_| debug!("edit rejected, discarding staged tree"))?;
        if self.validator.config().defaults.materialize_on_write {
            debug!("defaults phase");
            materialize(self.validator.schema(), &mut staged, &mut changes)?;
        }
        if request.test_option != TestOption::Set {
            self.validator
                .validate(&mut staged, &changes)
                .inspect_err(|_| debug!("validation failed, discarding staged tree"))?;
        }
        if request.test_option == TestOption::TestOnly {
            debug!(changes = changes.len(), "test-only request, nothing committed");
            return Ok(changes);
        }
        self.store.commit(staged)?;
        info!(changes = changes.len(), "edit committed");
        Ok(changes)
    }

    /// Committed tree
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be read.
    pub fn get_tree(&self) -> Result<DataTree> {
        self.store.load()
    }

    /// Committed tree rendered as JSON
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be read.
    pub fn get_config(&self, with_defaults: WithDefaults) -> Result<serde_json::Value> {
        let tree = self.store.load()?;
        Ok(json::render(self.validator.schema(), &tree, with_defaults))
    }

    /// Validate the whole committed tree
    ///
    /// # Errors
    ///
    /// Same as [`ConstraintValidator::validate_full`].
    pub fn validate_datastore(&self) -> ValidationResult<()> {
        let mut tree = self.store.load()?;
        self.validator.validate_full(&mut tree)
    }

    /// Replace the datastore with the JSON document `document`
    ///
    /// The document is validated as a whole before it is committed.
    ///
    /// # Errors
    ///
    /// Returns a rejection when the document is invalid, and an internal
    /// error when it is malformed or the store fails.
    pub fn load_json(&self, document: &serde_json::Value) -> ValidationResult<()> {
        let _lock = self.edit_lock.lock();
        let edit = json::json_to_edit(self.validator.schema(), document)?;
        let mut tree = DataTree::new();
        let mut changes = self
            .validator
            .applier()
            .apply(&mut tree, &EditConfigRequest::new(edit))?;
        materialize(self.validator.schema(), &mut tree, &mut changes)?;
        self.validator.validate_full(&mut tree)?;
        self.store.commit(tree)?;
        debug!(changes = changes.len(), "datastore loaded");
        Ok(())
    }
}
