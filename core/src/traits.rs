//! Collaborator traits

use crate::data::DataTree;
use crate::error::Result;

/// Persistence behind a datastore
///
/// The validation engine only needs whole-tree load and commit: a request
/// stages a copy of the committed tree and hands the validated result back.
pub trait DataStoreManager: Send + Sync {
    /// Current committed tree
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load(&self) -> Result<DataTree>;

    /// Replace the committed tree
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn commit(&self, tree: DataTree) -> Result<()>;
}
