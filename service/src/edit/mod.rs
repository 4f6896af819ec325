//! Application of edit-config payloads to staged trees

pub mod applier;
pub mod change_set;
pub mod defaults;

pub use applier::EditApplier;
pub use change_set::{Change, ChangeKind, ChangeSet};
pub use defaults::{WithDefaults, materialize, materialize_under};
