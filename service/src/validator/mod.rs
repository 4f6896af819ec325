//! Constraint validation of staged data trees

pub mod context;
pub mod engine;
pub mod failure;
pub mod reporter;
pub mod types;

pub use context::{ConstraintClass, NodeState, ValidationContext};
pub use engine::ConstraintValidator;
pub use failure::{FailureKind, ValidationFailure};
pub use reporter::ErrorReporter;
pub use types::{TypeValidator, TypeViolation, compare_values};
