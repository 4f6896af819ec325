//! Error types for the XPath expression language
//!
//! Parse errors mean a schema carries a malformed `must`, `when` or `path`
//! statement; evaluation errors mean a resource limit was hit or a function
//! was misused. Neither is a constraint violation: an unresolved path simply
//! yields an empty node-set.

use thiserror::Error;
use yang_core::error::YangError;

/// Main error type for expression operations
#[derive(Debug, Error)]
pub enum ExpressionError {
    /// Error during parsing
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error during evaluation
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
}

impl ExpressionError {
    /// Attach the expression text and convert to the crate error type
    #[must_use]
    pub fn into_yang_error(self, expression: &str) -> YangError {
        YangError::evaluation(expression, self.to_string())
    }
}

/// Errors that can occur during parsing
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// Unexpected end of input
    #[error("Unexpected end of input at position {position}")]
    UnexpectedEof {
        /// Position in the input where parsing failed
        position: usize,
    },

    /// Unexpected token
    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken {
        /// The unexpected token that was encountered
        token: String,
        /// Position in the input where the token was found
        position: usize,
    },

    /// Invalid number format
    #[error("Invalid number '{value}' at position {position}")]
    InvalidNumber {
        /// The invalid numeric string
        value: String,
        /// Position in the input where the number was found
        position: usize,
    },

    /// Unterminated string literal
    #[error("Unterminated string literal at position {position}")]
    UnterminatedString {
        /// Position of the opening quote
        position: usize,
    },

    /// Unknown axis name
    #[error("Unknown axis '{name}' at position {position}")]
    UnknownAxis {
        /// Axis name
        name: String,
        /// Position in the input
        position: usize,
    },

    /// Missing closing delimiter
    #[error("Missing closing '{delimiter}' at position {position}")]
    MissingDelimiter {
        /// The delimiter character that was expected but not found
        delimiter: char,
        /// Position in the input where the delimiter was expected
        position: usize,
    },

    /// Expression too deep
    #[error("Expression nesting depth {depth} exceeds maximum of {max}")]
    TooDeep {
        /// Current nesting depth
        depth: usize,
        /// Maximum allowed nesting depth
        max: usize,
    },

    /// Expression too long
    #[error("Expression length {length} exceeds maximum of {max}")]
    TooLong {
        /// Current expression length
        length: usize,
        /// Maximum allowed expression length
        max: usize,
    },

    /// Unknown function
    #[error("Unknown function '{name}' at position {position}")]
    UnknownFunction {
        /// Name of the function that was not recognized
        name: String,
        /// Position in the input where the function was found
        position: usize,
    },

    /// Wrong number of arguments
    #[error("Function '{name}' expects {expected} arguments, got {actual}")]
    WrongArity {
        /// Name of the function
        name: String,
        /// Expected number of arguments
        expected: String,
        /// Actual number of arguments provided
        actual: usize,
    },

    /// Variables are not bound in YANG expressions
    #[error("Unbound variable '${name}' at position {position}")]
    UnboundVariable {
        /// Variable name
        name: String,
        /// Position in the input
        position: usize,
    },

    /// Trailing input after expression
    #[error("Unexpected input after expression: '{input}'")]
    TrailingInput {
        /// The unexpected input that remained after parsing
        input: String,
    },
}

/// Errors that can occur during evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// Type mismatch in operation
    #[error("Type error: {message}")]
    TypeError {
        /// Description of the type error
        message: String,
    },

    /// Function evaluation error
    #[error("Function '{name}' error: {message}")]
    FunctionError {
        /// Name of the function that encountered an error
        name: String,
        /// Error message from the function
        message: String,
    },

    /// Evaluation timeout
    #[error("Expression evaluation timed out after {millis} ms")]
    Timeout {
        /// Limit in milliseconds
        millis: u128,
    },

    /// Too many node visits
    #[error("Expression evaluation exceeded maximum node visits ({max})")]
    TooManyNodeVisits {
        /// Maximum number of visits allowed
        max: usize,
    },

    /// Call stack too deep
    #[error("Expression evaluation exceeded maximum call depth ({max})")]
    CallStackTooDeep {
        /// Maximum call depth allowed
        max: usize,
    },

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {pattern}")]
    InvalidRegex {
        /// The regex pattern string that was invalid
        pattern: String,
    },
}

impl EvaluationError {
    /// Create a function error
    pub fn function(name: &str, message: impl Into<String>) -> Self {
        Self::FunctionError {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Create a type error for an argument that must be a node-set
    #[must_use]
    pub fn expected_node_set(function: &str) -> Self {
        Self::TypeError {
            message: format!("{function}() expects a node-set argument"),
        }
    }
}
