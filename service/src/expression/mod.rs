//! XPath expression language for YANG `must`, `when` and `path` statements
//!
//! This module implements the XPath 1.0 subset YANG uses, plus the YANG 1.1
//! function library, evaluated read-only over the arena data tree.

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod value;

// Function library
pub mod string_functions;
pub mod yang_functions;

// Parse caching and dependency analysis
pub mod cache;
pub mod dependencies;

use std::sync::Arc;
use tracing::trace;
use yang_core::config::ExpressionConfig;

pub use ast::Expr;
pub use cache::{CacheStats, ExpressionCache};
pub use dependencies::DependencyIndex;
pub use error::{EvaluationError, ExpressionError, ParseError};
pub use evaluator::{EvaluationEnv, EvaluatorConfig};
pub use functions::{CustomFunction, FunctionRegistry, XPathFunction};
pub use parser::Parser;
pub use value::XPathValue;

/// Main expression engine that combines parsing, caching and evaluation
#[derive(Debug)]
pub struct ExpressionEngine {
    parser: Parser,
    cache: ExpressionCache,
    functions: Arc<FunctionRegistry>,
    config: EvaluatorConfig,
}

impl ExpressionEngine {
    /// Create a new expression engine with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&ExpressionConfig::default())
    }

    /// Create an engine with the limits of `config`
    #[must_use]
    pub fn from_config(config: &ExpressionConfig) -> Self {
        let functions = Arc::new(FunctionRegistry::new());
        Self {
            parser: Parser::with_limits(config.max_depth, config.max_length)
                .with_functions(Arc::clone(&functions)),
            cache: ExpressionCache::new(config.parse_cache_size),
            functions,
            config: EvaluatorConfig::from(config),
        }
    }

    /// Replace the function library, for custom functions
    ///
    /// Cached expressions were checked against the old library and are
    /// dropped.
    #[must_use]
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = Arc::new(functions);
        self.parser = self.parser.with_functions(Arc::clone(&self.functions));
        self.cache.clear();
        self
    }

    /// Function library
    #[must_use]
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Evaluation limits
    #[must_use]
    pub fn evaluator_config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Parse `text`, using the cache
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::Parse`] for malformed expressions.
    pub fn compile(&self, text: &str) -> Result<Arc<Expr>, ExpressionError> {
        if let Some(expr) = self.cache.get(text) {
            return Ok(expr);
        }
        trace!(expression = text, "parsing expression");
        let expr = Arc::new(self.parser.parse(text)?);
        self.cache.insert(text, Arc::clone(&expr));
        Ok(expr)
    }

    /// Parse and evaluate `text`
    ///
    /// # Errors
    ///
    /// Returns an error if the expression is malformed or evaluation exceeds
    /// a limit or misuses a function.
    pub fn evaluate(&self, text: &str, env: &EvaluationEnv<'_>) -> Result<XPathValue, ExpressionError> {
        let expr = self.compile(text)?;
        self.evaluate_expr(&expr, env)
    }

    /// Evaluate a parsed expression
    ///
    /// # Errors
    ///
    /// Returns an error if evaluation exceeds a limit or misuses a function.
    pub fn evaluate_expr(&self, expr: &Expr, env: &EvaluationEnv<'_>) -> Result<XPathValue, ExpressionError> {
        Ok(evaluator::evaluate(self, expr, env)?)
    }

    /// Parse and evaluate `text`, converting the result with `boolean()`
    ///
    /// # Errors
    ///
    /// Same as [`ExpressionEngine::evaluate`].
    pub fn evaluate_boolean(&self, text: &str, env: &EvaluationEnv<'_>) -> Result<bool, ExpressionError> {
        Ok(self.evaluate(text, env)?.to_boolean())
    }

    /// Parse cache statistics
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::SchemaContext;
    use yang_core::data::DataTree;
    use yang_core::registry::SchemaRegistry;

    #[test]
    fn test_expression_engine_caches_parses() -> std::result::Result<(), anyhow::Error> {
        let engine = ExpressionEngine::new();
        let schema = SchemaContext::new(Arc::new(SchemaRegistry::default()));
        let tree = DataTree::new();
        let env = EvaluationEnv::for_node(&tree, &schema, tree.root());

        assert_eq!(engine.evaluate("1 + 2", &env)?, XPathValue::Number(3.0));
        assert!(engine.evaluate_boolean("1 + 2 = 3", &env)?);
        assert!(engine.evaluate_boolean("1 + 2 = 3", &env)?);

        let stats = engine.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 2);
        Ok(())
    }

    #[test]
    fn test_custom_function() -> std::result::Result<(), anyhow::Error> {
        let mut functions = FunctionRegistry::new();
        functions.register_custom(CustomFunction::new("answer", 0, Some(0), |_, _| {
            Ok(XPathValue::Number(42.0))
        }))?;
        let engine = ExpressionEngine::new().with_functions(functions);
        let schema = SchemaContext::new(Arc::new(SchemaRegistry::default()));
        let tree = DataTree::new();
        let env = EvaluationEnv::for_node(&tree, &schema, tree.root());
        assert!(engine.evaluate_boolean("answer() = 42", &env)?);
        assert!(ExpressionEngine::new().compile("answer()").is_err());
        Ok(())
    }

    #[test]
    fn test_parse_limits_come_from_config() {
        let engine = ExpressionEngine::from_config(&ExpressionConfig {
            max_length: 5,
            ..ExpressionConfig::default()
        });
        assert!(matches!(
            engine.compile("count(a) > 1"),
            Err(ExpressionError::Parse(ParseError::TooLong { .. }))
        ));
    }
}
