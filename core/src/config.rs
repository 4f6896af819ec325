//! Configuration types for the validation engine

use crate::error::{Result, YangError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for the validation engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Validation walk configuration
    pub validation: ValidationConfig,

    /// Expression evaluator configuration
    pub expression: ExpressionConfig,

    /// Referential integrity configuration
    pub integrity: IntegrityConfig,

    /// Error reporting configuration
    pub reporting: ReportingConfig,

    /// Default handling configuration
    pub defaults: DefaultsConfig,
}

/// Validation walk configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Stop at the first failure
    pub fail_fast: bool,

    /// Maximum errors collected when not failing fast
    pub max_errors: usize,

    /// Validate only nodes affected by the change set
    pub incremental: bool,

    /// Reuse constraint outcomes within one request
    pub validated_child_cache: bool,

    /// Upper bound on when-cleanup iterations
    pub max_when_cleanup_passes: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            fail_fast: true,
            max_errors: 100,
            incremental: true,
            validated_child_cache: true,
            max_when_cleanup_passes: 16,
        }
    }
}

/// Expression evaluator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionConfig {
    /// Maximum expression nesting depth
    pub max_depth: usize,

    /// Maximum expression length in characters
    pub max_length: usize,

    /// Number of parsed expressions kept in the LRU cache
    pub parse_cache_size: usize,

    /// Maximum data nodes visited by one evaluation
    pub max_node_visits: usize,

    /// Wall clock limit of one evaluation
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ExpressionConfig {
    fn default() -> Self {
        Self {
            max_depth: 100,
            max_length: 10_000,
            parse_cache_size: 512,
            max_node_visits: 1_000_000,
            timeout: Duration::from_secs(1),
        }
    }
}

/// Referential integrity configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    /// Check leafref and instance-identifier targets
    pub enabled: bool,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Error reporting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Attach the prefix to namespace map to each error path
    pub include_path_namespaces: bool,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            include_path_namespaces: true,
        }
    }
}

/// Default handling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Materialize schema defaults into the tree after each edit
    pub materialize_on_write: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            materialize_on_write: true,
        }
    }
}

impl ValidatorConfig {
    /// Parse a YAML document
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or the values are invalid.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the values are invalid.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has an unknown extension,
    /// or fails to parse or validate.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("yaml" | "yml") => Self::from_yaml_str(&text),
            other => Err(YangError::config(format!(
                "unsupported configuration file extension: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    /// Reject limits that would make the engine unusable
    ///
    /// # Errors
    ///
    /// Returns [`YangError::ConfigError`] naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.validation.max_errors == 0 {
            return Err(YangError::config("validation max_errors must be greater than 0"));
        }
        if self.validation.max_when_cleanup_passes == 0 {
            return Err(YangError::config(
                "validation max_when_cleanup_passes must be greater than 0",
            ));
        }
        if self.expression.max_depth == 0 {
            return Err(YangError::config("expression max_depth must be greater than 0"));
        }
        if self.expression.max_length == 0 {
            return Err(YangError::config("expression max_length must be greater than 0"));
        }
        if self.expression.parse_cache_size == 0 {
            return Err(YangError::config(
                "expression parse_cache_size must be greater than 0",
            ));
        }
        if self.expression.max_node_visits == 0 {
            return Err(YangError::config(
                "expression max_node_visits must be greater than 0",
            ));
        }
        if self.expression.timeout.is_zero() {
            return Err(YangError::config("expression timeout must be greater than 0"));
        }
        Ok(())
    }
}
