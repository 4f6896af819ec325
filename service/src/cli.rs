//! Command-line interface for YANG datastore validation
//!
//! - `validate`: load a datastore, optionally apply an edit, report the
//!   outcome as text or rpc-error JSON
//! - `get`: print the canonical datastore with a with-defaults mode

use crate::datastore::DatastoreService;
use crate::edit::defaults::WithDefaults;
use crate::error::ValidationError;
use crate::json;
use crate::validator::ConstraintValidator;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use yang_core::config::ValidatorConfig;
use yang_core::definition::ModuleDefinition;
use yang_core::edit::EditConfigRequest;
use yang_core::registry::SchemaRegistry;

/// YANG datastore validation tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Validator configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a datastore, or an edit applied to it
    Validate {
        /// Schema file: JSON array of module definitions
        #[arg(short, long)]
        schema: PathBuf,

        /// Datastore file in RFC 7951 JSON
        #[arg(short, long)]
        datastore: PathBuf,

        /// Edit file in RFC 7951 JSON with operation annotations
        #[arg(short, long)]
        edit: Option<PathBuf>,

        /// Print rpc-errors as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the datastore in canonical form
    Get {
        /// Schema file: JSON array of module definitions
        #[arg(short, long)]
        schema: PathBuf,

        /// Datastore file in RFC 7951 JSON
        #[arg(short, long)]
        datastore: PathBuf,

        /// with-defaults mode
        #[arg(long, value_enum, default_value = "report-all")]
        with_defaults: WithDefaults,
    },
}

impl Cli {
    /// Run the parsed command line
    ///
    /// Returns `false` when validation rejected the input.
    ///
    /// # Errors
    ///
    /// Returns an error when an input file cannot be read or parsed, or
    /// the engine fails internally.
    pub fn run(&self) -> Result<bool> {
        let default_level = if self.verbose { "debug" } else { "warn" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        // a subscriber may already be installed when embedded
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();

        let config = match &self.config {
            Some(path) => ValidatorConfig::load(path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?,
            None => ValidatorConfig::default(),
        };

        match &self.command {
            Commands::Validate {
                schema,
                datastore,
                edit,
                json,
            } => validate_command(config, schema, datastore, edit.as_deref(), *json),
            Commands::Get {
                schema,
                datastore,
                with_defaults,
            } => {
                let service = open(config, schema, datastore)?;
                let rendered = service.get_config(*with_defaults)?;
                println!("{}", serde_json::to_string_pretty(&rendered)?);
                Ok(true)
            }
        }
    }
}

fn validate_command(
    config: ValidatorConfig,
    schema: &Path,
    datastore: &Path,
    edit: Option<&Path>,
    as_json: bool,
) -> Result<bool> {
    let service = match open(config, schema, datastore) {
        Ok(service) => service,
        Err(err) => match err.downcast::<ValidationError>() {
            Ok(ValidationError::Rejected(errors)) => return Ok(report(&errors, as_json)),
            Ok(other) => return Err(other.into()),
            Err(err) => return Err(err),
        },
    };
    let outcome = match edit {
        Some(path) => {
            let document = read_json(path)?;
            let edit = json::json_to_edit(service.validator().schema(), &document)
                .with_context(|| format!("invalid edit document {}", path.display()))?;
            service.edit_config(&EditConfigRequest::new(edit)).map(|_| ())
        }
        None => service.validate_datastore(),
    };
    match outcome {
        Ok(()) => {
            if as_json {
                println!("{}", serde_json::json!({ "ok": true }));
            } else {
                println!("{}", "ok".green().bold());
            }
            Ok(true)
        }
        Err(ValidationError::Rejected(errors)) => Ok(report(&errors, as_json)),
        Err(ValidationError::Internal(err)) => Err(err.into()),
    }
}

fn report(errors: &crate::error::RpcErrors, as_json: bool) -> bool {
    if as_json {
        match serde_json::to_string_pretty(errors) {
            Ok(text) => println!("{text}"),
            Err(err) => eprintln!("failed to encode rpc-errors: {err}"),
        }
    } else {
        println!("{}", "rejected".red().bold());
        for error in errors {
            println!("  {} {}", format!("[{}]", error.tag).yellow(), error.message);
            if let Some(app_tag) = &error.app_tag {
                println!("      {} {app_tag}", "app-tag:".cyan());
            }
            if let Some(path) = &error.path {
                println!("      {} {path}", "path:".cyan());
            }
        }
    }
    false
}

/// Build the schema and load the datastore file
fn open(config: ValidatorConfig, schema: &Path, datastore: &Path) -> Result<DatastoreService> {
    let text = std::fs::read_to_string(schema).with_context(|| format!("failed to read schema {}", schema.display()))?;
    let modules: Vec<ModuleDefinition> =
        serde_json::from_str(&text).with_context(|| format!("invalid schema document {}", schema.display()))?;
    let registry = SchemaRegistry::builder().modules(modules).build()?;
    debug!(modules = registry.all_module_identifiers().len(), "schema loaded");

    let validator = ConstraintValidator::new(Arc::new(registry), config)?;
    let service = DatastoreService::in_memory(Arc::new(validator));
    service.load_json(&read_json(datastore)?)?;
    Ok(service)
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_get_with_defaults() {
        let cli = Cli::try_parse_from([
            "yangval",
            "get",
            "--schema",
            "modules.json",
            "--datastore",
            "running.json",
            "--with-defaults",
            "trim",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Get {
                with_defaults: WithDefaults::Trim,
                ..
            }
        ));
    }
}
