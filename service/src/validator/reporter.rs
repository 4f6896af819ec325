//! Mapping of validation failures to NETCONF rpc-errors

use super::failure::{FailureKind, ValidationFailure};
use yang_core::config::ReportingConfig;
use yang_core::rpc_error::{ErrorTag, RpcError, app_tags};

/// Renders [`ValidationFailure`]s as [`RpcError`]s
///
/// The mapping is fixed per failure kind. A custom `error-message` or
/// `error-app-tag` from the schema replaces the generated text verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorReporter {
    include_path_namespaces: bool,
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(&ReportingConfig::default())
    }
}

impl ErrorReporter {
    /// Reporter following `config`
    #[must_use]
    pub fn new(config: &ReportingConfig) -> Self {
        Self {
            include_path_namespaces: config.include_path_namespaces,
        }
    }

    /// Build the rpc-error for `failure`
    #[must_use]
    pub fn to_rpc_error(&self, failure: &ValidationFailure) -> RpcError {
        let error = match &failure.kind {
            FailureKind::TooFewElements { name, min } => RpcError::new(
                ErrorTag::OperationFailed,
                format!("Minimum elements required for {name} is {min}."),
            )
            .with_app_tag(app_tags::TOO_FEW_ELEMENTS),
            FailureKind::TooManyElements { name, max } => RpcError::new(
                ErrorTag::OperationFailed,
                format!("Maximum elements allowed for {name} is {max}."),
            )
            .with_app_tag(app_tags::TOO_MANY_ELEMENTS),
            FailureKind::MustViolation {
                expression,
                error_message,
                error_app_tag,
            } => RpcError::new(
                ErrorTag::OperationFailed,
                error_message
                    .clone()
                    .unwrap_or_else(|| format!("Violate must constraints: {expression}")),
            )
            .with_app_tag(error_app_tag.as_deref().unwrap_or(app_tags::MUST_VIOLATION)),
            FailureKind::WhenViolation { expression } => RpcError::new(
                ErrorTag::UnknownElement,
                format!("Violate when constraints: {expression}"),
            )
            .with_app_tag(app_tags::WHEN_VIOLATION),
            FailureKind::MissingMandatoryLeaf { name } => {
                RpcError::new(ErrorTag::DataMissing, format!("Missing mandatory node - {name}"))
                    .with_app_tag(app_tags::INSTANCE_REQUIRED)
            }
            FailureKind::MissingChoice { .. } => {
                RpcError::new(ErrorTag::DataMissing, "Missing mandatory node").with_app_tag(app_tags::MISSING_CHOICE)
            }
            FailureKind::DependencyViolated { value } => RpcError::new(
                ErrorTag::DataMissing,
                format!("Dependency violated, '{value}' must exist"),
            )
            .with_app_tag(app_tags::INSTANCE_REQUIRED),
            FailureKind::DuplicateElements { name } => {
                RpcError::new(ErrorTag::OperationFailed, format!("Duplicate elements in node {name}"))
                    .with_app_tag(app_tags::DATA_NOT_UNIQUE)
            }
            FailureKind::NotUnique { name, values } => {
                let values = values
                    .iter()
                    .map(|(leaf, value)| format!("{leaf}={value}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                RpcError::new(
                    ErrorTag::OperationFailed,
                    format!("Violate unique constraints of {name}: {{{values}}}"),
                )
                .with_app_tag(app_tags::DATA_NOT_UNIQUE)
            }
            FailureKind::MissingKeys { keys } => RpcError::new(
                ErrorTag::MissingElement,
                format!("Expected list key(s) [{}] is missing", keys.join(", ")),
            ),
            FailureKind::UnknownElement { name } => RpcError::new(
                ErrorTag::UnknownElement,
                format!("An unexpected element '{name}' is present"),
            ),
            FailureKind::InvalidValue { message, app_tag } => {
                let error = RpcError::new(ErrorTag::InvalidValue, message.clone());
                match app_tag {
                    Some(app_tag) => error.with_app_tag(app_tag.clone()),
                    None => error,
                }
            }
            FailureKind::MissingInsertAnchor => {
                RpcError::new(ErrorTag::BadAttribute, "Missing instance for insert before or after")
                    .with_app_tag(app_tags::MISSING_INSTANCE)
            }
            FailureKind::DataExists => RpcError::new(ErrorTag::DataExists, "Data already exists; cannot be created"),
            FailureKind::DataMissing => RpcError::new(ErrorTag::DataMissing, "Data does not exist; cannot be deleted"),
            FailureKind::UnknownRpc => RpcError::protocol(ErrorTag::BadElement, "No matched rpc found on the models"),
            FailureKind::UnknownAction => {
                RpcError::protocol(ErrorTag::BadElement, "No matched action found on the models")
            }
        };

        match &failure.path {
            Some(path) => {
                let namespaces = if self.include_path_namespaces {
                    path.namespaces()
                } else {
                    Default::default()
                };
                error.with_path(path.to_string(), namespaces)
            }
            None => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use yang_core::rpc_error::ErrorType;
    use yang_core::types::InstancePath;

    const NS: &str = "urn:org:bbf:pma:validation";

    fn path() -> InstancePath {
        InstancePath::root()
            .child("validation", NS, "validation")
            .child("validation", NS, "leaflist-range")
            .child("validation", NS, "leaflist-type")
    }

    #[test]
    fn test_too_few_elements() {
        let error = ErrorReporter::default().to_rpc_error(&ValidationFailure::at(
            FailureKind::TooFewElements {
                name: "leaflist-type".to_string(),
                min: 2,
            },
            path(),
        ));
        assert_eq!(error.tag, ErrorTag::OperationFailed);
        assert_eq!(error.app_tag.as_deref(), Some("too-few-elements"));
        assert_eq!(error.message, "Minimum elements required for leaflist-type is 2.");
        assert_eq!(
            error.path.as_deref(),
            Some("/validation:validation/validation:leaflist-range/validation:leaflist-type")
        );
        assert_eq!(
            error.path_namespaces.and_then(|ns| ns.get("validation").cloned()).as_deref(),
            Some(NS)
        );
    }

    #[test]
    fn test_custom_must_error_overrides_template() {
        let reporter = ErrorReporter::default();
        let generated = reporter.to_rpc_error(&ValidationFailure::at(
            FailureKind::MustViolation {
                expression: "../leaf1 = 'leaf1'".to_string(),
                error_message: None,
                error_app_tag: None,
            },
            path(),
        ));
        assert_eq!(generated.message, "Violate must constraints: ../leaf1 = 'leaf1'");
        assert_eq!(generated.app_tag.as_deref(), Some("must-violation"));

        let custom = reporter.to_rpc_error(&ValidationFailure::at(
            FailureKind::MustViolation {
                expression: "../leaf1 = 'leaf1'".to_string(),
                error_message: Some("leaf1 must be set".to_string()),
                error_app_tag: Some("leaf1-required".to_string()),
            },
            path(),
        ));
        assert_eq!(custom.message, "leaf1 must be set");
        assert_eq!(custom.app_tag.as_deref(), Some("leaf1-required"));
    }

    #[test]
    fn test_protocol_failures_have_no_path() {
        let error = ErrorReporter::default().to_rpc_error(&ValidationFailure::unlocated(FailureKind::UnknownAction));
        assert_eq!(error.error_type, ErrorType::Protocol);
        assert_eq!(error.tag, ErrorTag::BadElement);
        assert_eq!(error.message, "No matched action found on the models");
        assert!(error.path.is_none());
    }

    #[test]
    fn test_namespaces_can_be_omitted() {
        let reporter = ErrorReporter::new(&ReportingConfig {
            include_path_namespaces: false,
        });
        let error = reporter.to_rpc_error(&ValidationFailure::at(FailureKind::DataExists, path()));
        assert!(error.path.is_some());
        assert_eq!(error.path_namespaces.map(|ns| ns.len()), Some(0));
    }
}
