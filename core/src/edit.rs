//! edit-config payload
//!
//! An edit is a tree of [`EditContainmentNode`]s for containers and list
//! entries. List entries are located with [`EditMatchNode`] key predicates;
//! leaf and leaf-list changes are [`EditChangeNode`]s.

use crate::types::QName;
use serde::{Deserialize, Serialize};

/// NETCONF `operation` attribute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditOperation {
    /// merge
    #[default]
    Merge,
    /// replace
    Replace,
    /// create, fails on existing data
    Create,
    /// delete, fails on missing data
    Delete,
    /// remove, silently ignores missing data
    Remove,
    /// none, only navigates
    None,
}

impl EditOperation {
    /// Whether the operation removes data
    #[must_use]
    pub fn is_removal(self) -> bool {
        matches!(self, EditOperation::Delete | EditOperation::Remove)
    }
}

/// `test-option`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestOption {
    /// validate, then apply
    #[default]
    TestThenSet,
    /// apply without validation
    Set,
    /// validate only
    TestOnly,
}

/// `error-option`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorOption {
    /// stop and restore the datastore on the first error
    #[default]
    RollbackOnError,
}

/// `insert` attribute for ordered-by user lists and leaf-lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertPosition {
    /// first
    First,
    /// last
    Last,
    /// before the entry identified by the anchor
    Before(InsertAnchor),
    /// after the entry identified by the anchor
    After(InsertAnchor),
}

/// Entry identification for `before`/`after`: the leaf-list value, or the
/// key values of a list entry in key declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InsertAnchor(pub Vec<String>);

/// Key predicate locating a list entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditMatchNode {
    /// Key leaf name
    pub qname: QName,
    /// Key value as received
    pub value: String,
}

/// Change of a leaf or leaf-list entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditChangeNode {
    /// Leaf or leaf-list name
    pub qname: QName,
    /// Value as received, `None` for type empty or a delete without value
    #[serde(default)]
    pub value: Option<String>,
    /// Operation, inherited when absent
    #[serde(default)]
    pub operation: Option<EditOperation>,
    /// Position for ordered-by user leaf-lists
    #[serde(default)]
    pub insert: Option<InsertPosition>,
}

impl EditChangeNode {
    /// Set a leaf or add a leaf-list entry
    pub fn new(qname: QName, value: impl Into<String>) -> Self {
        Self {
            qname,
            value: Some(value.into()),
            operation: None,
            insert: None,
        }
    }

    /// Change with no value (type empty, or removal of a leaf)
    #[must_use]
    pub fn empty(qname: QName) -> Self {
        Self {
            qname,
            value: None,
            operation: None,
            insert: None,
        }
    }

    /// Set the operation
    #[must_use]
    pub fn with_operation(mut self, operation: EditOperation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Set the insert position
    #[must_use]
    pub fn with_insert(mut self, insert: InsertPosition) -> Self {
        self.insert = Some(insert);
        self
    }
}

/// Edit of a container, list entry, or (for the request root) the datastore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditContainmentNode {
    /// Node name; ignored on the request root
    pub qname: QName,
    /// Operation, inherited when absent
    #[serde(default)]
    pub operation: Option<EditOperation>,
    /// Key predicates for list entries, in received order
    #[serde(default)]
    pub match_nodes: Vec<EditMatchNode>,
    /// Leaf and leaf-list changes
    #[serde(default)]
    pub change_nodes: Vec<EditChangeNode>,
    /// Nested containers and list entries
    #[serde(default)]
    pub children: Vec<EditContainmentNode>,
    /// Position for ordered-by user lists
    #[serde(default)]
    pub insert: Option<InsertPosition>,
}

impl EditContainmentNode {
    /// Edit of a container or list entry
    #[must_use]
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            operation: None,
            match_nodes: Vec::new(),
            change_nodes: Vec::new(),
            children: Vec::new(),
            insert: None,
        }
    }

    /// Request root standing for the datastore
    #[must_use]
    pub fn root() -> Self {
        Self::new(QName::new("", ""))
    }

    /// Set the operation
    #[must_use]
    pub fn with_operation(mut self, operation: EditOperation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Add a key predicate
    #[must_use]
    pub fn with_key(mut self, qname: QName, value: impl Into<String>) -> Self {
        self.match_nodes.push(EditMatchNode {
            qname,
            value: value.into(),
        });
        self
    }

    /// Add a leaf change inheriting the operation
    #[must_use]
    pub fn with_leaf(mut self, qname: QName, value: impl Into<String>) -> Self {
        self.change_nodes.push(EditChangeNode::new(qname, value));
        self
    }

    /// Add a change node
    #[must_use]
    pub fn with_change(mut self, change: EditChangeNode) -> Self {
        self.change_nodes.push(change);
        self
    }

    /// Add a nested edit
    #[must_use]
    pub fn with_child(mut self, child: EditContainmentNode) -> Self {
        self.children.push(child);
        self
    }

    /// Set the insert position
    #[must_use]
    pub fn with_insert(mut self, insert: InsertPosition) -> Self {
        self.insert = Some(insert);
        self
    }
}

/// An edit-config request against the running datastore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditConfigRequest {
    /// Edit tree rooted at the datastore
    pub config: EditContainmentNode,
    /// `default-operation`
    #[serde(default)]
    pub default_operation: EditOperation,
    /// `test-option`
    #[serde(default)]
    pub test_option: TestOption,
    /// `error-option`
    #[serde(default)]
    pub error_option: ErrorOption,
}

impl EditConfigRequest {
    /// Merge request for `config`
    #[must_use]
    pub fn new(config: EditContainmentNode) -> Self {
        Self {
            config,
            default_operation: EditOperation::Merge,
            test_option: TestOption::TestThenSet,
            error_option: ErrorOption::RollbackOnError,
        }
    }

    /// Request with a single top-level edit
    #[must_use]
    pub fn single(node: EditContainmentNode) -> Self {
        Self::new(EditContainmentNode::root().with_child(node))
    }

    /// Set the test-option
    #[must_use]
    pub fn with_test_option(mut self, test_option: TestOption) -> Self {
        self.test_option = test_option;
        self
    }

    /// Set the default-operation
    #[must_use]
    pub fn with_default_operation(mut self, operation: EditOperation) -> Self {
        self.default_operation = operation;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "urn:org:bbf:pma:validation";

    #[test]
    fn test_request_deserializes_with_defaults() {
        let json = serde_json::json!({
            "config": {
                "qname": {"namespace": "", "local_name": ""},
                "children": [{
                    "qname": {"namespace": NS, "local_name": "validation"},
                    "operation": "merge",
                    "change_nodes": [{
                        "qname": {"namespace": NS, "local_name": "leaf1"},
                        "value": "leaf1"
                    }]
                }]
            }
        });
        let request: EditConfigRequest = serde_json::from_value(json).expect("valid request");
        assert_eq!(request.default_operation, EditOperation::Merge);
        assert_eq!(request.test_option, TestOption::TestThenSet);
        assert_eq!(request.config.children[0].change_nodes[0].value.as_deref(), Some("leaf1"));
    }

    #[test]
    fn test_insert_position_serde() {
        let insert = InsertPosition::After(InsertAnchor(vec!["b".to_string()]));
        let json = serde_json::to_value(&insert).expect("serialize");
        assert_eq!(json, serde_json::json!({"after": ["b"]}));
    }
}
