//! Schema definition documents
//!
//! A pre-built schema is described by [`ModuleDefinition`] documents. They
//! deserialize from JSON or YAML and can be assembled in code with the fluent
//! constructors on [`NodeDefinition`]. The registry builder compiles them
//! into immutable [`crate::schema::SchemaNode`]s.

use crate::schema::{
    LeafType, MustConstraint, OrderedBy, UniqueConstraint, WhenConstraint,
};
use serde::{Deserialize, Serialize};

/// A YANG module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    /// Module name
    pub name: String,
    /// Namespace URI
    pub namespace: String,
    /// Registered prefix
    pub prefix: String,
    /// Revision date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Identities defined by the module
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identities: Vec<IdentityDefinition>,
    /// Top-level data nodes, rpcs and augment targets
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
}

impl ModuleDefinition {
    /// Create an empty module
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            prefix: prefix.into(),
            revision: None,
            identities: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Set the revision
    #[must_use]
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Add an identity
    #[must_use]
    pub fn with_identity(mut self, name: &str, bases: &[&str]) -> Self {
        self.identities.push(IdentityDefinition {
            name: name.to_string(),
            bases: bases.iter().map(|b| (*b).to_string()).collect(),
        });
        self
    }

    /// Add a top-level node
    #[must_use]
    pub fn with_node(mut self, node: NodeDefinition) -> Self {
        self.nodes.push(node);
        self
    }
}

/// An identity and its bases (`prefix:name` or a bare local name)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDefinition {
    /// Identity name
    pub name: String,
    /// Base identities
    #[serde(default)]
    pub bases: Vec<String>,
}

/// Kind specific part of a node definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NodeKindDefinition {
    /// container
    Container {
        /// presence container
        #[serde(default)]
        presence: bool,
        /// schema mount point label
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mount_point: Option<String>,
    },
    /// list
    List {
        /// key leaf names
        keys: Vec<String>,
        /// min-elements
        #[serde(default)]
        min_elements: u32,
        /// max-elements
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_elements: Option<u32>,
        /// ordered-by
        #[serde(default)]
        ordered_by: OrderedBy,
        /// unique statements
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        unique: Vec<UniqueConstraint>,
    },
    /// leaf
    Leaf {
        /// leaf type
        #[serde(rename = "type")]
        leaf_type: LeafType,
        /// mandatory
        #[serde(default)]
        mandatory: bool,
        /// default value
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
    /// leaf-list
    LeafList {
        /// leaf-list type
        #[serde(rename = "type")]
        leaf_type: LeafType,
        /// min-elements
        #[serde(default)]
        min_elements: u32,
        /// max-elements
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_elements: Option<u32>,
        /// ordered-by
        #[serde(default)]
        ordered_by: OrderedBy,
        /// default values
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        defaults: Vec<String>,
    },
    /// choice
    Choice {
        /// mandatory
        #[serde(default)]
        mandatory: bool,
        /// default case name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_case: Option<String>,
    },
    /// case
    Case,
    /// anydata
    Anydata,
    /// rpc
    Rpc,
    /// action
    Action,
    /// input
    Input,
    /// output
    Output,
}

/// A schema node definition with its subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Local name
    pub name: String,
    /// Kind specific data
    #[serde(flatten)]
    pub kind: NodeKindDefinition,
    /// Name of the defining module when it differs from the parent's (augment)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Explicit `config` statement, inherited when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<bool>,
    /// must statements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<MustConstraint>,
    /// when statements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when: Vec<WhenConstraint>,
    /// Child definitions in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDefinition>,
}

impl NodeDefinition {
    fn of(name: &str, kind: NodeKindDefinition) -> Self {
        Self {
            name: name.to_string(),
            kind,
            module: None,
            config: None,
            must: Vec::new(),
            when: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Non-presence container
    #[must_use]
    pub fn container(name: &str) -> Self {
        Self::of(
            name,
            NodeKindDefinition::Container {
                presence: false,
                mount_point: None,
            },
        )
    }

    /// List with the given keys
    #[must_use]
    pub fn list(name: &str, keys: &[&str]) -> Self {
        Self::of(
            name,
            NodeKindDefinition::List {
                keys: keys.iter().map(|k| (*k).to_string()).collect(),
                min_elements: 0,
                max_elements: None,
                ordered_by: OrderedBy::System,
                unique: Vec::new(),
            },
        )
    }

    /// Leaf of the given type
    #[must_use]
    pub fn leaf(name: &str, leaf_type: LeafType) -> Self {
        Self::of(
            name,
            NodeKindDefinition::Leaf {
                leaf_type,
                mandatory: false,
                default: None,
            },
        )
    }

    /// Leaf-list of the given type
    #[must_use]
    pub fn leaf_list(name: &str, leaf_type: LeafType) -> Self {
        Self::of(
            name,
            NodeKindDefinition::LeafList {
                leaf_type,
                min_elements: 0,
                max_elements: None,
                ordered_by: OrderedBy::System,
                defaults: Vec::new(),
            },
        )
    }

    /// Optional choice
    #[must_use]
    pub fn choice(name: &str) -> Self {
        Self::of(
            name,
            NodeKindDefinition::Choice {
                mandatory: false,
                default_case: None,
            },
        )
    }

    /// Case
    #[must_use]
    pub fn case(name: &str) -> Self {
        Self::of(name, NodeKindDefinition::Case)
    }

    /// Anydata
    #[must_use]
    pub fn anydata(name: &str) -> Self {
        Self::of(name, NodeKindDefinition::Anydata)
    }

    /// RPC
    #[must_use]
    pub fn rpc(name: &str) -> Self {
        Self::of(name, NodeKindDefinition::Rpc)
    }

    /// Action
    #[must_use]
    pub fn action(name: &str) -> Self {
        Self::of(name, NodeKindDefinition::Action)
    }

    /// Input of an rpc or action
    #[must_use]
    pub fn input() -> Self {
        Self::of("input", NodeKindDefinition::Input)
    }

    /// Output of an rpc or action
    #[must_use]
    pub fn output() -> Self {
        Self::of("output", NodeKindDefinition::Output)
    }

    /// Add a child
    #[must_use]
    pub fn with_child(mut self, child: NodeDefinition) -> Self {
        self.children.push(child);
        self
    }

    /// Add several children
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = NodeDefinition>) -> Self {
        self.children.extend(children);
        self
    }

    /// Add a must statement
    #[must_use]
    pub fn with_must(mut self, expression: &str) -> Self {
        self.must.push(MustConstraint::new(expression));
        self
    }

    /// Add a must statement with custom error-message and error-app-tag
    #[must_use]
    pub fn with_must_error(
        mut self,
        expression: &str,
        message: Option<&str>,
        app_tag: Option<&str>,
    ) -> Self {
        self.must.push(MustConstraint {
            expression: expression.to_string(),
            error_message: message.map(str::to_string),
            error_app_tag: app_tag.map(str::to_string),
        });
        self
    }

    /// Add a when statement evaluated on the node itself
    #[must_use]
    pub fn with_when(mut self, expression: &str) -> Self {
        self.when.push(WhenConstraint::new(expression));
        self
    }

    /// Add a when statement evaluated on the parent (augment or uses)
    #[must_use]
    pub fn with_parent_when(mut self, expression: &str) -> Self {
        self.when.push(WhenConstraint {
            expression: expression.to_string(),
            on_parent: true,
        });
        self
    }

    /// Mark a leaf or choice mandatory
    #[must_use]
    pub fn mandatory(mut self) -> Self {
        match &mut self.kind {
            NodeKindDefinition::Leaf { mandatory, .. }
            | NodeKindDefinition::Choice { mandatory, .. } => *mandatory = true,
            _ => {}
        }
        self
    }

    /// Set a leaf default, or append a leaf-list default
    #[must_use]
    pub fn default_value(mut self, value: &str) -> Self {
        match &mut self.kind {
            NodeKindDefinition::Leaf { default, .. } => *default = Some(value.to_string()),
            NodeKindDefinition::LeafList { defaults, .. } => defaults.push(value.to_string()),
            _ => {}
        }
        self
    }

    /// Set the default case of a choice
    #[must_use]
    pub fn default_case(mut self, case: &str) -> Self {
        if let NodeKindDefinition::Choice { default_case, .. } = &mut self.kind {
            *default_case = Some(case.to_string());
        }
        self
    }

    /// Set min-elements of a list or leaf-list
    #[must_use]
    pub fn min_elements(mut self, n: u32) -> Self {
        match &mut self.kind {
            NodeKindDefinition::List { min_elements, .. }
            | NodeKindDefinition::LeafList { min_elements, .. } => *min_elements = n,
            _ => {}
        }
        self
    }

    /// Set max-elements of a list or leaf-list
    #[must_use]
    pub fn max_elements(mut self, n: u32) -> Self {
        match &mut self.kind {
            NodeKindDefinition::List { max_elements, .. }
            | NodeKindDefinition::LeafList { max_elements, .. } => *max_elements = Some(n),
            _ => {}
        }
        self
    }

    /// Make a list or leaf-list `ordered-by user`
    #[must_use]
    pub fn ordered_by_user(mut self) -> Self {
        match &mut self.kind {
            NodeKindDefinition::List { ordered_by, .. }
            | NodeKindDefinition::LeafList { ordered_by, .. } => *ordered_by = OrderedBy::User,
            _ => {}
        }
        self
    }

    /// Add a unique statement to a list
    #[must_use]
    pub fn unique(mut self, leaves: &[&str]) -> Self {
        if let NodeKindDefinition::List { unique, .. } = &mut self.kind {
            unique.push(UniqueConstraint {
                leaves: leaves.iter().map(|l| (*l).to_string()).collect(),
            });
        }
        self
    }

    /// Make a container a presence container
    #[must_use]
    pub fn presence(mut self) -> Self {
        if let NodeKindDefinition::Container { presence, .. } = &mut self.kind {
            *presence = true;
        }
        self
    }

    /// Declare a schema mount point on a container
    #[must_use]
    pub fn mount_point(mut self, label: &str) -> Self {
        if let NodeKindDefinition::Container { mount_point, .. } = &mut self.kind {
            *mount_point = Some(label.to_string());
        }
        self
    }

    /// Set the `config` statement
    #[must_use]
    pub fn config(mut self, config: bool) -> Self {
        self.config = Some(config);
        self
    }

    /// Attribute the node to another module (augment)
    #[must_use]
    pub fn in_module(mut self, module: &str) -> Self {
        self.module = Some(module.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::IntegerKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fluent_construction() {
        let list = NodeDefinition::list("list1", &["id"])
            .min_elements(1)
            .max_elements(3)
            .unique(&["a", "b"])
            .with_child(NodeDefinition::leaf("id", LeafType::string()));

        match &list.kind {
            NodeKindDefinition::List {
                keys,
                min_elements,
                max_elements,
                unique,
                ..
            } => {
                assert_eq!(keys, &vec!["id".to_string()]);
                assert_eq!(*min_elements, 1);
                assert_eq!(*max_elements, Some(3));
                assert_eq!(unique.len(), 1);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(list.children.len(), 1);
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let yaml = r"
name: validation
namespace: urn:org:bbf:pma:validation
prefix: validation
nodes:
  - name: validation
    kind: container
    children:
      - name: leaf1
        kind: leaf
        type:
          base: integer
          kind: int8
          range:
            expression: 1..10
      - name: leaf2
        kind: leaf
        type:
          base: string
        must:
          - expression: ../leaf1 = 5
";
        let module: ModuleDefinition = serde_yaml::from_str(yaml).expect("valid module");
        assert_eq!(module.nodes.len(), 1);
        let container = &module.nodes[0];
        assert_eq!(container.children.len(), 2);
        assert_eq!(
            container.children[0].kind,
            NodeKindDefinition::Leaf {
                leaf_type: LeafType::ranged(IntegerKind::Int8, "1..10"),
                mandatory: false,
                default: None,
            }
        );
        assert_eq!(container.children[1].must[0].expression, "../leaf1 = 5");
    }
}
