//! Schema node model
//!
//! A [`SchemaNode`] is built once when a [`crate::registry::SchemaRegistry`]
//! is compiled and is immutable afterwards. Node kinds form a closed set, so
//! the validator matches on [`SchemaNodeKind`] exhaustively instead of
//! dispatching through trait objects.

use crate::types::{QName, SchemaPath};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Anchor a translated pattern for whole-value matching
#[must_use]
pub fn anchored_pattern(pattern: &str) -> String {
    format!("^(?:{pattern})$")
}

/// `regex` source for an XSD pattern as used by YANG `pattern` statements
///
/// XSD patterns are implicitly anchored, `^` and `$` are ordinary
/// characters, and the `\i`/`\c` name classes exist.
#[must_use]
pub fn xsd_regex(pattern: &str) -> String {
    anchored_pattern(&translate_xsd(pattern))
}

const NAME_START: &str = "_:A-Za-z\\u{C0}-\\u{D6}\\u{D8}-\\u{F6}\\u{F8}-\\u{2FF}\\u{370}-\\u{37D}\\u{37F}-\\u{1FFF}";
const NAME_EXTRA: &str = "\\-.0-9\\u{B7}\\u{300}-\\u{36F}\\u{203F}-\\u{2040}";

/// Translate an XSD pattern body into `regex` syntax, unanchored
#[must_use]
pub fn translate_xsd(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    let mut class_depth = 0usize;
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('i') if class_depth == 0 => out.push_str(&format!("[{NAME_START}]")),
                Some('I') if class_depth == 0 => out.push_str(&format!("[^{NAME_START}]")),
                Some('c') if class_depth == 0 => out.push_str(&format!("[{NAME_START}{NAME_EXTRA}]")),
                Some('C') if class_depth == 0 => out.push_str(&format!("[^{NAME_START}{NAME_EXTRA}]")),
                Some('i') => out.push_str(NAME_START),
                Some('c') => {
                    out.push_str(NAME_START);
                    out.push_str(NAME_EXTRA);
                }
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push_str("\\\\"),
            },
            '[' => {
                class_depth += 1;
                out.push('[');
                if chars.peek() == Some(&'^') {
                    out.push('^');
                    chars.next();
                }
            }
            ']' if class_depth > 0 => {
                class_depth -= 1;
                out.push(']');
            }
            // Character class subtraction `[a-z-[aeiou]]`
            '-' if class_depth > 0 && chars.peek() == Some(&'[') => out.push_str("--"),
            '^' | '$' if class_depth == 0 => {
                out.push('\\');
                out.push(ch);
            }
            '&' | '~' if class_depth > 0 => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Ordering of list and leaf-list instances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderedBy {
    /// Server-defined canonical order
    #[default]
    System,
    /// Client insertion order
    User,
}

/// `must` statement attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MustConstraint {
    /// XPath expression text
    pub expression: String,
    /// Custom `error-message`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Custom `error-app-tag`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_app_tag: Option<String>,
}

impl MustConstraint {
    /// Create a must constraint without custom error text
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            error_message: None,
            error_app_tag: None,
        }
    }
}

/// `when` statement attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhenConstraint {
    /// XPath expression text
    pub expression: String,
    /// Evaluate with the parent data node as context (augment/uses `when`)
    #[serde(default)]
    pub on_parent: bool,
}

impl WhenConstraint {
    /// Create a when constraint evaluated on the node itself
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            on_parent: false,
        }
    }
}

/// `unique` statement of a list: descendant leaf paths relative to an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    /// Relative descendant paths, `/` separated local names
    pub leaves: Vec<String>,
}

/// `range` restriction with optional custom error text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRestriction {
    /// Range expression such as `1..10 | 20..max`
    pub expression: String,
    /// Custom `error-message`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Custom `error-app-tag`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_app_tag: Option<String>,
}

impl RangeRestriction {
    /// Create a restriction from its expression
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            error_message: None,
            error_app_tag: None,
        }
    }

    /// Split the expression into `(lower, upper)` bound literals
    ///
    /// A single value `v` yields `(v, v)`. Bounds may be `min` or `max`.
    #[must_use]
    pub fn intervals(&self) -> Vec<(String, String)> {
        self.expression
            .split('|')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once("..") {
                Some((lower, upper)) => (lower.trim().to_string(), upper.trim().to_string()),
                None => (part.to_string(), part.to_string()),
            })
            .collect()
    }
}

/// `pattern` restriction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRestriction {
    /// XSD regular expression
    pub pattern: String,
    /// `modifier invert-match`
    #[serde(default)]
    pub invert_match: bool,
    /// Custom `error-message`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Custom `error-app-tag`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_app_tag: Option<String>,
}

impl PatternRestriction {
    /// Create a plain pattern restriction
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            invert_match: false,
            error_message: None,
            error_app_tag: None,
        }
    }
}

/// Enumeration member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumMember {
    /// Assigned name
    pub name: String,
    /// Integer value
    pub value: i32,
}

/// Bit of a `bits` type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitMember {
    /// Bit name
    pub name: String,
    /// Bit position
    pub position: u32,
}

/// Built-in integer types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegerKind {
    /// int8
    Int8,
    /// int16
    Int16,
    /// int32
    Int32,
    /// int64
    Int64,
    /// uint8
    Uint8,
    /// uint16
    Uint16,
    /// uint32
    Uint32,
    /// uint64
    Uint64,
}

impl IntegerKind {
    /// Inclusive value bounds of the type
    #[must_use]
    pub fn bounds(self) -> (i128, i128) {
        match self {
            IntegerKind::Int8 => (i128::from(i8::MIN), i128::from(i8::MAX)),
            IntegerKind::Int16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
            IntegerKind::Int32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
            IntegerKind::Int64 => (i128::from(i64::MIN), i128::from(i64::MAX)),
            IntegerKind::Uint8 => (0, i128::from(u8::MAX)),
            IntegerKind::Uint16 => (0, i128::from(u16::MAX)),
            IntegerKind::Uint32 => (0, i128::from(u32::MAX)),
            IntegerKind::Uint64 => (0, i128::from(u64::MAX)),
        }
    }

    /// YANG name of the type
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            IntegerKind::Int8 => "int8",
            IntegerKind::Int16 => "int16",
            IntegerKind::Int32 => "int32",
            IntegerKind::Int64 => "int64",
            IntegerKind::Uint8 => "uint8",
            IntegerKind::Uint16 => "uint16",
            IntegerKind::Uint32 => "uint32",
            IntegerKind::Uint64 => "uint64",
        }
    }

    /// Whether JSON encoding uses a number rather than a string
    #[must_use]
    pub fn is_json_number(self) -> bool {
        !matches!(self, IntegerKind::Int64 | IntegerKind::Uint64)
    }
}

/// Resolved type of a leaf or leaf-list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "base", rename_all = "kebab-case")]
pub enum LeafType {
    /// Integer types
    Integer {
        /// Built-in integer type
        kind: IntegerKind,
        /// Range restriction
        #[serde(default, skip_serializing_if = "Option::is_none")]
        range: Option<RangeRestriction>,
    },
    /// decimal64
    Decimal64 {
        /// Number of fraction digits (1..=18)
        fraction_digits: u8,
        /// Range restriction
        #[serde(default, skip_serializing_if = "Option::is_none")]
        range: Option<RangeRestriction>,
    },
    /// string
    String {
        /// Length restriction
        #[serde(default, skip_serializing_if = "Option::is_none")]
        length: Option<RangeRestriction>,
        /// Pattern restrictions, all of which must hold
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        patterns: Vec<PatternRestriction>,
    },
    /// boolean
    Boolean,
    /// empty
    Empty,
    /// enumeration
    Enumeration {
        /// Members in declaration order
        members: Vec<EnumMember>,
    },
    /// bits
    Bits {
        /// Bits in declaration order
        members: Vec<BitMember>,
    },
    /// binary (base64)
    Binary {
        /// Length restriction on the decoded octets
        #[serde(default, skip_serializing_if = "Option::is_none")]
        length: Option<RangeRestriction>,
    },
    /// identityref
    #[serde(rename = "identityref")]
    IdentityRef {
        /// Base identities as `prefix:name`
        bases: Vec<String>,
    },
    /// leafref
    #[serde(rename = "leafref")]
    LeafRef {
        /// Path expression to the referenced leaf
        path: String,
        /// `require-instance`
        #[serde(default = "default_true")]
        require_instance: bool,
    },
    /// instance-identifier
    InstanceIdentifier {
        /// `require-instance`
        #[serde(default = "default_true")]
        require_instance: bool,
    },
    /// union
    Union {
        /// Member types in declaration order
        members: Vec<LeafType>,
    },
}

fn default_true() -> bool {
    true
}

impl LeafType {
    /// Unrestricted string
    #[must_use]
    pub fn string() -> Self {
        LeafType::String {
            length: None,
            patterns: Vec::new(),
        }
    }

    /// Unrestricted integer of the given kind
    #[must_use]
    pub fn integer(kind: IntegerKind) -> Self {
        LeafType::Integer { kind, range: None }
    }

    /// Integer of the given kind with a range
    pub fn ranged(kind: IntegerKind, range: impl Into<String>) -> Self {
        LeafType::Integer {
            kind,
            range: Some(RangeRestriction::new(range)),
        }
    }

    /// Enumeration from names, values assigned in order from zero
    #[must_use]
    pub fn enumeration(names: &[&str]) -> Self {
        LeafType::Enumeration {
            members: names
                .iter()
                .zip(0..)
                .map(|(name, value)| EnumMember {
                    name: (*name).to_string(),
                    value,
                })
                .collect(),
        }
    }

    /// Bits from names, positions assigned in order from zero
    #[must_use]
    pub fn bits(names: &[&str]) -> Self {
        LeafType::Bits {
            members: names
                .iter()
                .zip(0..)
                .map(|(name, position)| BitMember {
                    name: (*name).to_string(),
                    position,
                })
                .collect(),
        }
    }

    /// leafref with `require-instance true`
    pub fn leafref(path: impl Into<String>) -> Self {
        LeafType::LeafRef {
            path: path.into(),
            require_instance: true,
        }
    }

    /// Short name used in diagnostics
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            LeafType::Integer { kind, .. } => kind.name(),
            LeafType::Decimal64 { .. } => "decimal64",
            LeafType::String { .. } => "string",
            LeafType::Boolean => "boolean",
            LeafType::Empty => "empty",
            LeafType::Enumeration { .. } => "enumeration",
            LeafType::Bits { .. } => "bits",
            LeafType::Binary { .. } => "binary",
            LeafType::IdentityRef { .. } => "identityref",
            LeafType::LeafRef { .. } => "leafref",
            LeafType::InstanceIdentifier { .. } => "instance-identifier",
            LeafType::Union { .. } => "union",
        }
    }

    /// Whether values compare numerically when ordering instances
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, LeafType::Integer { .. } | LeafType::Decimal64 { .. })
    }

    /// Whether the type, or any union member, is a reference type
    #[must_use]
    pub fn has_references(&self) -> bool {
        match self {
            LeafType::LeafRef { .. } | LeafType::InstanceIdentifier { .. } => true,
            LeafType::Union { members } => members.iter().any(LeafType::has_references),
            _ => false,
        }
    }
}

/// Kind specific part of a schema node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SchemaNodeKind {
    /// container
    Container {
        /// Presence container
        presence: bool,
        /// Label of the schema mount point declared on this container
        mount_point: Option<String>,
    },
    /// list
    List {
        /// Key leaves in declaration order
        keys: Vec<QName>,
        /// min-elements
        min_elements: u32,
        /// max-elements, `None` is unbounded
        max_elements: Option<u32>,
        /// ordered-by
        ordered_by: OrderedBy,
        /// unique statements
        unique: Vec<UniqueConstraint>,
    },
    /// leaf
    Leaf {
        /// Resolved type
        leaf_type: LeafType,
        /// mandatory true
        mandatory: bool,
        /// default value
        default: Option<String>,
    },
    /// leaf-list
    LeafList {
        /// Resolved type
        leaf_type: LeafType,
        /// min-elements
        min_elements: u32,
        /// max-elements, `None` is unbounded
        max_elements: Option<u32>,
        /// ordered-by
        ordered_by: OrderedBy,
        /// default values
        defaults: Vec<String>,
    },
    /// choice
    Choice {
        /// mandatory true
        mandatory: bool,
        /// Default case name
        default_case: Option<QName>,
    },
    /// case
    Case,
    /// anydata / anyxml
    Anydata,
    /// rpc
    Rpc,
    /// action
    Action,
    /// rpc or action input
    Input,
    /// rpc or action output
    Output,
}

/// Compiled, immutable schema node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    /// Path from the schema root
    pub path: SchemaPath,
    /// Qualified name
    pub qname: QName,
    /// Kind specific data
    pub kind: SchemaNodeKind,
    /// `config` flag
    pub config: bool,
    /// must statements in declaration order
    pub must: Vec<MustConstraint>,
    /// when statements
    pub when: Vec<WhenConstraint>,
    /// Child names in declaration order, choices and cases included
    pub children: Vec<QName>,
}

impl SchemaNode {
    /// Local name of the node
    #[must_use]
    pub fn name(&self) -> &str {
        self.qname.local()
    }

    /// Whether instances of this node exist in the data tree
    #[must_use]
    pub fn is_data_node(&self) -> bool {
        matches!(
            self.kind,
            SchemaNodeKind::Container { .. }
                | SchemaNodeKind::List { .. }
                | SchemaNodeKind::Leaf { .. }
                | SchemaNodeKind::LeafList { .. }
                | SchemaNodeKind::Anydata
        )
    }

    /// Whether this is a choice or case node
    #[must_use]
    pub fn is_choice_or_case(&self) -> bool {
        matches!(self.kind, SchemaNodeKind::Choice { .. } | SchemaNodeKind::Case)
    }

    /// Whether the node can have many instances under one parent
    #[must_use]
    pub fn is_multi_instance(&self) -> bool {
        matches!(
            self.kind,
            SchemaNodeKind::List { .. } | SchemaNodeKind::LeafList { .. }
        )
    }

    /// Type of a leaf or leaf-list
    #[must_use]
    pub fn leaf_type(&self) -> Option<&LeafType> {
        match &self.kind {
            SchemaNodeKind::Leaf { leaf_type, .. } | SchemaNodeKind::LeafList { leaf_type, .. } => {
                Some(leaf_type)
            }
            _ => None,
        }
    }

    /// Keys of a list
    #[must_use]
    pub fn list_keys(&self) -> &[QName] {
        match &self.kind {
            SchemaNodeKind::List { keys, .. } => keys,
            _ => &[],
        }
    }

    /// Whether `name` is a key of this list
    #[must_use]
    pub fn is_key(&self, name: &QName) -> bool {
        self.list_keys().contains(name)
    }

    /// `(min-elements, max-elements)` for lists and leaf-lists
    #[must_use]
    pub fn cardinality(&self) -> Option<(u32, Option<u32>)> {
        match &self.kind {
            SchemaNodeKind::List {
                min_elements,
                max_elements,
                ..
            }
            | SchemaNodeKind::LeafList {
                min_elements,
                max_elements,
                ..
            } => Some((*min_elements, *max_elements)),
            _ => None,
        }
    }

    /// ordered-by of a list or leaf-list
    #[must_use]
    pub fn ordered_by(&self) -> OrderedBy {
        match &self.kind {
            SchemaNodeKind::List { ordered_by, .. } | SchemaNodeKind::LeafList { ordered_by, .. } => {
                *ordered_by
            }
            _ => OrderedBy::System,
        }
    }

    /// Whether this is a presence container
    #[must_use]
    pub fn is_presence(&self) -> bool {
        matches!(self.kind, SchemaNodeKind::Container { presence: true, .. })
    }

    /// Mount point label, if the node is a mount point
    #[must_use]
    pub fn mount_point(&self) -> Option<&str> {
        match &self.kind {
            SchemaNodeKind::Container { mount_point, .. } => mount_point.as_deref(),
            _ => None,
        }
    }

    /// Keyword naming the node kind
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            SchemaNodeKind::Container { .. } => "container",
            SchemaNodeKind::List { .. } => "list",
            SchemaNodeKind::Leaf { .. } => "leaf",
            SchemaNodeKind::LeafList { .. } => "leaf-list",
            SchemaNodeKind::Choice { .. } => "choice",
            SchemaNodeKind::Case => "case",
            SchemaNodeKind::Anydata => "anydata",
            SchemaNodeKind::Rpc => "rpc",
            SchemaNodeKind::Action => "action",
            SchemaNodeKind::Input => "input",
            SchemaNodeKind::Output => "output",
        }
    }
}

impl fmt::Display for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind_name(), self.path)
    }
}
