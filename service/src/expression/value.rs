//! XPath 1.0 values and conversions over the data tree

use super::ast::BinaryOp;
use std::cmp::Ordering;
use yang_core::data::{DataNodeKind, DataTree, NodeId};

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue {
    /// boolean
    Boolean(bool),
    /// number
    Number(f64),
    /// string
    String(String),
    /// node-set in document order without duplicates
    NodeSet(Vec<NodeId>),
}

impl XPathValue {
    /// Empty node-set
    #[must_use]
    pub fn empty() -> Self {
        XPathValue::NodeSet(Vec::new())
    }

    /// Type name used in diagnostics
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            XPathValue::Boolean(_) => "boolean",
            XPathValue::Number(_) => "number",
            XPathValue::String(_) => "string",
            XPathValue::NodeSet(_) => "node-set",
        }
    }

    /// `boolean()` conversion
    #[must_use]
    pub fn to_boolean(&self) -> bool {
        match self {
            XPathValue::Boolean(b) => *b,
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::String(s) => !s.is_empty(),
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
        }
    }

    /// `number()` conversion
    #[must_use]
    pub fn to_number(&self, tree: &DataTree) -> f64 {
        match self {
            XPathValue::Boolean(b) => f64::from(u8::from(*b)),
            XPathValue::Number(n) => *n,
            XPathValue::String(s) => string_to_number(s),
            XPathValue::NodeSet(_) => string_to_number(&self.to_string_value(tree)),
        }
    }

    /// `string()` conversion
    #[must_use]
    pub fn to_string_value(&self, tree: &DataTree) -> String {
        match self {
            XPathValue::Boolean(b) => b.to_string(),
            XPathValue::Number(n) => number_to_string(*n),
            XPathValue::String(s) => s.clone(),
            XPathValue::NodeSet(nodes) => nodes
                .first()
                .map(|node| string_value(tree, *node))
                .unwrap_or_default(),
        }
    }

    /// Node-set contents, `None` for other types
    #[must_use]
    pub fn as_node_set(&self) -> Option<&[NodeId]> {
        match self {
            XPathValue::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }
}

/// String-value of a node: its value, or the concatenated values of its
/// descendants for interior nodes
#[must_use]
pub fn string_value(tree: &DataTree, node: NodeId) -> String {
    let Some(data) = tree.get(node) else {
        return String::new();
    };
    match data.kind {
        DataNodeKind::Leaf | DataNodeKind::LeafListEntry | DataNodeKind::Anydata => {
            data.value.clone().unwrap_or_default()
        }
        _ => tree
            .descendants(node)
            .into_iter()
            .filter_map(|id| tree.value(id))
            .collect(),
    }
}

/// Strict XPath number syntax, `NaN` otherwise
#[must_use]
pub fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim();
    let unsigned = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = !unsigned.is_empty()
        && unsigned.chars().all(|c| c.is_ascii_digit() || c == '.')
        && unsigned.chars().filter(|c| *c == '.').count() <= 1
        && unsigned != ".";
    if !valid {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

/// XPath number to string conversion
#[must_use]
pub fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        return format!("{}", value as i64);
    }
    format!("{value}")
}

fn compare_numbers(op: BinaryOp, left: f64, right: f64) -> bool {
    match op {
        BinaryOp::Equal => left == right,
        BinaryOp::NotEqual => left != right,
        BinaryOp::Less => left < right,
        BinaryOp::LessOrEqual => left <= right,
        BinaryOp::Greater => left > right,
        BinaryOp::GreaterOrEqual => left >= right,
        _ => false,
    }
}

fn compare_strings(op: BinaryOp, left: &str, right: &str) -> bool {
    match op {
        BinaryOp::Equal => left == right,
        BinaryOp::NotEqual => left != right,
        _ => compare_numbers(op, string_to_number(left), string_to_number(right)),
    }
}

fn compare_booleans(op: BinaryOp, left: bool, right: bool) -> bool {
    match op {
        BinaryOp::Equal => left == right,
        BinaryOp::NotEqual => left != right,
        _ => compare_numbers(op, f64::from(u8::from(left)), f64::from(u8::from(right))),
    }
}

fn mirror(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Less => BinaryOp::Greater,
        BinaryOp::LessOrEqual => BinaryOp::GreaterOrEqual,
        BinaryOp::Greater => BinaryOp::Less,
        BinaryOp::GreaterOrEqual => BinaryOp::LessOrEqual,
        other => other,
    }
}

/// Comparison of two values following XPath 1.0 section 3.4
#[must_use]
pub fn compare(op: BinaryOp, left: &XPathValue, right: &XPathValue, tree: &DataTree) -> bool {
    use XPathValue::{Boolean, NodeSet, Number, String as Str};
    match (left, right) {
        (NodeSet(a), NodeSet(b)) => {
            let right_values: Vec<String> = b.iter().map(|n| string_value(tree, *n)).collect();
            a.iter().any(|n| {
                let value = string_value(tree, *n);
                right_values.iter().any(|other| compare_strings(op, &value, other))
            })
        }
        (NodeSet(nodes), other) => compare_node_set(op, nodes, other, tree),
        (other, NodeSet(nodes)) => compare_node_set(mirror(op), nodes, other, tree),
        _ if matches!(op, BinaryOp::Equal | BinaryOp::NotEqual) => match (left, right) {
            (Boolean(_), _) | (_, Boolean(_)) => {
                compare_booleans(op, left.to_boolean(), right.to_boolean())
            }
            (Number(_), _) | (_, Number(_)) => {
                compare_numbers(op, left.to_number(tree), right.to_number(tree))
            }
            (Str(a), Str(b)) => compare_strings(op, a, b),
            _ => false,
        },
        _ => compare_numbers(op, left.to_number(tree), right.to_number(tree)),
    }
}

fn compare_node_set(op: BinaryOp, nodes: &[NodeId], other: &XPathValue, tree: &DataTree) -> bool {
    match other {
        XPathValue::Boolean(b) => compare_booleans(op, !nodes.is_empty(), *b),
        XPathValue::Number(n) => nodes
            .iter()
            .any(|node| compare_numbers(op, string_to_number(&string_value(tree, *node)), *n)),
        XPathValue::String(s) => nodes
            .iter()
            .any(|node| compare_strings(op, &string_value(tree, *node), s)),
        XPathValue::NodeSet(_) => false,
    }
}

/// Total order used to sort numbers that may be `NaN`
#[must_use]
pub fn number_order(left: f64, right: f64) -> Ordering {
    left.partial_cmp(&right).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_core::data::{DataNode, Placement};
    use yang_core::types::{QName, SchemaPath};

    fn tree_with_values(values: &[&str]) -> (DataTree, Vec<NodeId>) {
        let mut tree = DataTree::new();
        let root = tree.root();
        let ids = values
            .iter()
            .map(|v| {
                tree.insert_child(
                    root,
                    DataNode::leaf_list_entry(QName::new("urn:t", "ll"), SchemaPath::root(), *v),
                    Placement::Last,
                )
                .unwrap()
            })
            .collect();
        (tree, ids)
    }

    #[test]
    fn test_number_conversions() {
        assert_eq!(string_to_number(" 42 "), 42.0);
        assert_eq!(string_to_number("-1.5"), -1.5);
        assert!(string_to_number("1e3").is_nan());
        assert!(string_to_number("").is_nan());
        assert_eq!(number_to_string(3.0), "3");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.5), "0.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
    }

    #[test]
    fn test_node_set_comparisons_are_existential() {
        let (tree, ids) = tree_with_values(&["1", "5"]);
        let set = XPathValue::NodeSet(ids);
        assert!(compare(BinaryOp::Equal, &set, &XPathValue::Number(5.0), &tree));
        assert!(compare(BinaryOp::NotEqual, &set, &XPathValue::Number(5.0), &tree));
        assert!(compare(BinaryOp::Less, &XPathValue::Number(2.0), &set, &tree));
        assert!(!compare(BinaryOp::Greater, &set, &XPathValue::Number(5.0), &tree));
        assert!(compare(BinaryOp::Equal, &set, &XPathValue::String("1".into()), &tree));
    }

    #[test]
    fn test_empty_node_set_is_false_for_every_comparison() {
        let tree = DataTree::new();
        let empty = XPathValue::empty();
        assert!(!compare(BinaryOp::Equal, &empty, &XPathValue::String(String::new()), &tree));
        assert!(!compare(BinaryOp::NotEqual, &empty, &XPathValue::String(String::new()), &tree));
        assert!(compare(BinaryOp::Equal, &empty, &XPathValue::Boolean(false), &tree));
    }

    #[test]
    fn test_scalar_comparisons() {
        let tree = DataTree::new();
        let yes = XPathValue::Boolean(true);
        let text = XPathValue::String("x".into());
        assert!(compare(BinaryOp::Equal, &yes, &text, &tree));
        assert!(compare(
            BinaryOp::Equal,
            &XPathValue::Number(1.0),
            &XPathValue::String("1.0".into()),
            &tree
        ));
    }
}
