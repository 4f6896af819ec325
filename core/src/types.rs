//! Identifier types shared by the schema model and the data tree

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Qualified name of a schema or data node: namespace URI plus local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    /// Namespace URI of the defining module
    pub namespace: Arc<str>,
    /// Local name
    pub local_name: Arc<str>,
}

impl QName {
    /// Create a new qualified name
    pub fn new(namespace: impl Into<Arc<str>>, local_name: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
        }
    }

    /// Local name of this qualified name
    #[must_use]
    pub fn local(&self) -> &str {
        &self.local_name
    }

    /// Create a sibling name in the same namespace
    #[must_use]
    pub fn sibling(&self, local_name: &str) -> Self {
        Self {
            namespace: Arc::clone(&self.namespace),
            local_name: Arc::from(local_name),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}", self.namespace, self.local_name)
    }
}

/// Identification of a loaded module
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleIdentifier {
    /// Module name
    pub name: String,
    /// Namespace URI
    pub namespace: String,
    /// Revision date, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl fmt::Display for ModuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(revision) => write!(f, "{}@{}", self.name, revision),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Path of a schema node from the schema root
///
/// Choice and case nodes are part of the path even though they have no
/// data instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaPath {
    segments: Vec<QName>,
}

impl SchemaPath {
    /// The schema root
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from its segments
    #[must_use]
    pub fn from_segments(segments: Vec<QName>) -> Self {
        Self { segments }
    }

    /// Compose this path with a child name
    #[must_use]
    pub fn child(&self, name: QName) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(name);
        Self { segments }
    }

    /// Parent path, `None` for the root
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Last segment, `None` for the root
    #[must_use]
    pub fn last(&self) -> Option<&QName> {
        self.segments.last()
    }

    /// All segments from the root
    #[must_use]
    pub fn segments(&self) -> &[QName] {
        &self.segments
    }

    /// Whether this is the schema root
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the path has no segments
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether `self` is a proper or improper prefix of `other`
    #[must_use]
    pub fn contains(&self, other: &SchemaPath) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment.local_name)?;
        }
        Ok(())
    }
}

/// One step of an instance path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    /// Prefix registered for the segment's namespace
    pub prefix: String,
    /// Namespace URI
    pub namespace: String,
    /// Local name
    pub name: String,
    /// Key predicates for list entries, in key declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<KeyPredicate>,
    /// Value predicate for a leaf-list entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// `[prefix:name='value']` predicate of a list entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPredicate {
    /// Prefix of the key leaf
    pub prefix: String,
    /// Local name of the key leaf
    pub name: String,
    /// Key value
    pub value: String,
}

/// Instance identifier of a data node, rendered with registered prefixes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstancePath {
    segments: Vec<PathSegment>,
}

impl InstancePath {
    /// The datastore root
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from its segments
    #[must_use]
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Append a segment
    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    /// Path extended with a plain child segment
    #[must_use]
    pub fn child(&self, prefix: &str, namespace: &str, name: &str) -> Self {
        let mut path = self.clone();
        path.push(PathSegment {
            prefix: prefix.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            keys: Vec::new(),
            value: None,
        });
        path
    }

    /// All segments
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Prefix to namespace map of every namespace crossed by the path
    #[must_use]
    pub fn namespaces(&self) -> IndexMap<String, String> {
        let mut namespaces = IndexMap::new();
        for segment in &self.segments {
            namespaces
                .entry(segment.prefix.clone())
                .or_insert_with(|| segment.namespace.clone());
        }
        namespaces
    }
}

fn quote(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{value}\"")
    } else {
        format!("'{value}'")
    }
}

impl fmt::Display for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{}:{}", segment.prefix, segment.name)?;
            for key in &segment.keys {
                write!(f, "[{}:{}={}]", key.prefix, key.name, quote(&key.value))?;
            }
            if let Some(value) = &segment.value {
                write!(f, "[.={}]", quote(value))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NS: &str = "urn:org:bbf:pma:validation";

    #[test]
    fn test_schema_path_composition() {
        let root = SchemaPath::root();
        let container = root.child(QName::new(NS, "validation"));
        let leaf = container.child(QName::new(NS, "leaf1"));

        assert_eq!(leaf.len(), 2);
        assert_eq!(leaf.parent(), Some(container.clone()));
        assert!(container.contains(&leaf));
        assert!(!leaf.contains(&container));
        assert_eq!(leaf.to_string(), "/validation/leaf1");
        assert_eq!(root.to_string(), "/");
    }

    #[test]
    fn test_instance_path_rendering() {
        let mut path = InstancePath::root().child("validation", NS, "validation");
        path.push(PathSegment {
            prefix: "validation".to_string(),
            namespace: NS.to_string(),
            name: "list1".to_string(),
            keys: vec![KeyPredicate {
                prefix: "validation".to_string(),
                name: "id".to_string(),
                value: "it's".to_string(),
            }],
            value: None,
        });

        assert_eq!(
            path.to_string(),
            "/validation:validation/validation:list1[validation:id=\"it's\"]"
        );
        assert_eq!(path.namespaces().len(), 1);
        assert_eq!(path.namespaces().get("validation").map(String::as_str), Some(NS));
    }
}
