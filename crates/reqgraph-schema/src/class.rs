//! Schema classes and their flattened lookup tables.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Value kind of a schema attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributeKind {
    String,
    Integer,
    Real,
    Boolean,
    /// Weak reference: the id of another element.
    Reference,
    /// List of element ids.
    ReferenceList,
    Any,
}

impl AttributeKind {
    /// Whether this attribute holds element ids.
    pub fn is_reference(&self) -> bool {
        matches!(self, AttributeKind::Reference | AttributeKind::ReferenceList)
    }

    /// Whether `value` is an acceptable payload for this kind.
    ///
    /// `null` is accepted for every kind; it is the removal marker on patch
    /// and is otherwise stored verbatim.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (AttributeKind::Any, _) => true,
            (AttributeKind::String | AttributeKind::Reference, Value::String(_)) => true,
            (AttributeKind::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (AttributeKind::Real, Value::Number(_)) => true,
            (AttributeKind::Boolean, Value::Bool(_)) => true,
            (AttributeKind::ReferenceList, Value::Array(items)) => {
                items.iter().all(|item| item.is_string())
            }
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::String => "string",
            AttributeKind::Integer => "integer",
            AttributeKind::Real => "real",
            AttributeKind::Boolean => "boolean",
            AttributeKind::Reference => "reference",
            AttributeKind::ReferenceList => "reference-list",
            AttributeKind::Any => "any",
        }
    }
}

/// One attribute declared by a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: AttributeKind,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

impl AttributeDescriptor {
    /// Element ids held by `value`, if this attribute is a relation value.
    pub fn referenced_ids<'a>(&self, value: &'a Value) -> Vec<&'a str> {
        match (self.kind, value) {
            (AttributeKind::Reference, Value::String(id)) => vec![id.as_str()],
            (AttributeKind::ReferenceList, Value::Array(items)) => {
                items.iter().filter_map(Value::as_str).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// A strong-ownership feature: elements nested under `name` must conform
/// to class `accepts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainmentFeature {
    pub name: String,
    pub accepts: String,
}

/// A resolved schema class.
///
/// The `own_*` fields mirror the schema source; the flattened tables are
/// computed once by the registry and cover the full supertype closure.
#[derive(Debug, Clone)]
pub struct SchemaClass {
    pub name: String,
    pub direct_supertypes: Vec<String>,
    pub own_attributes: Vec<AttributeDescriptor>,
    pub own_containment: Vec<ContainmentFeature>,
    pub(crate) all_supertypes: Vec<String>,
    pub(crate) supertype_set: HashSet<String>,
    pub(crate) all_attributes: Vec<AttributeDescriptor>,
    pub(crate) attribute_index: HashMap<String, usize>,
    pub(crate) all_containment: Vec<ContainmentFeature>,
}

impl SchemaClass {
    /// Transitive supertypes, nearest first. Does not include `self`.
    pub fn supertypes(&self) -> &[String] {
        &self.all_supertypes
    }

    /// Own and inherited attributes. Own declarations shadow inherited ones.
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.all_attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attribute_index
            .get(name)
            .map(|&idx| &self.all_attributes[idx])
    }

    /// Own containment features first, then inherited in supertype order.
    pub fn containment_features(&self) -> &[ContainmentFeature] {
        &self.all_containment
    }

    /// Reflexive subtype check.
    pub fn conforms_to(&self, ancestor: &str) -> bool {
        self.name == ancestor || self.supertype_set.contains(ancestor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_kind_rejects_fractions() {
        assert!(AttributeKind::Integer.accepts(&json!(3)));
        assert!(!AttributeKind::Integer.accepts(&json!(3.5)));
        assert!(AttributeKind::Real.accepts(&json!(3)));
    }

    #[test]
    fn reference_list_requires_string_items() {
        assert!(AttributeKind::ReferenceList.accepts(&json!(["a", "b"])));
        assert!(!AttributeKind::ReferenceList.accepts(&json!(["a", 1])));
        assert!(AttributeKind::ReferenceList.accepts(&Value::Null));
    }

    #[test]
    fn referenced_ids_reads_both_reference_kinds() {
        let single = AttributeDescriptor {
            name: "target".to_string(),
            kind: AttributeKind::Reference,
            required: false,
        };
        let many = AttributeDescriptor {
            name: "exposed".to_string(),
            kind: AttributeKind::ReferenceList,
            required: false,
        };
        assert_eq!(single.referenced_ids(&json!("R1")), vec!["R1"]);
        assert_eq!(many.referenced_ids(&json!(["R1", "R2"])), vec!["R1", "R2"]);
        assert!(single.referenced_ids(&json!(7)).is_empty());
    }
}
