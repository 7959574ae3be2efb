//! Element type: a typed record with an open property bag.

use reqgraph_schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Property bag. Keys the schema does not declare are kept as-is.
pub type Properties = serde_json::Map<String, Value>;

/// Containment owner of an element: the owning element and the feature
/// the element is nested under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub feature: String,
}

/// One element of a project graph.
///
/// `owner` and `contents` are maintained by [`crate::Graph`]; callers change
/// containment through the graph, never by editing these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub properties: Properties,
    /// Contained element ids per containment feature, in document order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contents: BTreeMap<String, Vec<String>>,
}

impl Element {
    pub fn new(id: impl Into<String>, element_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            element_type: element_type.into(),
            owner: None,
            properties: Properties::new(),
            contents: BTreeMap::new(),
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn string_property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner.as_ref().map(|owner| owner.id.as_str())
    }

    /// Direct children across all containment features.
    pub fn children(&self) -> impl Iterator<Item = &str> {
        self.contents
            .values()
            .flat_map(|ids| ids.iter().map(String::as_str))
    }

    pub fn has_children(&self) -> bool {
        self.contents.values().any(|ids| !ids.is_empty())
    }
}

/// A weak reference held by an element property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationValue<'a> {
    pub property: &'a str,
    pub target: &'a str,
}

/// Relation values of `element`: every id held by an attribute the schema
/// declares as `reference` or `reference-list`.
///
/// Properties unknown to the schema are never treated as references.
pub fn relation_values<'a>(schema: &'a Schema, element: &'a Element) -> Vec<RelationValue<'a>> {
    let Some(attributes) = schema.attributes_of(&element.element_type) else {
        return Vec::new();
    };
    let mut values = Vec::new();
    for attribute in attributes.iter().filter(|a| a.kind.is_reference()) {
        if let Some(value) = element.properties.get(&attribute.name) {
            for target in attribute.referenced_ids(value) {
                values.push(RelationValue {
                    property: attribute.name.as_str(),
                    target,
                });
            }
        }
    }
    values
}
