//! Universal element service: generic CRUD over any schema type.
//!
//! Every operation validates against the schema registry first and then
//! runs as one lock-scoped store mutation, so a rejected request never
//! touches durable state.

use crate::element::{Element, Owner, Properties, relation_values};
use crate::error::ElementError;
use crate::graph::Graph;
use crate::store::ElementStore;
use reqgraph_schema::{Schema, SchemaClass};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Property naming the containment owner of an element.
pub const OWNER_FIELD: &str = "owner";

/// Root class of relation elements; their `(type, source, target)` tuple is
/// unique within a project.
pub const RELATIONSHIP_CLASS: &str = "Relationship";

const ID_FIELDS: &[&str] = &["id", "@id"];
const TYPE_FIELDS: &[&str] = &["type", "@type"];
const SOURCE_FIELD: &str = "source";
const TARGET_FIELD: &str = "target";

/// How `delete_with` treats contained children and incoming references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletePolicy {
    /// Remove the whole containment subtree instead of refusing.
    pub cascade: bool,
    /// Skip the incoming-reference check; references may dangle afterwards.
    pub force: bool,
}

impl DeletePolicy {
    pub fn restrict() -> Self {
        Self::default()
    }

    pub fn cascade() -> Self {
        Self {
            cascade: true,
            force: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// A validated create request, ready to be placed into a graph.
#[derive(Debug)]
pub(crate) struct Draft {
    element_type: String,
    id: Option<String>,
    owner: Option<String>,
    properties: Properties,
}

/// Generic element operations over an [`ElementStore`].
#[derive(Debug, Clone)]
pub struct ElementService {
    store: Arc<ElementStore>,
}

impl ElementService {
    pub fn new(store: Arc<ElementStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ElementStore {
        &self.store
    }

    pub fn schema(&self) -> &Schema {
        self.store.schema()
    }

    /// Create an element of `element_type`.
    ///
    /// `id` is taken from the properties when present, otherwise generated.
    /// A string `owner` nests the element under the owner's containment
    /// feature that accepts its type.
    pub fn create(
        &self,
        project: &str,
        element_type: &str,
        properties: Properties,
    ) -> Result<Element, ElementError> {
        let draft = self.prepare_create(element_type, properties)?;
        let element = self
            .store
            .mutate_project(project, |graph| {
                let element = self.insert_draft(graph, draft)?;
                Ok::<_, ElementError>((element, true))
            })?;
        tracing::info!(project, id = %element.id, element_type, "element created");
        Ok(element)
    }

    pub fn get(&self, project: &str, id: &str) -> Result<Element, ElementError> {
        self.store
            .read_project(project, |graph| graph.get(id).cloned())?
            .ok_or_else(|| ElementError::NotFound(format!("element `{id}` in project `{project}`")))
    }

    /// All elements of the project, top-level and contained, depth-first in
    /// document order. `type_filter` keeps only elements of exactly that type.
    pub fn query(
        &self,
        project: &str,
        type_filter: Option<&str>,
    ) -> Result<Vec<Element>, ElementError> {
        if let Some(element_type) = type_filter
            && !self.schema().is_valid_type(element_type)
        {
            return Err(ElementError::invalid(format!(
                "unknown element type `{element_type}`"
            )));
        }
        let elements = self.store.read_project(project, |graph| {
            graph
                .iter()
                .filter(|element| type_filter.is_none_or(|t| element.element_type == t))
                .cloned()
                .collect()
        })?;
        Ok(elements)
    }

    /// Consistent copy of every element, for validation and query passes.
    pub fn snapshot(&self, project: &str) -> Result<Vec<Element>, ElementError> {
        self.query(project, None)
    }

    /// Snapshot plus its content digest (see [`Graph::snapshot_ref`]), both
    /// taken under one read guard.
    pub fn snapshot_with_ref(
        &self,
        project: &str,
    ) -> Result<(Vec<Element>, String), ElementError> {
        let pair = self.store.read_project(project, |graph| {
            (graph.iter().cloned().collect(), graph.snapshot_ref())
        })?;
        Ok(pair)
    }

    /// Merge `patch` into the element's property bag.
    ///
    /// `null` removes a key. An `owner` key moves the element (`null` moves
    /// it to top level); without one the containment position is kept.
    pub fn patch(
        &self,
        project: &str,
        id: &str,
        mut patch: Properties,
    ) -> Result<Element, ElementError> {
        if let Some(requested) = take_id(&mut patch)?
            && requested != id
        {
            return Err(ElementError::invalid(format!(
                "element ids are immutable (`{id}` cannot become `{requested}`)"
            )));
        }
        let declared_types: Vec<Value> = TYPE_FIELDS
            .iter()
            .filter_map(|key| patch.remove(*key))
            .collect();
        let owner_change = take_owner(&mut patch)?;

        let element = self.store.mutate_project(project, |graph| {
            let current = graph.get(id).ok_or_else(|| {
                ElementError::NotFound(format!("element `{id}` in project `{project}`"))
            })?;
            let element_type = current.element_type.clone();
            if declared_types
                .iter()
                .any(|declared| declared.as_str() != Some(element_type.as_str()))
            {
                return Err(ElementError::invalid(format!(
                    "element type is immutable (`{id}` is a {element_type})"
                )));
            }
            let class = self.schema().class(&element_type).ok_or_else(|| {
                ElementError::invalid(format!(
                    "element `{id}` has type `{element_type}` unknown to the loaded schema"
                ))
            })?;

            let mut merged = current.properties.clone();
            for (key, value) in patch {
                if value.is_null() {
                    merged.remove(&key);
                } else {
                    merged.insert(key, value);
                }
            }
            check_property_bag(class, &merged)?;
            self.check_relation_tuple(graph, &element_type, &merged, Some(id))?;

            let current_owner = current.owner_id().map(str::to_string);
            let mut changed = merged != current.properties;

            if let Some(target) = owner_change
                && target != current_owner
            {
                let owner = match target {
                    Some(owner_id) => Some(self.resolve_owner(graph, &owner_id, &element_type)?),
                    None => None,
                };
                graph.reparent(id, owner)?;
                changed = true;
            }

            if let Some(properties) = graph.properties_mut(id) {
                *properties = merged;
            }
            let updated = graph
                .get(id)
                .cloned()
                .ok_or_else(|| ElementError::NotFound(format!("element `{id}`")))?;
            Ok::<_, ElementError>((updated, changed))
        })?;
        tracing::info!(project, id, "element patched");
        Ok(element)
    }

    /// Delete under [`DeletePolicy::restrict`].
    pub fn delete(&self, project: &str, id: &str) -> Result<bool, ElementError> {
        self.delete_with(project, id, DeletePolicy::restrict())
    }

    /// Remove an element from whichever container holds it.
    ///
    /// Without `cascade`, an element that still owns children is not
    /// deleted. Without `force`, an element (or, with `cascade`, any element
    /// of its subtree) referenced from outside the deleted set is not
    /// deleted either. Removed ids are retired.
    pub fn delete_with(
        &self,
        project: &str,
        id: &str,
        policy: DeletePolicy,
    ) -> Result<bool, ElementError> {
        let removed = self.store.mutate_project(project, |graph| {
            let element = graph.get(id).ok_or_else(|| {
                ElementError::NotFound(format!("element `{id}` in project `{project}`"))
            })?;

            let doomed = if element.has_children() {
                if !policy.cascade {
                    return Err(ElementError::ReferentialIntegrity(format!(
                        "element `{id}` owns {} contained element(s); delete them first or cascade",
                        element.children().count()
                    )));
                }
                graph.subtree_ids(id)
            } else {
                vec![id.to_string()]
            };

            if !policy.force {
                let doomed_set: HashSet<&str> = doomed.iter().map(String::as_str).collect();
                for other in graph
                    .iter()
                    .filter(|other| !doomed_set.contains(other.id.as_str()))
                {
                    if let Some(reference) = relation_values(self.schema(), other)
                        .into_iter()
                        .find(|reference| doomed_set.contains(reference.target))
                    {
                        return Err(ElementError::ReferentialIntegrity(format!(
                            "element `{}` is still referenced by `{}` via `{}`",
                            reference.target, other.id, reference.property
                        )));
                    }
                }
            }

            let removed = graph.remove_subtree(id)?;
            Ok::<_, ElementError>((removed.len(), true))
        })?;
        tracing::info!(project, id, removed, "element deleted");
        Ok(true)
    }

    pub(crate) fn prepare_create(
        &self,
        element_type: &str,
        mut properties: Properties,
    ) -> Result<Draft, ElementError> {
        let class = self.schema().class(element_type).ok_or_else(|| {
            ElementError::invalid(format!("unknown element type `{element_type}`"))
        })?;

        let id = take_id(&mut properties)?;
        for key in TYPE_FIELDS {
            if let Some(declared) = properties.remove(*key)
                && declared.as_str() != Some(element_type)
            {
                return Err(ElementError::invalid(format!(
                    "`{key}` = {declared} contradicts element type `{element_type}`"
                )));
            }
        }
        let owner = take_owner(&mut properties)?.flatten();
        check_property_bag(class, &properties)?;

        Ok(Draft {
            element_type: element_type.to_string(),
            id,
            owner,
            properties,
        })
    }

    pub(crate) fn insert_draft(
        &self,
        graph: &mut Graph,
        draft: Draft,
    ) -> Result<Element, ElementError> {
        let id = match draft.id {
            Some(id) if graph.contains(&id) => {
                return Err(ElementError::Conflict(format!(
                    "element id `{id}` already exists in this project"
                )));
            }
            Some(id) if graph.is_retired(&id) => {
                return Err(ElementError::Conflict(format!(
                    "element id `{id}` belonged to a deleted element and cannot be reused"
                )));
            }
            Some(id) => id,
            None => generate_id(graph),
        };

        let owner = match &draft.owner {
            Some(owner_id) => Some(self.resolve_owner(graph, owner_id, &draft.element_type)?),
            None => None,
        };
        self.check_relation_tuple(graph, &draft.element_type, &draft.properties, None)?;

        let element = Element::new(id.clone(), draft.element_type).with_properties(draft.properties);
        graph.insert(element, owner)?;
        graph
            .get(&id)
            .cloned()
            .ok_or_else(|| ElementError::NotFound(format!("element `{id}`")))
    }

    fn resolve_owner(
        &self,
        graph: &Graph,
        owner_id: &str,
        child_type: &str,
    ) -> Result<Owner, ElementError> {
        let owner = graph
            .get(owner_id)
            .ok_or_else(|| ElementError::NotFound(format!("owner element `{owner_id}`")))?;
        let feature = self
            .schema()
            .containment_feature_for(&owner.element_type, child_type)
            .ok_or_else(|| {
                ElementError::invalid(format!(
                    "{} `{owner_id}` has no containment feature accepting {child_type}",
                    owner.element_type
                ))
            })?;
        Ok(Owner {
            id: owner_id.to_string(),
            feature: feature.name.clone(),
        })
    }

    /// Relation elements are unique per exact `(type, source, target)`; the
    /// reversed direction is a different tuple.
    fn check_relation_tuple(
        &self,
        graph: &Graph,
        element_type: &str,
        properties: &Properties,
        exclude: Option<&str>,
    ) -> Result<(), ElementError> {
        if !self.schema().is_subtype_of(element_type, RELATIONSHIP_CLASS) {
            return Ok(());
        }
        let (Some(source), Some(target)) = (
            properties.get(SOURCE_FIELD).and_then(Value::as_str),
            properties.get(TARGET_FIELD).and_then(Value::as_str),
        ) else {
            return Ok(());
        };

        let duplicate = graph.iter().find(|other| {
            other.element_type == element_type
                && Some(other.id.as_str()) != exclude
                && other.string_property(SOURCE_FIELD) == Some(source)
                && other.string_property(TARGET_FIELD) == Some(target)
        });
        match duplicate {
            Some(existing) => Err(ElementError::Conflict(format!(
                "{element_type} {source} -> {target} already exists as `{}`",
                existing.id
            ))),
            None => Ok(()),
        }
    }
}

fn generate_id(graph: &Graph) -> String {
    loop {
        let id = Uuid::new_v4().to_string();
        if !graph.is_id_taken(&id) {
            return id;
        }
    }
}

/// Remove `id` / `@id` from a property bag.
fn take_id(properties: &mut Properties) -> Result<Option<String>, ElementError> {
    let mut found: Option<String> = None;
    for key in ID_FIELDS {
        let Some(value) = properties.remove(*key) else {
            continue;
        };
        let id = match value {
            Value::String(id) if !id.trim().is_empty() => id,
            other => {
                return Err(ElementError::invalid(format!(
                    "`{key}` must be a non-empty string, got {other}"
                )));
            }
        };
        match &found {
            Some(previous) if *previous != id => {
                return Err(ElementError::invalid(format!(
                    "conflicting ids `{previous}` and `{id}`"
                )));
            }
            _ => found = Some(id),
        }
    }
    Ok(found)
}

/// Remove the owner field: `None` when absent, `Some(None)` for an explicit
/// `null`, `Some(Some(id))` otherwise.
fn take_owner(properties: &mut Properties) -> Result<Option<Option<String>>, ElementError> {
    match properties.remove(OWNER_FIELD) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(Some(Some(id))),
        Some(other) => Err(ElementError::invalid(format!(
            "`{OWNER_FIELD}` must be an element id or null, got {other}"
        ))),
    }
}

/// Schema checks on a complete property bag: containment features cannot be
/// written directly, declared attributes must match their kind, and
/// required attributes must be present.
fn check_property_bag(class: &SchemaClass, properties: &Properties) -> Result<(), ElementError> {
    for (key, value) in properties {
        if class
            .containment_features()
            .iter()
            .any(|feature| feature.name == *key)
        {
            return Err(ElementError::invalid(format!(
                "`{key}` is a containment feature of {}; nest elements by setting `{OWNER_FIELD}` on them",
                class.name
            )));
        }
        if let Some(attribute) = class.attribute(key)
            && !attribute.kind.accepts(value)
        {
            return Err(ElementError::invalid(format!(
                "property `{key}` of {} expects {}, got {value}",
                class.name,
                attribute.kind.as_str()
            )));
        }
    }

    for attribute in class.attributes().iter().filter(|a| a.required) {
        match properties.get(&attribute.name) {
            None | Some(Value::Null) => {
                return Err(ElementError::invalid(format!(
                    "missing required property `{}` for {}",
                    attribute.name, class.name
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Properties {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn take_id_accepts_either_key_but_not_both_differing() {
        let mut bag = props(json!({"@id": "R1", "name": "x"}));
        assert_eq!(take_id(&mut bag).expect("ok"), Some("R1".to_string()));
        assert!(!bag.contains_key("@id"));

        let mut bag = props(json!({"id": "R1", "@id": "R2"}));
        assert!(take_id(&mut bag).is_err());

        let mut bag = props(json!({"id": 7}));
        assert!(take_id(&mut bag).is_err());
    }

    #[test]
    fn take_owner_distinguishes_absent_and_null() {
        assert_eq!(take_owner(&mut props(json!({}))).expect("ok"), None);
        assert_eq!(
            take_owner(&mut props(json!({"owner": null}))).expect("ok"),
            Some(None)
        );
        assert_eq!(
            take_owner(&mut props(json!({"owner": "pkg"}))).expect("ok"),
            Some(Some("pkg".to_string()))
        );
        assert!(take_owner(&mut props(json!({"owner": 3}))).is_err());
    }

    #[test]
    fn property_bag_checks_kinds_required_and_containment() {
        let schema = Schema::bundled().expect("bundled schema must load");
        let requirement = schema.class("RequirementUsage").expect("class");
        assert!(check_property_bag(requirement, &props(json!({"reqId": "R", "x": 1}))).is_ok());
        assert!(check_property_bag(requirement, &props(json!({"priority": "high"}))).is_err());
        assert!(check_property_bag(requirement, &props(json!({"subrequirement": []}))).is_err());

        let derive = schema.class("DeriveRelationship").expect("class");
        assert!(check_property_bag(derive, &props(json!({"source": "a"}))).is_err());
        assert!(check_property_bag(derive, &props(json!({"source": "a", "target": "b"}))).is_ok());
    }
}
