//! Schema loading, resolution and lookup.

use crate::class::{AttributeDescriptor, ContainmentFeature, SchemaClass};
use crate::error::SchemaLoadError;
use serde::Deserialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

/// Minimum class count a schema source must declare.
pub const DEFAULT_MIN_CLASSES: usize = 100;

/// Core vocabulary the rest of the system assumes exists. Each class must
/// specialise the one before it.
pub const REQUIRED_CHAIN: &[&str] = &[
    "Element",
    "Namespace",
    "Type",
    "Feature",
    "Usage",
    "OccurrenceUsage",
    "ConstraintUsage",
    "RequirementUsage",
];

/// Requirements vocabulary shipped with the workspace.
pub const BUNDLED_SCHEMA: &str = include_str!("../schema/core.json");

/// Acceptance thresholds applied after a schema source resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLoadOptions {
    pub min_classes: usize,
    pub required_chain: Vec<String>,
}

impl Default for SchemaLoadOptions {
    fn default() -> Self {
        Self {
            min_classes: DEFAULT_MIN_CLASSES,
            required_chain: REQUIRED_CHAIN.iter().map(|name| name.to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SchemaSource {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
    classes: Vec<ClassDecl>,
}

#[derive(Debug, Deserialize)]
struct ClassDecl {
    name: String,
    #[serde(default)]
    supertypes: Vec<String>,
    #[serde(default)]
    attributes: Vec<AttributeDescriptor>,
    #[serde(default)]
    containment: Vec<ContainmentFeature>,
}

/// The loaded schema: an arena of resolved classes keyed by name.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    version: String,
    classes: Vec<SchemaClass>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Load and resolve a schema document from disk.
    pub fn load(
        path: impl AsRef<Path>,
        options: &SchemaLoadOptions,
    ) -> Result<Self, SchemaLoadError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SchemaLoadError::Missing(path.display().to_string()),
            _ => SchemaLoadError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            },
        })?;
        let schema = Self::from_json_str(&text, options)?;
        tracing::info!(
            path = %path.display(),
            classes = schema.class_count(),
            "schema loaded"
        );
        Ok(schema)
    }

    /// The bundled vocabulary under default thresholds.
    pub fn bundled() -> Result<Self, SchemaLoadError> {
        Self::from_json_str(BUNDLED_SCHEMA, &SchemaLoadOptions::default())
    }

    pub fn from_json_str(
        text: &str,
        options: &SchemaLoadOptions,
    ) -> Result<Self, SchemaLoadError> {
        let source: SchemaSource =
            serde_json::from_str(text).map_err(|e| SchemaLoadError::Malformed(e.to_string()))?;
        let schema = resolve(source)?;
        schema.check_thresholds(options)?;
        Ok(schema)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Class names in declaration order.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|class| class.name.as_str())
    }

    pub fn class(&self, name: &str) -> Option<&SchemaClass> {
        self.index.get(name).map(|&idx| &self.classes[idx])
    }

    pub fn is_valid_type(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All attributes of `name`, inherited included.
    pub fn attributes_of(&self, name: &str) -> Option<&[AttributeDescriptor]> {
        self.class(name).map(SchemaClass::attributes)
    }

    pub fn attribute(&self, type_name: &str, attribute: &str) -> Option<&AttributeDescriptor> {
        self.class(type_name)?.attribute(attribute)
    }

    pub fn is_containment_feature(&self, type_name: &str, feature: &str) -> bool {
        self.class(type_name).is_some_and(|class| {
            class
                .containment_features()
                .iter()
                .any(|candidate| candidate.name == feature)
        })
    }

    /// The containment feature of `owner_type` under which an element of
    /// `child_type` is nested: the first (most specific) feature whose
    /// accepted class the child conforms to.
    pub fn containment_feature_for(
        &self,
        owner_type: &str,
        child_type: &str,
    ) -> Option<&ContainmentFeature> {
        let owner = self.class(owner_type)?;
        let child = self.class(child_type)?;
        owner
            .containment_features()
            .iter()
            .find(|feature| child.conforms_to(&feature.accepts))
    }

    /// Transitive supertypes of `name`, nearest first.
    pub fn supertypes_of(&self, name: &str) -> Option<&[String]> {
        self.class(name).map(SchemaClass::supertypes)
    }

    /// Reflexive: every type is a subtype of itself.
    pub fn is_subtype_of(&self, name: &str, ancestor: &str) -> bool {
        self.class(name)
            .is_some_and(|class| class.conforms_to(ancestor))
    }

    fn check_thresholds(&self, options: &SchemaLoadOptions) -> Result<(), SchemaLoadError> {
        if self.class_count() < options.min_classes {
            return Err(SchemaLoadError::TooFewClasses {
                actual: self.class_count(),
                minimum: options.min_classes,
            });
        }

        let mut previous: Option<&str> = None;
        for name in &options.required_chain {
            let class = self
                .class(name)
                .ok_or_else(|| SchemaLoadError::MissingRequiredClass(name.clone()))?;
            if let Some(expected) = previous
                && !class.conforms_to(expected)
            {
                return Err(SchemaLoadError::BrokenRequiredChain {
                    class: name.clone(),
                    expected: expected.to_string(),
                });
            }
            previous = Some(name.as_str());
        }
        Ok(())
    }
}

fn resolve(source: SchemaSource) -> Result<Schema, SchemaLoadError> {
    let mut index = HashMap::with_capacity(source.classes.len());
    for (idx, decl) in source.classes.iter().enumerate() {
        if decl.name.trim().is_empty() {
            return Err(SchemaLoadError::Malformed(format!(
                "class at position {idx} has an empty name"
            )));
        }
        if index.insert(decl.name.clone(), idx).is_some() {
            return Err(SchemaLoadError::DuplicateClass(decl.name.clone()));
        }
    }

    for decl in &source.classes {
        for supertype in &decl.supertypes {
            if !index.contains_key(supertype) {
                return Err(SchemaLoadError::UnknownSupertype {
                    class: decl.name.clone(),
                    supertype: supertype.clone(),
                });
            }
        }
        for feature in &decl.containment {
            if !index.contains_key(&feature.accepts) {
                return Err(SchemaLoadError::UnknownContainmentTarget {
                    class: decl.name.clone(),
                    feature: feature.name.clone(),
                    accepts: feature.accepts.clone(),
                });
            }
        }
    }

    reject_supertype_cycles(&source.classes, &index)?;

    let classes = (0..source.classes.len())
        .map(|idx| flatten(idx, &source.classes, &index))
        .collect();

    Ok(Schema {
        name: source.name,
        version: source.version,
        classes,
        index,
    })
}

fn reject_supertype_cycles(
    decls: &[ClassDecl],
    index: &HashMap<String, usize>,
) -> Result<(), SchemaLoadError> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; decls.len()];
    for root in 0..decls.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        // Explicit stack of (class, next supertype position).
        let mut stack = vec![(root, 0usize)];
        marks[root] = Mark::OnStack;
        while let Some((current, cursor)) = stack.last_mut() {
            let current = *current;
            match decls[current].supertypes.get(*cursor) {
                Some(supertype) => {
                    *cursor += 1;
                    let next = index[supertype];
                    match marks[next] {
                        Mark::OnStack => {
                            return Err(SchemaLoadError::SupertypeCycle(decls[next].name.clone()));
                        }
                        Mark::Unvisited => {
                            marks[next] = Mark::OnStack;
                            stack.push((next, 0));
                        }
                        Mark::Done => {}
                    }
                }
                None => {
                    marks[current] = Mark::Done;
                    stack.pop();
                }
            }
        }
    }
    Ok(())
}

fn flatten(idx: usize, decls: &[ClassDecl], index: &HashMap<String, usize>) -> SchemaClass {
    let decl = &decls[idx];

    let mut all_supertypes = Vec::new();
    let mut seen = HashSet::new();
    let mut queue: VecDeque<&String> = decl.supertypes.iter().collect();
    while let Some(name) = queue.pop_front() {
        if seen.insert(name.clone()) {
            all_supertypes.push(name.clone());
            queue.extend(decls[index[name]].supertypes.iter());
        }
    }

    let lineage = std::iter::once(decl)
        .chain(all_supertypes.iter().map(|name| &decls[index[name]]));

    let mut all_attributes: Vec<AttributeDescriptor> = Vec::new();
    let mut attribute_index = HashMap::new();
    let mut all_containment: Vec<ContainmentFeature> = Vec::new();
    let mut feature_names = HashSet::new();
    for ancestor in lineage {
        for attribute in &ancestor.attributes {
            if !attribute_index.contains_key(&attribute.name) {
                attribute_index.insert(attribute.name.clone(), all_attributes.len());
                all_attributes.push(attribute.clone());
            }
        }
        for feature in &ancestor.containment {
            if feature_names.insert(feature.name.clone()) {
                all_containment.push(feature.clone());
            }
        }
    }

    SchemaClass {
        name: decl.name.clone(),
        direct_supertypes: decl.supertypes.clone(),
        own_attributes: decl.attributes.clone(),
        own_containment: decl.containment.clone(),
        supertype_set: seen,
        all_supertypes,
        all_attributes,
        attribute_index,
        all_containment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::AttributeKind;

    fn small_options(chain: &[&str]) -> SchemaLoadOptions {
        SchemaLoadOptions {
            min_classes: 1,
            required_chain: chain.iter().map(|name| name.to_string()).collect(),
        }
    }

    const SMALL: &str = r#"{
        "classes": [
            {"name": "Element", "attributes": [{"name": "name", "kind": "string"}]},
            {"name": "Namespace", "supertypes": ["Element"],
             "containment": [{"name": "ownedMember", "accepts": "Element"}]},
            {"name": "Comment", "supertypes": ["Element"],
             "attributes": [{"name": "name", "kind": "string", "required": true}]}
        ]
    }"#;

    #[test]
    fn bundled_schema_satisfies_default_thresholds() {
        let schema = Schema::bundled().expect("bundled schema must load");
        assert!(schema.class_count() >= DEFAULT_MIN_CLASSES);
        for name in REQUIRED_CHAIN {
            assert!(schema.is_valid_type(name), "missing {name}");
        }
        assert!(!schema.is_valid_type("NoSuchClass"));
    }

    #[test]
    fn attributes_include_inherited_and_own() {
        let schema = Schema::bundled().expect("bundled schema must load");
        let names: Vec<&str> = schema
            .attributes_of("RequirementUsage")
            .expect("class exists")
            .iter()
            .map(|attribute| attribute.name.as_str())
            .collect();
        assert!(names.contains(&"reqId"));
        assert!(names.contains(&"expression"));
        assert!(names.contains(&"status"));
        assert!(names.contains(&"name"));
        assert_eq!(names.first(), Some(&"reqId"));
    }

    #[test]
    fn own_attribute_shadows_inherited_declaration() {
        let schema = Schema::bundled().expect("bundled schema must load");
        let inherited = schema
            .attribute("Relationship", "source")
            .expect("relationship declares source");
        let shadowed = schema
            .attribute("DeriveRelationship", "source")
            .expect("derive inherits source");
        assert!(!inherited.required);
        assert!(shadowed.required);
        assert_eq!(shadowed.kind, AttributeKind::Reference);
    }

    #[test]
    fn supertypes_are_transitive_and_nearest_first() {
        let schema = Schema::bundled().expect("bundled schema must load");
        let supertypes = schema
            .supertypes_of("RequirementUsage")
            .expect("class exists");
        assert_eq!(supertypes.first().map(String::as_str), Some("ConstraintUsage"));
        assert!(supertypes.iter().any(|name| name == "Element"));
        assert!(schema.is_subtype_of("RequirementUsage", "Usage"));
        assert!(schema.is_subtype_of("RequirementUsage", "RequirementUsage"));
        assert!(!schema.is_subtype_of("Usage", "RequirementUsage"));
    }

    #[test]
    fn containment_prefers_most_specific_feature() {
        let schema = Schema::bundled().expect("bundled schema must load");
        let nested = schema
            .containment_feature_for("RequirementUsage", "RequirementUsage")
            .expect("requirements nest");
        assert_eq!(nested.name, "subrequirement");
        let packaged = schema
            .containment_feature_for("Package", "RequirementUsage")
            .expect("packages own members");
        assert_eq!(packaged.name, "ownedMember");
        assert!(schema
            .containment_feature_for("Comment", "RequirementUsage")
            .is_none());
        assert!(schema.is_containment_feature("Package", "ownedMember"));
        assert!(!schema.is_containment_feature("Package", "subrequirement"));
    }

    #[test]
    fn missing_source_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Schema::load(dir.path().join("absent.json"), &SchemaLoadOptions::default())
            .expect_err("missing schema must fail");
        assert!(matches!(err, SchemaLoadError::Missing(_)));
    }

    #[test]
    fn malformed_source_is_reported() {
        let err = Schema::from_json_str("{\"classes\": [", &SchemaLoadOptions::default())
            .expect_err("truncated json must fail");
        assert!(matches!(err, SchemaLoadError::Malformed(_)));
    }

    #[test]
    fn too_few_classes_is_fatal() {
        let err = Schema::from_json_str(SMALL, &SchemaLoadOptions::default())
            .expect_err("three classes are not enough");
        assert!(matches!(
            err,
            SchemaLoadError::TooFewClasses {
                actual: 3,
                minimum: DEFAULT_MIN_CLASSES
            }
        ));
    }

    #[test]
    fn required_chain_must_be_present_and_ordered() {
        let schema = Schema::from_json_str(SMALL, &small_options(&["Element", "Namespace"]))
            .expect("chain holds");
        assert_eq!(schema.class_count(), 3);

        let err = Schema::from_json_str(SMALL, &small_options(&["Element", "Type"]))
            .expect_err("Type is missing");
        assert!(matches!(err, SchemaLoadError::MissingRequiredClass(name) if name == "Type"));

        let err = Schema::from_json_str(SMALL, &small_options(&["Namespace", "Comment"]))
            .expect_err("Comment does not specialise Namespace");
        assert!(matches!(
            err,
            SchemaLoadError::BrokenRequiredChain { class, expected }
                if class == "Comment" && expected == "Namespace"
        ));
    }

    #[test]
    fn unknown_supertype_and_cycles_are_rejected() {
        let unknown = r#"{"classes": [{"name": "A", "supertypes": ["Ghost"]}]}"#;
        let err = Schema::from_json_str(unknown, &small_options(&[])).expect_err("unknown");
        assert!(matches!(err, SchemaLoadError::UnknownSupertype { .. }));

        let cyclic = r#"{"classes": [
            {"name": "A", "supertypes": ["C"]},
            {"name": "B", "supertypes": ["A"]},
            {"name": "C", "supertypes": ["B"]}
        ]}"#;
        let err = Schema::from_json_str(cyclic, &small_options(&[])).expect_err("cycle");
        assert!(matches!(err, SchemaLoadError::SupertypeCycle(_)));

        let duplicate = r#"{"classes": [{"name": "A"}, {"name": "A"}]}"#;
        let err = Schema::from_json_str(duplicate, &small_options(&[])).expect_err("duplicate");
        assert!(matches!(err, SchemaLoadError::DuplicateClass(name) if name == "A"));
    }

    #[test]
    fn load_reads_schema_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("schema.json");
        fs::write(&path, BUNDLED_SCHEMA).expect("fixture should write");
        let schema = Schema::load(&path, &SchemaLoadOptions::default()).expect("loads");
        assert_eq!(schema.name(), "reqgraph-core");
        assert_eq!(schema.version(), "1");
    }
}
