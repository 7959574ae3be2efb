//! Containment forest of one project.
//!
//! Elements are held in an id-keyed index; the tree shape lives in each
//! element's `owner` / `contents` pair plus the ordered list of top-level
//! roots. All tree edits go through this type so both sides of every
//! containment edge stay consistent.

use crate::element::{Element, Owner, Properties};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};

/// Structural errors raised by graph edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("element id already used in this project: {0}")]
    DuplicateId(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("owner element not found: {0}")]
    OwnerNotFound(String),

    #[error("containment cycle: {id} cannot be owned by its descendant {owner}")]
    CyclicContainment { id: String, owner: String },
}

/// In-memory element graph of one project.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    elements: HashMap<String, Element>,
    roots: Vec<String>,
    retired: BTreeSet<String>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    /// Mutable access to the property bag only; containment is edited
    /// through [`Graph::insert`], [`Graph::reparent`] and removal.
    pub fn properties_mut(&mut self, id: &str) -> Option<&mut Properties> {
        self.elements.get_mut(id).map(|element| &mut element.properties)
    }

    /// Top-level element ids in document order.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Ids removed from this project. They are never handed out again.
    pub fn retired(&self) -> impl Iterator<Item = &str> {
        self.retired.iter().map(String::as_str)
    }

    pub fn is_retired(&self, id: &str) -> bool {
        self.retired.contains(id)
    }

    /// Whether `id` is live or retired.
    pub fn is_id_taken(&self, id: &str) -> bool {
        self.contains(id) || self.is_retired(id)
    }

    pub(crate) fn retire(&mut self, id: impl Into<String>) {
        self.retired.insert(id.into());
    }

    /// Insert a new element at top level (`owner = None`) or at the end of
    /// the owner's containment feature.
    ///
    /// Any `owner` / `contents` already set on `element` are replaced.
    pub fn insert(&mut self, mut element: Element, owner: Option<Owner>) -> Result<(), GraphError> {
        if self.is_id_taken(&element.id) {
            return Err(GraphError::DuplicateId(element.id));
        }
        if let Some(owner) = &owner
            && !self.contains(&owner.id)
        {
            return Err(GraphError::OwnerNotFound(owner.id.clone()));
        }

        element.contents.clear();
        element.owner = owner.clone();
        let id = element.id.clone();
        self.elements.insert(id.clone(), element);
        self.attach(&id, owner.as_ref());
        Ok(())
    }

    /// Whether `ancestor` owns `id` directly or transitively.
    pub fn is_ancestor(&self, ancestor: &str, id: &str) -> bool {
        let mut current = self.get(id).and_then(Element::owner_id);
        while let Some(owner_id) = current {
            if owner_id == ancestor {
                return true;
            }
            current = self.get(owner_id).and_then(Element::owner_id);
        }
        false
    }

    /// Move `id` under a new owner, or to top level with `None`.
    ///
    /// Rejects moves that would make an element its own ancestor.
    pub fn reparent(&mut self, id: &str, owner: Option<Owner>) -> Result<(), GraphError> {
        if !self.contains(id) {
            return Err(GraphError::ElementNotFound(id.to_string()));
        }
        if let Some(owner) = &owner {
            if !self.contains(&owner.id) {
                return Err(GraphError::OwnerNotFound(owner.id.clone()));
            }
            if owner.id == id || self.is_ancestor(id, &owner.id) {
                return Err(GraphError::CyclicContainment {
                    id: id.to_string(),
                    owner: owner.id.clone(),
                });
            }
        }

        self.detach(id);
        if let Some(element) = self.elements.get_mut(id) {
            element.owner = owner.clone();
        }
        self.attach(id, owner.as_ref());
        Ok(())
    }

    /// `id` followed by all of its descendants, pre-order.
    pub fn subtree_ids(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(element) = self.get(current) else {
                continue;
            };
            out.push(current.to_string());
            let children: Vec<&str> = element.children().collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Remove `id` with every contained descendant; all ids are retired.
    pub fn remove_subtree(&mut self, id: &str) -> Result<Vec<Element>, GraphError> {
        if !self.contains(id) {
            return Err(GraphError::ElementNotFound(id.to_string()));
        }
        let doomed = self.subtree_ids(id);
        self.detach(id);
        let mut removed = Vec::with_capacity(doomed.len());
        for doomed_id in doomed {
            if let Some(element) = self.elements.remove(&doomed_id) {
                removed.push(element);
            }
            self.retire(doomed_id);
        }
        Ok(removed)
    }

    /// All elements, depth-first in document order.
    pub fn iter(&self) -> Preorder<'_> {
        Preorder {
            graph: self,
            stack: self.roots.iter().rev().map(String::as_str).collect(),
        }
    }

    /// Hex SHA-256 over every element in document order plus retired ids.
    ///
    /// Equal graphs produce equal refs regardless of cache history.
    pub fn snapshot_ref(&self) -> String {
        let mut hasher = Sha256::new();
        for element in self.iter() {
            hasher.update(element.id.as_bytes());
            hasher.update([0]);
            hasher.update(element.element_type.as_bytes());
            hasher.update([0]);
            if let Some(owner) = &element.owner {
                hasher.update(owner.id.as_bytes());
                hasher.update([b'.']);
                hasher.update(owner.feature.as_bytes());
            }
            hasher.update([0]);
            let properties = serde_json::Value::Object(element.properties.clone());
            hasher.update(properties.to_string().as_bytes());
            hasher.update([b'\n']);
        }
        for id in &self.retired {
            hasher.update(b"retired:");
            hasher.update(id.as_bytes());
            hasher.update([b'\n']);
        }
        let digest = hasher.finalize();
        digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    fn attach(&mut self, id: &str, owner: Option<&Owner>) {
        match owner {
            Some(owner) => {
                if let Some(parent) = self.elements.get_mut(&owner.id) {
                    parent
                        .contents
                        .entry(owner.feature.clone())
                        .or_default()
                        .push(id.to_string());
                }
            }
            None => self.roots.push(id.to_string()),
        }
    }

    fn detach(&mut self, id: &str) {
        let owner = self.get(id).and_then(|element| element.owner.clone());
        match owner {
            Some(owner) => {
                if let Some(parent) = self.elements.get_mut(&owner.id)
                    && let Some(ids) = parent.contents.get_mut(&owner.feature)
                {
                    ids.retain(|child| child != id);
                    if ids.is_empty() {
                        parent.contents.remove(&owner.feature);
                    }
                }
            }
            None => self.roots.retain(|root| root != id),
        }
    }
}

/// Pre-order traversal over a [`Graph`].
pub struct Preorder<'a> {
    graph: &'a Graph,
    stack: Vec<&'a str>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if let Some(element) = self.graph.get(id) {
                let children: Vec<&'a str> = element.children().collect();
                self.stack.extend(children.into_iter().rev());
                return Some(element);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(id: &str, feature: &str) -> Option<Owner> {
        Some(Owner {
            id: id.to_string(),
            feature: feature.to_string(),
        })
    }

    fn sample() -> Graph {
        let mut graph = Graph::new();
        graph.insert(Element::new("pkg", "Package"), None).expect("pkg");
        graph
            .insert(Element::new("r1", "RequirementUsage"), owner("pkg", "ownedMember"))
            .expect("r1");
        graph
            .insert(Element::new("r1.1", "RequirementUsage"), owner("r1", "subrequirement"))
            .expect("r1.1");
        graph
            .insert(Element::new("r2", "RequirementUsage"), owner("pkg", "ownedMember"))
            .expect("r2");
        graph.insert(Element::new("loose", "Comment"), None).expect("loose");
        graph
    }

    #[test]
    fn iteration_is_preorder_in_document_order() {
        let graph = sample();
        let ids: Vec<&str> = graph.iter().map(|element| element.id.as_str()).collect();
        assert_eq!(ids, vec!["pkg", "r1", "r1.1", "r2", "loose"]);
    }

    #[test]
    fn insert_rejects_duplicate_and_retired_ids() {
        let mut graph = sample();
        let err = graph
            .insert(Element::new("r2", "RequirementUsage"), None)
            .expect_err("duplicate must fail");
        assert_eq!(err, GraphError::DuplicateId("r2".to_string()));

        graph.remove_subtree("loose").expect("leaf removes");
        let err = graph
            .insert(Element::new("loose", "Comment"), None)
            .expect_err("retired id must not be reused");
        assert_eq!(err, GraphError::DuplicateId("loose".to_string()));
    }

    #[test]
    fn reparent_rejects_cycles_via_ancestor_walk() {
        let mut graph = sample();
        assert!(graph.is_ancestor("pkg", "r1.1"));
        assert!(!graph.is_ancestor("r1.1", "pkg"));

        let err = graph
            .reparent("pkg", owner("r1.1", "subrequirement"))
            .expect_err("descendant cannot own ancestor");
        assert!(matches!(err, GraphError::CyclicContainment { .. }));

        let err = graph
            .reparent("r1", owner("r1", "subrequirement"))
            .expect_err("self ownership");
        assert!(matches!(err, GraphError::CyclicContainment { .. }));
    }

    #[test]
    fn reparent_moves_between_containers() {
        let mut graph = sample();
        graph
            .reparent("r1.1", owner("r2", "subrequirement"))
            .expect("move under r2");
        assert!(!graph.get("r1").expect("r1").has_children());
        assert_eq!(graph.get("r1.1").expect("r1.1").owner_id(), Some("r2"));

        graph.reparent("r1.1", None).expect("move to top level");
        assert_eq!(graph.roots().last().map(String::as_str), Some("r1.1"));
        assert_eq!(graph.iter().count(), graph.len());
    }

    #[test]
    fn subtree_removal_retires_all() {
        let mut graph = sample();
        let removed = graph.remove_subtree("r1").expect("subtree removes");
        assert_eq!(removed.len(), 2);
        assert!(graph.is_retired("r1"));
        assert!(graph.is_retired("r1.1"));
        assert_eq!(graph.get("pkg").expect("pkg").children().count(), 1);
        assert_eq!(graph.iter().count(), graph.len());
    }

    #[test]
    fn snapshot_ref_tracks_content() {
        let graph = sample();
        let same = sample();
        assert_eq!(graph.snapshot_ref(), same.snapshot_ref());
        assert_eq!(graph.snapshot_ref().len(), 64);

        let mut changed = sample();
        changed
            .properties_mut("r2")
            .expect("r2")
            .insert("status".to_string(), serde_json::json!("approved"));
        assert_ne!(graph.snapshot_ref(), changed.snapshot_ref());
    }
}
