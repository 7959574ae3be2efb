//! Rule passes. The snapshot is indexed once; every pass reads that index.

use crate::config::ValidationConfig;
use crate::report::{
    RULE_BROKEN_REF, RULE_CYCLE_DERIVE_REFINE, RULE_DUP_REQID, ValidationReport,
    ValidationSummary, Violation,
};
use crate::scc::strongly_connected;
use reqgraph_schema::Schema;
use reqgraph_store::{Element, relation_values};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

const SOURCE_FIELD: &str = "source";
const TARGET_FIELD: &str = "target";

struct SnapshotIndex<'a> {
    elements: &'a [Element],
    ids: HashSet<&'a str>,
    /// Requirement ids sorted; a position here is a trace-graph node.
    requirements: Vec<&'a str>,
    trace_edges: Vec<Vec<usize>>,
}

impl<'a> SnapshotIndex<'a> {
    fn build(schema: &Schema, elements: &'a [Element], config: &ValidationConfig) -> Self {
        let conforms = |element_type: &str, classes: &[String]| {
            classes
                .iter()
                .any(|class| schema.is_subtype_of(element_type, class))
        };

        let ids = elements.iter().map(|element| element.id.as_str()).collect();

        let mut requirements: Vec<&str> = elements
            .iter()
            .filter(|element| conforms(&element.element_type, &config.requirement_types))
            .map(|element| element.id.as_str())
            .collect();
        requirements.sort_unstable();
        requirements.dedup();
        let node_of: HashMap<&str, usize> = requirements
            .iter()
            .enumerate()
            .map(|(node, id)| (*id, node))
            .collect();

        let mut edges: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); requirements.len()];
        for element in elements {
            let element_type = element.element_type.as_str();
            if !conforms(element_type, &config.derive_types)
                && !conforms(element_type, &config.refine_types)
            {
                continue;
            }
            let (Some(source), Some(target)) = (
                element.string_property(SOURCE_FIELD),
                element.string_property(TARGET_FIELD),
            ) else {
                continue;
            };
            if let (Some(&from), Some(&to)) = (node_of.get(source), node_of.get(target)) {
                edges[from].insert(to);
            }
        }

        Self {
            elements,
            ids,
            requirements,
            trace_edges: edges.into_iter().map(|set| set.into_iter().collect()).collect(),
        }
    }

    fn trace_edge_count(&self) -> usize {
        self.trace_edges.iter().map(Vec::len).sum()
    }
}

/// Run every rule over one snapshot.
///
/// Violations are ordered by rule (`DUP_REQID`, `CYCLE_DERIVE_REFINE`,
/// `BROKEN_REF`) and deterministically within each rule, so equal
/// snapshots give equal reports whatever their element order.
pub fn validate_static(
    schema: &Schema,
    elements: &[Element],
    config: &ValidationConfig,
) -> ValidationReport {
    let index = SnapshotIndex::build(schema, elements, config);

    let mut violations = duplicate_keys(&index, &config.business_key);
    violations.extend(trace_cycles(&index));
    violations.extend(broken_references(schema, &index));

    let summary = ValidationSummary {
        element_count: elements.len(),
        requirement_count: index.requirements.len(),
        trace_edge_count: index.trace_edge_count(),
        ..ValidationSummary::default()
    };
    let report = ValidationReport::from_violations(violations, summary);
    tracing::debug!(
        elements = report.summary.element_count,
        violations = report.summary.violation_count,
        result = %report.result,
        "static validation finished"
    );
    report
}

/// One violation per member of every business-key group larger than one.
fn duplicate_keys(index: &SnapshotIndex<'_>, business_key: &str) -> Vec<Violation> {
    let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for element in index.elements {
        if let Some(value) = element.string_property(business_key)
            && !value.trim().is_empty()
        {
            groups.entry(value).or_default().push(element.id.as_str());
        }
    }

    let mut violations = Vec::new();
    for (value, mut members) in groups {
        if members.len() < 2 {
            continue;
        }
        members.sort_unstable();
        let related: Vec<String> = members.iter().map(|id| id.to_string()).collect();
        for member in &members {
            violations.push(Violation {
                rule: RULE_DUP_REQID.to_string(),
                element_id: member.to_string(),
                property: Some(business_key.to_string()),
                related_ids: related.clone(),
                message: format!(
                    "{business_key} `{value}` is shared by {} elements: {}",
                    members.len(),
                    members.join(", ")
                ),
            });
        }
    }
    violations
}

/// One violation per non-trivial strongly connected component or self-loop.
fn trace_cycles(index: &SnapshotIndex<'_>) -> Vec<Violation> {
    let mut cycles: Vec<Vec<usize>> = strongly_connected(&index.trace_edges)
        .into_iter()
        .filter(|component| match component.as_slice() {
            [single] => index.trace_edges[*single].contains(single),
            members => members.len() > 1,
        })
        .map(|mut component| {
            component.sort_unstable();
            component
        })
        .collect();
    // Node numbers follow sorted ids, so this orders cycles by smallest id.
    cycles.sort_unstable();

    cycles
        .into_iter()
        .map(|component| {
            let path = cycle_path(&index.trace_edges, &component);
            let ids: Vec<String> = path
                .iter()
                .map(|node| index.requirements[*node].to_string())
                .collect();
            let mut rendered = ids.join(" -> ");
            rendered.push_str(" -> ");
            rendered.push_str(&ids[0]);
            let message = if component.len() > path.len() {
                format!(
                    "derive/refine cycle {rendered} (strongly connected group of {} requirements)",
                    component.len()
                )
            } else {
                format!("derive/refine cycle {rendered}")
            };
            Violation {
                rule: RULE_CYCLE_DERIVE_REFINE.to_string(),
                element_id: ids[0].clone(),
                property: None,
                related_ids: ids,
                message,
            }
        })
        .collect()
}

/// Shortest cycle through the smallest node of a sorted, non-empty
/// component, starting at that node.
fn cycle_path(edges: &[Vec<usize>], component: &[usize]) -> Vec<usize> {
    let start = component[0];
    let members: HashSet<usize> = component.iter().copied().collect();
    let mut parent: HashMap<usize, usize> = HashMap::new();
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        for &next in &edges[node] {
            if next == start {
                let mut path = vec![node];
                let mut cursor = node;
                while let Some(&previous) = parent.get(&cursor) {
                    path.push(previous);
                    cursor = previous;
                }
                path.reverse();
                return path;
            }
            if members.contains(&next) && !parent.contains_key(&next) {
                parent.insert(next, node);
                queue.push_back(next);
            }
        }
    }
    // Unreachable for a strongly connected component; keep the members.
    component.to_vec()
}

/// One violation per dangling (element, property, target).
fn broken_references(schema: &Schema, index: &SnapshotIndex<'_>) -> Vec<Violation> {
    let mut violations = Vec::new();
    for element in index.elements {
        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        for reference in relation_values(schema, element) {
            if index.ids.contains(reference.target)
                || !seen.insert((reference.property, reference.target))
            {
                continue;
            }
            violations.push(Violation {
                rule: RULE_BROKEN_REF.to_string(),
                element_id: element.id.clone(),
                property: Some(reference.property.to_string()),
                related_ids: vec![reference.target.to_string()],
                message: format!(
                    "{} `{}` references missing element `{}` via `{}`",
                    element.element_type, element.id, reference.target, reference.property
                ),
            });
        }
    }
    violations.sort_by(|a, b| {
        (&a.element_id, &a.property, &a.related_ids).cmp(&(
            &b.element_id,
            &b.property,
            &b.related_ids,
        ))
    });
    violations
}
