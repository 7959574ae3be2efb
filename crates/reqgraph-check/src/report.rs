//! Validation report types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const VALIDATION_CHECK_KIND: &str = "reqgraph.validation.check.v1";

pub const RULE_DUP_REQID: &str = "DUP_REQID";
pub const RULE_CYCLE_DERIVE_REFINE: &str = "CYCLE_DERIVE_REFINE";
pub const RULE_BROKEN_REF: &str = "BROKEN_REF";

const RESULT_ACCEPTED: &str = "accepted";
const RESULT_REJECTED: &str = "rejected";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub rule: String,
    pub element_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    /// Group members, cycle path or dangling target, depending on the rule.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_ids: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub element_count: usize,
    pub requirement_count: usize,
    pub trace_edge_count: usize,
    pub violation_count: usize,
    pub duplicate_key_count: usize,
    pub cycle_count: usize,
    pub broken_ref_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub check_kind: String,
    pub result: String,
    /// Digest of the snapshot the report was computed from, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_ref: Option<String>,
    pub failure_classes: Vec<String>,
    pub violations: Vec<Violation>,
    pub summary: ValidationSummary,
}

impl ValidationReport {
    pub(crate) fn from_violations(violations: Vec<Violation>, mut summary: ValidationSummary) -> Self {
        let failure_classes: Vec<String> = violations
            .iter()
            .map(|violation| violation.rule.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let count = |rule: &str| violations.iter().filter(|v| v.rule == rule).count();
        summary.violation_count = violations.len();
        summary.duplicate_key_count = count(RULE_DUP_REQID);
        summary.cycle_count = count(RULE_CYCLE_DERIVE_REFINE);
        summary.broken_ref_count = count(RULE_BROKEN_REF);

        let result = if violations.is_empty() {
            RESULT_ACCEPTED
        } else {
            RESULT_REJECTED
        };
        Self {
            check_kind: VALIDATION_CHECK_KIND.to_string(),
            result: result.to_string(),
            snapshot_ref: None,
            failure_classes,
            violations,
            summary,
        }
    }

    pub fn with_snapshot_ref(mut self, snapshot_ref: impl Into<String>) -> Self {
        self.snapshot_ref = Some(snapshot_ref.into());
        self
    }

    pub fn accepted(&self) -> bool {
        self.result == RESULT_ACCEPTED
    }

    /// Violations of one rule, in report order.
    pub fn by_rule<'a>(&'a self, rule: &'a str) -> impl Iterator<Item = &'a Violation> + 'a {
        self.violations.iter().filter(move |violation| violation.rule == rule)
    }
}
