//! # reqgraph-check
//!
//! Deterministic validation over one element snapshot.
//!
//! Rules:
//! - `DUP_REQID`: business-key values shared by more than one element
//! - `CYCLE_DERIVE_REFINE`: cycles among requirements through derive/refine
//!   relations
//! - `BROKEN_REF`: reference-kind properties naming missing elements
//!
//! A [`ValidationReport`] carries a check kind, an `accepted` / `rejected`
//! result, the rule codes present and the ordered violations.

pub mod config;
pub mod report;
pub mod rules;
mod scc;

pub use config::ValidationConfig;
pub use report::{
    RULE_BROKEN_REF, RULE_CYCLE_DERIVE_REFINE, RULE_DUP_REQID, VALIDATION_CHECK_KIND,
    ValidationReport, ValidationSummary, Violation,
};
pub use rules::validate_static;
