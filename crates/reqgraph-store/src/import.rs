//! Best-effort batch import of flat element entries.

use crate::element::Properties;
use crate::error::{ElementError, ErrorKind};
use crate::service::ElementService;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One rejected import entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFailure {
    /// Zero-based position in the submitted batch.
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of [`ElementService::import`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub created: usize,
    pub created_ids: Vec<String>,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl ElementService {
    /// Create every entry in order under one project lock.
    ///
    /// Each entry is a property bag carrying its own `type` (or `@type`).
    /// Entries may reference owners created earlier in the same batch. A
    /// rejected entry is reported and skipped; the rest still land, and the
    /// project is written once at the end.
    pub fn import(
        &self,
        project: &str,
        entries: Vec<Properties>,
    ) -> Result<ImportReport, ElementError> {
        let report = self.store().mutate_project(project, |graph| {
            let mut report = ImportReport::default();
            for (index, entry) in entries.into_iter().enumerate() {
                let declared_id = ["id", "@id"]
                    .iter()
                    .find_map(|key| entry.get(*key).and_then(Value::as_str))
                    .map(str::to_string);

                let outcome = entry_type(&entry)
                    .and_then(|element_type| self.prepare_create(&element_type, entry))
                    .and_then(|draft| self.insert_draft(graph, draft));

                match outcome {
                    Ok(element) => {
                        report.created += 1;
                        report.created_ids.push(element.id);
                    }
                    Err(err) => {
                        tracing::warn!(
                            project,
                            index,
                            id = declared_id.as_deref().unwrap_or(""),
                            error = %err,
                            "import entry rejected"
                        );
                        report.failures.push(ImportFailure {
                            index,
                            id: declared_id,
                            kind: err.kind(),
                            message: err.to_string(),
                        });
                    }
                }
            }
            let changed = report.created > 0;
            Ok::<_, ElementError>((report, changed))
        })?;

        tracing::info!(
            project,
            created = report.created,
            failed = report.failures.len(),
            "import finished"
        );
        Ok(report)
    }
}

fn entry_type(entry: &Properties) -> Result<String, ElementError> {
    ["type", "@type"]
        .iter()
        .find_map(|key| entry.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| ElementError::invalid("import entry has no `type`"))
}
