//! Project document storage: one JSON document per project.
//!
//! The portable interchange format. Top-level elements are entries of
//! `elements`; contained elements are nested under their containment
//! feature name inside the owner's entry. Every entry is a flat property
//! bag carrying `id` and `type`.

use crate::element::{Element, Owner, Properties};
use crate::graph::{Graph, GraphError};
use chrono::{DateTime, Utc};
use reqgraph_schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DOCUMENT_FORMAT: &str = "reqgraph.project.v1";

const ID_KEY: &str = "id";
const TYPE_KEY: &str = "type";

fn default_document_format() -> String {
    DOCUMENT_FORMAT.to_string()
}

/// On-disk shape of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    #[serde(default = "default_document_format")]
    pub format: String,
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retired_ids: Vec<String>,
    #[serde(default)]
    pub elements: Vec<Properties>,
}

impl ProjectDocument {
    pub fn empty(project: impl Into<String>) -> Self {
        Self {
            format: DOCUMENT_FORMAT.to_string(),
            project: project.into(),
            saved_at: None,
            retired_ids: Vec::new(),
            elements: Vec::new(),
        }
    }
}

/// Encode a graph into its nested document form.
pub fn encode_graph(project: &str, graph: &Graph) -> ProjectDocument {
    let mut document = ProjectDocument::empty(project);
    document.retired_ids = graph.retired().map(str::to_string).collect();
    document.elements = graph
        .roots()
        .iter()
        .filter_map(|id| encode_entry(graph, id))
        .collect();
    document
}

fn encode_entry(graph: &Graph, id: &str) -> Option<Properties> {
    let element = graph.get(id)?;
    let mut entry = Properties::new();
    entry.insert(ID_KEY.to_string(), Value::String(element.id.clone()));
    entry.insert(
        TYPE_KEY.to_string(),
        Value::String(element.element_type.clone()),
    );
    for (key, value) in &element.properties {
        entry.insert(key.clone(), value.clone());
    }
    for (feature, children) in &element.contents {
        let nested: Vec<Value> = children
            .iter()
            .filter_map(|child| encode_entry(graph, child))
            .map(Value::Object)
            .collect();
        entry.insert(feature.clone(), Value::Array(nested));
    }
    Some(entry)
}

/// Decode a document into a graph, using the schema to tell containment
/// features apart from ordinary properties.
///
/// Entries whose type the schema does not know are kept with all keys as
/// properties.
pub fn decode_graph(document: &ProjectDocument, schema: &Schema) -> Result<Graph, DocumentError> {
    let mut graph = Graph::new();
    for (idx, entry) in document.elements.iter().enumerate() {
        decode_entry(&mut graph, schema, entry, None, &format!("elements[{idx}]"))?;
    }
    for id in &document.retired_ids {
        graph.retire(id.clone());
    }
    Ok(graph)
}

fn decode_entry(
    graph: &mut Graph,
    schema: &Schema,
    entry: &Properties,
    owner: Option<Owner>,
    path: &str,
) -> Result<(), DocumentError> {
    let id = required_string(entry, ID_KEY, path)?;
    let element_type = required_string(entry, TYPE_KEY, path)?;
    let known = schema.is_valid_type(element_type);
    if !known {
        tracing::warn!(
            id,
            element_type,
            path,
            "document entry has a type unknown to the schema; keeping it verbatim"
        );
    }

    let mut properties = Properties::new();
    let mut nested: Vec<(&str, &Vec<Value>)> = Vec::new();
    for (key, value) in entry {
        if key == ID_KEY || key == TYPE_KEY {
            continue;
        }
        match value {
            Value::Array(children) if known && schema.is_containment_feature(element_type, key) => {
                nested.push((key.as_str(), children));
            }
            _ => {
                properties.insert(key.clone(), value.clone());
            }
        }
    }

    let element = Element::new(id, element_type).with_properties(properties);
    graph.insert(element, owner).map_err(|err| match err {
        GraphError::DuplicateId(id) => DocumentError::DuplicateId(id),
        other => DocumentError::Malformed(format!("{path}: {other}")),
    })?;

    for (feature, children) in nested {
        for (idx, child) in children.iter().enumerate() {
            let child_path = format!("{path}.{feature}[{idx}]");
            let child = child.as_object().ok_or_else(|| {
                DocumentError::Malformed(format!("{child_path}: contained entry is not an object"))
            })?;
            let owner = Owner {
                id: id.to_string(),
                feature: feature.to_string(),
            };
            decode_entry(graph, schema, child, Some(owner), &child_path)?;
        }
    }
    Ok(())
}

fn required_string<'a>(
    entry: &'a Properties,
    key: &'static str,
    path: &str,
) -> Result<&'a str, DocumentError> {
    match entry.get(key).and_then(Value::as_str) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(DocumentError::MissingField {
            path: path.to_string(),
            field: key,
        }),
    }
}

/// Read a project document from disk.
pub fn read_document(path: impl AsRef<Path>) -> Result<ProjectDocument, DocumentError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| DocumentError::Io(format!("{}: {e}", path.display())))?;
    validate_substrate_bytes(path, &bytes)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| DocumentError::Parse(format!("{}: {e}", path.display())))
}

/// Write a project document, replacing any previous version atomically.
pub fn write_document(
    path: impl AsRef<Path>,
    document: &ProjectDocument,
) -> Result<(), DocumentError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| DocumentError::Io(format!("{parent:?}: {e}")))?;
    }

    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> Result<(), DocumentError> {
        let file = File::create(&tmp_path)
            .map_err(|e| DocumentError::Io(format!("{}: {e}", tmp_path.display())))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, document)
            .map_err(|e| DocumentError::Serialize(e.to_string()))?;
        writeln!(writer).map_err(|e| DocumentError::Io(format!("{}: {e}", tmp_path.display())))?;
        writer
            .flush()
            .map_err(|e| DocumentError::Io(format!("{}: {e}", tmp_path.display())))?;
        let file = writer
            .into_inner()
            .map_err(|e| DocumentError::Io(format!("{}: {e}", tmp_path.display())))?;
        file.sync_all()
            .map_err(|e| DocumentError::Io(format!("{}: {e}", tmp_path.display())))?;
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DocumentError::Io(format!(
            "{} -> {}: {e}",
            tmp_path.display(),
            path.display()
        ))
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        let dir = File::open(parent)
            .map_err(|e| DocumentError::Io(format!("{}: {e}", parent.display())))?;
        dir.sync_all()
            .map_err(|e| DocumentError::Io(format!("{}: {e}", parent.display())))?;
    }

    Ok(())
}

/// Marker embedded in temporary file names; such files are never projects.
pub(crate) const TMP_MARKER: &str = ".tmp.";

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!("{TMP_MARKER}{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

fn validate_substrate_bytes(path: &Path, bytes: &[u8]) -> Result<(), DocumentError> {
    if bytes.contains(&0) {
        return Err(DocumentError::Corrupt(format!(
            "{}: contains NUL byte(s)",
            path.display()
        )));
    }
    if std::str::from_utf8(bytes).is_err() {
        return Err(DocumentError::Corrupt(format!(
            "{}: contains non-UTF-8 byte sequence(s)",
            path.display()
        )));
    }
    Ok(())
}

/// Errors from document operations.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("corrupted document: {0}")]
    Corrupt(String),

    #[error("{path}: missing or empty `{field}`")]
    MissingField { path: String, field: &'static str },

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("duplicate element id in document: {0}")]
    DuplicateId(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::bundled().expect("bundled schema must load")
    }

    fn document(value: Value) -> ProjectDocument {
        serde_json::from_value(value).expect("document literal")
    }

    #[test]
    fn nested_entries_decode_into_containment() {
        let doc = document(json!({
            "project": "demo",
            "elements": [
                {"id": "pkg", "type": "Package", "name": "Power",
                 "ownedMember": [
                    {"id": "R1", "type": "RequirementUsage", "reqId": "REQ-1",
                     "subrequirement": [{"id": "R1.1", "type": "RequirementUsage"}]}
                 ]},
                {"id": "c", "type": "Comment", "body": "loose", "x-vendor": {"k": [1, 2]}}
            ]
        }));

        let graph = decode_graph(&doc, &schema()).expect("decodes");
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.roots(), &["pkg".to_string(), "c".to_string()]);
        let r11 = graph.get("R1.1").expect("nested element");
        assert_eq!(
            r11.owner,
            Some(Owner {
                id: "R1".to_string(),
                feature: "subrequirement".to_string()
            })
        );
        assert_eq!(graph.get("c").expect("c").property("x-vendor"), Some(&json!({"k": [1, 2]})));
    }

    #[test]
    fn encode_then_decode_preserves_graph() {
        let doc = document(json!({
            "project": "demo",
            "retiredIds": ["gone"],
            "elements": [
                {"id": "pkg", "type": "Package",
                 "ownedMember": [{"id": "R1", "type": "RequirementUsage", "unknownField": "kept"}]}
            ]
        }));
        let schema = schema();
        let graph = decode_graph(&doc, &schema).expect("decodes");
        let encoded = encode_graph("demo", &graph);
        assert_eq!(encoded.elements, doc.elements);
        assert_eq!(encoded.retired_ids, vec!["gone".to_string()]);

        let again = decode_graph(&encoded, &schema).expect("re-decodes");
        assert_eq!(again.snapshot_ref(), graph.snapshot_ref());
    }

    #[test]
    fn unknown_types_keep_nested_arrays_as_properties() {
        let doc = document(json!({
            "project": "demo",
            "elements": [{"id": "x", "type": "VendorThing", "ownedMember": [{"id": "y"}]}]
        }));
        let graph = decode_graph(&doc, &schema()).expect("decodes");
        assert_eq!(graph.len(), 1);
        assert!(graph.get("x").expect("x").property("ownedMember").is_some());
    }

    #[test]
    fn decode_rejects_duplicate_ids_and_missing_fields() {
        let duplicate = document(json!({
            "project": "demo",
            "elements": [
                {"id": "a", "type": "Package", "ownedMember": [{"id": "a", "type": "Comment"}]}
            ]
        }));
        assert!(matches!(
            decode_graph(&duplicate, &schema()),
            Err(DocumentError::DuplicateId(id)) if id == "a"
        ));

        let missing = document(json!({"project": "demo", "elements": [{"type": "Package"}]}));
        assert!(matches!(
            decode_graph(&missing, &schema()),
            Err(DocumentError::MissingField { field: "id", .. })
        ));
    }

    #[test]
    fn read_document_rejects_nul_payload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("demo.json");
        fs::write(&path, b"{\"project\":\"demo\"}\n\0garbage").expect("fixture should write");

        match read_document(&path) {
            Err(DocumentError::Corrupt(message)) => assert!(message.contains("contains NUL")),
            other => panic!("expected corrupt document error, got {other:?}"),
        }
    }

    #[test]
    fn read_document_rejects_non_utf8_payload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("demo.json");
        fs::write(&path, [0xff, 0xfe, 0xfd]).expect("fixture should write");

        match read_document(&path) {
            Err(DocumentError::Corrupt(message)) => assert!(message.contains("non-UTF-8")),
            other => panic!("expected corrupt document error, got {other:?}"),
        }
    }

    #[test]
    fn write_document_replaces_file_atomically() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("demo.json");

        let mut first = ProjectDocument::empty("demo");
        first.retired_ids = vec!["first-marker".to_string()];
        write_document(&path, &first).expect("first write should succeed");

        let mut second = ProjectDocument::empty("demo");
        second.retired_ids = vec!["second-marker".to_string()];
        write_document(&path, &second).expect("second write should succeed");

        let text = fs::read_to_string(&path).expect("document should exist");
        assert!(!text.contains("first-marker"));
        assert!(text.contains("second-marker"));
        assert_eq!(read_document(&path).expect("reads back"), second);

        let leftovers: Vec<_> = fs::read_dir(path.parent().expect("parent"))
            .expect("dir lists")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(TMP_MARKER))
            .collect();
        assert!(leftovers.is_empty());
    }
}
