//! # reqgraph-store
//!
//! Element layer for schema-governed requirement graphs.
//!
//! This crate provides:
//! - `Element` and `Graph` (the containment forest of one project)
//! - project document read/write (portable persistence, atomic replace)
//! - `ElementStore` (per-project cache with lock-scoped mutation)
//! - `ElementService` (generic create/get/query/patch/delete over any
//!   schema type) and best-effort batch import
//!
//! Validation and query concerns live in downstream crates
//! (`reqgraph-check`, `reqgraph-query`) that only read service snapshots.
//!
//! ## Data model
//!
//! ```text
//! <data_dir>/<project>.json (one document per project, nested entries)
//!     ↕  decode / encode
//! Graph (cached per project, RwLock-guarded)
//!     ↕  create / patch / delete
//! ElementService
//! ```

pub mod document;
pub mod element;
pub mod error;
pub mod graph;
pub mod import;
pub mod service;
pub mod store;

pub use document::{
    DOCUMENT_FORMAT, DocumentError, ProjectDocument, decode_graph, encode_graph, read_document,
    write_document,
};
pub use element::{Element, Owner, Properties, RelationValue, relation_values};
pub use error::{ElementError, ErrorKind};
pub use graph::{Graph, GraphError};
pub use import::{ImportFailure, ImportReport};
pub use service::{DeletePolicy, ElementService, OWNER_FIELD, RELATIONSHIP_CLASS};
pub use store::{ElementStore, StoreError, StoreMutationError, validate_project_id};
