//! # reqgraph-schema
//!
//! Runtime schema registry for the element store.
//!
//! A schema is an externally supplied class hierarchy: every element type the
//! store accepts, its attributes, and the containment features through which
//! elements own other elements. The registry is loaded exactly once at
//! startup and is read-only afterwards.
//!
//! Inherited attributes, transitive supertypes and inherited containment
//! features are flattened into a per-class table at load time, so runtime
//! checks are map lookups rather than hierarchy walks.
//!
//! ```text
//! schema JSON (classes + direct supertypes)
//!     │  parse, resolve, flatten
//! Schema (arena of SchemaClass, keyed by name)
//! ```

pub mod class;
pub mod error;
pub mod registry;

pub use class::{AttributeDescriptor, AttributeKind, ContainmentFeature, SchemaClass};
pub use error::SchemaLoadError;
pub use registry::{
    BUNDLED_SCHEMA, DEFAULT_MIN_CLASSES, REQUIRED_CHAIN, Schema, SchemaLoadOptions,
};
