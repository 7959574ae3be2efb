//! Schema load failures.
//!
//! Every variant is fatal: a store without a valid schema cannot validate
//! anything downstream, so callers stop at startup.

/// Errors raised while loading or resolving a schema source.
#[derive(Debug, thiserror::Error)]
pub enum SchemaLoadError {
    #[error("schema source not found: {0}")]
    Missing(String),

    #[error("failed to read schema {path}: {message}")]
    Io { path: String, message: String },

    #[error("malformed schema: {0}")]
    Malformed(String),

    #[error("duplicate schema class: {0}")]
    DuplicateClass(String),

    #[error("class {class} names unknown supertype {supertype}")]
    UnknownSupertype { class: String, supertype: String },

    #[error("supertype cycle through class {0}")]
    SupertypeCycle(String),

    #[error("containment feature {class}.{feature} accepts unknown class {accepts}")]
    UnknownContainmentTarget {
        class: String,
        feature: String,
        accepts: String,
    },

    #[error("schema declares {actual} classes, at least {minimum} are required")]
    TooFewClasses { actual: usize, minimum: usize },

    #[error("required class missing: {0}")]
    MissingRequiredClass(String),

    #[error("required class {class} does not specialise {expected}")]
    BrokenRequiredChain { class: String, expected: String },
}
