//! # reqgraph-query
//!
//! Read-only queries over an element snapshot:
//! filter (AND over whitelisted fields) → case-insensitive search →
//! stable multi-key sort → pagination.

pub mod engine;
pub mod request;

pub use engine::{PagedResult, apply};
pub use request::{
    DEFAULT_PAGE_SIZE, FieldFilter, MAX_PAGE_SIZE, QUERY_FIELDS, QueryError, QuerySpec,
    SortDirection, SortKey,
};
