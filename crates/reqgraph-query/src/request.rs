//! Query parameters and their parsing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 200;

/// Fields accepted by both `sort` and `filter`.
pub const QUERY_FIELDS: &[&str] = &["id", "type", "name", "reqId", "status", "priority", "owner"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Exact match of a field's scalar value, rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySpec {
    pub page: usize,
    pub size: usize,
    pub sort: Vec<SortKey>,
    pub filter: Vec<FieldFilter>,
    pub search: Option<String>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: Vec::new(),
            filter: Vec::new(),
            search: None,
        }
    }
}

fn filter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z][A-Za-z0-9_]*):(.+)$").expect("filter regex must compile")
    })
}

fn sort_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z][A-Za-z0-9_]*)(?::((?i:asc|desc)))?$")
            .expect("sort regex must compile")
    })
}

fn check_field(field: &str, usage: &str) -> Result<(), QueryError> {
    if QUERY_FIELDS.contains(&field) {
        Ok(())
    } else {
        Err(QueryError::InvalidArgument(format!(
            "unknown {usage} field `{field}` (allowed: {})",
            QUERY_FIELDS.join(", ")
        )))
    }
}

impl QuerySpec {
    pub fn new(page: usize, size: usize) -> Self {
        Self {
            page,
            size,
            ..Self::default()
        }
    }

    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(SortKey {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.push(FieldFilter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Parse `field:value`. The value is everything after the first colon.
    pub fn parse_filter(text: &str) -> Result<FieldFilter, QueryError> {
        let captures = filter_re().captures(text.trim()).ok_or_else(|| {
            QueryError::InvalidArgument(format!("malformed filter `{text}`, expected field:value"))
        })?;
        let field = &captures[1];
        check_field(field, "filter")?;
        Ok(FieldFilter {
            field: field.to_string(),
            value: captures[2].to_string(),
        })
    }

    /// Parse `field`, `field:asc` or `field:desc`.
    pub fn parse_sort(text: &str) -> Result<SortKey, QueryError> {
        let captures = sort_re().captures(text.trim()).ok_or_else(|| {
            QueryError::InvalidArgument(format!(
                "malformed sort `{text}`, expected field[:asc|desc]"
            ))
        })?;
        let field = &captures[1];
        check_field(field, "sort")?;
        let direction = match captures.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
            Some(direction) if direction == "desc" => SortDirection::Desc,
            _ => SortDirection::Asc,
        };
        Ok(SortKey {
            field: field.to_string(),
            direction,
        })
    }

    /// Checks applied before every query run, however the query was built.
    pub fn validate(&self) -> Result<(), QueryError> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.size) {
            return Err(QueryError::InvalidArgument(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.size
            )));
        }
        for key in &self.sort {
            check_field(&key.field, "sort")?;
        }
        for filter in &self.filter {
            check_field(&filter.field, "filter")?;
        }
        Ok(())
    }
}
