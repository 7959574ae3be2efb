//! Query pipeline over a snapshot.

use crate::request::{FieldFilter, QueryError, QuerySpec, SortDirection, SortKey};
use reqgraph_store::Element;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult {
    pub content: Vec<Element>,
    pub page: usize,
    pub size: usize,
    pub total_elements: usize,
    pub total_pages: usize,
    pub first: bool,
    pub last: bool,
}

/// Run `spec` over `elements`.
///
/// A page past the end is empty, not an error.
pub fn apply(elements: &[Element], spec: &QuerySpec) -> Result<PagedResult, QueryError> {
    spec.validate()?;

    let needle = spec
        .search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase);

    let mut matched: Vec<&Element> = elements
        .iter()
        .filter(|element| spec.filter.iter().all(|filter| matches_filter(element, filter)))
        .filter(|element| needle.as_deref().is_none_or(|needle| matches_search(element, needle)))
        .collect();

    if !spec.sort.is_empty() {
        matched.sort_by(|a, b| compare_by_keys(a, b, &spec.sort));
    }

    let total_elements = matched.len();
    let total_pages = total_elements.div_ceil(spec.size);
    let content = matched
        .into_iter()
        .skip(spec.page.saturating_mul(spec.size))
        .take(spec.size)
        .cloned()
        .collect();

    Ok(PagedResult {
        content,
        page: spec.page,
        size: spec.size,
        total_elements,
        total_pages,
        first: spec.page == 0,
        last: spec.page.saturating_add(1) >= total_pages,
    })
}

/// Value of a query field. `null` counts as missing.
fn field_value<'a>(element: &'a Element, field: &str) -> Option<FieldValue<'a>> {
    match field {
        "id" => Some(FieldValue::Text(&element.id)),
        "type" => Some(FieldValue::Text(&element.element_type)),
        "owner" => element.owner_id().map(FieldValue::Text),
        _ => match element.property(field)? {
            Value::Null => None,
            value => Some(FieldValue::Json(value)),
        },
    }
}

enum FieldValue<'a> {
    Text(&'a str),
    Json(&'a Value),
}

impl FieldValue<'_> {
    fn rendered(&self) -> Option<String> {
        match self {
            FieldValue::Text(text) => Some((*text).to_string()),
            FieldValue::Json(Value::String(text)) => Some(text.clone()),
            FieldValue::Json(Value::Number(number)) => Some(number.to_string()),
            FieldValue::Json(Value::Bool(flag)) => Some(flag.to_string()),
            FieldValue::Json(_) => None,
        }
    }

    /// Booleans < numbers < strings < anything else.
    fn rank(&self) -> u8 {
        match self {
            FieldValue::Json(Value::Bool(_)) => 0,
            FieldValue::Json(Value::Number(_)) => 1,
            FieldValue::Text(_) | FieldValue::Json(Value::String(_)) => 2,
            FieldValue::Json(_) => 3,
        }
    }

    fn text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(*text),
            FieldValue::Json(Value::String(text)) => Some(text.as_str()),
            FieldValue::Json(_) => None,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FieldValue::Json(Value::Number(a)), FieldValue::Json(Value::Number(b))) => {
                let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            (FieldValue::Json(Value::Bool(a)), FieldValue::Json(Value::Bool(b))) => a.cmp(b),
            _ => match (self.text(), other.text()) {
                (Some(a), Some(b)) => a.cmp(b),
                _ => self.rank().cmp(&other.rank()).then_with(|| {
                    self.rendered()
                        .unwrap_or_default()
                        .cmp(&other.rendered().unwrap_or_default())
                }),
            },
        }
    }
}

fn matches_filter(element: &Element, filter: &FieldFilter) -> bool {
    field_value(element, &filter.field)
        .and_then(|value| value.rendered())
        .is_some_and(|rendered| rendered == filter.value)
}

/// Case-insensitive substring over the id and every string value,
/// including strings inside lists.
fn matches_search(element: &Element, needle: &str) -> bool {
    element.id.to_lowercase().contains(needle)
        || element
            .properties
            .values()
            .any(|value| value_contains(value, needle))
}

fn value_contains(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(text) => text.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|item| value_contains(item, needle)),
        _ => false,
    }
}

/// Missing values sort first whatever the direction.
fn compare_by_keys(a: &Element, b: &Element, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ordering = match (field_value(a, &key.field), field_value(b, &key.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(left), Some(right)) => match key.direction {
                SortDirection::Asc => left.compare(&right),
                SortDirection::Desc => right.compare(&left),
            },
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
