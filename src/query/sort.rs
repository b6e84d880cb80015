//! Sorting of listed pages

use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, ErrorCode, Result};
use crate::page::Page;
use crate::plugin::FieldRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One sort key, written as `field_ASC` or `field_DESC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

impl FromStr for SortSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || {
            Error::operation(
                ErrorCode::MalformedSort,
                format!("Sort \"{}\" must look like \"field_ASC\" or \"field_DESC\".", s),
                serde_json::json!({ "sort": s }),
            )
        };
        let (field, direction) = s.rsplit_once('_').ok_or_else(malformed)?;
        if field.is_empty() {
            return Err(malformed());
        }
        let direction = match direction.to_ascii_uppercase().as_str() {
            "ASC" => SortDirection::Asc,
            "DESC" => SortDirection::Desc,
            _ => return Err(malformed()),
        };
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        write!(f, "{}_{}", self.field, direction)
    }
}

/// Rejects unknown or unsortable fields.
pub fn validate_sort(sort: &[SortSpec], registry: &FieldRegistry) -> Result<()> {
    for spec in sort {
        match registry.get(&spec.field) {
            Some(field) if field.sortable() => {}
            Some(_) => {
                return Err(Error::operation(
                    ErrorCode::MalformedSort,
                    format!("Field \"{}\" is not sortable.", spec.field),
                    serde_json::json!({ "sort": spec.to_string() }),
                ))
            }
            None => {
                return Err(Error::operation(
                    ErrorCode::MalformedSort,
                    format!("Unknown sort field \"{}\".", spec.field),
                    serde_json::json!({ "sort": spec.to_string() }),
                ))
            }
        }
    }
    Ok(())
}

/// Stable sort by the given keys, applied in order. Unknown fields are skipped.
pub fn sort_pages(pages: &mut [Page], sort: &[SortSpec], registry: &FieldRegistry) {
    if sort.is_empty() {
        return;
    }
    let fields: Vec<_> = sort
        .iter()
        .filter_map(|spec| registry.get(&spec.field).map(|f| (f, spec.direction)))
        .collect();

    pages.sort_by(|a, b| {
        for (field, direction) in &fields {
            let ordering = total_order(&field.value(a), &field.value(b));
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Ordering of two scalar values of the same type, `None` across types.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order used for sorting: nulls first, then by type, then by value.
pub(crate) fn total_order(a: &Value, b: &Value) -> Ordering {
    compare_values(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
}
