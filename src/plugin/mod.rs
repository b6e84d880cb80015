//! Page fields for filtering and sorting
//!
//! List requests filter and sort on named page fields. Instead of discovering
//! field plugins at call time, fields are registered in a [`FieldRegistry`]
//! that is injected into the page operations at construction:
//! - Built-in fields (`id`, `title`, `createdOn`, `tags`, ...)
//! - Application fields added with [`FieldRegistry::with_field`]

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::sync::Arc;

use crate::page::Page;

pub mod registry;
pub mod traits;

pub use registry::FieldRegistry;
pub use traits::{BuiltinField, FnField, PageField};

/// Timestamps use a fixed width format so string order is time order.
fn date_value(date: &DateTime<Utc>) -> Value {
    Value::String(date.to_rfc3339_opts(SecondsFormat::Millis, true))
}

const BUILTIN_FIELDS: &[BuiltinField] = &[
    BuiltinField::new("id", |p| Value::String(p.id.clone()), true),
    BuiltinField::new("pid", |p| Value::String(p.pid.clone()), true),
    BuiltinField::new("version", |p| Value::from(p.version), true),
    BuiltinField::new("status", |p| Value::String(p.status.as_str().to_string()), true),
    BuiltinField::new("title", |p| Value::String(p.title.clone()), true),
    BuiltinField::new("titleLC", |p| Value::String(p.title_lc()), true),
    BuiltinField::new("path", |p| Value::String(p.path.clone()), true),
    BuiltinField::new("category", |p| Value::String(p.category.clone()), true),
    BuiltinField::new("editor", |p| Value::String(p.editor.clone()), true),
    BuiltinField::new("locked", |p| Value::Bool(p.locked), true),
    BuiltinField::new(
        "snippet",
        |p| p.snippet().map(|s| Value::String(s.to_string())).unwrap_or(Value::Null),
        true,
    ),
    BuiltinField::new(
        "tags",
        |p| Value::Array(p.tags().iter().cloned().map(Value::String).collect()),
        false,
    ),
    BuiltinField::new("createdOn", |p| date_value(&p.created_on), true),
    BuiltinField::new("savedOn", |p| date_value(&p.saved_on), true),
    BuiltinField::new(
        "publishedOn",
        |p| p.published_on.as_ref().map(date_value).unwrap_or(Value::Null),
        true,
    ),
    BuiltinField::new(
        "createdBy",
        |p| {
            p.created_by
                .as_ref()
                .map(|i| Value::String(i.id.clone()))
                .unwrap_or(Value::Null)
        },
        true,
    ),
];

impl FieldRegistry {
    /// Registry with every built-in page field
    pub fn with_defaults() -> Self {
        let mut registry = FieldRegistry::new();
        for field in BUILTIN_FIELDS {
            let registered = registry.register(Arc::new(*field));
            debug_assert!(registered.is_ok(), "duplicate built-in field {}", field.name());
        }
        registry
    }
}
