//! Page field trait definitions

use serde_json::Value;
use std::fmt;

use crate::page::Page;

/// A named, filterable (and optionally sortable) value of a page.
///
/// Fields are resolved by name when a list request filters or sorts on them.
pub trait PageField: Send + Sync {
    fn name(&self) -> &str;

    /// Value of this field for `page`; `Value::Null` when absent.
    fn value(&self, page: &Page) -> Value;

    fn sortable(&self) -> bool {
        true
    }
}

/// Field backed by a plain function pointer.
#[derive(Clone, Copy)]
pub struct BuiltinField {
    name: &'static str,
    extract: fn(&Page) -> Value,
    sortable: bool,
}

impl BuiltinField {
    pub const fn new(name: &'static str, extract: fn(&Page) -> Value, sortable: bool) -> Self {
        Self {
            name,
            extract,
            sortable,
        }
    }
}

impl fmt::Debug for BuiltinField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinField")
            .field("name", &self.name)
            .field("sortable", &self.sortable)
            .finish()
    }
}

impl PageField for BuiltinField {
    fn name(&self) -> &str {
        self.name
    }

    fn value(&self, page: &Page) -> Value {
        (self.extract)(page)
    }

    fn sortable(&self) -> bool {
        self.sortable
    }
}

/// Field computed by a closure, for application specific attributes
/// (for example values nested in `content`).
pub struct FnField<F> {
    name: String,
    extract: F,
    sortable: bool,
}

impl<F> FnField<F>
where
    F: Fn(&Page) -> Value + Send + Sync,
{
    pub fn new(name: impl Into<String>, extract: F) -> Self {
        Self {
            name: name.into(),
            extract,
            sortable: true,
        }
    }

    pub fn unsortable(mut self) -> Self {
        self.sortable = false;
        self
    }
}

impl<F> PageField for FnField<F>
where
    F: Fn(&Page) -> Value + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self, page: &Page) -> Value {
        (self.extract)(page)
    }

    fn sortable(&self) -> bool {
        self.sortable
    }
}
