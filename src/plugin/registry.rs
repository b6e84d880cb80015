//! Field registry - maps field names to their implementations

use super::traits::PageField;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Field registry
///
/// Built once and handed to the page operations at construction; it is
/// immutable afterwards.
#[derive(Clone, Default)]
pub struct FieldRegistry {
    fields: BTreeMap<String, Arc<dyn PageField>>,
}

impl fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRegistry")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FieldRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Register a field
    pub fn register(&mut self, field: Arc<dyn PageField>) -> Result<()> {
        let name = field.name().to_string();
        if name.is_empty() {
            return Err(Error::InvalidArgument("Field name cannot be empty".to_string()));
        }
        if self.fields.contains_key(&name) {
            return Err(Error::InvalidArgument(format!(
                "Field '{}' already registered",
                name
            )));
        }
        self.fields.insert(name, field);
        Ok(())
    }

    /// Register a field (builder style)
    pub fn with_field<F: PageField + 'static>(mut self, field: F) -> Result<Self> {
        self.register(Arc::new(field))?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn PageField>> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Registered field names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }
}
