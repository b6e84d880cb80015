//! List filters
//!
//! A [`ListWhere`] is built once per request through [`ListWhereBuilder`],
//! which rejects conflicting combinations before any I/O happens. Filtering
//! itself is a pure function over already loaded pages.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;

use super::sort::compare_values;
use crate::error::{Error, ErrorCode, Result};
use crate::page::{Page, PageScope};
use crate::plugin::FieldRegistry;

/// How `tags` filters combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TagsRule {
    /// Page must carry every requested tag.
    #[default]
    All,
    /// Page must carry at least one requested tag.
    Any,
}

/// Which partition a list request reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListProjection {
    #[default]
    Latest,
    Published,
}

/// Predicate on a single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCondition {
    Eq(Value),
    NotEq(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    /// Case-insensitive substring for strings, membership for arrays.
    Contains(String),
    StartsWith(String),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
}

impl FieldCondition {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldCondition::Eq(expected) => value == expected,
            FieldCondition::NotEq(expected) => value != expected,
            FieldCondition::In(options) => options.contains(value),
            FieldCondition::NotIn(options) => !options.contains(value),
            FieldCondition::Contains(needle) => match value {
                Value::String(s) => s.to_lowercase().contains(&needle.to_lowercase()),
                Value::Array(values) => values.iter().any(|v| v.as_str() == Some(needle.as_str())),
                _ => false,
            },
            FieldCondition::StartsWith(prefix) => value
                .as_str()
                .map(|s| s.starts_with(prefix.as_str()))
                .unwrap_or(false),
            FieldCondition::Gt(bound) => compare_values(value, bound) == Some(Ordering::Greater),
            FieldCondition::Gte(bound) => matches!(
                compare_values(value, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FieldCondition::Lt(bound) => compare_values(value, bound) == Some(Ordering::Less),
            FieldCondition::Lte(bound) => matches!(
                compare_values(value, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

/// Fields matched by free text search.
pub const SEARCH_FIELDS: &[&str] = &["title", "snippet"];

/// Validated `where` of a list request
#[derive(Debug, Clone, PartialEq)]
pub struct ListWhere {
    scope: PageScope,
    projection: ListProjection,
    search: Option<String>,
    tags: Vec<String>,
    tags_rule: TagsRule,
    fields: Vec<(String, FieldCondition)>,
}

impl ListWhere {
    pub fn builder(scope: PageScope) -> ListWhereBuilder {
        ListWhereBuilder {
            scope,
            latest: false,
            published: false,
            search: None,
            tags: Vec::new(),
            tags_rule: TagsRule::default(),
            fields: Vec::new(),
        }
    }

    /// Latest pages of `scope` without further filters.
    pub fn latest(scope: PageScope) -> Self {
        Self {
            scope,
            projection: ListProjection::Latest,
            search: None,
            tags: Vec::new(),
            tags_rule: TagsRule::default(),
            fields: Vec::new(),
        }
    }

    pub fn scope(&self) -> &PageScope {
        &self.scope
    }

    pub fn projection(&self) -> ListProjection {
        self.projection
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn tags_rule(&self) -> TagsRule {
        self.tags_rule
    }

    pub fn fields(&self) -> &[(String, FieldCondition)] {
        &self.fields
    }

    /// Rejects conditions on fields the registry does not know.
    pub fn validate_fields(&self, registry: &FieldRegistry) -> Result<()> {
        for (name, _) in &self.fields {
            if !registry.contains(name) {
                return Err(Error::operation(
                    ErrorCode::MalformedWhere,
                    format!("Unknown where field \"{}\".", name),
                    json!({ "field": name, "known": registry.names() }),
                ));
            }
        }
        Ok(())
    }

    /// Whether `page` passes every condition.
    pub fn matches(&self, page: &Page, registry: &FieldRegistry) -> bool {
        if let Some(search) = &self.search {
            if !matches_search(page, search, registry) {
                return false;
            }
        }

        if !self.tags.is_empty() {
            let page_tags = page.tags();
            let has = |tag: &String| page_tags.contains(tag);
            let ok = match self.tags_rule {
                TagsRule::Any => self.tags.iter().any(has),
                TagsRule::All => self.tags.iter().all(has),
            };
            if !ok {
                return false;
            }
        }

        self.fields.iter().all(|(name, condition)| {
            registry
                .get(name)
                .map(|field| condition.matches(&field.value(page)))
                .unwrap_or(false)
        })
    }
}

/// Every search term must occur in one of the [`SEARCH_FIELDS`].
fn matches_search(page: &Page, search: &str, registry: &FieldRegistry) -> bool {
    let haystack: Vec<String> = SEARCH_FIELDS
        .iter()
        .filter_map(|name| registry.get(name))
        .filter_map(|field| field.value(page).as_str().map(str::to_lowercase))
        .collect();

    search
        .split_whitespace()
        .map(str::to_lowercase)
        .all(|term| haystack.iter().any(|h| h.contains(&term)))
}

/// Builder for [`ListWhere`]
#[derive(Debug, Clone)]
pub struct ListWhereBuilder {
    scope: PageScope,
    latest: bool,
    published: bool,
    search: Option<String>,
    tags: Vec<String>,
    tags_rule: TagsRule,
    fields: Vec<(String, FieldCondition)>,
}

impl ListWhereBuilder {
    pub fn latest(mut self, latest: bool) -> Self {
        self.latest = latest;
        self
    }

    pub fn published(mut self, published: bool) -> Self {
        self.published = published;
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = if search.trim().is_empty() {
            None
        } else {
            Some(search)
        };
        self
    }

    pub fn tags(mut self, tags: Vec<String>, rule: TagsRule) -> Self {
        self.tags = tags;
        self.tags_rule = rule;
        self
    }

    pub fn field(mut self, name: impl Into<String>, condition: FieldCondition) -> Self {
        self.fields.push((name.into(), condition));
        self
    }

    pub fn build(self) -> Result<ListWhere> {
        if self.latest && self.published {
            return Err(Error::operation(
                ErrorCode::MalformedWhere,
                "Both published and latest cannot be defined at the same time.",
                json!({
                    "tenant": self.scope.tenant(),
                    "locale": self.scope.locale(),
                    "latest": true,
                    "published": true,
                }),
            ));
        }
        let projection = if self.published {
            ListProjection::Published
        } else {
            ListProjection::Latest
        };
        Ok(ListWhere {
            scope: self.scope,
            projection,
            search: self.search,
            tags: self.tags,
            tags_rule: self.tags_rule,
            fields: self.fields,
        })
    }
}
