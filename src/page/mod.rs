//! Page model
//!
//! A page is a group of revisions sharing a `pid`. Each revision is addressed
//! by a composite id `{pid}#{version:04}`:
//!
//! ```text
//! pid "8f14e45f"
//!   ├─→ 8f14e45f#0001  (unpublished)
//!   ├─→ 8f14e45f#0002  (published)
//!   └─→ 8f14e45f#0003  (draft, latest)
//! ```
//!
//! Pages live inside a [`PageScope`], the tenant and locale pair every key is
//! prefixed with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::keys;

/// Lifecycle status of a single revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageStatus {
    Draft,
    ReviewRequested,
    ChangesRequested,
    Published,
    Unpublished,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Draft => "draft",
            PageStatus::ReviewRequested => "reviewRequested",
            PageStatus::ChangesRequested => "changesRequested",
            PageStatus::Published => "published",
            PageStatus::Unpublished => "unpublished",
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant and locale a page belongs to.
///
/// Both values become part of every partition key, so they must be non-empty
/// and must not contain the `#` key separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageScope {
    tenant: String,
    locale: String,
}

impl PageScope {
    pub fn new(tenant: impl Into<String>, locale: impl Into<String>) -> Result<Self> {
        let tenant = tenant.into();
        let locale = locale.into();
        validate_key_segment("tenant", &tenant)?;
        validate_key_segment("locale", &locale)?;
        Ok(Self { tenant, locale })
    }

    /// Builds a scope from values that were validated when the page was created.
    pub(crate) fn unchecked(tenant: &str, locale: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            locale: locale.to_string(),
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }
}

fn validate_key_segment(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidArgument(format!("{} cannot be empty", name)));
    }
    if value.contains(keys::SEPARATOR) {
        return Err(Error::InvalidArgument(format!(
            "{} cannot contain '{}'",
            name,
            keys::SEPARATOR
        )));
    }
    Ok(())
}

/// Who created a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub identity_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageImage {
    pub id: String,
    pub src: String,
}

/// `settings.general` of a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralSettings {
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image: Option<PageImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSettings {
    #[serde(default)]
    pub general: GeneralSettings,
}

/// A single page revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Composite id `{pid}#{version:04}`.
    pub id: String,
    pub pid: String,
    pub tenant: String,
    pub locale: String,
    pub version: u32,
    pub status: PageStatus,
    pub title: String,
    pub path: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub editor: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub settings: PageSettings,
    #[serde(default)]
    pub content: Option<serde_json::Value>,
    pub created_on: DateTime<Utc>,
    pub saved_on: DateTime<Utc>,
    #[serde(default)]
    pub published_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<Identity>,
}

impl Page {
    pub fn scope(&self) -> PageScope {
        PageScope::unchecked(&self.tenant, &self.locale)
    }

    /// Copy of this revision with another status.
    pub fn with_status(&self, status: PageStatus) -> Page {
        Page {
            status,
            ..self.clone()
        }
    }

    pub fn tags(&self) -> &[String] {
        &self.settings.general.tags
    }

    pub fn snippet(&self) -> Option<&str> {
        self.settings.general.snippet.as_deref()
    }

    /// Lower-cased title stored next to the page for case-insensitive search.
    pub fn title_lc(&self) -> String {
        self.title.to_lowercase()
    }

    pub fn is_published(&self) -> bool {
        self.status == PageStatus::Published
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    /// Revision `version` of `pid` in tenant `root`, locale `en-US`.
    pub fn page(pid: &str, version: u32) -> Page {
        let created_on = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        Page {
            id: keys::page_id(pid, version),
            pid: pid.to_string(),
            tenant: "root".to_string(),
            locale: "en-US".to_string(),
            version,
            status: PageStatus::Draft,
            title: format!("Page {} v{}", pid, version),
            path: format!("/{}", pid),
            category: "static".to_string(),
            editor: "page-builder".to_string(),
            locked: false,
            settings: PageSettings::default(),
            content: None,
            created_on,
            saved_on: created_on,
            published_on: None,
            created_by: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_camel_case() {
        let json = serde_json::to_string(&PageStatus::ReviewRequested).unwrap();
        assert_eq!(json, "\"reviewRequested\"");
        assert_eq!(PageStatus::ChangesRequested.to_string(), "changesRequested");
    }

    #[test]
    fn test_scope_validation() {
        assert!(PageScope::new("root", "en-US").is_ok());
        assert!(PageScope::new("", "en-US").is_err());
        assert!(PageScope::new("root", "").is_err());
        assert!(PageScope::new("ro#ot", "en-US").is_err());
    }

    #[test]
    fn test_page_round_trips_through_json() {
        let mut page = fixtures::page("abc", 2);
        page.settings.general.tags = vec!["news".to_string()];

        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["id"], "abc#0002");
        assert_eq!(value["settings"]["general"]["tags"][0], "news");
        assert_eq!(value["createdOn"], "2024-01-01T12:00:00Z");

        let back: Page = serde_json::from_value(value).unwrap();
        assert_eq!(back, page);
    }
}
