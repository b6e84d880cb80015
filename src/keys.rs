//! Key schema for page records
//!
//! All page projections share one table. Each projection has its own
//! partition/sort key pattern under the scope prefix `T#{tenant}#L#{locale}#PB`:
//!
//! ```text
//! Revision   PK = {base}#P#{pid}       SK = {version:04}
//! Latest     PK = {base}#LATEST        SK = {pid}
//! Published  PK = {base}#PUBLISHED     SK = {pid}
//! Path       GSI1_PK = {base}#PATH     GSI1_SK = {path}   (carried by Published)
//! ```
//!
//! Versions are zero padded so that lexical sort key order equals numeric
//! version order.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::page::{Page, PageScope};

/// Separator between key segments.
pub const SEPARATOR: char = '#';

/// Width of the zero padded version in revision sort keys and page ids.
pub const VERSION_WIDTH: usize = 4;

/// Highest version that still sorts correctly with [`VERSION_WIDTH`] digits.
pub const MAX_VERSION: u32 = 9999;

/// `TYPE` discriminator of revision records.
pub const REVISION_TYPE: &str = "pb.page";
/// `TYPE` discriminator of latest records.
pub const LATEST_TYPE: &str = "pb.page.l";
/// `TYPE` discriminator of published records.
pub const PUBLISHED_TYPE: &str = "pb.page.p";

/// Partition and sort key of a single record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "SK")]
    pub sk: String,
}

impl RecordKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.pk, self.sk)
    }
}

/// A page id split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageId {
    pub pid: String,
    pub version: Option<u32>,
}

/// Composite revision id `{pid}#{version:04}`.
pub fn page_id(pid: &str, version: u32) -> String {
    format!("{}{}{:0width$}", pid, SEPARATOR, version, width = VERSION_WIDTH)
}

/// Splits `pid#0003` into `("pid", Some(3))`; a bare pid has no version.
pub fn parse_page_id(id: &str) -> PageId {
    if let Some((pid, suffix)) = id.rsplit_once(SEPARATOR) {
        if let Ok(version) = suffix.parse::<u32>() {
            return PageId {
                pid: pid.to_string(),
                version: Some(version),
            };
        }
    }
    PageId {
        pid: id.to_string(),
        version: None,
    }
}

fn base_partition_key(scope: &PageScope) -> String {
    format!("T#{}#L#{}#PB", scope.tenant(), scope.locale())
}

pub fn revision_partition_key(scope: &PageScope, pid: &str) -> String {
    format!("{}#P#{}", base_partition_key(scope), pid)
}

pub fn revision_sort_key(version: u32) -> String {
    format!("{:0width$}", version, width = VERSION_WIDTH)
}

pub fn revision_keys(scope: &PageScope, pid: &str, version: u32) -> RecordKey {
    RecordKey::new(revision_partition_key(scope, pid), revision_sort_key(version))
}

pub fn latest_partition_key(scope: &PageScope) -> String {
    format!("{}#LATEST", base_partition_key(scope))
}

pub fn latest_keys(scope: &PageScope, pid: &str) -> RecordKey {
    RecordKey::new(latest_partition_key(scope), pid)
}

pub fn published_partition_key(scope: &PageScope) -> String {
    format!("{}#PUBLISHED", base_partition_key(scope))
}

pub fn published_keys(scope: &PageScope, pid: &str) -> RecordKey {
    RecordKey::new(published_partition_key(scope), pid)
}

pub fn path_partition_key(scope: &PageScope) -> String {
    format!("{}#PATH", base_partition_key(scope))
}

/// Index key (`GSI1_PK`, `GSI1_SK`) resolving a path to its published page.
pub fn path_keys(scope: &PageScope, path: &str) -> RecordKey {
    RecordKey::new(path_partition_key(scope), path)
}

/// Every key a page revision can be stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageKeys {
    pub revision: RecordKey,
    pub latest: RecordKey,
    pub published: RecordKey,
    pub path: RecordKey,
}

impl PageKeys {
    pub fn for_page(page: &Page) -> Self {
        let scope = page.scope();
        Self {
            revision: revision_keys(&scope, &page.pid, page.version),
            latest: latest_keys(&scope, &page.pid),
            published: published_keys(&scope, &page.pid),
            path: path_keys(&scope, &page.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::fixtures;

    fn scope() -> PageScope {
        PageScope::new("root", "en-US").unwrap()
    }

    #[test]
    fn test_key_families() {
        let scope = scope();
        assert_eq!(
            revision_keys(&scope, "abc", 3),
            RecordKey::new("T#root#L#en-US#PB#P#abc", "0003")
        );
        assert_eq!(
            latest_keys(&scope, "abc"),
            RecordKey::new("T#root#L#en-US#PB#LATEST", "abc")
        );
        assert_eq!(
            published_keys(&scope, "abc"),
            RecordKey::new("T#root#L#en-US#PB#PUBLISHED", "abc")
        );
        assert_eq!(
            path_keys(&scope, "/about"),
            RecordKey::new("T#root#L#en-US#PB#PATH", "/about")
        );
    }

    #[test]
    fn test_sort_keys_order_like_versions() {
        let mut keys: Vec<String> = [10, 2, 9999, 1, 100].iter().map(|v| revision_sort_key(*v)).collect();
        keys.sort();
        assert_eq!(keys, vec!["0001", "0002", "0010", "0100", "9999"]);
    }

    #[test]
    fn test_page_id_round_trip() {
        assert_eq!(page_id("abc", 7), "abc#0007");
        assert_eq!(
            parse_page_id("abc#0007"),
            PageId {
                pid: "abc".to_string(),
                version: Some(7)
            }
        );
        assert_eq!(parse_page_id("abc").version, None);
        assert_eq!(parse_page_id("abc#draft").pid, "abc#draft");
    }

    #[test]
    fn test_scopes_do_not_collide() {
        let a = PageScope::new("root", "en-US").unwrap();
        let b = PageScope::new("root", "de-DE").unwrap();
        let c = PageScope::new("other", "en-US").unwrap();
        assert_ne!(latest_keys(&a, "p"), latest_keys(&b, "p"));
        assert_ne!(latest_keys(&a, "p"), latest_keys(&c, "p"));
        assert_ne!(latest_partition_key(&a), published_partition_key(&a));
    }

    #[test]
    fn test_page_keys_are_stable() {
        let page = fixtures::page("abc", 2);
        assert_eq!(PageKeys::for_page(&page), PageKeys::for_page(&page.clone()));
        assert_eq!(PageKeys::for_page(&page).revision.sk, "0002");
        assert_eq!(PageKeys::for_page(&page).path.sk, "/abc");
    }
}
