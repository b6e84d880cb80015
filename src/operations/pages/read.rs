//! Read paths: get, get by path, list, revisions and tags

use regex_lite::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use tracing::debug;

use super::{timed, PageStorageOperations};
use crate::error::{Error, ErrorCode, Result};
use crate::keys;
use crate::page::{Page, PageScope};
use crate::query::{
    decode_cursor, encode_cursor, sort_pages, validate_sort, ListProjection, ListWhere, SortSpec,
};
use crate::storage::{query_all, query_one, Item, QueryRequest, SortKeyCondition};

/// Lookup of a single page.
///
/// Resolution order: `path`, then `published`, then an explicit or id-embedded
/// `version`, otherwise the Latest record.
#[derive(Debug, Clone)]
pub struct GetWhere {
    pub scope: PageScope,
    pub id: Option<String>,
    pub pid: Option<String>,
    pub path: Option<String>,
    pub published: bool,
    pub version: Option<u32>,
}

impl GetWhere {
    pub fn id(scope: PageScope, id: impl Into<String>) -> Self {
        Self {
            scope,
            id: Some(id.into()),
            pid: None,
            path: None,
            published: false,
            version: None,
        }
    }

    pub fn published(scope: PageScope, pid: impl Into<String>) -> Self {
        Self {
            published: true,
            ..Self::id(scope, pid)
        }
    }

    pub fn path(scope: PageScope, path: impl Into<String>) -> Self {
        Self {
            scope,
            id: None,
            pid: None,
            path: Some(path.into()),
            published: false,
            version: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListParams {
    pub where_: ListWhere,
    pub sort: Vec<SortSpec>,
    pub limit: Option<usize>,
    pub after: Option<String>,
}

impl ListParams {
    pub fn new(where_: ListWhere) -> Self {
        Self {
            where_,
            sort: Vec::new(),
            limit: None,
            after: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    pub has_more_items: bool,
    pub total_count: usize,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    pub items: Vec<Page>,
    pub meta: ListMeta,
}

#[derive(Debug, Clone)]
pub struct ListTagsWhere {
    pub scope: PageScope,
    /// Case-insensitive pattern the tags must match.
    pub search: Option<String>,
}

fn to_pages(items: &[Item]) -> Result<Vec<Page>> {
    items.iter().map(Item::to_page).collect()
}

impl PageStorageOperations {
    pub async fn get(&self, where_: GetWhere) -> Result<Option<Page>> {
        if let Some(path) = &where_.path {
            return self.get_by_path(&where_.scope, path).await;
        }

        let Some(id) = where_.id.as_deref().or(where_.pid.as_deref()) else {
            return Err(Error::operation(
                ErrorCode::MalformedGetRequest,
                "There are no ID or pageId.",
                json!({
                    "tenant": where_.scope.tenant(),
                    "locale": where_.scope.locale(),
                }),
            ));
        };
        let parsed = keys::parse_page_id(id);
        let version = where_.version.or(parsed.version);

        let key = if where_.published {
            keys::published_keys(&where_.scope, &parsed.pid)
        } else if let Some(version) = version {
            keys::revision_keys(&where_.scope, &parsed.pid, version)
        } else {
            keys::latest_keys(&where_.scope, &parsed.pid)
        };

        timed("get", async {
            let item = self.table.get_item(&key).await.map_err(|e| {
                Error::wrap(
                    e,
                    ErrorCode::GetPage,
                    "Could not load page by given params.",
                    json!({ "id": id, "published": where_.published, "keys": key }),
                )
            })?;
            item.map(|item| item.to_page()).transpose()
        })
        .await
    }

    /// Published page served under `path`.
    pub async fn get_by_path(&self, scope: &PageScope, path: &str) -> Result<Option<Page>> {
        let path_keys = keys::path_keys(scope, path);
        let request = QueryRequest::partition(path_keys.pk.clone())
            .with_index(self.path_index())
            .with_condition(SortKeyCondition::Eq(path_keys.sk.clone()));

        timed("get_by_path", async {
            let item = query_one(&self.table, &request).await.map_err(|e| {
                Error::wrap(
                    e,
                    ErrorCode::GetPageByPath,
                    "Could not get page by given path.",
                    json!({ "path": path, "keys": path_keys }),
                )
            })?;
            item.map(|item| item.to_page()).transpose()
        })
        .await
    }

    /// Filtered, sorted and paginated Latest or Published pages.
    ///
    /// The `where` and sort are validated before the table is touched.
    pub async fn list(&self, params: ListParams) -> Result<ListResponse> {
        let ListParams {
            where_,
            sort,
            limit,
            after,
        } = params;
        where_.validate_fields(&self.fields)?;
        validate_sort(&sort, &self.fields)?;
        let start = decode_cursor(after.as_deref())?;
        let limit = limit.filter(|l| *l > 0).unwrap_or(self.default_list_limit);
        let end = start.checked_add(limit).ok_or_else(|| {
            Error::operation(
                ErrorCode::InvalidCursor,
                "Pagination cursor is out of range.",
                json!({ "cursor": after, "limit": limit }),
            )
        })?;

        let scope = where_.scope();
        let partition_key = match where_.projection() {
            ListProjection::Latest => keys::latest_partition_key(scope),
            ListProjection::Published => keys::published_partition_key(scope),
        };

        timed("list", async {
            let request = QueryRequest::partition(partition_key.clone());
            let items = query_all(&self.table, &request).await.map_err(|e| {
                Error::wrap(
                    e,
                    ErrorCode::ListPages,
                    "Could not load pages by given query params.",
                    json!({ "partitionKey": partition_key }),
                )
            })?;

            let mut pages: Vec<Page> = to_pages(&items)?
                .into_iter()
                .filter(|page| where_.matches(page, &self.fields))
                .collect();
            sort_pages(&mut pages, &sort, &self.fields);

            let total_count = pages.len();
            let has_more_items = total_count > end;
            let items: Vec<Page> = pages.into_iter().skip(start).take(limit).collect();
            let cursor = has_more_items.then(|| encode_cursor(end));

            debug!(
                partition_key = %partition_key,
                total_count,
                returned = items.len(),
                has_more_items,
                "Listed pages"
            );
            Ok(ListResponse {
                items,
                meta: ListMeta {
                    has_more_items,
                    total_count,
                    cursor,
                },
            })
        })
        .await
    }

    /// Every revision of `pid`, ascending by version.
    pub async fn list_revisions(&self, scope: &PageScope, pid: &str) -> Result<Vec<Page>> {
        let request = QueryRequest::partition(keys::revision_partition_key(scope, pid));

        timed("list_revisions", async {
            let items = query_all(&self.table, &request).await.map_err(|e| {
                Error::wrap(
                    e,
                    ErrorCode::LoadPageRevisions,
                    "Could not load all the revisions from requested page.",
                    json!({ "pid": pid, "partitionKey": request.partition_key }),
                )
            })?;
            to_pages(&items)
        })
        .await
    }

    /// Distinct tags of the Latest pages in order of first occurrence.
    pub async fn list_tags(&self, where_: ListTagsWhere) -> Result<Vec<String>> {
        let pattern = match where_.search.as_deref().filter(|s| !s.is_empty()) {
            Some(search) => Some(
                RegexBuilder::new(search)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        Error::operation(
                            ErrorCode::MalformedWhere,
                            format!("Invalid tag search pattern: {}", e),
                            json!({ "search": search }),
                        )
                    })?,
            ),
            None => None,
        };
        let partition_key = keys::latest_partition_key(&where_.scope);

        timed("list_tags", async {
            let request = QueryRequest::partition(partition_key.clone());
            let items = query_all(&self.table, &request).await.map_err(|e| {
                Error::wrap(
                    e,
                    ErrorCode::ListPagesTags,
                    "Could not load pages by given query params.",
                    json!({ "partitionKey": partition_key }),
                )
            })?;

            let mut seen = HashSet::new();
            let mut tags = Vec::new();
            for page in to_pages(&items)? {
                for tag in page.tags() {
                    if pattern.as_ref().is_some_and(|re| !re.is_match(tag)) {
                        continue;
                    }
                    if seen.insert(tag.clone()) {
                        tags.push(tag.clone());
                    }
                }
            }
            Ok(tags)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::pages::{CreateParams, PublishParams};
    use crate::page::fixtures;
    use crate::plugin::FieldRegistry;
    use crate::query::TagsRule;
    use crate::storage::{MockTable, Table};
    use std::sync::Arc;

    fn scope() -> PageScope {
        PageScope::new("root", "en-US").unwrap()
    }

    fn operations(mock: &MockTable) -> PageStorageOperations {
        let table = Arc::new(Table::new("pages", Box::new(mock.clone())));
        PageStorageOperations::new(table, FieldRegistry::with_defaults())
    }

    async fn seed(ops: &PageStorageOperations, pid: &str, tags: &[&str]) -> Result<Page> {
        let mut page = fixtures::page(pid, 1);
        page.settings.general.tags = tags.iter().map(|t| t.to_string()).collect();
        ops.create(CreateParams { page }).await
    }

    #[tokio::test]
    async fn test_get_resolution() -> Result<()> {
        let mock = MockTable::new();
        let ops = operations(&mock);
        let page = seed(&ops, "abc", &[]).await?;
        ops.publish(PublishParams {
            page: page.clone(),
            latest_page: page.clone(),
            published_page: None,
        })
        .await?;

        let latest = ops.get(GetWhere::id(scope(), "abc")).await?;
        assert_eq!(latest.map(|p| p.version), Some(1));

        let revision = ops.get(GetWhere::id(scope(), "abc#0001")).await?;
        assert_eq!(revision.map(|p| p.id), Some("abc#0001".to_string()));

        let missing = ops.get(GetWhere::id(scope(), "abc#0002")).await?;
        assert!(missing.is_none());

        let published = ops.get(GetWhere::published(scope(), "abc")).await?;
        let by_path = ops.get(GetWhere::path(scope(), "/abc")).await?;
        assert!(published.is_some());
        assert_eq!(published, by_path);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_without_id_is_malformed() {
        let mock = MockTable::new();
        let ops = operations(&mock);
        let where_ = GetWhere {
            scope: scope(),
            id: None,
            pid: None,
            path: None,
            published: true,
            version: None,
        };

        let err = ops.get(where_).await.unwrap_err();
        assert_eq!(err.code(), "MALFORMED_GET_REQUEST");
        assert_eq!(mock.stats().io_calls(), 0);
    }

    #[tokio::test]
    async fn test_read_failures_are_wrapped() -> Result<()> {
        let mock = MockTable::new();
        let ops = operations(&mock);
        seed(&ops, "abc", &[]).await?;
        mock.fail_reads(true);

        let err = ops.get(GetWhere::id(scope(), "abc")).await.unwrap_err();
        assert_eq!(err.code(), "GET_PAGE_ERROR");
        let err = ops.get_by_path(&scope(), "/abc").await.unwrap_err();
        assert_eq!(err.code(), "GET_PAGE_BY_PATH_ERROR");
        let err = ops.list(ListParams::new(ListWhere::latest(scope()))).await.unwrap_err();
        assert_eq!(err.code(), "LIST_PAGES_ERROR");
        let err = ops.list_revisions(&scope(), "abc").await.unwrap_err();
        assert_eq!(err.code(), "LOAD_PAGE_REVISIONS_ERROR");
        let err = ops
            .list_tags(ListTagsWhere {
                scope: scope(),
                search: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "LIST_PAGES_TAGS_ERROR");
        Ok(())
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() -> Result<()> {
        let mock = MockTable::new();
        let ops = operations(&mock);
        seed(&ops, "a", &["news"]).await?;
        seed(&ops, "b", &["news", "tech"]).await?;
        seed(&ops, "c", &["sports"]).await?;

        let where_ = ListWhere::builder(scope())
            .tags(vec!["news".to_string()], TagsRule::Any)
            .build()?;
        let mut params = ListParams::new(where_);
        params.sort = vec![SortSpec::desc("pid")];
        let response = ops.list(params).await?;

        let pids: Vec<&str> = response.items.iter().map(|p| p.pid.as_str()).collect();
        assert_eq!(pids, vec!["b", "a"]);
        assert_eq!(response.meta.total_count, 2);
        assert!(!response.meta.has_more_items);
        assert!(response.meta.cursor.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_sort_before_io() {
        let mock = MockTable::new();
        let ops = operations(&mock);
        let mut params = ListParams::new(ListWhere::latest(scope()));
        params.sort = vec![SortSpec::asc("colour")];

        let err = ops.list(params).await.unwrap_err();
        assert_eq!(err.code(), "MALFORMED_SORT_ERROR");
        assert_eq!(mock.stats().io_calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_default_limit_still_advances() -> Result<()> {
        let mock = MockTable::new();
        let ops = operations(&mock).with_default_list_limit(0);
        assert_eq!(ops.default_list_limit(), 1);
        seed(&ops, "a", &[]).await?;
        seed(&ops, "b", &[]).await?;

        let first = ops.list(ListParams::new(ListWhere::latest(scope()))).await?;
        assert_eq!(first.items.len(), 1);
        assert!(first.meta.has_more_items);

        let mut params = ListParams::new(ListWhere::latest(scope()));
        params.after = first.meta.cursor;
        let second = ops.list(params).await?;
        assert_eq!(second.items.len(), 1);
        assert_ne!(first.items[0].pid, second.items[0].pid);
        assert!(!second.meta.has_more_items);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_rejects_out_of_range_cursor() -> Result<()> {
        let mock = MockTable::new();
        let ops = operations(&mock);
        seed(&ops, "a", &[]).await?;
        let reads_before = mock.stats().io_calls();

        let mut params = ListParams::new(ListWhere::latest(scope()));
        params.after = Some(encode_cursor(usize::MAX));
        let err = ops.list(params).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_CURSOR");
        assert_eq!(mock.stats().io_calls(), reads_before);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_tags() -> Result<()> {
        let mock = MockTable::new();
        let ops = operations(&mock);
        seed(&ops, "a", &["News", "tech"]).await?;
        seed(&ops, "b", &["tech", "sports"]).await?;

        let all = ops
            .list_tags(ListTagsWhere {
                scope: scope(),
                search: None,
            })
            .await?;
        assert_eq!(all, vec!["News", "tech", "sports"]);

        let filtered = ops
            .list_tags(ListTagsWhere {
                scope: scope(),
                search: Some("^n".to_string()),
            })
            .await?;
        assert_eq!(filtered, vec!["News"]);

        let err = ops
            .list_tags(ListTagsWhere {
                scope: scope(),
                search: Some("(".to_string()),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MALFORMED_WHERE_ERROR");
        Ok(())
    }
}
