//! Page storage operations
//!
//! One method per lifecycle transition. Each follows the same shape:
//!
//! 1. derive the keys of the affected projections
//! 2. read current state where the decision depends on it
//! 3. plan the ordered puts/deletes ([`plan`])
//! 4. submit them through [`batch_write_all`]
//! 5. return the canonical page
//!
//! Failures of step 2 or 4 are wrapped into [`Error::Operation`] with an
//! operation specific code. Nothing is retried or compensated: a failed
//! chunk leaves earlier chunks applied, and re-running the operation
//! converges.

pub mod plan;
pub mod read;

use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{Error, ErrorCode, Result};
use crate::keys::{self, PageKeys};
use crate::metrics::OperationTimer;
use crate::page::{Page, PageStatus};
use crate::plugin::FieldRegistry;
use crate::storage::{
    batch_write_all, query_all, query_one, QueryRequest, SortKeyCondition, Table, PATH_INDEX,
};

pub use read::{GetWhere, ListMeta, ListParams, ListResponse, ListTagsWhere};

/// Default page size of list requests.
pub const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct CreateParams {
    pub page: Page,
}

#[derive(Debug, Clone)]
pub struct CreateFromParams {
    pub page: Page,
    pub latest_page: Page,
    pub original: Page,
}

#[derive(Debug, Clone)]
pub struct UpdateParams {
    pub original: Page,
    pub page: Page,
}

#[derive(Debug, Clone)]
pub struct PublishParams {
    pub page: Page,
    pub latest_page: Page,
    pub published_page: Option<Page>,
}

#[derive(Debug, Clone)]
pub struct UnpublishParams {
    pub page: Page,
    pub latest_page: Page,
}

/// Parameters of `request_review` and `request_changes`.
#[derive(Debug, Clone)]
pub struct StatusChangeParams {
    pub original: Page,
    pub page: Page,
    pub latest_page: Page,
}

pub type RequestReviewParams = StatusChangeParams;
pub type RequestChangesParams = StatusChangeParams;

#[derive(Debug, Clone)]
pub struct DeleteParams {
    pub page: Page,
    pub latest_page: Option<Page>,
    pub published_page: Option<Page>,
}

#[derive(Debug, Clone)]
pub struct DeleteAllParams {
    pub page: Page,
}

/// Storage operations for pages in a single table
#[derive(Debug, Clone)]
pub struct PageStorageOperations {
    table: Arc<Table>,
    fields: Arc<FieldRegistry>,
    default_list_limit: usize,
    path_index: String,
}

async fn timed<T>(operation: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
    let timer = OperationTimer::start(operation);
    let result = fut.await;
    timer.finish(&result);
    result
}

impl PageStorageOperations {
    pub fn new(table: Arc<Table>, fields: FieldRegistry) -> Self {
        Self {
            table,
            fields: Arc::new(fields),
            default_list_limit: DEFAULT_LIST_LIMIT,
            path_index: PATH_INDEX.to_string(),
        }
    }

    pub fn from_config(table: Arc<Table>, fields: FieldRegistry, config: &StoreConfig) -> Self {
        Self {
            table,
            fields: Arc::new(fields),
            default_list_limit: config.default_list_limit.max(1),
            path_index: config.path_index.clone(),
        }
    }

    /// Page size used when a list request has none; at least one item.
    pub fn with_default_list_limit(mut self, limit: usize) -> Self {
        self.default_list_limit = limit.max(1);
        self
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    pub fn default_list_limit(&self) -> usize {
        self.default_list_limit
    }

    pub(crate) fn path_index(&self) -> &str {
        &self.path_index
    }

    /// Submits planned requests, wrapping any failure with `code` and `data`.
    async fn submit(
        &self,
        plan: plan::MutationPlan,
        code: ErrorCode,
        message: &str,
        data: impl FnOnce() -> Value,
    ) -> Result<()> {
        debug!(code = %code, requests = plan.len(), "Submitting mutation plan");
        batch_write_all(&self.table, plan.into_requests())
            .await
            .map_err(|e| Error::wrap(e, code, message, data()))
    }

    pub async fn create(&self, params: CreateParams) -> Result<Page> {
        timed("create", async {
            let CreateParams { page } = params;
            let page_keys = PageKeys::for_page(&page);
            let plan = plan::plan_create(&page)?;

            self.submit(plan, ErrorCode::CreatePage, "Could not create new page.", || {
                json!({
                    "revisionKeys": page_keys.revision,
                    "latestKeys": page_keys.latest,
                    "page": page,
                })
            })
            .await?;
            Ok(page)
        })
        .await
    }

    pub async fn create_from(&self, params: CreateFromParams) -> Result<Page> {
        timed("create_from", async {
            let CreateFromParams {
                page,
                latest_page,
                original,
            } = params;
            let page_keys = PageKeys::for_page(&page);
            let plan = plan::plan_create(&page)?;

            self.submit(
                plan,
                ErrorCode::CreatePageFrom,
                "Could not create new page from existing page.",
                || {
                    json!({
                        "revisionKeys": page_keys.revision,
                        "latestKeys": page_keys.latest,
                        "latestPage": latest_page,
                        "original": original,
                        "page": page,
                    })
                },
            )
            .await?;
            Ok(page)
        })
        .await
    }

    /// Saves a revision, and the Latest record when it is the current head.
    pub async fn update(&self, params: UpdateParams) -> Result<Page> {
        timed("update", async {
            let UpdateParams { original, page } = params;
            let page_keys = PageKeys::for_page(&page);

            let latest_page = match self.table.get_item(&page_keys.latest).await {
                Ok(item) => item.map(|item| item.to_page()).transpose()?,
                Err(e) => {
                    return Err(Error::wrap(
                        e,
                        ErrorCode::UpdatePage,
                        "Could not load the latest page record.",
                        json!({ "latestKeys": page_keys.latest, "page": page }),
                    ))
                }
            };

            let plan = plan::plan_update(&page, latest_page.as_ref())?;
            self.submit(plan, ErrorCode::UpdatePage, "Could not update existing page.", || {
                json!({
                    "original": original,
                    "page": page,
                    "latestPage": latest_page,
                    "latestKeys": page_keys.latest,
                    "revisionKeys": page_keys.revision,
                })
            })
            .await?;
            Ok(page)
        })
        .await
    }

    /// Deletes one revision, promoting the previous revision to Latest when
    /// the deleted one was the head.
    ///
    /// Returns the deleted page and the new Latest, if it changed.
    pub async fn delete(&self, params: DeleteParams) -> Result<(Page, Option<Page>)> {
        timed("delete", async {
            let DeleteParams {
                page,
                latest_page,
                published_page,
            } = params;
            let scope = page.scope();

            let deletes_latest = latest_page.as_ref().is_some_and(|latest| latest.id == page.id);
            let previous = if deletes_latest {
                let request = QueryRequest::partition(keys::revision_partition_key(&scope, &page.pid))
                    .with_condition(SortKeyCondition::Lt(keys::revision_sort_key(page.version)))
                    .reverse();
                let item = query_one(&self.table, &request).await.map_err(|e| {
                    Error::wrap(
                        e,
                        ErrorCode::ListRevisions,
                        "Could not load the previous revision of the page.",
                        json!({ "page": page }),
                    )
                })?;
                item.map(|item| item.to_page()).transpose()?
            } else {
                None
            };

            let plan = plan::plan_delete(
                &page,
                latest_page.as_ref(),
                published_page.as_ref(),
                previous.as_ref(),
            )?;
            self.submit(
                plan,
                ErrorCode::BatchWriteRecords,
                "Could not batch write all the page records.",
                || json!({ "page": page, "previousLatestPage": previous }),
            )
            .await?;

            debug!(id = %page.id, promoted = ?previous.as_ref().map(|p| &p.id), "Deleted page revision");
            Ok((page, previous))
        })
        .await
    }

    /// Deletes every record of the page: Latest, Published (and path) and all
    /// revisions.
    pub async fn delete_all(&self, params: DeleteAllParams) -> Result<Page> {
        timed("delete_all", async {
            let DeleteAllParams { page } = params;
            let scope = page.scope();
            let request = QueryRequest::partition(keys::revision_partition_key(&scope, &page.pid));

            let revisions = query_all(&self.table, &request).await.map_err(|e| {
                Error::wrap(
                    e,
                    ErrorCode::ListRevisions,
                    "Could not query for all revisions of the page.",
                    json!({ "partitionKey": request.partition_key }),
                )
            })?;
            let revisions = revisions
                .iter()
                .map(|item| item.to_page())
                .collect::<Result<Vec<_>>>()?;

            let plan = match plan::plan_delete_all(&page, &revisions) {
                Ok(plan) => plan,
                Err(e) => {
                    warn!(pid = %page.pid, error = %e, "Refusing to delete page");
                    return Err(e);
                }
            };
            self.submit(
                plan,
                ErrorCode::DeleteRecords,
                "Could not delete all the page records.",
                || json!({ "pid": page.pid, "revisions": revisions.len() }),
            )
            .await?;

            info!(pid = %page.pid, revisions = revisions.len(), "Deleted page");
            Ok(page)
        })
        .await
    }

    /// Publishes a revision. The returned page has the `published` status.
    pub async fn publish(&self, params: PublishParams) -> Result<Page> {
        timed("publish", async {
            let PublishParams {
                page,
                latest_page,
                published_page,
            } = params;
            let page = page.with_status(PageStatus::Published);

            let plan = plan::plan_publish(&page, &latest_page, published_page.as_ref())?;
            self.submit(
                plan,
                ErrorCode::UpdateRecords,
                "Could not update all the page records when publishing.",
                || {
                    json!({
                        "page": page,
                        "latestPage": latest_page,
                        "publishedPage": published_page,
                    })
                },
            )
            .await?;

            info!(
                id = %page.id,
                path = %page.path,
                previous = ?published_page.as_ref().map(|p| &p.id),
                "Published page"
            );
            Ok(page)
        })
        .await
    }

    pub async fn unpublish(&self, params: UnpublishParams) -> Result<Page> {
        timed("unpublish", async {
            let UnpublishParams { page, latest_page } = params;

            let plan = plan::plan_unpublish(&page, &latest_page)?;
            self.submit(
                plan,
                ErrorCode::UpdateRecords,
                "Could not update all the page records when unpublishing.",
                || json!({ "page": page, "latestPage": latest_page }),
            )
            .await?;

            info!(id = %page.id, status = %page.status, "Unpublished page");
            Ok(page)
        })
        .await
    }

    pub async fn request_review(&self, params: RequestReviewParams) -> Result<Page> {
        timed("request_review", async {
            self.change_status(
                params,
                PageStatus::ReviewRequested,
                ErrorCode::RequestReview,
                "Could not request review on page record.",
            )
            .await
        })
        .await
    }

    pub async fn request_changes(&self, params: RequestChangesParams) -> Result<Page> {
        timed("request_changes", async {
            self.change_status(
                params,
                PageStatus::ChangesRequested,
                ErrorCode::RequestChanges,
                "Could not request changes on page record.",
            )
            .await
        })
        .await
    }

    async fn change_status(
        &self,
        params: StatusChangeParams,
        status: PageStatus,
        code: ErrorCode,
        message: &str,
    ) -> Result<Page> {
        let StatusChangeParams {
            original,
            page,
            latest_page,
        } = params;
        let page = page.with_status(status);

        let plan = plan::plan_status_change(&page, &latest_page)?;
        self.submit(plan, code, message, || {
            json!({
                "original": original,
                "page": page,
                "latestPage": latest_page,
            })
        })
        .await?;
        Ok(page)
    }
}
