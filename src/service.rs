//! Page service
//!
//! The calling layer over [`PageStorageOperations`]: it builds new revisions,
//! reads the Latest and Published snapshots the operations expect, enforces
//! status preconditions and turns misses into `NOT_FOUND`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, ErrorCode, Result};
use crate::keys::{self, MAX_VERSION};
use crate::operations::{
    CreateFromParams, CreateParams, DeleteAllParams, DeleteParams, GetWhere, ListParams,
    ListResponse, ListTagsWhere, PageStorageOperations, PublishParams, StatusChangeParams,
    UnpublishParams, UpdateParams,
};
use crate::page::{Identity, Page, PageScope, PageSettings, PageStatus};

const DEFAULT_TITLE: &str = "Untitled";
const DEFAULT_EDITOR: &str = "page-builder";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePageInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub created_by: Option<Identity>,
}

/// Patch applied by `update`; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePageInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub settings: Option<PageSettings>,
    #[serde(default)]
    pub content: Option<Value>,
}

impl UpdatePageInput {
    fn apply(self, page: &mut Page) {
        if let Some(title) = self.title {
            page.title = title;
        }
        if let Some(path) = self.path {
            page.path = path;
        }
        if let Some(category) = self.category {
            page.category = category;
        }
        if let Some(settings) = self.settings {
            page.settings = settings;
        }
        if let Some(content) = self.content {
            page.content = Some(content);
        }
    }
}

fn not_found(what: &str) -> Error {
    Error::NotFound(format!("Page \"{}\" not found.", what))
}

fn invalid_status(page: &Page, message: &str) -> Error {
    Error::operation(
        ErrorCode::InvalidStatus,
        message,
        json!({ "id": page.id, "status": page.status }),
    )
}

/// Page lifecycle service
#[derive(Debug, Clone)]
pub struct PageService {
    operations: PageStorageOperations,
}

impl PageService {
    pub fn new(operations: PageStorageOperations) -> Self {
        Self { operations }
    }

    pub fn operations(&self) -> &PageStorageOperations {
        &self.operations
    }

    /// Revision addressed by `id`, or the Latest one for a bare pid.
    pub async fn get(&self, scope: &PageScope, id: &str) -> Result<Page> {
        self.operations
            .get(GetWhere::id(scope.clone(), id))
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn get_published(&self, scope: &PageScope, pid: &str) -> Result<Page> {
        self.operations
            .get(GetWhere::published(scope.clone(), pid))
            .await?
            .ok_or_else(|| not_found(pid))
    }

    pub async fn get_published_by_path(&self, scope: &PageScope, path: &str) -> Result<Page> {
        self.operations
            .get_by_path(scope, path)
            .await?
            .ok_or_else(|| not_found(path))
    }

    async fn get_latest(&self, scope: &PageScope, pid: &str) -> Result<Page> {
        let pid = keys::parse_page_id(pid).pid;
        self.get(scope, &pid).await
    }

    async fn find_published(&self, scope: &PageScope, pid: &str) -> Result<Option<Page>> {
        self.operations
            .get(GetWhere::published(scope.clone(), pid))
            .await
    }

    pub async fn list(&self, params: ListParams) -> Result<ListResponse> {
        self.operations.list(params).await
    }

    pub async fn list_revisions(&self, scope: &PageScope, id: &str) -> Result<Vec<Page>> {
        let pid = keys::parse_page_id(id).pid;
        self.operations.list_revisions(scope, &pid).await
    }

    pub async fn list_tags(&self, scope: &PageScope, search: Option<String>) -> Result<Vec<String>> {
        self.operations
            .list_tags(ListTagsWhere {
                scope: scope.clone(),
                search,
            })
            .await
    }

    /// New page with a fresh pid, version 1, as a draft.
    pub async fn create(&self, scope: &PageScope, input: CreatePageInput) -> Result<Page> {
        let pid = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let page = Page {
            id: keys::page_id(&pid, 1),
            tenant: scope.tenant().to_string(),
            locale: scope.locale().to_string(),
            version: 1,
            status: PageStatus::Draft,
            title: input.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            path: input
                .path
                .unwrap_or_else(|| format!("/untitled-{}", pid)),
            category: input.category,
            editor: DEFAULT_EDITOR.to_string(),
            locked: false,
            settings: PageSettings::default(),
            content: None,
            created_on: now,
            saved_on: now,
            published_on: None,
            created_by: input.created_by,
            pid,
        };

        debug!(id = %page.id, "Creating page");
        self.operations.create(CreateParams { page }).await
    }

    /// Copies revision `id` into a new draft revision on top of the Latest.
    pub async fn create_from(&self, scope: &PageScope, id: &str) -> Result<Page> {
        let original = self.get(scope, id).await?;
        let latest_page = self.get_latest(scope, &original.pid).await?;

        let version = latest_page.version + 1;
        if version > MAX_VERSION {
            return Err(Error::InvalidArgument(format!(
                "Page \"{}\" cannot have more than {} revisions",
                original.pid, MAX_VERSION
            )));
        }

        let now = Utc::now();
        let page = Page {
            id: keys::page_id(&original.pid, version),
            version,
            status: PageStatus::Draft,
            locked: false,
            published_on: None,
            created_on: now,
            saved_on: now,
            ..original.clone()
        };

        self.operations
            .create_from(CreateFromParams {
                page,
                latest_page,
                original,
            })
            .await
    }

    pub async fn update(&self, scope: &PageScope, id: &str, input: UpdatePageInput) -> Result<Page> {
        let original = self.get(scope, id).await?;
        if original.locked {
            return Err(Error::operation(
                ErrorCode::PageLocked,
                "Cannot update page because it's locked.",
                json!({ "id": original.id }),
            ));
        }

        let mut page = original.clone();
        input.apply(&mut page);
        page.saved_on = Utc::now();

        self.operations.update(UpdateParams { original, page }).await
    }

    /// Publishes revision `id`, demoting any other published revision.
    pub async fn publish(&self, scope: &PageScope, id: &str) -> Result<Page> {
        let original = self.get(scope, id).await?;
        if original.is_published() {
            return Err(invalid_status(&original, "Page is already published."));
        }
        let latest_page = self.get_latest(scope, &original.pid).await?;
        let published_page = self.find_published(scope, &original.pid).await?;

        let now = Utc::now();
        let page = Page {
            status: PageStatus::Published,
            locked: true,
            published_on: Some(now),
            saved_on: now,
            ..original
        };

        let page = self
            .operations
            .publish(PublishParams {
                page,
                latest_page,
                published_page,
            })
            .await?;
        info!(id = %page.id, "Page published");
        Ok(page)
    }

    pub async fn unpublish(&self, scope: &PageScope, id: &str) -> Result<Page> {
        let original = self.get(scope, id).await?;
        let published = self.find_published(scope, &original.pid).await?;
        if published.map(|p| p.id) != Some(original.id.clone()) {
            return Err(invalid_status(&original, "Page is not published."));
        }
        let latest_page = self.get_latest(scope, &original.pid).await?;

        let page = Page {
            status: PageStatus::Unpublished,
            saved_on: Utc::now(),
            ..original
        };
        self.operations
            .unpublish(UnpublishParams { page, latest_page })
            .await
    }

    /// Locks a draft for review.
    pub async fn request_review(&self, scope: &PageScope, id: &str) -> Result<Page> {
        let original = self.get(scope, id).await?;
        if !matches!(original.status, PageStatus::Draft | PageStatus::ChangesRequested) {
            return Err(invalid_status(
                &original,
                "Review can only be requested on a draft or a page with requested changes.",
            ));
        }
        let latest_page = self.get_latest(scope, &original.pid).await?;

        let page = Page {
            locked: true,
            saved_on: Utc::now(),
            ..original.clone()
        };
        self.operations
            .request_review(StatusChangeParams {
                original,
                page,
                latest_page,
            })
            .await
    }

    /// Sends a page under review back to its editor, unlocked.
    pub async fn request_changes(&self, scope: &PageScope, id: &str) -> Result<Page> {
        let original = self.get(scope, id).await?;
        if original.status != PageStatus::ReviewRequested {
            return Err(invalid_status(
                &original,
                "Changes can only be requested on a page under review.",
            ));
        }
        let latest_page = self.get_latest(scope, &original.pid).await?;

        let page = Page {
            locked: false,
            saved_on: Utc::now(),
            ..original.clone()
        };
        self.operations
            .request_changes(StatusChangeParams {
                original,
                page,
                latest_page,
            })
            .await
    }

    /// Deletes a revision, or the whole page for a bare pid or its last
    /// remaining revision.
    ///
    /// Returns the deleted page and the new Latest revision, if any remains.
    pub async fn delete(&self, scope: &PageScope, id: &str) -> Result<(Page, Option<Page>)> {
        let parsed = keys::parse_page_id(id);
        let latest_page = self.get_latest(scope, &parsed.pid).await?;

        if parsed.version.is_none() {
            let page = self
                .operations
                .delete_all(DeleteAllParams { page: latest_page })
                .await?;
            return Ok((page, None));
        }

        let page = self.get(scope, id).await?;
        let revisions = self.operations.list_revisions(scope, &parsed.pid).await?;
        if revisions.len() <= 1 {
            let page = self.operations.delete_all(DeleteAllParams { page }).await?;
            return Ok((page, None));
        }

        let published_page = self.find_published(scope, &parsed.pid).await?;
        let deletes_latest = latest_page.id == page.id;
        let (page, previous) = self
            .operations
            .delete(DeleteParams {
                page,
                latest_page: Some(latest_page.clone()),
                published_page,
            })
            .await?;

        let latest = if deletes_latest { previous } else { Some(latest_page) };
        Ok((page, latest))
    }
}
