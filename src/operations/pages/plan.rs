//! Mutation planning
//!
//! Every lifecycle transition is turned into an ordered list of puts and
//! deletes before anything is written. Planners are pure: given the page and
//! the Latest/Published snapshot they compute the desired projection state as
//! upserts and deletes keyed by immutable ids, so running a plan twice
//! converges to the same records.

use serde_json::json;

use crate::error::{Error, ErrorCode, Result};
use crate::keys::{self, PageKeys, RecordKey};
use crate::page::{Page, PageStatus};
use crate::storage::{Item, WriteRequest};

/// Ordered write requests of one logical operation.
#[derive(Debug, Default)]
pub struct MutationPlan {
    requests: Vec<WriteRequest>,
}

impl MutationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revision record; versions above [`keys::MAX_VERSION`] would break the
    /// sort key order and are rejected.
    pub fn put_revision(&mut self, page: &Page) -> Result<&mut Self> {
        if page.version == 0 || page.version > keys::MAX_VERSION {
            return Err(Error::InvalidArgument(format!(
                "Page version {} is outside 1..={}",
                page.version,
                keys::MAX_VERSION
            )));
        }
        let key = keys::revision_keys(&page.scope(), &page.pid, page.version);
        self.put(Item::from_page(page, &key, keys::REVISION_TYPE)?);
        Ok(self)
    }

    pub fn put_latest(&mut self, page: &Page) -> Result<&mut Self> {
        let key = keys::latest_keys(&page.scope(), &page.pid);
        self.put(Item::from_page(page, &key, keys::LATEST_TYPE)?);
        Ok(self)
    }

    /// Published record, carrying the path index keys.
    pub fn put_published(&mut self, page: &Page) -> Result<&mut Self> {
        let page_keys = PageKeys::for_page(page);
        let item = Item::from_page(page, &page_keys.published, keys::PUBLISHED_TYPE)?
            .with_index_key(&page_keys.path);
        self.put(item);
        Ok(self)
    }

    pub fn delete(&mut self, key: RecordKey) -> &mut Self {
        self.requests.push(WriteRequest::Delete(key));
        self
    }

    fn put(&mut self, item: Item) {
        self.requests.push(WriteRequest::Put(item));
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests(&self) -> &[WriteRequest] {
        &self.requests
    }

    pub fn into_requests(self) -> Vec<WriteRequest> {
        self.requests
    }
}

fn is_same_revision(a: &Page, b: &Page) -> bool {
    a.id == b.id
}

/// create / createFrom: Latest and Revision.
pub fn plan_create(page: &Page) -> Result<MutationPlan> {
    let mut plan = MutationPlan::new();
    plan.put_latest(page)?.put_revision(page)?;
    Ok(plan)
}

/// update: Revision always, Latest only when `page` is the current Latest.
pub fn plan_update(page: &Page, latest: Option<&Page>) -> Result<MutationPlan> {
    let mut plan = MutationPlan::new();
    plan.put_revision(page)?;
    if latest.is_some_and(|latest| is_same_revision(latest, page)) {
        plan.put_latest(page)?;
    }
    Ok(plan)
}

/// publish
///
/// `page` must already carry the `published` status. A previously published
/// revision other than `page` is demoted to `unpublished` (and so is the
/// Latest record when it mirrors that revision) before the Published record
/// is replaced.
pub fn plan_publish(page: &Page, latest: &Page, published: Option<&Page>) -> Result<MutationPlan> {
    let mut plan = MutationPlan::new();
    plan.put_revision(page)?;
    if is_same_revision(latest, page) {
        plan.put_latest(page)?;
    }

    if let Some(previous) = published.filter(|previous| !is_same_revision(previous, page)) {
        let demoted = previous.with_status(PageStatus::Unpublished);
        plan.put_revision(&demoted)?;
        if is_same_revision(latest, previous) {
            plan.put_latest(&demoted)?;
        }
    }

    plan.put_published(page)?;
    Ok(plan)
}

/// unpublish: Revision with the caller's status, Published (and with it the
/// path index entry) removed.
pub fn plan_unpublish(page: &Page, latest: &Page) -> Result<MutationPlan> {
    let mut plan = MutationPlan::new();
    plan.put_revision(page)?;
    plan.delete(keys::published_keys(&page.scope(), &page.pid));
    if is_same_revision(latest, page) {
        plan.put_latest(page)?;
    }
    Ok(plan)
}

/// requestReview / requestChanges.
pub fn plan_status_change(page: &Page, latest: &Page) -> Result<MutationPlan> {
    let mut plan = MutationPlan::new();
    plan.put_revision(page)?;
    if is_same_revision(latest, page) {
        plan.put_latest(page)?;
    }
    Ok(plan)
}

/// delete of a single revision.
///
/// `previous` is the highest revision below `page`; it becomes the new
/// Latest when `page` was the Latest. Without one the Latest record goes.
pub fn plan_delete(
    page: &Page,
    latest: Option<&Page>,
    published: Option<&Page>,
    previous: Option<&Page>,
) -> Result<MutationPlan> {
    let scope = page.scope();
    let mut plan = MutationPlan::new();
    plan.delete(keys::revision_keys(&scope, &page.pid, page.version));

    if published.is_some_and(|published| is_same_revision(published, page)) {
        plan.delete(keys::published_keys(&scope, &page.pid));
    }

    if latest.is_some_and(|latest| is_same_revision(latest, page)) {
        match previous {
            Some(previous) => {
                plan.put_latest(previous)?;
            }
            None => {
                plan.delete(keys::latest_keys(&scope, &page.pid));
            }
        }
    }
    Ok(plan)
}

/// deleteAll: Latest, Published once, every Revision.
///
/// More than one revision in `published` status breaks the single published
/// revision invariant and is rejected without planning any write.
pub fn plan_delete_all(page: &Page, revisions: &[Page]) -> Result<MutationPlan> {
    let scope = page.scope();
    let published: Vec<&str> = revisions
        .iter()
        .filter(|revision| revision.is_published())
        .map(|revision| revision.id.as_str())
        .collect();

    if published.len() > 1 {
        return Err(Error::operation(
            ErrorCode::DataIntegrity,
            "More than one revision of the page is marked as published.",
            json!({ "pid": page.pid, "published": published }),
        ));
    }

    let mut plan = MutationPlan::new();
    plan.delete(keys::latest_keys(&scope, &page.pid));
    if !published.is_empty() {
        plan.delete(keys::published_keys(&scope, &page.pid));
    }
    for revision in revisions {
        plan.delete(keys::revision_keys(&scope, &revision.pid, revision.version));
    }
    Ok(plan)
}
