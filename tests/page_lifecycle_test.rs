//! End-to-end page lifecycle against the mock table

use chrono::{TimeZone, Utc};
use pagestore::error::Result;
use pagestore::keys;
use pagestore::operations::{
    CreateFromParams, CreateParams, DeleteAllParams, DeleteParams, GetWhere, ListParams,
    PageStorageOperations, PublishParams, UnpublishParams, UpdateParams,
};
use pagestore::page::{Page, PageScope, PageSettings, PageStatus};
use pagestore::query::{ListWhere, SortSpec};
use pagestore::storage::{MockTable, Table};
use pagestore::FieldRegistry;
use std::sync::Arc;

fn scope() -> PageScope {
    PageScope::new("root", "en-US").unwrap()
}

fn page(pid: &str, version: u32) -> Page {
    let created_on = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, version).unwrap();
    Page {
        id: keys::page_id(pid, version),
        pid: pid.to_string(),
        tenant: "root".to_string(),
        locale: "en-US".to_string(),
        version,
        status: PageStatus::Draft,
        title: format!("{} v{}", pid, version),
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

fn setup() -> (PageStorageOperations, MockTable) {
    let mock = MockTable::new();
    let table = Arc::new(Table::new("pages", Box::new(mock.clone())));
    (
        PageStorageOperations::new(table, FieldRegistry::with_defaults()),
        mock,
    )
}

fn pages_in(mock: &MockTable, partition_key: &str) -> Vec<Page> {
    mock.partition(partition_key)
        .iter()
        .map(|item| item.to_page().unwrap())
        .collect()
}

fn latest_of(mock: &MockTable, pid: &str) -> Option<Page> {
    pages_in(mock, &keys::latest_partition_key(&scope()))
        .into_iter()
        .find(|p| p.pid == pid)
}

fn published_of(mock: &MockTable, pid: &str) -> Vec<Page> {
    pages_in(mock, &keys::published_partition_key(&scope()))
        .into_iter()
        .filter(|p| p.pid == pid)
        .collect()
}

fn revisions_of(mock: &MockTable, pid: &str) -> Vec<Page> {
    pages_in(mock, &keys::revision_partition_key(&scope(), pid))
}

/// Creates `count` revisions of `pid`, each becoming the Latest.
async fn create_revisions(ops: &PageStorageOperations, pid: &str, count: u32) -> Result<Vec<Page>> {
    let first = ops.create(CreateParams { page: page(pid, 1) }).await?;
    let mut revisions = vec![first];
    for version in 2..=count {
        let latest_page = revisions[revisions.len() - 1].clone();
        let created = ops
            .create_from(CreateFromParams {
                page: page(pid, version),
                original: latest_page.clone(),
                latest_page,
            })
            .await?;
        revisions.push(created);
    }
    Ok(revisions)
}

#[tokio::test]
async fn test_create_writes_latest_and_first_revision() -> Result<()> {
    let (ops, mock) = setup();
    ops.create(CreateParams { page: page("p1", 1) }).await?;

    assert_eq!(mock.len(), 2);
    assert_eq!(latest_of(&mock, "p1").map(|p| p.id), Some("p1#0001".to_string()));
    let revisions = revisions_of(&mock, "p1");
    assert_eq!(revisions.len(), 1);
    assert_eq!(revisions[0].version, 1);

    let item = &mock.partition(&keys::latest_partition_key(&scope()))[0];
    assert_eq!(item.entity_type, keys::LATEST_TYPE);
    assert_eq!(item.data["titleLC"], "p1 v1");
    Ok(())
}

#[tokio::test]
async fn test_update_only_moves_latest_for_the_head() -> Result<()> {
    let (ops, mock) = setup();
    let revisions = create_revisions(&ops, "p1", 2).await?;

    let mut older = revisions[0].clone();
    older.title = "edited old".to_string();
    ops.update(UpdateParams {
        original: revisions[0].clone(),
        page: older,
    })
    .await?;
    assert_eq!(revisions_of(&mock, "p1")[0].title, "edited old");
    let latest = latest_of(&mock, "p1").unwrap();
    assert_eq!(latest.version, 2);
    assert_eq!(latest.title, "p1 v2");

    let mut head = revisions[1].clone();
    head.title = "edited head".to_string();
    ops.update(UpdateParams {
        original: revisions[1].clone(),
        page: head,
    })
    .await?;
    assert_eq!(revisions_of(&mock, "p1")[1].title, "edited head");
    assert_eq!(latest_of(&mock, "p1").unwrap().title, "edited head");
    Ok(())
}

#[tokio::test]
async fn test_publish_demotes_previously_published_revision() -> Result<()> {
    let (ops, mock) = setup();
    let revisions = create_revisions(&ops, "p1", 2).await?;

    let v1 = ops
        .publish(PublishParams {
            page: revisions[0].clone(),
            latest_page: revisions[1].clone(),
            published_page: None,
        })
        .await?;
    assert_eq!(v1.status, PageStatus::Published);

    let v2 = ops
        .publish(PublishParams {
            page: revisions[1].clone(),
            latest_page: revisions[1].clone(),
            published_page: Some(v1),
        })
        .await?;

    let stored = revisions_of(&mock, "p1");
    assert_eq!(stored[0].status, PageStatus::Unpublished);
    assert_eq!(stored[1].status, PageStatus::Published);

    let published = published_of(&mock, "p1");
    assert_eq!(published.len(), 1);
    assert_eq!(published[0], v2);
    assert_eq!(latest_of(&mock, "p1").unwrap().status, PageStatus::Published);
    Ok(())
}

#[tokio::test]
async fn test_delete_latest_promotes_previous_revision() -> Result<()> {
    let (ops, mock) = setup();
    let revisions = create_revisions(&ops, "p1", 3).await?;

    let (deleted, promoted) = ops
        .delete(DeleteParams {
            page: revisions[2].clone(),
            latest_page: Some(revisions[2].clone()),
            published_page: None,
        })
        .await?;

    assert_eq!(deleted.version, 3);
    assert_eq!(promoted.map(|p| p.version), Some(2));
    assert_eq!(latest_of(&mock, "p1").unwrap().version, 2);
    assert_eq!(revisions_of(&mock, "p1").len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_delete_non_latest_keeps_latest() -> Result<()> {
    let (ops, mock) = setup();
    let revisions = create_revisions(&ops, "p1", 3).await?;

    let (_, promoted) = ops
        .delete(DeleteParams {
            page: revisions[1].clone(),
            latest_page: Some(revisions[2].clone()),
            published_page: None,
        })
        .await?;

    assert!(promoted.is_none());
    assert_eq!(latest_of(&mock, "p1").unwrap().version, 3);
    let versions: Vec<u32> = revisions_of(&mock, "p1").iter().map(|p| p.version).collect();
    assert_eq!(versions, vec![1, 3]);
    Ok(())
}

#[tokio::test]
async fn test_delete_sole_revision_removes_latest() -> Result<()> {
    let (ops, mock) = setup();
    let created = ops.create(CreateParams { page: page("p1", 1) }).await?;

    let (_, promoted) = ops
        .delete(DeleteParams {
            page: created.clone(),
            latest_page: Some(created),
            published_page: None,
        })
        .await?;

    assert!(promoted.is_none());
    assert!(latest_of(&mock, "p1").is_none());
    assert!(mock.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_delete_all_leaves_nothing_behind() -> Result<()> {
    let (ops, mock) = setup();
    let revisions = create_revisions(&ops, "p1", 3).await?;
    ops.create(CreateParams { page: page("p2", 1) }).await?;
    ops.publish(PublishParams {
        page: revisions[1].clone(),
        latest_page: revisions[2].clone(),
        published_page: None,
    })
    .await?;

    ops.delete_all(DeleteAllParams {
        page: revisions[2].clone(),
    })
    .await?;

    assert!(latest_of(&mock, "p1").is_none());
    assert!(published_of(&mock, "p1").is_empty());
    assert!(revisions_of(&mock, "p1").is_empty());
    assert!(ops.get_by_path(&scope(), "/p1").await?.is_none());

    // The other page is untouched.
    assert!(latest_of(&mock, "p2").is_some());
    assert_eq!(mock.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_delete_all_rejects_multiple_published_revisions() -> Result<()> {
    let (ops, mock) = setup();
    let revisions = create_revisions(&ops, "p1", 2).await?;

    // Two revisions carrying the published status can only come from a
    // partially applied publish; write them directly.
    for revision in &revisions {
        ops.update(UpdateParams {
            original: revision.clone(),
            page: revision.with_status(PageStatus::Published),
        })
        .await?;
    }
    let before = mock.len();
    let writes_before = mock.stats().batch_calls;

    let err = ops
        .delete_all(DeleteAllParams {
            page: revisions[1].clone(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), "DATA_INTEGRITY_ERROR");
    assert_eq!(mock.len(), before);
    assert_eq!(mock.stats().batch_calls, writes_before);
    Ok(())
}

#[tokio::test]
async fn test_list_with_latest_and_published_is_malformed_without_io() {
    let (_ops, mock) = setup();

    let err = ListWhere::builder(scope())
        .latest(true)
        .published(true)
        .build()
        .unwrap_err();

    assert_eq!(err.code(), "MALFORMED_WHERE_ERROR");
    assert_eq!(mock.stats().io_calls(), 0);
}

#[tokio::test]
async fn test_list_pagination_with_cursor() -> Result<()> {
    let (ops, _mock) = setup();
    for pid in ["a", "b", "c"] {
        ops.create(CreateParams { page: page(pid, 1) }).await?;
    }

    let mut params = ListParams::new(ListWhere::latest(scope()));
    params.sort = vec![SortSpec::asc("pid")];
    params.limit = Some(2);
    let first = ops.list(params.clone()).await?;

    assert_eq!(first.items.len(), 2);
    assert!(first.meta.has_more_items);
    assert_eq!(first.meta.total_count, 3);
    let cursor = first.meta.cursor.clone();
    assert!(cursor.is_some());

    params.after = cursor;
    let second = ops.list(params).await?;
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].pid, "c");
    assert!(!second.meta.has_more_items);
    assert!(second.meta.cursor.is_none());
    Ok(())
}

#[tokio::test]
async fn test_list_published_projection() -> Result<()> {
    let (ops, _mock) = setup();
    let a = ops.create(CreateParams { page: page("a", 1) }).await?;
    ops.create(CreateParams { page: page("b", 1) }).await?;
    ops.publish(PublishParams {
        page: a.clone(),
        latest_page: a,
        published_page: None,
    })
    .await?;

    let where_ = ListWhere::builder(scope()).published(true).build()?;
    let response = ops.list(ListParams::new(where_)).await?;
    let pids: Vec<&str> = response.items.iter().map(|p| p.pid.as_str()).collect();
    assert_eq!(pids, vec!["a"]);
    Ok(())
}

#[tokio::test]
async fn test_get_by_path_matches_published_get() -> Result<()> {
    let (ops, _mock) = setup();
    let revisions = create_revisions(&ops, "p1", 2).await?;
    ops.publish(PublishParams {
        page: revisions[0].clone(),
        latest_page: revisions[1].clone(),
        published_page: None,
    })
    .await?;

    let by_path = ops.get_by_path(&scope(), "/p1").await?;
    let published = ops.get(GetWhere::published(scope(), "p1")).await?;

    assert!(by_path.is_some());
    assert_eq!(by_path, published);
    assert_eq!(by_path.map(|p| p.version), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_unpublish_latest_removes_published_and_path() -> Result<()> {
    let (ops, mock) = setup();
    let revisions = create_revisions(&ops, "p1", 2).await?;
    let published = ops
        .publish(PublishParams {
            page: revisions[1].clone(),
            latest_page: revisions[1].clone(),
            published_page: None,
        })
        .await?;
    assert!(ops.get_by_path(&scope(), "/p1").await?.is_some());

    ops.unpublish(UnpublishParams {
        page: published.with_status(PageStatus::Unpublished),
        latest_page: published,
    })
    .await?;

    assert!(ops.get(GetWhere::published(scope(), "p1")).await?.is_none());
    assert!(ops.get_by_path(&scope(), "/p1").await?.is_none());
    assert!(published_of(&mock, "p1").is_empty());
    assert_eq!(revisions_of(&mock, "p1")[1].status, PageStatus::Unpublished);
    assert_eq!(latest_of(&mock, "p1").unwrap().status, PageStatus::Unpublished);
    Ok(())
}

#[tokio::test]
async fn test_unpublish_older_revision_keeps_latest() -> Result<()> {
    let (ops, mock) = setup();
    let revisions = create_revisions(&ops, "p1", 2).await?;
    let published = ops
        .publish(PublishParams {
            page: revisions[0].clone(),
            latest_page: revisions[1].clone(),
            published_page: None,
        })
        .await?;

    ops.unpublish(UnpublishParams {
        page: published.with_status(PageStatus::Unpublished),
        latest_page: revisions[1].clone(),
    })
    .await?;

    assert!(ops.get(GetWhere::published(scope(), "p1")).await?.is_none());
    assert!(ops.get_by_path(&scope(), "/p1").await?.is_none());
    assert_eq!(revisions_of(&mock, "p1")[0].status, PageStatus::Unpublished);
    let latest = latest_of(&mock, "p1").unwrap();
    assert_eq!(latest, revisions[1]);
    assert_eq!(latest.status, PageStatus::Draft);
    Ok(())
}

#[tokio::test]
async fn test_delete_published_older_revision_removes_published_and_path() -> Result<()> {
    let (ops, mock) = setup();
    let revisions = create_revisions(&ops, "p1", 3).await?;
    let published = ops
        .publish(PublishParams {
            page: revisions[0].clone(),
            latest_page: revisions[2].clone(),
            published_page: None,
        })
        .await?;

    let (_, promoted) = ops
        .delete(DeleteParams {
            page: published.clone(),
            latest_page: Some(revisions[2].clone()),
            published_page: Some(published),
        })
        .await?;

    assert!(promoted.is_none());
    assert!(published_of(&mock, "p1").is_empty());
    assert!(ops.get(GetWhere::published(scope(), "p1")).await?.is_none());
    assert!(ops.get_by_path(&scope(), "/p1").await?.is_none());
    assert_eq!(latest_of(&mock, "p1").unwrap().version, 3);
    let versions: Vec<u32> = revisions_of(&mock, "p1").iter().map(|p| p.version).collect();
    assert_eq!(versions, vec![2, 3]);
    Ok(())
}

#[tokio::test]
async fn test_list_revisions_is_ascending_without_gaps() -> Result<()> {
    let (ops, _mock) = setup();
    create_revisions(&ops, "p1", 12).await?;

    let revisions = ops.list_revisions(&scope(), "p1").await?;
    let versions: Vec<u32> = revisions.iter().map(|p| p.version).collect();
    assert_eq!(versions, (1..=12).collect::<Vec<_>>());
    Ok(())
}
