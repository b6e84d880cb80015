//! Paged query helpers
//!
//! Engines return bounded pages of results. `query_all` follows
//! `last_evaluated_key` until the partition is exhausted; `query_one` asks for
//! a single item.

use tracing::debug;

use super::engine::{Item, QueryRequest, Table};
use crate::error::Result;

/// Every item matching `request`, in query order. `request.limit` is ignored.
pub async fn query_all(table: &Table, request: &QueryRequest) -> Result<Vec<Item>> {
    let mut request = request.clone();
    request.limit = None;

    let mut items = Vec::new();
    let mut pages = 0usize;
    loop {
        let output = table.query(&request).await?;
        pages += 1;
        items.extend(output.items);
        match output.last_evaluated_key {
            Some(key) => request.exclusive_start_key = Some(key),
            None => break,
        }
    }

    debug!(
        pk = %request.partition_key,
        pages,
        items = items.len(),
        "Query completed"
    );
    Ok(items)
}

/// First item matching `request`, if any.
pub async fn query_one(table: &Table, request: &QueryRequest) -> Result<Option<Item>> {
    let request = request.clone().with_limit(1);
    let output = table.query(&request).await?;
    Ok(output.items.into_iter().next())
}
