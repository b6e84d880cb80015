//! In-memory table engine
//!
//! Keeps items in an ordered map keyed by `(PK, SK)` so partition queries are
//! range scans. Mirrors the limits of the managed store: batch writes are
//! capped and reject duplicate keys, and query results are returned in pages
//! of at most `page_size` items.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use super::engine::{
    Item, QueryOutput, QueryRequest, TableEngine, WriteRequest, DEFAULT_MAX_BATCH_SIZE, PATH_INDEX,
};
use crate::error::{Error, Result};
use crate::keys::RecordKey;

/// Default number of items per query page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Call counters of a table engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    pub get_calls: u64,
    pub query_calls: u64,
    pub batch_calls: u64,
    pub written_items: u64,
}

impl TableStats {
    /// Total number of calls that reached the engine.
    pub fn io_calls(&self) -> u64 {
        self.get_calls + self.query_calls + self.batch_calls
    }
}

#[derive(Debug, Default)]
struct Counters {
    get_calls: AtomicU64,
    query_calls: AtomicU64,
    batch_calls: AtomicU64,
    written_items: AtomicU64,
}

/// Ordered in-memory table
#[derive(Debug)]
pub struct MemoryTable {
    items: RwLock<BTreeMap<RecordKey, Item>>,
    max_batch_size: usize,
    page_size: usize,
    counters: Counters,
}

impl Default for MemoryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_BATCH_SIZE, DEFAULT_PAGE_SIZE)
    }

    pub fn with_limits(max_batch_size: usize, page_size: usize) -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            max_batch_size,
            page_size: page_size.max(1),
            counters: Counters::default(),
        }
    }

    /// Replaces the table contents.
    pub fn load(&self, items: Vec<Item>) {
        let mut map = self.items.write();
        map.clear();
        for item in items {
            map.insert(item.key(), item);
        }
    }

    /// All items in key order.
    pub fn snapshot(&self) -> Vec<Item> {
        self.items.read().values().cloned().collect()
    }

    /// Items of one partition in sort key order.
    pub fn partition(&self, partition_key: &str) -> Vec<Item> {
        let items = self.items.read();
        partition_range(&items, partition_key).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn clear(&self) {
        self.items.write().clear();
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            get_calls: self.counters.get_calls.load(Ordering::Relaxed),
            query_calls: self.counters.query_calls.load(Ordering::Relaxed),
            batch_calls: self.counters.batch_calls.load(Ordering::Relaxed),
            written_items: self.counters.written_items.load(Ordering::Relaxed),
        }
    }

    fn validate_batch(&self, requests: &[WriteRequest]) -> Result<()> {
        if requests.is_empty() {
            return Err(Error::Storage("Batch write requires at least one request".to_string()));
        }
        if requests.len() > self.max_batch_size {
            return Err(Error::Storage(format!(
                "Too many items requested for the batch write call: {} > {}",
                requests.len(),
                self.max_batch_size
            )));
        }
        let mut seen = HashSet::with_capacity(requests.len());
        for request in requests {
            let key = request.key();
            if !seen.insert(key.clone()) {
                return Err(Error::Storage(format!(
                    "Provided list of item keys contains duplicates: {}",
                    key
                )));
            }
        }
        Ok(())
    }

    fn run_query(&self, request: &QueryRequest) -> Result<QueryOutput> {
        let items = self.items.read();

        // (ordering sort key, primary key) of every matching item
        let mut matched: Vec<(&str, &Item)> = match request.index.as_deref() {
            None => partition_range(&items, &request.partition_key)
                .map(|item| (item.sk.as_str(), item))
                .collect(),
            Some(PATH_INDEX) => {
                let mut found: Vec<(&str, &Item)> = items
                    .values()
                    .filter_map(|item| match (&item.gsi1_pk, &item.gsi1_sk) {
                        (Some(pk), Some(sk)) if *pk == request.partition_key => {
                            Some((sk.as_str(), item))
                        }
                        _ => None,
                    })
                    .collect();
                found.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.key().cmp(&b.1.key())));
                found
            }
            Some(other) => {
                return Err(Error::Storage(format!("Unknown index '{}'", other)));
            }
        };

        if let Some(condition) = &request.condition {
            matched.retain(|(sort_key, _)| condition.matches(sort_key));
        }
        if request.reverse {
            matched.reverse();
        }

        if let Some(start) = &request.exclusive_start_key {
            let position = matched.iter().position(|(_, item)| item.key() == *start);
            match position {
                Some(pos) => {
                    matched.drain(..=pos);
                }
                None if request.index.is_none() => {
                    let reverse = request.reverse;
                    matched.retain(|(sort_key, _)| {
                        if reverse {
                            *sort_key < start.sk.as_str()
                        } else {
                            *sort_key > start.sk.as_str()
                        }
                    });
                }
                None => {
                    return Err(Error::Storage(format!(
                        "Exclusive start key {} is not part of the index",
                        start
                    )));
                }
            }
        }

        let limit = request.limit.unwrap_or(usize::MAX).min(self.page_size);
        let has_more = matched.len() > limit;
        matched.truncate(limit);

        let items: Vec<Item> = matched.into_iter().map(|(_, item)| item.clone()).collect();
        let last_evaluated_key = if has_more {
            items.last().map(Item::key)
        } else {
            None
        };

        Ok(QueryOutput {
            items,
            last_evaluated_key,
        })
    }
}

fn partition_range<'a>(
    items: &'a BTreeMap<RecordKey, Item>,
    partition_key: &'a str,
) -> impl Iterator<Item = &'a Item> + 'a {
    items
        .range(RecordKey::new(partition_key, String::new())..)
        .take_while(move |(key, _)| key.pk == partition_key)
        .map(|(_, item)| item)
}

#[async_trait]
impl TableEngine for MemoryTable {
    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn get_item(&self, key: &RecordKey) -> Result<Option<Item>> {
        self.counters.get_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.items.read().get(key).cloned())
    }

    async fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<()> {
        self.counters.batch_calls.fetch_add(1, Ordering::Relaxed);
        self.validate_batch(&requests)?;

        let count = requests.len() as u64;
        let mut items = self.items.write();
        for request in requests {
            match request {
                WriteRequest::Put(item) => {
                    items.insert(item.key(), item);
                }
                WriteRequest::Delete(key) => {
                    items.remove(&key);
                }
            }
        }
        self.counters.written_items.fetch_add(count, Ordering::Relaxed);
        Ok(())
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryOutput> {
        self.counters.query_calls.fetch_add(1, Ordering::Relaxed);
        self.run_query(request)
    }
}
