//! Mock table for testing
//!
//! Wraps a [`MemoryTable`] behind an `Arc` so tests keep a handle after the
//! engine is moved into a [`Table`](super::Table), and adds fault injection
//! for store failures.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::engine::{Item, QueryOutput, QueryRequest, TableEngine, WriteRequest};
use super::memory::{MemoryTable, TableStats, DEFAULT_PAGE_SIZE};
use crate::error::{Error, Result};
use crate::keys::RecordKey;

#[derive(Debug, Default)]
struct Faults {
    /// Batch writes still allowed to succeed; `None` means unlimited.
    batch_successes_left: Mutex<Option<u64>>,
    fail_reads: AtomicBool,
    batch_calls: AtomicU64,
    get_calls: AtomicU64,
    query_calls: AtomicU64,
}

/// In-memory mock table with fault injection
#[derive(Debug, Clone)]
pub struct MockTable {
    inner: Arc<MemoryTable>,
    faults: Arc<Faults>,
}

impl Default for MockTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTable {
    /// Create a new mock table with the store's default limits
    pub fn new() -> Self {
        Self::from_memory(MemoryTable::new())
    }

    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Self::from_memory(MemoryTable::with_limits(max_batch_size, DEFAULT_PAGE_SIZE))
    }

    pub fn with_limits(max_batch_size: usize, page_size: usize) -> Self {
        Self::from_memory(MemoryTable::with_limits(max_batch_size, page_size))
    }

    fn from_memory(inner: MemoryTable) -> Self {
        Self {
            inner: Arc::new(inner),
            faults: Arc::new(Faults::default()),
        }
    }

    /// Let `successes` more batch writes succeed, then fail every one after.
    pub fn fail_batch_after(&self, successes: u64) {
        *self.faults.batch_successes_left.lock() = Some(successes);
    }

    /// Make every get and query fail.
    pub fn fail_reads(&self, fail: bool) {
        self.faults.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Remove all injected faults.
    pub fn heal(&self) {
        *self.faults.batch_successes_left.lock() = None;
        self.faults.fail_reads.store(false, Ordering::SeqCst);
    }

    /// Calls that reached the mock, including failed ones.
    pub fn stats(&self) -> TableStats {
        TableStats {
            get_calls: self.faults.get_calls.load(Ordering::SeqCst),
            query_calls: self.faults.query_calls.load(Ordering::SeqCst),
            batch_calls: self.faults.batch_calls.load(Ordering::SeqCst),
            written_items: self.inner.stats().written_items,
        }
    }

    pub fn memory(&self) -> &MemoryTable {
        &self.inner
    }

    pub fn partition(&self, partition_key: &str) -> Vec<Item> {
        self.inner.partition(partition_key)
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.inner.snapshot().iter().any(|item| item.key() == *key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn check_reads(&self) -> Result<()> {
        if self.faults.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Storage("Injected read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TableEngine for MockTable {
    fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size()
    }

    async fn get_item(&self, key: &RecordKey) -> Result<Option<Item>> {
        self.faults.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        self.inner.get_item(key).await
    }

    async fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<()> {
        self.faults.batch_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut left = self.faults.batch_successes_left.lock();
            if let Some(remaining) = left.as_mut() {
                if *remaining == 0 {
                    return Err(Error::Storage("Injected batch write failure".to_string()));
                }
                *remaining -= 1;
            }
        }
        self.inner.batch_write(requests).await
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryOutput> {
        self.faults.query_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        self.inner.query(request).await
    }
}
