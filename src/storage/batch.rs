//! Batch submission
//!
//! A logical page operation produces an ordered list of puts and deletes.
//! The list is split into chunks of at most `max_batch_size` requests, and the
//! chunks are submitted one after another:
//!
//! ```text
//! [r1 .. r25] → batch_write   ✓ committed
//! [r26 .. r50] → batch_write  ✗ error returned, r51.. never sent
//! ```
//!
//! A chunk is all-or-nothing. Chunks already committed are not rolled back
//! when a later chunk fails; re-running the same logical operation converges
//! because every request is an upsert or delete keyed by immutable ids.

use tracing::debug;

use super::engine::{Table, WriteRequest};
use crate::error::{Error, Result};
use crate::metrics;

/// Submits all requests in chunks, stopping at the first failing chunk.
pub async fn batch_write_all(table: &Table, requests: Vec<WriteRequest>) -> Result<()> {
    if requests.is_empty() {
        return Ok(());
    }

    let chunk_size = table.max_batch_size();
    if chunk_size == 0 {
        return Err(Error::Config("max_batch_size must be at least 1".to_string()));
    }

    let total = requests.len();
    let chunks = total.div_ceil(chunk_size);
    let mut requests = requests.into_iter().peekable();
    let mut chunk_index = 0usize;

    while requests.peek().is_some() {
        let chunk: Vec<WriteRequest> = requests.by_ref().take(chunk_size).collect();
        let size = chunk.len();
        debug!(
            table = %table.name(),
            chunk = chunk_index + 1,
            chunks,
            size,
            "Submitting batch chunk"
        );

        table.batch_write(chunk).await?;

        metrics::BATCH_CHUNKS_TOTAL.inc();
        metrics::BATCH_ITEMS_TOTAL.inc_by(size as u64);
        chunk_index += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::RecordKey;
    use crate::storage::MockTable;

    fn deletes(count: usize) -> Vec<WriteRequest> {
        (0..count)
            .map(|i| WriteRequest::Delete(RecordKey::new("P", format!("{:04}", i))))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() -> Result<()> {
        let mock = MockTable::new();
        let table = Table::new("pages", Box::new(mock.clone()));

        batch_write_all(&table, Vec::new()).await?;
        assert_eq!(mock.stats().batch_calls, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_chunks_respect_cap() -> Result<()> {
        let mock = MockTable::with_max_batch_size(10);
        let table = Table::new("pages", Box::new(mock.clone()));

        batch_write_all(&table, deletes(25)).await?;
        assert_eq!(mock.stats().batch_calls, 3);
        assert_eq!(mock.stats().written_items, 25);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_chunk_stops_submission() {
        let mock = MockTable::with_max_batch_size(10);
        mock.fail_batch_after(1);
        let table = Table::new("pages", Box::new(mock.clone()));

        let result = batch_write_all(&table, deletes(25)).await;
        assert!(result.is_err());
        // First chunk committed, second failed, third never sent.
        assert_eq!(mock.stats().batch_calls, 2);
        assert_eq!(mock.stats().written_items, 10);
    }
}
