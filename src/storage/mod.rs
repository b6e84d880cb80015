//! Storage layer
//!
//! # Architecture
//!
//! Pages are stored in a single table addressed by partition and sort key:
//!
//! ```text
//! Table (PK, SK) ─┬─ Revision / Latest / Published records
//!                 └─ GSI1 (GSI1_PK, GSI1_SK) → path lookup of Published records
//! ```
//!
//! ## Table Engine
//!
//! The `TableEngine` trait is the boundary to the store:
//! - Single item reads by primary key
//! - Capped batch writes of puts and deletes (no cross-item atomicity)
//! - Paged partition queries with sort key conditions, reverse order and limit
//!
//! ## Implementations
//!
//! - **MemoryTable**: ordered in-process map with the store's limits
//! - **FileTable**: MemoryTable persisted as a JSON snapshot
//! - **MockTable**: MemoryTable with fault injection, for tests

pub mod batch;
pub mod engine;
pub mod file;
pub mod memory;
pub mod mock;
pub mod query;

pub use batch::batch_write_all;
pub use engine::{
    Item, QueryOutput, QueryRequest, SortKeyCondition, Table, TableEngine, WriteRequest,
    DEFAULT_MAX_BATCH_SIZE, PATH_INDEX,
};
pub use file::FileTable;
pub use memory::{MemoryTable, TableStats};
pub use mock::MockTable;
pub use query::{query_all, query_one};
