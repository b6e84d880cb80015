// pagestore - single-table storage operations for page builder pages
// Revisions, latest and published projections kept consistent with batched writes

#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod keys;
pub mod metrics;
pub mod operations;
pub mod page;
pub mod plugin;
pub mod query;
pub mod response;
pub mod service;
pub mod storage;

// Re-exports for convenience
pub use config::StoreConfig;
pub use error::{Error, ErrorCode, Result};
pub use operations::PageStorageOperations;
pub use page::{Page, PageScope, PageStatus};
pub use plugin::FieldRegistry;
pub use response::Response;
pub use service::PageService;
pub use storage::{Table, TableEngine};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
