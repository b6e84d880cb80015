//! Storage operations
//!
//! Entity specific operations over the shared [`Table`](crate::storage::Table).

pub mod pages;

pub use pages::{
    CreateFromParams, CreateParams, DeleteAllParams, DeleteParams, GetWhere, ListMeta, ListParams,
    ListResponse, ListTagsWhere, PageStorageOperations, PublishParams, RequestChangesParams,
    RequestReviewParams, StatusChangeParams, UnpublishParams, UpdateParams,
};
