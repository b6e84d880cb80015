//! Page store error types
//!
//! Every failure carries a stable string code. Storage failures raised by a
//! [`TableEngine`](crate::storage::TableEngine) are wrapped by the page
//! operations into [`Error::Operation`] with an operation-specific code and a
//! JSON context (keys, pages, parameters) for diagnostics.

use std::fmt;
use thiserror::Error;

/// Stable, machine readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    CreatePage,
    CreatePageFrom,
    UpdatePage,
    BatchWriteRecords,
    ListRevisions,
    DeleteRecords,
    UpdateRecords,
    RequestReview,
    RequestChanges,
    GetPage,
    GetPageByPath,
    ListPages,
    LoadPageRevisions,
    ListPagesTags,
    MalformedGetRequest,
    MalformedWhere,
    MalformedSort,
    InvalidCursor,
    DataIntegrity,
    PageLocked,
    InvalidStatus,
    NotFound,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::CreatePage => "CREATE_PAGE_ERROR",
            ErrorCode::CreatePageFrom => "CREATE_PAGE_FROM_ERROR",
            ErrorCode::UpdatePage => "UPDATE_PAGE_ERROR",
            ErrorCode::BatchWriteRecords => "BATCH_WRITE_RECORDS_ERROR",
            ErrorCode::ListRevisions => "LIST_REVISIONS_ERROR",
            ErrorCode::DeleteRecords => "DELETE_RECORDS_ERROR",
            ErrorCode::UpdateRecords => "UPDATE_RECORDS_ERROR",
            ErrorCode::RequestReview => "REQUEST_REVIEW_ERROR",
            ErrorCode::RequestChanges => "REQUEST_CHANGES_ERROR",
            ErrorCode::GetPage => "GET_PAGE_ERROR",
            ErrorCode::GetPageByPath => "GET_PAGE_BY_PATH_ERROR",
            ErrorCode::ListPages => "LIST_PAGES_ERROR",
            ErrorCode::LoadPageRevisions => "LOAD_PAGE_REVISIONS_ERROR",
            ErrorCode::ListPagesTags => "LIST_PAGES_TAGS_ERROR",
            ErrorCode::MalformedGetRequest => "MALFORMED_GET_REQUEST",
            ErrorCode::MalformedWhere => "MALFORMED_WHERE_ERROR",
            ErrorCode::MalformedSort => "MALFORMED_SORT_ERROR",
            ErrorCode::InvalidCursor => "INVALID_CURSOR",
            ErrorCode::DataIntegrity => "DATA_INTEGRITY_ERROR",
            ErrorCode::PageLocked => "PAGE_LOCKED",
            ErrorCode::InvalidStatus => "INVALID_STATUS",
            ErrorCode::NotFound => "NOT_FOUND",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A domain failure with a stable code and diagnostic payload.
    #[error("{message}")]
    Operation {
        code: ErrorCode,
        message: String,
        data: serde_json::Value,
        #[source]
        source: Option<Box<Error>>,
    },
}

impl Error {
    /// Domain error without an underlying cause (validation failures).
    pub fn operation(code: ErrorCode, message: impl Into<String>, data: serde_json::Value) -> Self {
        Error::Operation {
            code,
            message: message.into(),
            data,
            source: None,
        }
    }

    /// Wraps a lower level failure with an operation code and context.
    pub fn wrap(
        source: Error,
        code: ErrorCode,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Error::Operation {
            code,
            message: message.into(),
            data,
            source: Some(Box::new(source)),
        }
    }

    /// Stable string code of this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Storage(_) => "STORAGE_ERROR",
            Error::NotFound(_) => ErrorCode::NotFound.as_str(),
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Operation { code, .. } => code.as_str(),
        }
    }

    /// Diagnostic payload attached to the error, `null` when there is none.
    pub fn data(&self) -> serde_json::Value {
        match self {
            Error::Operation { data, .. } => data.clone(),
            _ => serde_json::Value::Null,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ErrorCode::CreatePage.to_string(), "CREATE_PAGE_ERROR");
        assert_eq!(ErrorCode::MalformedWhere.as_str(), "MALFORMED_WHERE_ERROR");
        assert_eq!(Error::NotFound("page".into()).code(), "NOT_FOUND");
    }

    #[test]
    fn test_wrapped_error_keeps_source_and_context() {
        let err = Error::wrap(
            Error::Storage("throttled".into()),
            ErrorCode::UpdateRecords,
            "Could not update all the page records when publishing.",
            json!({ "pid": "abc" }),
        );

        assert_eq!(err.code(), "UPDATE_RECORDS_ERROR");
        assert_eq!(err.data()["pid"], "abc");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Storage error: throttled"));
    }
}
