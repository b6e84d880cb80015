//! Table engine trait
//!
//! The page store targets a managed wide-column store with single-table
//! design: items are addressed by a partition key (`PK`) and sort key (`SK`),
//! one secondary index (`GSI1`) supports alternate key lookups, batch writes
//! are capped per call, and nothing is atomic across items.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::keys::RecordKey;
use crate::page::Page;

/// Name of the secondary index resolving paths to published pages.
pub const PATH_INDEX: &str = "GSI1";

/// Per-call item cap of a batch write.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 25;

/// A stored record: keys, type discriminator and the flattened document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "SK")]
    pub sk: String,
    #[serde(rename = "GSI1_PK", default, skip_serializing_if = "Option::is_none")]
    pub gsi1_pk: Option<String>,
    #[serde(rename = "GSI1_SK", default, skip_serializing_if = "Option::is_none")]
    pub gsi1_sk: Option<String>,
    #[serde(rename = "TYPE")]
    pub entity_type: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Item {
    /// Denormalized copy of `page` stored under `key`.
    ///
    /// `titleLC` is added for case-insensitive title search.
    pub fn from_page(page: &Page, key: &RecordKey, entity_type: &str) -> Result<Self> {
        let mut data = match serde_json::to_value(page)? {
            Value::Object(map) => map,
            other => {
                return Err(Error::Serialization(format!(
                    "Page serialized to a non-object value: {}",
                    other
                )))
            }
        };
        data.insert("titleLC".to_string(), Value::String(page.title_lc()));

        Ok(Self {
            pk: key.pk.clone(),
            sk: key.sk.clone(),
            gsi1_pk: None,
            gsi1_sk: None,
            entity_type: entity_type.to_string(),
            data,
        })
    }

    /// Adds the secondary index keys.
    pub fn with_index_key(mut self, index_key: &RecordKey) -> Self {
        self.gsi1_pk = Some(index_key.pk.clone());
        self.gsi1_sk = Some(index_key.sk.clone());
        self
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.pk.clone(), self.sk.clone())
    }

    pub fn index_key(&self) -> Option<RecordKey> {
        match (&self.gsi1_pk, &self.gsi1_sk) {
            (Some(pk), Some(sk)) => Some(RecordKey::new(pk.clone(), sk.clone())),
            _ => None,
        }
    }

    /// The page document without any storage attributes.
    pub fn to_page(&self) -> Result<Page> {
        serde_json::from_value(Value::Object(self.data.clone()))
            .map_err(|e| Error::Serialization(format!("Invalid page record {}: {}", self.key(), e)))
    }
}

/// A single mutation inside a batch write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put(Item),
    Delete(RecordKey),
}

impl WriteRequest {
    pub fn key(&self) -> RecordKey {
        match self {
            WriteRequest::Put(item) => item.key(),
            WriteRequest::Delete(key) => key.clone(),
        }
    }

    pub fn is_put(&self) -> bool {
        matches!(self, WriteRequest::Put(_))
    }
}

/// Range condition on the sort key (or index sort key) of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKeyCondition {
    Eq(String),
    Lt(String),
    Lte(String),
    Gt(String),
    Gte(String),
    Between(String, String),
    BeginsWith(String),
}

impl SortKeyCondition {
    pub fn matches(&self, sort_key: &str) -> bool {
        match self {
            SortKeyCondition::Eq(v) => sort_key == v,
            SortKeyCondition::Lt(v) => sort_key < v.as_str(),
            SortKeyCondition::Lte(v) => sort_key <= v.as_str(),
            SortKeyCondition::Gt(v) => sort_key > v.as_str(),
            SortKeyCondition::Gte(v) => sort_key >= v.as_str(),
            SortKeyCondition::Between(low, high) => sort_key >= low.as_str() && sort_key <= high.as_str(),
            SortKeyCondition::BeginsWith(prefix) => sort_key.starts_with(prefix.as_str()),
        }
    }
}

/// Query over a single partition of the table or of an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub partition_key: String,
    pub index: Option<String>,
    pub condition: Option<SortKeyCondition>,
    /// Descending sort key order when set.
    pub reverse: bool,
    pub limit: Option<usize>,
    /// Resume after this primary key (from a previous `last_evaluated_key`).
    pub exclusive_start_key: Option<RecordKey>,
}

impl QueryRequest {
    pub fn partition(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            index: None,
            condition: None,
            reverse: false,
            limit: None,
            exclusive_start_key: None,
        }
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_condition(mut self, condition: SortKeyCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub items: Vec<Item>,
    /// Set when more items match; pass back as `exclusive_start_key`.
    pub last_evaluated_key: Option<RecordKey>,
}

/// Table engine trait
#[async_trait]
pub trait TableEngine: Send + Sync {
    /// Maximum number of requests accepted by one `batch_write` call.
    fn max_batch_size(&self) -> usize;

    async fn get_item(&self, key: &RecordKey) -> Result<Option<Item>>;

    /// Applies up to `max_batch_size` puts/deletes. Keys must be unique
    /// within the call. The whole call either succeeds or fails.
    async fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<()>;

    async fn query(&self, request: &QueryRequest) -> Result<QueryOutput>;
}

/// Main table interface
pub struct Table {
    name: String,
    engine: Box<dyn TableEngine>,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table").field("name", &self.name).finish()
    }
}

impl Table {
    pub fn new(name: impl Into<String>, engine: Box<dyn TableEngine>) -> Self {
        Self {
            name: name.into(),
            engine,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_batch_size(&self) -> usize {
        self.engine.max_batch_size()
    }

    #[instrument(skip(self), fields(table = %self.name, pk = %key.pk, sk = %key.sk))]
    pub async fn get_item(&self, key: &RecordKey) -> Result<Option<Item>> {
        self.engine.get_item(key).await
    }

    #[instrument(skip(self, requests), fields(table = %self.name, count = requests.len()))]
    pub async fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<()> {
        self.engine.batch_write(requests).await
    }

    #[instrument(skip(self, request), fields(table = %self.name, pk = %request.partition_key))]
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryOutput> {
        self.engine.query(request).await
    }
}
