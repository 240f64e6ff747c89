use crate::domain::model::TableRef;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Whole-payload byte storage: a filesystem root or an object-storage bucket.
pub trait Storage: Send + Sync {
    fn fetch(&self, key: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn store(&self, key: &str, data: &[u8])
        -> impl std::future::Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestMode {
    /// Bulk append, no uniqueness checks beyond the table's own constraints.
    Append,
    /// Update rows matching on `key_columns`, insert the rest, in one transaction.
    Merge { key_columns: Vec<String> },
}

#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Loads a CSV payload (header row included) into `table`.
    ///
    /// Unquoted empty fields load as NULL, so an empty text value cannot go
    /// into a `NOT NULL` column.
    async fn ingest(&self, csv: &[u8], table: &TableRef, mode: &IngestMode) -> Result<u64>;

    async fn truncate(&self, table: &TableRef) -> Result<()>;

    /// Every row of `table` as a CSV payload with header, in no particular order.
    async fn export(&self, table: &TableRef) -> Result<Vec<u8>>;
}

/// Hands out adapters for each backend a transfer can touch.
#[async_trait]
pub trait Backends: Send + Sync {
    type Files: Storage;
    type Objects: Storage;
    type Relational: RelationalStore;

    fn files(&self) -> Self::Files;

    async fn objects(&self, bucket: &str) -> Result<Self::Objects>;

    async fn relational(&self) -> Result<&Self::Relational>;
}
