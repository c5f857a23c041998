use crate::event::PageviewEvent;
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("analytics store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Write side of the columnar analytics store
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Initialize the storage (wait for the server, create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Open a new batch insert against the pageviews table
    async fn open_batch(&self) -> StorageResult<Box<dyn PageviewBatch>>;
}

/// An open batch insert. Rows are only durable once [`PageviewBatch::send`]
/// returns successfully; dropping the batch discards them.
#[async_trait]
pub trait PageviewBatch: Send {
    /// Append one pageview as a row of the batch
    async fn append(&mut self, event: &PageviewEvent) -> StorageResult<()>;

    /// Number of rows appended so far
    fn rows(&self) -> usize;

    /// Commit the batch to the store
    async fn send(self: Box<Self>) -> StorageResult<()>;
}
