//! Pageview event store
//!
//! Request handlers hand validated pageviews to an [`EventStore`]; the
//! [`BatchingWriter`] implementation queues them and a single background task
//! writes them to the analytics store in batches.

pub mod writer;

use async_trait::async_trait;
use thiserror::Error;

use crate::event::PageviewEvent;
use crate::storage::StorageError;

pub use writer::{BatchingWriter, WriterConfig};

#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("pageview writer is closed")]
    Closed,
}

/// Unrecoverable failures of the flush loop
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("failed to open pageview batch: {0}")]
    Open(#[source] StorageError),
    #[error("failed to append pageview to batch: {0}")]
    Append(#[source] StorageError),
    #[error("failed to send batch of {rows} pageviews: {source}")]
    Send {
        rows: usize,
        #[source]
        source: StorageError,
    },
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Queue a pageview for storage.
    ///
    /// Returns once the event is enqueued, not once it is durable. Store side
    /// failures are never reported here.
    async fn store_pageview(&self, event: PageviewEvent) -> Result<(), EnqueueError>;
}
