//! In-process analytics store
//!
//! Records every sent batch in memory. Used as the store test double: it can
//! be told to fail at a given step, to stall on send or to slow down appends,
//! simulating a store outage or a slow flush.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};

use crate::event::PageviewEvent;
use crate::storage::{AnalyticsStore, PageviewBatch, StorageError, StorageResult};

/// Step of the batch lifecycle at which an injected failure fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    Open,
    Append,
    Send,
}

struct Shared {
    batches: Mutex<Vec<Vec<PageviewEvent>>>,
    failure: Mutex<Option<FailurePoint>>,
    append_delay: Mutex<Option<Duration>>,
    stalled: watch::Sender<bool>,
    sent: Notify,
    opened: AtomicUsize,
}

#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (stalled, _) = watch::channel(false);

        Self {
            shared: Arc::new(Shared {
                batches: Mutex::new(Vec::new()),
                failure: Mutex::new(None),
                append_delay: Mutex::new(None),
                stalled,
                sent: Notify::new(),
                opened: AtomicUsize::new(0),
            }),
        }
    }

    /// Make every subsequent operation at `point` fail
    pub async fn fail_on(&self, point: FailurePoint) {
        *self.shared.failure.lock().await = Some(point);
    }

    /// Make every subsequent `append` take `delay`
    pub async fn slow_appends(&self, delay: Duration) {
        *self.shared.append_delay.lock().await = Some(delay);
    }

    /// Block `send` calls until [`MemoryStore::resume`] is called
    pub fn stall(&self) {
        self.shared.stalled.send_replace(true);
    }

    pub fn resume(&self) {
        self.shared.stalled.send_replace(false);
    }

    /// Batches sent so far, in send order
    pub async fn batches(&self) -> Vec<Vec<PageviewEvent>> {
        self.shared.batches.lock().await.clone()
    }

    /// Total rows across all sent batches
    pub async fn rows(&self) -> usize {
        self.shared.batches.lock().await.iter().map(Vec::len).sum()
    }

    /// Number of batches opened, sent or not
    pub fn opened_batches(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` batches have been sent and return them
    pub async fn wait_for_batches(&self, count: usize) -> Vec<Vec<PageviewEvent>> {
        loop {
            // Register before checking so a send in between is not missed.
            let notified = self.shared.sent.notified();

            {
                let batches = self.shared.batches.lock().await;
                if batches.len() >= count {
                    return batches.clone();
                }
            }

            notified.await;
        }
    }

    async fn check_failure(&self, point: FailurePoint) -> StorageResult<()> {
        match *self.shared.failure.lock().await {
            Some(failure) if failure == point => Err(StorageError::Unavailable(format!(
                "injected {point:?} failure"
            ))),
            _ => Ok(()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalyticsStore for MemoryStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn open_batch(&self) -> StorageResult<Box<dyn PageviewBatch>> {
        self.check_failure(FailurePoint::Open).await?;
        self.shared.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryBatch {
            store: self.clone(),
            rows: Vec::new(),
        }))
    }
}

struct MemoryBatch {
    store: MemoryStore,
    rows: Vec<PageviewEvent>,
}

#[async_trait]
impl PageviewBatch for MemoryBatch {
    async fn append(&mut self, event: &PageviewEvent) -> StorageResult<()> {
        self.store.check_failure(FailurePoint::Append).await?;

        let delay = *self.store.shared.append_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.rows.push(event.clone());
        Ok(())
    }

    fn rows(&self) -> usize {
        self.rows.len()
    }

    async fn send(self: Box<Self>) -> StorageResult<()> {
        let MemoryBatch { store, rows } = *self;

        let mut stalled = store.shared.stalled.subscribe();
        stalled
            .wait_for(|stalled| !*stalled)
            .await
            .map_err(|e| StorageError::Other(e.into()))?;

        store.check_failure(FailurePoint::Send).await?;

        store.shared.batches.lock().await.push(rows);
        store.shared.sent.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uaparser::ClientDescriptor;
    use url::Url;

    fn pageview(path: &str) -> PageviewEvent {
        let url = Url::parse(&format!("https://example.com{path}")).unwrap();
        PageviewEvent::new(&url, ClientDescriptor::other()).unwrap()
    }

    #[tokio::test]
    async fn test_sent_batches_are_recorded() {
        let store = MemoryStore::new();

        let mut batch = store.open_batch().await.unwrap();
        batch.append(&pageview("/a")).await.unwrap();
        batch.append(&pageview("/b")).await.unwrap();
        assert_eq!(batch.rows(), 2);
        batch.send().await.unwrap();

        let batches = store.wait_for_batches(1).await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][1].path(), "/b");
        assert_eq!(store.rows().await, 2);
        assert_eq!(store.opened_batches(), 1);
    }

    #[tokio::test]
    async fn test_dropped_batch_is_discarded() {
        let store = MemoryStore::new();

        let mut batch = store.open_batch().await.unwrap();
        batch.append(&pageview("/a")).await.unwrap();
        drop(batch);

        assert!(store.batches().await.is_empty());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new();
        let mut batch = store.open_batch().await.unwrap();

        store.fail_on(FailurePoint::Append).await;
        assert!(batch.append(&pageview("/a")).await.is_err());

        store.fail_on(FailurePoint::Open).await;
        assert!(store.open_batch().await.is_err());

        store.fail_on(FailurePoint::Send).await;
        assert!(batch.send().await.is_err());
        assert!(store.batches().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_appends() {
        let store = MemoryStore::new();
        store.slow_appends(Duration::from_millis(250)).await;

        let mut batch = store.open_batch().await.unwrap();
        let start = tokio::time::Instant::now();
        batch.append(&pageview("/a")).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(250));
        assert_eq!(batch.rows(), 1);
    }
}
