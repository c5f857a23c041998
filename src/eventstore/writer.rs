//! Batching pageview writer
//!
//! Decouples request latency from the analytics store write pattern.
//! Producers push pageviews into a bounded mpsc queue; a single flush loop
//! owns the open batch and sends it once it holds `max_batch_size` rows or
//! is `max_batch_age` old, whichever comes first.
//!
//! - Backpressure: a full queue blocks producers instead of dropping events.
//! - Ordering: rows are appended in dequeue order (FIFO per queue).
//! - Failures: any store error ends the loop with a [`WriterError`]. Nothing
//!   is retried in place; the supervisor is expected to restart the process.
//! - Shutdown: [`BatchingWriter::shutdown`] closes the queue, drains what is
//!   already enqueued and flushes the last batch.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::event::PageviewEvent;
use crate::eventstore::{EnqueueError, EventStore, WriterError};
use crate::storage::{AnalyticsStore, PageviewBatch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    /// Hand-off queue capacity, in events
    pub queue_capacity: usize,
    /// Row count at which a batch is sent
    pub max_batch_size: usize,
    /// Age at which a batch is sent, measured from its first row
    pub max_batch_age: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_batch_size: 1000,
            max_batch_age: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FlushTrigger {
    Size,
    Age,
    Shutdown,
}

struct OpenBatch {
    batch: Box<dyn PageviewBatch>,
    opened_at: Instant,
}

impl OpenBatch {
    fn is_expired(&self, max_age: Duration) -> bool {
        self.opened_at.elapsed() >= max_age
    }
}

/// The single consumer of the pageview queue
struct FlushLoop {
    receiver: mpsc::Receiver<PageviewEvent>,
    shutdown_rx: watch::Receiver<bool>,
    store: Arc<dyn AnalyticsStore>,
    max_batch_size: usize,
    max_batch_age: Duration,
    open: Option<OpenBatch>,
    batches_sent: u64,
    rows_sent: u64,
}

impl FlushLoop {
    async fn run(mut self) -> Result<(), WriterError> {
        let result = self.process().await;

        match &result {
            Ok(()) => info!(
                batches_sent = self.batches_sent,
                rows_sent = self.rows_sent,
                "Pageview writer stopped"
            ),
            Err(err) => error!(
                error = %err,
                batches_sent = self.batches_sent,
                rows_sent = self.rows_sent,
                "Pageview writer failed"
            ),
        }

        result
    }

    async fn process(&mut self) -> Result<(), WriterError> {
        loop {
            let deadline = self
                .open
                .as_ref()
                .map(|open| open.opened_at + self.max_batch_age);

            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("Pageview writer received shutdown signal, draining queue...");
                        return self.drain().await;
                    }
                }
                () = expire(deadline) => {
                    self.flush(FlushTrigger::Age).await?;
                }
                event = self.receiver.recv() => match event {
                    Some(event) => self.append(event).await?,
                    // Every producer handle is gone.
                    None => return self.flush(FlushTrigger::Shutdown).await,
                },
            }
        }
    }

    async fn append(&mut self, event: PageviewEvent) -> Result<(), WriterError> {
        if self
            .open
            .as_ref()
            .is_some_and(|open| open.is_expired(self.max_batch_age))
        {
            self.flush(FlushTrigger::Age).await?;
        }

        let mut open = match self.open.take() {
            Some(open) => open,
            None => OpenBatch {
                batch: self.store.open_batch().await.map_err(WriterError::Open)?,
                opened_at: Instant::now(),
            },
        };

        open.batch
            .append(&event)
            .await
            .map_err(WriterError::Append)?;

        if open.batch.rows() >= self.max_batch_size {
            self.send(open, FlushTrigger::Size).await
        } else if open.is_expired(self.max_batch_age) {
            self.send(open, FlushTrigger::Age).await
        } else {
            self.open = Some(open);
            Ok(())
        }
    }

    async fn flush(&mut self, trigger: FlushTrigger) -> Result<(), WriterError> {
        match self.open.take() {
            Some(open) => self.send(open, trigger).await,
            None => Ok(()),
        }
    }

    async fn send(&mut self, open: OpenBatch, trigger: FlushTrigger) -> Result<(), WriterError> {
        let rows = open.batch.rows();
        let age = open.opened_at.elapsed();

        open.batch
            .send()
            .await
            .map_err(|source| WriterError::Send { rows, source })?;

        self.batches_sent += 1;
        self.rows_sent += rows as u64;

        debug!(
            rows,
            ?trigger,
            age_ms = age.as_millis() as u64,
            "Pageview batch sent"
        );
        Ok(())
    }

    /// Stop accepting events, write everything already queued, flush
    async fn drain(&mut self) -> Result<(), WriterError> {
        self.receiver.close();

        while let Some(event) = self.receiver.recv().await {
            self.append(event).await?;
        }

        self.flush(FlushTrigger::Shutdown).await
    }
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Producer handle of the batching writer. Cheap to clone.
#[derive(Clone)]
pub struct BatchingWriter {
    sender: mpsc::Sender<PageviewEvent>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl BatchingWriter {
    /// Spawn the flush loop on the current runtime.
    ///
    /// The returned handle resolves when the loop stops: `Ok(())` after a
    /// shutdown drain, or the fatal [`WriterError`] that stopped it.
    pub fn spawn(
        store: Arc<dyn AnalyticsStore>,
        config: WriterConfig,
    ) -> (Self, JoinHandle<Result<(), WriterError>>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            queue_capacity = config.queue_capacity,
            max_batch_size = config.max_batch_size,
            max_batch_age_ms = config.max_batch_age.as_millis() as u64,
            "Pageview writer configured"
        );

        let flush_loop = FlushLoop {
            receiver,
            shutdown_rx,
            store,
            max_batch_size: config.max_batch_size,
            max_batch_age: config.max_batch_age,
            open: None,
            batches_sent: 0,
            rows_sent: 0,
        };

        let handle = tokio::spawn(flush_loop.run());

        let writer = Self {
            sender,
            shutdown_tx: Arc::new(shutdown_tx),
        };

        (writer, handle)
    }

    /// Signal the flush loop to drain the queue and stop
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Whether the flush loop has stopped accepting events
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[async_trait]
impl EventStore for BatchingWriter {
    async fn store_pageview(&self, event: PageviewEvent) -> Result<(), EnqueueError> {
        // Waits for queue capacity when the flush loop falls behind.
        self.sender
            .send(event)
            .await
            .map_err(|_| EnqueueError::Closed)
    }
}
