//! ClickHouse backed analytics store
//!
//! Pageviews are written with the RowBinary insert API, one HTTP insert per
//! batch. The table has six positional columns:
//!
//! ```sql
//! CREATE TABLE events_pageviews (
//!     timestamp DateTime64(3, 'UTC'),
//!     domain String,
//!     path String,
//!     operating_system LowCardinality(String),
//!     browser_family LowCardinality(String),
//!     device LowCardinality(String)
//! ) ENGINE = MergeTree
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use clickhouse::insert::Insert;
use clickhouse::{Client, Row};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::ClickhouseConfig;
use crate::event::PageviewEvent;
use crate::storage::{AnalyticsStore, PageviewBatch, StorageError, StorageResult};

pub const PAGEVIEWS_TABLE: &str = "events_pageviews";

const CONNECT_ATTEMPTS: u32 = 5;

const CREATE_PAGEVIEWS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS events_pageviews (
        timestamp DateTime64(3, 'UTC'),
        domain String,
        path String,
        operating_system LowCardinality(String),
        browser_family LowCardinality(String),
        device LowCardinality(String)
    )
    ENGINE = MergeTree
    PARTITION BY toYYYYMM(timestamp)
    ORDER BY (domain, timestamp)
"#;

/// One row of the pageviews table, in column order
#[derive(Debug, Clone, PartialEq, Row, Serialize)]
pub struct PageviewRow {
    /// Capture time in milliseconds since the Unix epoch
    pub timestamp: i64,
    pub domain: String,
    pub path: String,
    pub operating_system: String,
    pub browser_family: String,
    pub device: String,
}

impl From<&PageviewEvent> for PageviewRow {
    fn from(event: &PageviewEvent) -> Self {
        let client = event.client();

        Self {
            timestamp: event.timestamp().timestamp_millis(),
            domain: event.domain().to_string(),
            path: event.path().to_string(),
            operating_system: client.operating_system.clone(),
            browser_family: client.browser_family.clone(),
            device: client.device.clone(),
        }
    }
}

pub struct ClickhouseStore {
    client: Client,
}

impl ClickhouseStore {
    pub fn new(config: &ClickhouseConfig) -> Self {
        let client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_user(&config.user)
            .with_password(&config.password);

        Self { client }
    }

    /// Ping the server until it answers, backing off linearly between attempts
    async fn wait_until_ready(&self) -> Result<()> {
        let mut attempt = 1;

        loop {
            match self.client.query("SELECT 1").execute().await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < CONNECT_ATTEMPTS => {
                    warn!(attempt, error = %err, "ClickHouse not ready, retrying");
                    tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("ClickHouse unreachable after {CONNECT_ATTEMPTS} attempts")
                    });
                }
            }
        }
    }
}

#[async_trait]
impl AnalyticsStore for ClickhouseStore {
    async fn init(&self) -> Result<()> {
        self.wait_until_ready().await?;

        self.client
            .query(CREATE_PAGEVIEWS_TABLE)
            .execute()
            .await
            .context("failed to create events_pageviews table")?;

        info!(table = PAGEVIEWS_TABLE, "ClickHouse schema ready");
        Ok(())
    }

    async fn open_batch(&self) -> StorageResult<Box<dyn PageviewBatch>> {
        let insert = self
            .client
            .insert::<PageviewRow>(PAGEVIEWS_TABLE)
            .map_err(|e| StorageError::Other(e.into()))?;

        Ok(Box::new(ClickhouseBatch { insert, rows: 0 }))
    }
}

struct ClickhouseBatch {
    insert: Insert<PageviewRow>,
    rows: usize,
}

#[async_trait]
impl PageviewBatch for ClickhouseBatch {
    async fn append(&mut self, event: &PageviewEvent) -> StorageResult<()> {
        let row = PageviewRow::from(event);

        self.insert
            .write(&row)
            .await
            .map_err(|e| StorageError::Other(e.into()))?;

        self.rows += 1;
        Ok(())
    }

    fn rows(&self) -> usize {
        self.rows
    }

    async fn send(self: Box<Self>) -> StorageResult<()> {
        self.insert
            .end()
            .await
            .map_err(|e| StorageError::Other(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uaparser::ClientDescriptor;
    use url::Url;

    #[test]
    fn test_row_from_pageview() {
        let url = Url::parse("https://🏹.to/shop/items").unwrap();
        let client = ClientDescriptor {
            operating_system: "Windows".to_string(),
            browser_family: "Chrome".to_string(),
            device: "Other".to_string(),
        };
        let event = PageviewEvent::new(&url, client).unwrap();

        let row = PageviewRow::from(&event);

        assert_eq!(row.timestamp, event.timestamp().timestamp_millis());
        assert_eq!(row.domain, "xn--kn8h.to");
        assert_eq!(row.path, "/shop/items");
        assert_eq!(row.operating_system, "Windows");
        assert_eq!(row.browser_family, "Chrome");
        assert_eq!(row.device, "Other");
    }
}
