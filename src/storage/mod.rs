pub mod clickhouse;
pub mod memory;
pub mod trait_def;

pub use self::clickhouse::{ClickhouseStore, PageviewRow};
pub use memory::{FailurePoint, MemoryStore};
pub use trait_def::{AnalyticsStore, PageviewBatch, StorageError, StorageResult};
