pub mod memory;
pub mod postgres;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::models::{NewReading, Order, StoredReading};

pub use memory::MemoryReadingStore;
pub use postgres::PgReadingStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The persistence layer rejected the operation. Never retried here.
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    /// The detached write task panicked or was cancelled by runtime shutdown.
    #[error("write task failed: {0}")]
    Interrupted(#[from] tokio::task::JoinError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Append-and-scan persistence for readings.
///
/// Cheap to clone; every clone talks to the same underlying storage.
#[derive(Debug, Clone)]
pub enum ReadingStore {
    Postgres(PgReadingStore),
    Memory(MemoryReadingStore),
}

impl ReadingStore {
    /// Persist `reading`, assigning `seq`, `id`, and (if absent) `timestamp`.
    pub async fn append(&self, reading: NewReading) -> StoreResult<StoredReading> {
        match self {
            Self::Postgres(s) => s.append(reading).await,
            Self::Memory(s) => Ok(s.append(reading).await),
        }
    }

    /// Up to `limit` readings of `device_id` in `order`. Unknown devices yield
    /// an empty vector.
    pub async fn query_by_device(
        &self,
        device_id: &str,
        order: Order,
        limit: usize,
    ) -> StoreResult<Vec<StoredReading>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        match self {
            Self::Postgres(s) => s.query_by_device(device_id, order, limit).await,
            Self::Memory(s) => Ok(s.query_by_device(device_id, order, limit).await),
        }
    }

    /// The newest reading of every device, ordered by `device_id`.
    pub async fn latest_per_device(&self) -> StoreResult<Vec<StoredReading>> {
        match self {
            Self::Postgres(s) => s.latest_per_device().await,
            Self::Memory(s) => Ok(s.latest_per_device().await),
        }
    }

    /// Delete readings with `timestamp < cutoff`. Returns how many were removed.
    pub async fn prune_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        match self {
            Self::Postgres(s) => s.prune_before(cutoff).await,
            Self::Memory(s) => Ok(s.prune_before(cutoff).await),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }
}
