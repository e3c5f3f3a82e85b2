use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    db::models::{DeviceSummary, NewReading, Order, StoredReading},
    registry::DeviceRegistry,
    sensors::payload::{self, PayloadError},
    store::{ReadingStore, StoreError},
};

/// Default number of readings returned by a history query.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    pub history_limit: usize,
    /// Upper bound for a caller-supplied history limit.
    pub history_max_limit: usize,
    /// Reject readings with uncoercible fields or no `deviceId`.
    pub ingest_strict: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            history_max_limit: 100,
            ingest_strict: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneReport {
    pub readings_removed: u64,
    pub devices_evicted: usize,
}

/// Ingestion and queries over the reading store, plus the device registry
/// derived from it.
#[derive(Clone)]
pub struct ReadingService {
    store: ReadingStore,
    registry: DeviceRegistry,
    settings: ServiceSettings,
}

impl ReadingService {
    pub fn new(store: ReadingStore, registry: DeviceRegistry, settings: ServiceSettings) -> Self {
        Self {
            store,
            registry,
            settings,
        }
    }

    /// Rebuild the registry from what the store already holds.
    pub async fn seed_registry(&self) -> Result<usize, StoreError> {
        let latest = self.store.latest_per_device().await?;
        let devices = self.registry.seed(&latest).await;
        info!(devices, backend = self.store.backend_name(), "Device registry seeded");
        Ok(devices)
    }

    /// Parse a raw request body, apply the ingestion policy, and append.
    pub async fn ingest(&self, body: &[u8]) -> Result<StoredReading, IngestError> {
        let parsed = payload::parse(body)?;

        if !parsed.issues.is_empty() && !self.settings.ingest_strict {
            for issue in &parsed.issues {
                warn!(
                    device_id = ?parsed.reading.device_id,
                    field = issue.field,
                    reason = %issue.reason,
                    "Dropping uncoercible field"
                );
            }
        }

        let reading = parsed.enforce(self.settings.ingest_strict)?;
        Ok(self.append(reading).await?)
    }

    /// Append a reading and fold it into the registry.
    ///
    /// The registry is only touched after the store has accepted the write.
    /// Both steps run on a spawned task, so once the store has the reading
    /// the registry gets it too, even if the caller is dropped meanwhile.
    pub async fn append(&self, reading: NewReading) -> Result<StoredReading, StoreError> {
        let store = self.store.clone();
        let registry = self.registry.clone();
        let stored = tokio::spawn(async move {
            let stored = store.append(reading).await?;
            registry.observe(&stored).await;
            Ok::<_, StoreError>(stored)
        })
        .await??;

        debug!(
            device_id = %stored.device_id,
            seq = stored.seq,
            timestamp = %stored.timestamp,
            "Reading stored"
        );
        Ok(stored)
    }

    /// Newest reading of `device_id`; `None` when the device has none.
    pub async fn latest(&self, device_id: &str) -> Result<Option<StoredReading>, StoreError> {
        let mut rows = self
            .store
            .query_by_device(device_id, Order::Descending, 1)
            .await?;
        Ok(rows.pop())
    }

    /// Most recent readings of `device_id`, newest first.
    ///
    /// `limit` defaults to the configured window and is clamped to
    /// `1..=history_max_limit`.
    pub async fn history(
        &self,
        device_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredReading>, StoreError> {
        let limit = limit
            .unwrap_or(self.settings.history_limit)
            .clamp(1, self.settings.history_max_limit.max(1));
        self.store
            .query_by_device(device_id, Order::Descending, limit)
            .await
    }

    /// Newest reading of every known device in one call.
    pub async fn latest_all(&self) -> Result<Vec<StoredReading>, StoreError> {
        self.store.latest_per_device().await
    }

    pub async fn list_devices(&self) -> Vec<DeviceSummary> {
        self.registry.list().await
    }

    /// Delete readings older than `cutoff` and forget devices left without any.
    pub async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<PruneReport, StoreError> {
        let readings_removed = self.store.prune_before(cutoff).await?;
        let devices_evicted = self.registry.evict_before(cutoff).await;
        Ok(PruneReport {
            readings_removed,
            devices_evicted,
        })
    }
}
