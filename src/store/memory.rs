use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{NewReading, Order, StoredReading};

/// Process-local reading store.
///
/// Each device's readings are kept sorted by `(timestamp, seq)` so per-device
/// scans are a slice walk. Contents are lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct MemoryReadingStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    last_seq: i64,
    by_device: HashMap<String, Vec<StoredReading>>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, reading: NewReading) -> StoredReading {
        let mut inner = self.inner.write().await;
        inner.last_seq += 1;

        let stored = StoredReading {
            id: Uuid::new_v4(),
            seq: inner.last_seq,
            device_id: reading.device_id.unwrap_or_default(),
            device_name: reading.device_name,
            location: reading.location,
            temperature: reading.temperature,
            humidity: reading.humidity,
            door_state: reading.door_state,
            timestamp: reading.timestamp.unwrap_or_else(Utc::now),
            extra: reading.extra,
        };

        // Sender-supplied timestamps may arrive out of order.
        let readings = inner.by_device.entry(stored.device_id.clone()).or_default();
        let key = stored.recency();
        let at = readings.partition_point(|r| r.recency() <= key);
        readings.insert(at, stored.clone());

        stored
    }

    pub async fn query_by_device(
        &self,
        device_id: &str,
        order: Order,
        limit: usize,
    ) -> Vec<StoredReading> {
        let inner = self.inner.read().await;
        let Some(readings) = inner.by_device.get(device_id) else {
            return Vec::new();
        };

        match order {
            Order::Ascending => readings.iter().take(limit).cloned().collect(),
            Order::Descending => readings.iter().rev().take(limit).cloned().collect(),
        }
    }

    pub async fn latest_per_device(&self) -> Vec<StoredReading> {
        let inner = self.inner.read().await;
        let mut latest: Vec<StoredReading> = inner
            .by_device
            .values()
            .filter_map(|readings| readings.last().cloned())
            .collect();
        latest.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        latest
    }

    pub async fn prune_before(&self, cutoff: DateTime<Utc>) -> u64 {
        let mut inner = self.inner.write().await;
        let mut removed = 0u64;

        inner.by_device.retain(|_, readings| {
            let before = readings.len();
            readings.retain(|r| r.timestamp >= cutoff);
            removed += (before - readings.len()) as u64;
            !readings.is_empty()
        });

        removed
    }
}
