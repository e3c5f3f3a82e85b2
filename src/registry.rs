use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::db::models::{DeviceSummary, StoredReading};

/// Materialised view of the device registry, one summary per `device_id`.
///
/// The registry holds nothing the readings don't already say: it is seeded
/// from the newest reading of each device and then folded forward with every
/// appended reading. Display metadata comes from the most recent reading.
///
/// Wrapped in `Arc` so it can be cheaply cloned and shared across tasks.
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

#[derive(Debug, Clone)]
struct Entry {
    summary: DeviceSummary,
    /// `seq` of the reading the summary was taken from.
    seq: i64,
}

impl Entry {
    fn recency(&self) -> (DateTime<Utc>, i64) {
        (self.summary.last_seen, self.seq)
    }
}

impl From<&StoredReading> for Entry {
    fn from(r: &StoredReading) -> Self {
        Self {
            summary: DeviceSummary::from(r),
            seq: r.seq,
        }
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole registry with one entry per reading in `latest`.
    ///
    /// `latest` is expected to hold the newest reading of each device; if a
    /// device appears twice the newer reading wins.
    pub async fn seed(&self, latest: &[StoredReading]) -> usize {
        let mut map: HashMap<String, Entry> = HashMap::with_capacity(latest.len());
        for r in latest {
            fold(&mut map, r);
        }
        let len = map.len();
        *self.inner.write().await = map;
        len
    }

    /// Fold a freshly stored reading into its device's summary.
    pub async fn observe(&self, reading: &StoredReading) {
        fold(&mut *self.inner.write().await, reading);
    }

    /// Snapshot of every known device, ordered by `device_id`.
    pub async fn list(&self) -> Vec<DeviceSummary> {
        let mut devices: Vec<DeviceSummary> = self
            .inner
            .read()
            .await
            .values()
            .map(|e| e.summary.clone())
            .collect();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        devices
    }

    #[cfg(test)]
    pub async fn get(&self, device_id: &str) -> Option<DeviceSummary> {
        self.inner
            .read()
            .await
            .get(device_id)
            .map(|e| e.summary.clone())
    }

    /// Drop devices whose newest reading is older than `cutoff`, i.e. devices
    /// with no readings left after a retention sweep at `cutoff`.
    pub async fn evict_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.len();
        inner.retain(|_, e| e.summary.last_seen >= cutoff);
        before - inner.len()
    }

    /// Hold the read lock until the returned guard is dropped, stalling
    /// every writer meanwhile.
    #[cfg(test)]
    pub async fn hold_read(&self) -> impl Sized {
        self.inner.clone().read_owned().await
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

fn fold(map: &mut HashMap<String, Entry>, reading: &StoredReading) {
    let candidate = Entry::from(reading);
    match map.get_mut(&reading.device_id) {
        Some(current) if current.recency() >= candidate.recency() => {}
        Some(current) => *current = candidate,
        None => {
            map.insert(reading.device_id.clone(), candidate);
        }
    }
}
