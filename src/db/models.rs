use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A reading as accepted from a device, before the store assigns identity.
///
/// Every field is optional: `None` means the sender did not supply a usable
/// value. Nothing is defaulted here; the store decides what absence means.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewReading {
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub location: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    /// 0 = closed, 1 = open. Any other value is kept exactly as sent.
    pub door_state: Option<Value>,
    /// Sender-supplied instant. The store assigns `now()` when absent.
    pub timestamp: Option<DateTime<Utc>>,
    /// Payload fields with no dedicated column, kept verbatim.
    pub extra: Map<String, Value>,
}

/// An immutable reading as persisted by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReading {
    pub id: Uuid,
    /// Store-assigned, strictly increasing. Breaks timestamp ties.
    pub seq: i64,
    /// Empty when the sender omitted it.
    pub device_id: String,
    pub device_name: Option<String>,
    pub location: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub door_state: Option<Value>,
    pub timestamp: DateTime<Utc>,
    pub extra: Map<String, Value>,
}

impl StoredReading {
    /// Only the number 1 counts as open; anything else, including absence,
    /// is closed.
    pub fn door_open(&self) -> bool {
        self.door_state
            .as_ref()
            .and_then(Value::as_f64)
            .is_some_and(|v| v == 1.0)
    }

    /// Sort key within a device: newest reading has the greatest key.
    pub fn recency(&self) -> (DateTime<Utc>, i64) {
        (self.timestamp, self.seq)
    }
}

/// Last-seen view of one device, derived from its readings.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSummary {
    pub device_id: String,
    pub device_name: Option<String>,
    pub location: Option<String>,
    pub last_seen: DateTime<Utc>,
}

impl From<&StoredReading> for DeviceSummary {
    /// Summary of a device whose most recent reading is `r`.
    fn from(r: &StoredReading) -> Self {
        Self {
            device_id: r.device_id.clone(),
            device_name: r.device_name.clone(),
            location: r.location.clone(),
            last_seen: r.timestamp,
        }
    }
}

/// Scan direction for per-device queries, keyed on [`StoredReading::recency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}
