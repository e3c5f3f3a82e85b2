use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::db::models::{DeviceSummary, StoredReading};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadingDto {
    pub id: Uuid,
    /// Store-assigned sequence number; breaks ties between equal timestamps.
    pub seq: i64,
    pub device_id: String,
    pub device_name: Option<String>,
    pub location: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    /// 0 = closed, 1 = open. Other values are passed through as stored.
    pub door_state: Option<serde_json::Value>,
    /// `true` only when `doorState` is 1.
    pub door_open: bool,
    pub timestamp: DateTime<Utc>,
    /// Unrecognised payload fields, echoed back verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// JSON names of [`ReadingDto`]'s own fields. An `extra` entry under one of
/// these would be flattened next to the real field and shadow it.
const READING_FIELDS: &[&str] = &[
    "id",
    "seq",
    "deviceId",
    "deviceName",
    "location",
    "temperature",
    "humidity",
    "doorState",
    "doorOpen",
    "timestamp",
];

impl From<StoredReading> for ReadingDto {
    fn from(r: StoredReading) -> Self {
        Self {
            door_open: r.door_open(),
            id: r.id,
            seq: r.seq,
            device_id: r.device_id,
            device_name: r.device_name,
            location: r.location,
            temperature: r.temperature,
            humidity: r.humidity,
            door_state: r.door_state,
            timestamp: r.timestamp,
            extra: r
                .extra
                .into_iter()
                .filter(|(k, _)| !READING_FIELDS.contains(&k.as_str()))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummaryDto {
    pub device_id: String,
    pub device_name: Option<String>,
    pub location: Option<String>,
    /// Timestamp of the device's newest reading.
    pub last_seen: DateTime<Utc>,
}

impl From<DeviceSummary> for DeviceSummaryDto {
    fn from(s: DeviceSummary) -> Self {
        Self {
            device_id: s.device_id,
            device_name: s.device_name,
            location: s.location,
            last_seen: s.last_seen,
        }
    }
}

/// Schema of the `POST /api/sensors` body, for the OpenAPI document only.
/// Bodies are parsed by `sensors::payload`, never into this type.
///
/// Every field is optional and unknown fields are stored as-is. `id`,
/// `temperatura`, `humedad` and `puerta` are accepted as spellings of
/// `deviceId`, `temperature`, `humidity` and `doorState`. `seq` and
/// `doorOpen` are assigned by the server and ignored on input.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestReadingDto {
    /// String, or a number/boolean which is stringified.
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub location: Option<String>,
    /// Number or numeric string, e.g. `22.5` or `"22.5"`.
    #[schema(value_type = Option<serde_json::Value>)]
    pub temperature: Option<f64>,
    /// Number or numeric string.
    #[schema(value_type = Option<serde_json::Value>)]
    pub humidity: Option<f64>,
    /// 0 or 1 as a number, boolean or string. Other values are stored as sent.
    pub door_state: Option<serde_json::Value>,
    /// RFC 3339 string or Unix epoch milliseconds, years 1 to 9999.
    /// Assigned by the server when omitted.
    #[schema(value_type = Option<serde_json::Value>)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageDto {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDto {
    pub error: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Number of readings to return. Defaults to 10; clamped to the server maximum.
    pub limit: Option<usize>,
}
