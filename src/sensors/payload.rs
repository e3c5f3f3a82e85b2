use std::fmt;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::db::models::NewReading;

// ---------------------------------------------------------------------------
// Field names
//
// The first name in each list is canonical. The rest are spellings already
// used by deployed device firmware and are accepted on input only.
// ---------------------------------------------------------------------------

const DEVICE_ID: &[&str] = &["deviceId", "id"];
const DEVICE_NAME: &[&str] = &["deviceName"];
const LOCATION: &[&str] = &["location"];
const TEMPERATURE: &[&str] = &["temperature", "temperatura"];
const HUMIDITY: &[&str] = &["humidity", "humedad"];
const DOOR_STATE: &[&str] = &["doorState", "puerta"];
const TIMESTAMP: &[&str] = &["timestamp"];

/// Output keys the server fills in itself (`seq` by the store, `doorOpen`
/// from `doorState`). Sender-supplied values are discarded so they can never
/// shadow the real ones in a reading's JSON.
const SERVER_ASSIGNED: &[&str] = &["seq", "doorOpen"];

/// Years a timestamp may fall in. Anything outside is a field issue rather
/// than a value the database would refuse.
const TIMESTAMP_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// A field that was present but could not be coerced to its column type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    pub field: &'static str,
    pub reason: String,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("reading payload must be a JSON object")]
    NotAnObject,

    #[error("reading rejected: {}", join_issues(.0))]
    Rejected(Vec<FieldIssue>),
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result of best-effort parsing: the reading plus whatever had to be dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReading {
    pub reading: NewReading,
    pub issues: Vec<FieldIssue>,
}

impl ParsedReading {
    /// Apply the ingestion policy.
    ///
    /// Lenient: uncoercible fields are already `None`; the reading is kept.
    /// Strict: any issue, or a missing/empty `deviceId`, rejects the reading.
    pub fn enforce(mut self, strict: bool) -> Result<NewReading, PayloadError> {
        if !strict {
            return Ok(self.reading);
        }

        let has_device_issue = self.issues.iter().any(|i| i.field == DEVICE_ID[0]);
        let device_missing = self.reading.device_id.as_deref().map_or(true, str::is_empty);
        if device_missing && !has_device_issue {
            self.issues.insert(
                0,
                FieldIssue {
                    field: DEVICE_ID[0],
                    reason: "missing".to_owned(),
                },
            );
        }

        if self.issues.is_empty() {
            Ok(self.reading)
        } else {
            Err(PayloadError::Rejected(self.issues))
        }
    }
}

/// Parse a raw request body into a [`ParsedReading`].
///
/// Only a non-object body is an error here; field-level problems are
/// collected in `issues` and left for [`ParsedReading::enforce`] to judge.
pub fn parse(body: &[u8]) -> Result<ParsedReading, PayloadError> {
    match serde_json::from_slice::<Value>(body)? {
        Value::Object(map) => Ok(from_map(map)),
        _ => Err(PayloadError::NotAnObject),
    }
}

pub fn from_map(mut map: Map<String, Value>) -> ParsedReading {
    let mut issues = Vec::new();

    let reading = NewReading {
        device_id: field(&mut map, DEVICE_ID, coerce_text, &mut issues),
        device_name: field(&mut map, DEVICE_NAME, coerce_text, &mut issues),
        location: field(&mut map, LOCATION, coerce_text, &mut issues),
        temperature: field(&mut map, TEMPERATURE, coerce_number, &mut issues),
        humidity: field(&mut map, HUMIDITY, coerce_number, &mut issues),
        door_state: field(&mut map, DOOR_STATE, coerce_door_state, &mut issues),
        timestamp: field(&mut map, TIMESTAMP, coerce_timestamp, &mut issues),
        extra: {
            for key in SERVER_ASSIGNED {
                map.remove(*key);
            }
            map
        },
    };

    ParsedReading { reading, issues }
}

/// Remove every spelling of a field from `map` and coerce the first one found.
fn field<T>(
    map: &mut Map<String, Value>,
    names: &'static [&'static str],
    coerce: fn(&Value) -> Result<Option<T>, String>,
    issues: &mut Vec<FieldIssue>,
) -> Option<T> {
    // Every spelling is removed so aliases never leak into `extra`.
    let removed: Vec<Value> = names.iter().filter_map(|name| map.remove(*name)).collect();
    let value = removed.into_iter().next()?;

    match coerce(&value) {
        Ok(v) => v,
        Err(reason) => {
            issues.push(FieldIssue {
                field: names[0],
                reason,
            });
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Coercions
//
// `Ok(None)` is explicit absence (`null`, empty string). `Err` is a value of
// the wrong shape.
// ---------------------------------------------------------------------------

fn coerce_text(value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(format!("expected a string, got {}", kind(other))),
    }
}

fn coerce_number(value: &Value) -> Result<Option<f64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("{n} is not representable as a float")),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(format!("{s:?} is not a number")),
        },
        other => Err(format!("expected a number, got {}", kind(other))),
    }
}

/// 0/1 in any common spelling is normalised to the number; any other scalar
/// is kept exactly as sent.
fn coerce_door_state(value: &Value) -> Result<Option<Value>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(Value::from(i64::from(*b)))),
        Value::Number(_) => Ok(Some(value.clone())),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(match s.trim() {
            "0" => Value::from(0),
            "1" => Value::from(1),
            _ => value.clone(),
        })),
        other => Err(format!("expected a scalar, got {}", kind(other))),
    }
}

/// RFC 3339 strings or Unix epoch milliseconds.
fn coerce_timestamp(value: &Value) -> Result<Option<DateTime<Utc>>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .map_err(|e| format!("{s:?} is not an RFC 3339 timestamp: {e}"))
            .and_then(|dt| in_range(dt.with_timezone(&Utc))),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| format!("{n} is not a valid epoch-milliseconds timestamp"))
            .and_then(in_range),
        other => Err(format!("expected a timestamp, got {}", kind(other))),
    }
}

fn in_range(dt: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, String> {
    if TIMESTAMP_YEARS.contains(&dt.year()) {
        Ok(Some(dt))
    } else {
        Err(format!(
            "{dt} is outside years {}..={}",
            TIMESTAMP_YEARS.start(),
            TIMESTAMP_YEARS.end()
        ))
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse_value(v: Value) -> ParsedReading {
        parse(v.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn parses_canonical_payload() {
        let parsed = parse_value(json!({
            "deviceId": "A",
            "deviceName": "Cold room",
            "location": "Dock 3",
            "temperature": 22.5,
            "humidity": 40,
            "doorState": 0,
            "timestamp": "2024-05-01T12:00:00Z"
        }));

        assert!(parsed.issues.is_empty());
        let r = parsed.reading;
        assert_eq!(r.device_id.as_deref(), Some("A"));
        assert_eq!(r.device_name.as_deref(), Some("Cold room"));
        assert_eq!(r.location.as_deref(), Some("Dock 3"));
        assert_eq!(r.temperature, Some(22.5));
        assert_eq!(r.humidity, Some(40.0));
        assert_eq!(r.door_state, Some(json!(0)));
        assert_eq!(
            r.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
        assert!(r.extra.is_empty());
    }

    #[test]
    fn accepts_firmware_field_names() {
        let parsed = parse_value(json!({
            "id": "esp32-01",
            "temperatura": 19.5,
            "humedad": 55,
            "puerta": 1
        }));

        let r = parsed.reading;
        assert_eq!(r.device_id.as_deref(), Some("esp32-01"));
        assert_eq!(r.temperature, Some(19.5));
        assert_eq!(r.humidity, Some(55.0));
        assert_eq!(r.door_state, Some(json!(1)));
        assert!(r.extra.is_empty());
    }

    #[test]
    fn canonical_name_wins_over_alias() {
        let parsed = parse_value(json!({ "deviceId": "A", "id": "B", "temperature": 1, "temperatura": 2 }));
        assert_eq!(parsed.reading.device_id.as_deref(), Some("A"));
        assert_eq!(parsed.reading.temperature, Some(1.0));
        assert!(parsed.reading.extra.is_empty());
    }

    #[test]
    fn missing_fields_are_none_not_defaults() {
        let parsed = parse_value(json!({ "deviceId": "A" }));
        assert!(parsed.issues.is_empty());
        assert_eq!(parsed.reading.temperature, None);
        assert_eq!(parsed.reading.humidity, None);
        assert_eq!(parsed.reading.door_state, None);
        assert_eq!(parsed.reading.timestamp, None);
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let parsed = parse_value(json!({ "temperature": " 21.25 ", "humidity": "60", "doorState": "1" }));
        assert!(parsed.issues.is_empty());
        assert_eq!(parsed.reading.temperature, Some(21.25));
        assert_eq!(parsed.reading.humidity, Some(60.0));
        assert_eq!(parsed.reading.door_state, Some(json!(1)));
    }

    #[test]
    fn door_state_accepts_bools_and_numeric_strings() {
        let door = |v: Value| parse_value(json!({ "doorState": v })).reading.door_state;
        assert_eq!(door(json!(true)), Some(json!(1)));
        assert_eq!(door(json!(false)), Some(json!(0)));
        assert_eq!(door(json!(" 0 ")), Some(json!(0)));
        assert_eq!(door(json!("")), None);
    }

    #[test]
    fn door_state_other_values_are_kept_as_sent() {
        for sent in [json!(7), json!(2.5), json!(1.0), json!("open"), json!("2")] {
            let parsed = parse_value(json!({ "doorState": sent.clone() }));
            assert!(parsed.issues.is_empty(), "{sent} raised {:?}", parsed.issues);
            assert_eq!(parsed.reading.door_state, Some(sent));
        }
    }

    #[test]
    fn uncoercible_values_become_issues() {
        let parsed = parse_value(json!({
            "deviceId": "A",
            "temperature": "warm",
            "doorState": { "open": true },
            "location": ["a", "b"]
        }));

        assert_eq!(parsed.reading.temperature, None);
        assert_eq!(parsed.reading.door_state, None);
        assert_eq!(parsed.reading.location, None);
        let fields: Vec<&str> = parsed.issues.iter().map(|i| i.field).collect();
        assert_eq!(fields, vec!["location", "temperature", "doorState"]);
    }

    #[test]
    fn unknown_fields_kept_verbatim() {
        let parsed = parse_value(json!({ "deviceId": "A", "battery": 87, "fw": { "rev": "1.2" } }));
        assert_eq!(parsed.reading.extra["battery"], json!(87));
        assert_eq!(parsed.reading.extra["fw"], json!({ "rev": "1.2" }));
    }

    #[test]
    fn server_assigned_keys_are_dropped() {
        let parsed = parse_value(json!({
            "deviceId": "A",
            "seq": 99,
            "doorOpen": true,
            "doorState": 0
        }));
        assert!(parsed.reading.extra.is_empty());
        assert_eq!(parsed.reading.door_state, Some(json!(0)));
    }

    #[test]
    fn epoch_millis_timestamp() {
        let parsed = parse_value(json!({ "timestamp": 1_714_564_800_000_i64 }));
        assert_eq!(
            parsed.reading.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn timestamps_outside_supported_years_are_issues() {
        // Roughly 250,000 years before the epoch, and year 11476.
        for ms in [-8_000_000_000_000_000_i64, 300_000_000_000_000] {
            let parsed = parse_value(json!({ "deviceId": "A", "timestamp": ms }));
            assert_eq!(parsed.reading.timestamp, None);
            assert_eq!(parsed.issues.len(), 1);
            assert_eq!(parsed.issues[0].field, "timestamp");
        }

        let parsed = parse_value(json!({ "timestamp": "0001-01-01T00:00:00Z" }));
        assert!(parsed.issues.is_empty());
    }

    #[test]
    fn non_object_bodies_are_errors() {
        assert!(matches!(parse(b"[1, 2]"), Err(PayloadError::NotAnObject)));
        assert!(matches!(parse(b"42"), Err(PayloadError::NotAnObject)));
        assert!(matches!(parse(b"{oops"), Err(PayloadError::InvalidJson(_))));
    }

    #[test]
    fn lenient_policy_keeps_partial_reading() {
        let parsed = parse_value(json!({ "temperature": "warm" }));
        let reading = parsed.enforce(false).unwrap();
        assert_eq!(reading.device_id, None);
        assert_eq!(reading.temperature, None);
    }

    #[test]
    fn strict_policy_rejects_issues_and_missing_device() {
        let err = parse_value(json!({ "temperature": "warm" })).enforce(true).unwrap_err();
        match err {
            PayloadError::Rejected(issues) => {
                assert_eq!(issues[0].field, "deviceId");
                assert_eq!(issues[1].field, "temperature");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = parse_value(json!({ "deviceId": "" })).enforce(true).unwrap_err();
        assert!(err.to_string().contains("deviceId: missing"));

        assert!(parse_value(json!({ "deviceId": "A", "temperature": 3 })).enforce(true).is_ok());
    }
}
