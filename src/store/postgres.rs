use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use super::StoreResult;
use crate::db::models::{NewReading, Order, StoredReading};

/// Reading store backed by the `readings` table.
#[derive(Debug, Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct ReadingRow {
    seq: i64,
    id: Uuid,
    device_id: String,
    device_name: Option<String>,
    location: Option<String>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    door_state: Option<Json<Value>>,
    recorded_at: DateTime<Utc>,
    extra: Json<Map<String, Value>>,
}

impl From<ReadingRow> for StoredReading {
    fn from(r: ReadingRow) -> Self {
        Self {
            id: r.id,
            seq: r.seq,
            device_id: r.device_id,
            device_name: r.device_name,
            location: r.location,
            temperature: r.temperature,
            humidity: r.humidity,
            door_state: r.door_state.map(|d| d.0),
            timestamp: r.recorded_at,
            extra: r.extra.0,
        }
    }
}

const READING_COLUMNS: &str = "seq, id, device_id, device_name, location, \
                               temperature, humidity, door_state, recorded_at, extra";

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, reading: NewReading) -> StoreResult<StoredReading> {
        let sql = format!(
            r#"
            INSERT INTO readings
                (id, device_id, device_name, location,
                 temperature, humidity, door_state, recorded_at, extra)
            VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8::timestamptz, now()), $9)
            RETURNING {READING_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ReadingRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(reading.device_id.unwrap_or_default())
            .bind(reading.device_name)
            .bind(reading.location)
            .bind(reading.temperature)
            .bind(reading.humidity)
            .bind(reading.door_state.map(Json))
            .bind(reading.timestamp)
            .bind(Json(reading.extra))
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    pub async fn query_by_device(
        &self,
        device_id: &str,
        order: Order,
        limit: usize,
    ) -> StoreResult<Vec<StoredReading>> {
        let direction = match order {
            Order::Ascending => "ASC",
            Order::Descending => "DESC",
        };
        let sql = format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM readings
            WHERE device_id = $1
            ORDER BY recorded_at {direction}, seq {direction}
            LIMIT $2
            "#
        );

        let rows = sqlx::query_as::<_, ReadingRow>(&sql)
            .bind(device_id)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn latest_per_device(&self) -> StoreResult<Vec<StoredReading>> {
        let sql = format!(
            r#"
            SELECT DISTINCT ON (device_id) {READING_COLUMNS}
            FROM readings
            ORDER BY device_id, recorded_at DESC, seq DESC
            "#
        );

        let rows = sqlx::query_as::<_, ReadingRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn prune_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM readings WHERE recorded_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Tests
//
// These need a live Postgres reachable through DATABASE_URL:
//   cargo test -- --ignored
// ---------------------------------------------------------------------------
