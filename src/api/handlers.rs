use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use utoipa::OpenApi;

use super::{
    dto::{DeviceSummaryDto, ErrorDto, HistoryParams, IngestReadingDto, MessageDto, ReadingDto},
    errors::AppError,
};
use crate::sensors::ReadingService;

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Store one reading pushed by a device.
///
/// The body is accepted without schema validation: missing fields are stored
/// as null and unknown fields verbatim. Re-sending a payload stores it again.
#[utoipa::path(
    post,
    path = "/api/sensors",
    request_body(content = IngestReadingDto, content_type = "application/json"),
    responses(
        (status = 201, description = "Reading stored", body = MessageDto),
        (status = 400, description = "Body is not a JSON object, or rejected by strict ingestion", body = ErrorDto),
        (status = 500, description = "Storage unavailable", body = ErrorDto),
    ),
    tag = "sensors"
)]
pub async fn ingest_reading(
    State(service): State<ReadingService>,
    body: Bytes,
) -> Result<(StatusCode, Json<MessageDto>), AppError> {
    service.ingest(&body).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageDto {
            message: "Reading stored".to_owned(),
        }),
    ))
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// List every device that has sent at least one reading.
#[utoipa::path(
    get,
    path = "/api/devices",
    responses(
        (status = 200, description = "One summary per distinct deviceId, ordered by deviceId", body = Vec<DeviceSummaryDto>),
    ),
    tag = "devices"
)]
pub async fn list_devices(State(service): State<ReadingService>) -> Json<Vec<DeviceSummaryDto>> {
    let devices = service.list_devices().await;
    Json(devices.into_iter().map(Into::into).collect())
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Fetch the newest reading of every known device in one request.
#[utoipa::path(
    get,
    path = "/api/sensors/latest",
    responses(
        (status = 200, description = "Latest reading per device, ordered by deviceId", body = Vec<ReadingDto>),
        (status = 500, description = "Storage unavailable", body = ErrorDto),
    ),
    tag = "sensors"
)]
pub async fn get_latest_all(
    State(service): State<ReadingService>,
) -> Result<Json<Vec<ReadingDto>>, AppError> {
    let rows = service.latest_all().await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Fetch the newest reading of a device. Responds with `null` when the
/// device has no readings.
#[utoipa::path(
    get,
    path = "/api/sensors/{device_id}/latest",
    params(
        ("device_id" = String, Path, description = "Device ID, matched exactly"),
    ),
    responses(
        (status = 200, description = "Latest reading, or null", body = ReadingDto),
        (status = 500, description = "Storage unavailable", body = ErrorDto),
    ),
    tag = "sensors"
)]
pub async fn get_latest(
    State(service): State<ReadingService>,
    Path(device_id): Path<String>,
) -> Result<Json<Option<ReadingDto>>, AppError> {
    let row = service.latest(&device_id).await?;
    Ok(Json(row.map(Into::into)))
}

/// Fetch the most recent readings of a device, newest first.
#[utoipa::path(
    get,
    path = "/api/sensors/{device_id}/history",
    params(
        ("device_id" = String, Path, description = "Device ID, matched exactly"),
        HistoryParams,
    ),
    responses(
        (status = 200, description = "Up to `limit` readings (default 10), newest first", body = Vec<ReadingDto>),
        (status = 500, description = "Storage unavailable", body = ErrorDto),
    ),
    tag = "sensors"
)]
pub async fn get_history(
    State(service): State<ReadingService>,
    Path(device_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ReadingDto>>, AppError> {
    let rows = service.history(&device_id, params.limit).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// The API has no page at `/`.
pub async fn root() -> (StatusCode, Json<MessageDto>) {
    (
        StatusCode::NOT_FOUND,
        Json(MessageDto {
            message: "This page is not available.".to_owned(),
        }),
    )
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(ingest_reading, list_devices, get_latest_all, get_latest, get_history, health),
    components(schemas(
        ReadingDto,
        DeviceSummaryDto,
        IngestReadingDto,
        MessageDto,
        ErrorDto
    )),
    tags(
        (name = "sensors", description = "Reading ingestion and queries"),
        (name = "devices", description = "Device registry derived from readings"),
        (name = "system",  description = "System endpoints"),
    ),
    info(
        title = "Telemetry Service API",
        version = "0.1.0",
        description = "Ingests device telemetry and serves latest and recent readings per device"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
