use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::OpenApi;
use uuid::Uuid;

use super::{
    dto::{
        DeleteReceipt, DeviceSummaryDto, HourlyBucketDto, IngestBatch, IngestReading,
        ReadingDto, UserSummaryDto,
    },
    AppState,
};
use crate::{error::TelemetryError, store::NewReading};

const DEFAULT_WINDOW_HOURS: i64 = 24;
const DEFAULT_READING_LIMIT: i64 = 1000;

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct WindowParams {
    pub hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReadingsParams {
    pub hours: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DevicesParams {
    pub hours: Option<i64>,
    /// Keep only the N largest consumers, ranked by total descending.
    pub top: Option<usize>,
}

fn window_hours(hours: Option<i64>) -> Result<i64, TelemetryError> {
    let hours = hours.unwrap_or(DEFAULT_WINDOW_HOURS);
    if hours < 1 {
        return Err(TelemetryError::InvalidValue(format!(
            "hours must be at least 1, got {hours}"
        )));
    }
    Ok(hours)
}

fn reading_limit(limit: Option<i64>) -> Result<i64, TelemetryError> {
    let limit = limit.unwrap_or(DEFAULT_READING_LIMIT);
    if limit < 1 {
        return Err(TelemetryError::InvalidValue(format!(
            "limit must be at least 1, got {limit}"
        )));
    }
    Ok(limit)
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Store a single telemetry reading.
#[utoipa::path(
    post,
    path = "/",
    request_body = IngestReading,
    responses(
        (status = 201, description = "Reading stored", body = ReadingDto),
        (status = 400, description = "Negative watts"),
        (status = 404, description = "Unknown device"),
    ),
    tag = "ingestion"
)]
pub async fn ingest_reading(
    State(state): State<AppState>,
    Json(payload): Json<IngestReading>,
) -> Result<(StatusCode, Json<ReadingDto>), TelemetryError> {
    state.directory.resolve(payload.device_id).await?;

    let stored = state
        .store
        .append(NewReading {
            device_id: payload.device_id,
            recorded_at: payload.timestamp,
            watts: payload.energy_watts,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(stored.into())))
}

/// Store a batch of telemetry readings atomically: either every reading is
/// committed or none are. The whole batch is rejected if it exceeds the
/// configured maximum or references an unknown device.
#[utoipa::path(
    post,
    path = "/batch",
    request_body = IngestBatch,
    responses(
        (status = 201, description = "All readings stored", body = Vec<ReadingDto>),
        (status = 400, description = "Batch too large or negative watts"),
        (status = 404, description = "One or more unknown devices; the error lists them"),
    ),
    tag = "ingestion"
)]
pub async fn ingest_batch(
    State(state): State<AppState>,
    Json(payload): Json<IngestBatch>,
) -> Result<(StatusCode, Json<Vec<ReadingDto>>), TelemetryError> {
    state.store.ensure_batch_size(payload.data.len())?;

    let device_ids: Vec<Uuid> = payload.data.iter().map(|r| r.device_id).collect();
    state.directory.resolve_many(&device_ids).await?;

    let readings: Vec<NewReading> = payload
        .data
        .iter()
        .map(|r| NewReading {
            device_id: r.device_id,
            recorded_at: r.timestamp,
            watts: r.energy_watts,
        })
        .collect();

    let stored = state.store.append_batch(&readings).await?;
    Ok((
        StatusCode::CREATED,
        Json(stored.into_iter().map(Into::into).collect()),
    ))
}

// ---------------------------------------------------------------------------
// Device queries
// ---------------------------------------------------------------------------

/// Raw readings for a device within the trailing window, newest first.
#[utoipa::path(
    get,
    path = "/device/{device_id}",
    params(
        ("device_id" = Uuid, Path, description = "Device ID"),
        ("hours" = Option<i64>, Query, description = "Trailing window in hours (default 24)"),
        ("limit" = Option<i64>, Query, description = "Maximum readings returned (default 1000)"),
    ),
    responses(
        (status = 200, description = "Readings, newest first", body = Vec<ReadingDto>),
        (status = 404, description = "Unknown device"),
    ),
    tag = "queries"
)]
pub async fn get_device_readings(
    State(state): State<AppState>,
    Path(device_id): Path<Uuid>,
    Query(params): Query<ReadingsParams>,
) -> Result<Json<Vec<ReadingDto>>, TelemetryError> {
    let hours = window_hours(params.hours)?;
    let limit = reading_limit(params.limit)?;
    state.directory.resolve(device_id).await?;

    let rows = state.store.query(device_id, hours, limit).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Energy consumption summary for a device over the trailing window.
#[utoipa::path(
    get,
    path = "/device/{device_id}/summary",
    params(
        ("device_id" = Uuid, Path, description = "Device ID"),
        ("hours" = Option<i64>, Query, description = "Trailing window in hours (default 24)"),
    ),
    responses(
        (status = 200, description = "Summary; all-zero when the window is empty", body = DeviceSummaryDto),
        (status = 404, description = "Unknown device"),
    ),
    tag = "queries"
)]
pub async fn get_device_summary(
    State(state): State<AppState>,
    Path(device_id): Path<Uuid>,
    Query(params): Query<WindowParams>,
) -> Result<Json<DeviceSummaryDto>, TelemetryError> {
    let hours = window_hours(params.hours)?;
    let summary = state.aggregator.device_summary(device_id, hours).await?;
    Ok(Json(summary.into()))
}

/// Hourly consumption buckets for a device, ascending by slot start.
/// Hours without samples are omitted.
#[utoipa::path(
    get,
    path = "/device/{device_id}/hourly",
    params(
        ("device_id" = Uuid, Path, description = "Device ID"),
        ("hours" = Option<i64>, Query, description = "Trailing window in hours (default 24)"),
    ),
    responses(
        (status = 200, description = "Buckets for non-empty hours only", body = Vec<HourlyBucketDto>),
        (status = 404, description = "Unknown device"),
    ),
    tag = "queries"
)]
pub async fn get_device_hourly(
    State(state): State<AppState>,
    Path(device_id): Path<Uuid>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Vec<HourlyBucketDto>>, TelemetryError> {
    let hours = window_hours(params.hours)?;
    let buckets = state.aggregator.hourly_buckets(device_id, hours).await?;
    Ok(Json(buckets.into_iter().map(Into::into).collect()))
}

/// Delete a device's readings within the trailing window. Destructive and
/// irreversible; readings before the cutover are untouched.
#[utoipa::path(
    delete,
    path = "/device/{device_id}/telemetry",
    params(
        ("device_id" = Uuid, Path, description = "Device ID"),
        ("hours" = Option<i64>, Query, description = "Trailing window in hours (default 24)"),
    ),
    responses(
        (status = 200, description = "Count of readings removed", body = DeleteReceipt),
        (status = 404, description = "Unknown device"),
    ),
    tag = "ingestion"
)]
pub async fn delete_device_telemetry(
    State(state): State<AppState>,
    Path(device_id): Path<Uuid>,
    Query(params): Query<WindowParams>,
) -> Result<Json<DeleteReceipt>, TelemetryError> {
    let hours = window_hours(params.hours)?;
    state.directory.resolve(device_id).await?;

    let deleted = state.store.delete_window(device_id, hours).await?;
    Ok(Json(DeleteReceipt { deleted }))
}

// ---------------------------------------------------------------------------
// User queries
// ---------------------------------------------------------------------------

/// Per-device summaries for a user's active devices. With `top=N`, only
/// the N largest consumers, ranked by total descending (stable on ties).
#[utoipa::path(
    get,
    path = "/user/{user_id}/devices",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
        ("hours" = Option<i64>, Query, description = "Trailing window in hours (default 24)"),
        ("top" = Option<usize>, Query, description = "Keep only the N largest consumers"),
    ),
    responses(
        (status = 200, description = "Per-device summaries; empty list for a user without devices", body = Vec<DeviceSummaryDto>),
    ),
    tag = "queries"
)]
pub async fn get_user_devices(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<DevicesParams>,
) -> Result<Json<Vec<DeviceSummaryDto>>, TelemetryError> {
    let hours = window_hours(params.hours)?;
    let summaries = state
        .aggregator
        .user_devices(user_id, hours, params.top)
        .await?;
    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

/// Combined consumption summary across all of a user's active devices.
/// The average is the sample-weighted mean of per-device averages.
#[utoipa::path(
    get,
    path = "/user/{user_id}/summary",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
        ("hours" = Option<i64>, Query, description = "Trailing window in hours (default 24)"),
    ),
    responses(
        (status = 200, description = "Combined summary; all-zero for a user without devices", body = UserSummaryDto),
    ),
    tag = "queries"
)]
pub async fn get_user_summary(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<WindowParams>,
) -> Result<Json<UserSummaryDto>, TelemetryError> {
    let hours = window_hours(params.hours)?;
    let summary = state.aggregator.user_summary(user_id, hours).await?;
    Ok(Json(summary.into()))
}

// ---------------------------------------------------------------------------
// Health check
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

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        ingest_reading,
        ingest_batch,
        get_device_readings,
        get_device_summary,
        get_device_hourly,
        delete_device_telemetry,
        get_user_devices,
        get_user_summary,
        health,
    ),
    components(schemas(
        IngestReading,
        IngestBatch,
        ReadingDto,
        DeviceSummaryDto,
        UserSummaryDto,
        HourlyBucketDto,
        DeleteReceipt,
    )),
    tags(
        (name = "ingestion", description = "Telemetry write endpoints"),
        (name = "queries",   description = "Consumption query endpoints"),
        (name = "system",    description = "System endpoints"),
    ),
    info(
        title = "Energy Telemetry Service API",
        version = "0.1.0",
        description = "Device telemetry ingestion and consumption queries"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
