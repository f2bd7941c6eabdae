//! HTTP request handlers.

use super::AppState;
use crate::db::{Alert, Device, DeviceStatus, NewDevice, Reading};
use crate::error::BatteryError;
use crate::telemetry::{self, DeviceDetail, FleetExport, FleetStatus, IngestRequest};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::Deserialize;

// ============================================================================
// API: Devices
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DeviceQuery {
    pub status: Option<DeviceStatus>,
}

pub async fn handle_list_devices(
    State(state): State<AppState>,
    Query(query): Query<DeviceQuery>,
) -> Result<Json<Vec<Device>>, BatteryError> {
    let devices = state.engine.store().list_devices(query.status)?;
    Ok(Json(devices))
}

pub async fn handle_create_device(
    State(state): State<AppState>,
    Json(req): Json<NewDevice>,
) -> Result<impl IntoResponse, BatteryError> {
    let device = state.engine.register(req)?;
    Ok((StatusCode::CREATED, Json(device)))
}

pub async fn handle_get_device(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeviceDetail>, BatteryError> {
    Ok(Json(state.engine.device_detail(id)?))
}

pub async fn handle_delete_device(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, BatteryError> {
    state.engine.delete_device(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_mark_offline(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Device>, BatteryError> {
    Ok(Json(state.engine.mark_offline(id)?))
}

// ============================================================================
// API: Readings
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReadingQuery {
    pub limit: Option<i64>,
}

pub async fn handle_list_readings(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ReadingQuery>,
) -> Result<Json<Vec<Reading>>, BatteryError> {
    let limit = query.limit.unwrap_or(100);
    Ok(Json(state.engine.reading_history(id, limit)?))
}

pub async fn handle_ingest(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<IngestRequest>,
) -> Result<(StatusCode, Json<Reading>), BatteryError> {
    let reading = state.engine.ingest(id, &req)?;
    Ok((StatusCode::CREATED, Json(reading)))
}

// ============================================================================
// API: Alerts
// ============================================================================

pub async fn handle_get_alerts(State(state): State<AppState>) -> Result<Json<Vec<Alert>>, BatteryError> {
    Ok(Json(state.engine.store().list_unresolved_alerts()?))
}

pub async fn handle_resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Alert>, BatteryError> {
    let alert = state
        .engine
        .store()
        .resolve_alert(id)
        .map_err(|e| BatteryError::from_db(e, "alert", id))?;
    tracing::info!("Resolved alert {} for device {}", alert.id, alert.device_id);
    Ok(Json(alert))
}

// ============================================================================
// API: Fleet
// ============================================================================

pub async fn handle_status(State(state): State<AppState>) -> Result<Json<FleetStatus>, BatteryError> {
    Ok(Json(telemetry::summarize(state.engine.store())?))
}

pub async fn handle_export(State(state): State<AppState>) -> Result<Json<FleetExport>, BatteryError> {
    Ok(Json(telemetry::export(state.engine.store(), Utc::now())?))
}
