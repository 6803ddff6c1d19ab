//! Sensor Routes

use axum::{
    extract::{Path, Query, State},
    Json,
};
use dms::SensorStatus;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::TimestampQuery;
use crate::error::ApiError;
use crate::AppState;

/// Response for a sensor activation
#[derive(Debug, Serialize)]
pub struct ActivationResponse {
    pub sensor: String,
    pub timestamp_ms: u64,
    pub status: SensorStatus,
}

/// Record a sensor activation
pub async fn activate(
    State(state): State<Arc<AppState>>,
    Path(sensor): Path<String>,
    Query(params): Query<TimestampQuery>,
) -> Result<Json<ActivationResponse>, ApiError> {
    let now = state.now(params.timestamp_ms);
    let sensor = state.dms.activate_named(&sensor, now)?;
    metrics::counter!("dms_sensor_events_total", "sensor" => sensor.as_str()).increment(1);
    debug!("Sensor event {} at {}", sensor, now);

    Ok(Json(ActivationResponse {
        sensor: sensor.to_string(),
        timestamp_ms: now,
        status: state.dms.snapshot(now)?,
    }))
}

/// Get current sensor flags
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TimestampQuery>,
) -> Result<Json<SensorStatus>, ApiError> {
    let now = state.now(params.timestamp_ms);
    Ok(Json(state.dms.snapshot(now)?))
}
