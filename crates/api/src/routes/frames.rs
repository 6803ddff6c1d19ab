//! Frame Routes

use axum::{extract::State, Json};
use dms::{FrameMeasurement, FrameReport, LandmarkPoint};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ApiError;
use crate::AppState;

/// One frame of landmarks; an empty list means no face
#[derive(Debug, Deserialize)]
pub struct FrameRequest {
    #[serde(default)]
    pub landmarks: Vec<LandmarkPoint>,
    pub timestamp_ms: Option<u64>,
}

/// One frame of precomputed ratios
#[derive(Debug, Deserialize)]
pub struct MeasurementRequest {
    pub measurement: FrameMeasurement,
    pub timestamp_ms: Option<u64>,
}

/// Process a frame of landmarks
pub async fn post_frame(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FrameRequest>,
) -> Result<Json<FrameReport>, ApiError> {
    let now = state.now(request.timestamp_ms);
    let report = state.dms.process_frame(&request.landmarks, now)?;
    state.observe(&report);
    Ok(Json(report))
}

/// Process a frame whose ratios were computed upstream
pub async fn post_measurement(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MeasurementRequest>,
) -> Result<Json<FrameReport>, ApiError> {
    let m = &request.measurement;
    if !(m.ear.is_finite() && m.mar.is_finite() && m.ear >= 0.0 && m.mar >= 0.0) {
        return Err(ApiError::BadRequest("ratios must be finite and non-negative".into()));
    }
    let now = state.now(request.timestamp_ms);
    let report = state.dms.process_measurement(request.measurement, now)?;
    state.observe(&report);
    Ok(Json(report))
}
