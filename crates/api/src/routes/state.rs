//! Driver State Routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use dms::{AggregatedSignal, AlertRecord, DriverState, SensorStatus};
use serde::Serialize;
use std::sync::Arc;

use super::TimestampQuery;
use crate::error::ApiError;
use crate::AppState;

/// Current driver state and the signals behind it
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub driver_state: DriverState,
    pub signal: AggregatedSignal,
    pub sensors: SensorStatus,
}

/// Result of an explicit decision poll
#[derive(Debug, Serialize)]
pub struct DecideResponse {
    pub driver_state: DriverState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<AlertRecord>,
    /// HighRisk alert raised because drowsiness persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<AlertRecord>,
}

/// Get the last decided state
pub async fn get_state(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TimestampQuery>,
) -> Result<Json<StateResponse>, ApiError> {
    let now = state.now(params.timestamp_ms);
    Ok(Json(StateResponse {
        driver_state: state.dms.last_state()?,
        signal: state.dms.signal()?,
        sensors: state.dms.snapshot(now)?,
    }))
}

/// Re-decide on the current signal
pub async fn post_decide(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TimestampQuery>,
) -> Result<Json<DecideResponse>, ApiError> {
    let now = state.now(params.timestamp_ms);
    let report = state.dms.poll(now)?;
    for alert in report.alert.iter().chain(report.escalation.iter()) {
        state.observe_alert(alert);
    }
    Ok(Json(DecideResponse {
        driver_state: report.state,
        alert: report.alert,
        escalation: report.escalation,
    }))
}

/// Reset the session on driver change
///
/// Alert history is kept; notification cooldowns start over.
pub async fn post_reset(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    state.dms.reset_state()?;
    state.notifier.reset();
    Ok(StatusCode::NO_CONTENT)
}
