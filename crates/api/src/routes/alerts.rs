//! Alert Routes

use axum::{
    extract::{Query, State},
    Json,
};
use alerting::Notification;
use dms::{AlertRecord, DriverState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;

/// Query parameters for alerts endpoint
#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    /// Filter by driver state
    pub status: Option<DriverState>,
    /// Maximum number of records
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for alerts endpoint
#[derive(Debug, Serialize)]
pub struct AlertResponse {
    /// Newest first
    pub data: Vec<AlertRecord>,
    pub count: usize,
    pub total: usize,
    /// Notifications sent to emergency contacts
    pub notifications_sent: usize,
}

/// Get alert history
pub async fn get_alerts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AlertQuery>,
) -> Json<AlertResponse> {
    let limit = params.limit.min(500);
    let history = state.dms.alerts();
    let total = history.len();

    let data: Vec<AlertRecord> = history
        .into_iter()
        .rev()
        .filter(|a| params.status.map_or(true, |s| a.status == s))
        .take(limit)
        .collect();

    Json(AlertResponse {
        count: data.len(),
        total,
        notifications_sent: state.notifications().len(),
        data,
    })
}

/// Notifications sent so far
pub async fn get_notifications(State(state): State<Arc<AppState>>) -> Json<Vec<Notification>> {
    Json(state.notifications())
}
