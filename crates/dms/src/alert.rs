//! Alert recording and delivery contract

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SimulatedLocation;
use crate::state::DriverState;

/// Geographic position attached to an alert
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Immutable alert entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Sequential within the session, starting at 1
    pub id: u64,
    pub status: DriverState,
    pub timestamp_ms: u64,
    pub location: GeoPoint,
    pub address: String,
}

/// Alert delivery failure
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("Delivery channel unavailable: {0}")]
    Unavailable(String),

    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

/// External notification channel for alerts
///
/// Delivery is best effort: failures are logged by the recorder and never
/// affect the decision or the recorded history.
pub trait AlertSink: Send + Sync {
    fn deliver(&self, record: &AlertRecord) -> Result<(), DeliveryError>;
}

/// Sink that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn deliver(&self, record: &AlertRecord) -> Result<(), DeliveryError> {
        info!(
            "Alert #{}: driver {} at {} ({}, {})",
            record.id, record.status, record.address, record.location.lat, record.location.lng
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct History {
    records: Vec<AlertRecord>,
    next_id: u64,
}

/// Append-only in-memory alert history
pub struct AlertRecorder {
    history: Mutex<History>,
    location: SimulatedLocation,
    sink: Option<Arc<dyn AlertSink>>,
}

impl AlertRecorder {
    pub fn new(location: SimulatedLocation) -> Self {
        Self {
            history: Mutex::new(History {
                records: Vec::new(),
                next_id: 1,
            }),
            location,
            sink: None,
        }
    }

    /// Attach a delivery sink
    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Append an alert for `status` and hand it to the sink
    ///
    /// Always succeeds; duplicate and rapid-fire calls are all recorded.
    pub fn record(&self, status: DriverState, now_ms: u64) -> AlertRecord {
        let record = {
            // Append-only, a poisoned history is still consistent
            let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
            let record = AlertRecord {
                id: history.next_id,
                status,
                timestamp_ms: now_ms,
                location: GeoPoint {
                    lat: self.location.lat,
                    lng: self.location.lng,
                },
                address: self.location.address.clone(),
            };
            history.next_id += 1;
            history.records.push(record.clone());
            record
        };

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.deliver(&record) {
                warn!("Alert #{} delivery failed: {}", record.id, e);
            }
        }

        record
    }

    /// All alerts, oldest first
    pub fn history(&self) -> Vec<AlertRecord> {
        self.history
            .lock()
            .map(|h| h.records.clone())
            .unwrap_or_else(|e| e.into_inner().records.clone())
    }

    /// Most recent alerts, newest first
    pub fn recent(&self, limit: usize) -> Vec<AlertRecord> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.records.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history
            .lock()
            .map(|h| h.records.len())
            .unwrap_or_else(|e| e.into_inner().records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AlertRecorder {
    fn default() -> Self {
        Self::new(SimulatedLocation::default())
    }
}

impl std::fmt::Debug for AlertRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertRecorder")
            .field("location", &self.location)
            .field("alerts", &self.len())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
