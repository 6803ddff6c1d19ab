//! Per-frame pipeline output

use serde::{Deserialize, Serialize};

use crate::alert::AlertRecord;
use crate::decision::DrowsinessCue;
use crate::extractor::FrameMeasurement;
use crate::sensors::SensorStatus;
use crate::state::{AggregatedSignal, DriverState};

/// Everything produced by processing one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub measurement: FrameMeasurement,
    pub signal: AggregatedSignal,
    pub sensors: SensorStatus,
    pub state: DriverState,
    pub cues: Vec<DrowsinessCue>,

    /// Alert raised by this frame (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<AlertRecord>,

    /// HighRisk alert raised because drowsiness persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation: Option<AlertRecord>,
}

impl FrameReport {
    /// Check if this frame raised an alert
    pub fn has_alert(&self) -> bool {
        self.alert.is_some() || self.escalation.is_some()
    }

    /// Highest priority cue
    pub fn primary_cue(&self) -> Option<DrowsinessCue> {
        // Priority: Seatbelt > EyesClosed > Yawning > HeadTilt > BlinkRate
        [
            DrowsinessCue::SeatbeltSpike,
            DrowsinessCue::EyesClosed,
            DrowsinessCue::Yawning,
            DrowsinessCue::HeadTilt,
            DrowsinessCue::HighBlinkRate,
        ]
        .into_iter()
        .find(|cue| self.cues.contains(cue))
    }
}

/// Outcome of re-deciding without a new frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollReport {
    pub state: DriverState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<AlertRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation: Option<AlertRecord>,
}
