//! Driver state and aggregated signal types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::extractor::HeadPose;

/// Driver alertness classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DriverState {
    #[default]
    Awake,
    Drowsy,
    HighRisk,
}

impl DriverState {
    /// Whether this state must raise an alert
    pub fn is_alerting(&self) -> bool {
        !matches!(self, DriverState::Awake)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DriverState::Awake => "Awake",
            DriverState::Drowsy => "Drowsy",
            DriverState::HighRisk => "HighRisk",
        }
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the eye-closure signal is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyeClosureScale {
    /// Raw eye aspect ratio, lower = more closed
    #[default]
    AspectRatio,
    /// Closedness percentage 0-100, higher = more closed
    ClosedPercent,
}

/// Eye-closure value tagged with its representation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scale", content = "value", rename_all = "snake_case")]
pub enum EyeClosure {
    AspectRatio(f32),
    ClosedPercent(f32),
}

impl EyeClosure {
    /// Express an eye aspect ratio on the requested scale
    pub fn from_ear(ear: f32, scale: EyeClosureScale) -> Self {
        match scale {
            EyeClosureScale::AspectRatio => EyeClosure::AspectRatio(ear),
            EyeClosureScale::ClosedPercent => {
                EyeClosure::ClosedPercent(((1.0 - ear) * 100.0).clamp(0.0, 100.0))
            }
        }
    }

    pub fn scale(&self) -> EyeClosureScale {
        match self {
            EyeClosure::AspectRatio(_) => EyeClosureScale::AspectRatio,
            EyeClosure::ClosedPercent(_) => EyeClosureScale::ClosedPercent,
        }
    }
}

impl Default for EyeClosure {
    fn default() -> Self {
        EyeClosure::AspectRatio(0.0)
    }
}

/// Smoothed per-session signal produced by the aggregator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSignal {
    /// Whether the latest frame contained a face
    pub face_detected: bool,

    /// Latest eye aspect ratio seen with a face
    pub ear: f32,

    /// Eye closure on the configured scale
    pub eye_closure: EyeClosure,

    /// Blinks counted in the last completed window
    pub blinks_per_minute: u32,

    /// Blinks counted so far in the current window
    pub blink_count: u32,

    /// Blinks counted over the whole session
    pub total_blinks: u64,

    /// Yawn seen within the decay period
    pub yawn_active: bool,

    /// Continuous time with eyes below threshold (None while open)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eyes_closed_ms: Option<u64>,

    /// Latest head pose seen with a face
    pub head_pose: HeadPose,

    /// Timestamp of the frame that produced this snapshot
    pub updated_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_percent_conversion() {
        match EyeClosure::from_ear(0.3, EyeClosureScale::ClosedPercent) {
            EyeClosure::ClosedPercent(p) => assert!((p - 70.0).abs() < 1e-3),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(EyeClosure::from_ear(1.4, EyeClosureScale::ClosedPercent), EyeClosure::ClosedPercent(0.0));
        assert_eq!(EyeClosure::from_ear(0.25, EyeClosureScale::AspectRatio), EyeClosure::AspectRatio(0.25));
    }

    #[test]
    fn test_alerting_states() {
        assert!(!DriverState::Awake.is_alerting());
        assert!(DriverState::Drowsy.is_alerting());
        assert!(DriverState::HighRisk.is_alerting());
        assert_eq!(DriverState::HighRisk.to_string(), "HighRisk");
    }
}
