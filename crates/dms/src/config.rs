//! DMS configuration

use serde::{Deserialize, Serialize};

use crate::decision::RuleSet;
use crate::state::EyeClosureScale;

/// Temporal aggregation thresholds and windows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Eye aspect ratio below which a frame counts as "eyes closed"
    pub ear_threshold: f32,

    /// Consecutive closed frames needed to register a blink
    pub blink_consecutive_frames: u32,

    /// Blink counting window (milliseconds)
    pub blink_window_ms: u64,

    /// Mouth aspect ratio above which a frame counts as yawning
    pub mar_threshold: f32,

    /// Time without a yawning frame before the yawn flag clears (milliseconds)
    pub yawn_decay_ms: u64,

    /// Representation of the eye-closure signal handed to the decision engine
    pub eye_closure_scale: EyeClosureScale,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.2,
            blink_consecutive_frames: 2,
            blink_window_ms: 60_000,
            mar_threshold: 0.5,
            yawn_decay_ms: 5_000,
            eye_closure_scale: EyeClosureScale::AspectRatio,
        }
    }
}

/// Decision engine thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Which rule set classifies the driver
    pub rule_set: RuleSet,

    /// Blinks per minute above which the driver is drowsy (threshold-only rules)
    pub blink_rate_threshold: u32,

    /// Eye aspect ratio below which eyes count as closed (aspect-ratio scale)
    pub ear_drowsy_threshold: f32,

    /// Closed percentage above which eyes count as closed (percent scale)
    ///
    /// The percentage is `(1 - ear) * 100`, so 80.0 matches an EAR of 0.2.
    pub closed_percent_threshold: f32,

    /// Head tilt (max of |pitch|, |yaw|) considered excessive (degrees)
    pub head_tilt_threshold_deg: f32,

    /// Consecutive Drowsy decisions tolerated before one HighRisk escalation (0 disables)
    pub escalation_limit: u32,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            rule_set: RuleSet::SensorGated,
            blink_rate_threshold: 15,
            ear_drowsy_threshold: 0.2,
            closed_percent_threshold: 80.0,
            head_tilt_threshold_deg: 8.0,
            escalation_limit: 3,
        }
    }
}

/// Simulated vehicle position attached to every alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedLocation {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

impl Default for SimulatedLocation {
    fn default() -> Self {
        Self {
            lat: 37.7749,
            lng: -122.4194,
            address: "San Francisco, CA, USA".to_string(),
        }
    }
}

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    pub aggregator: AggregatorConfig,
    pub decision: DecisionConfig,

    /// Depth constant used by the head pose approximation (normalized units)
    pub pose_depth: f32,

    pub location: SimulatedLocation,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            aggregator: AggregatorConfig::default(),
            decision: DecisionConfig::default(),
            pose_depth: 1.0,
            location: SimulatedLocation::default(),
        }
    }
}

impl DmsConfig {
    /// Create strict config (lower thresholds)
    pub fn strict() -> Self {
        Self {
            aggregator: AggregatorConfig {
                yawn_decay_ms: 8_000,
                ..Default::default()
            },
            decision: DecisionConfig {
                blink_rate_threshold: 12,
                ear_drowsy_threshold: 0.22,
                closed_percent_threshold: 78.0,
                head_tilt_threshold_deg: 6.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Create lenient config (higher thresholds)
    pub fn lenient() -> Self {
        Self {
            aggregator: AggregatorConfig {
                yawn_decay_ms: 3_000,
                ..Default::default()
            },
            decision: DecisionConfig {
                blink_rate_threshold: 20,
                ear_drowsy_threshold: 0.17,
                closed_percent_threshold: 83.0,
                head_tilt_threshold_deg: 12.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: DmsConfig = serde_json::from_str(r#"{"decision": {"head_tilt_threshold_deg": 20.0}}"#).unwrap();
        assert_eq!(config.decision.head_tilt_threshold_deg, 20.0);
        assert_eq!(config.decision.blink_rate_threshold, 15);
        assert_eq!(config.aggregator.blink_window_ms, 60_000);
        assert_eq!(config.pose_depth, 1.0);
        assert_eq!(config.decision.rule_set, RuleSet::SensorGated);
    }

    #[test]
    fn test_presets_order_thresholds() {
        let strict = DmsConfig::strict();
        let lenient = DmsConfig::lenient();
        assert!(strict.decision.head_tilt_threshold_deg < lenient.decision.head_tilt_threshold_deg);
        assert!(strict.decision.blink_rate_threshold < lenient.decision.blink_rate_threshold);
        assert_eq!(strict.location, SimulatedLocation::default());
    }

    #[test]
    fn test_closed_percent_thresholds_match_ear_thresholds() {
        for config in [DmsConfig::default(), DmsConfig::strict(), DmsConfig::lenient()] {
            let d = &config.decision;
            let expected = (1.0 - d.ear_drowsy_threshold) * 100.0;
            assert!((d.closed_percent_threshold - expected).abs() < 1e-3, "{:?}", d);
        }
    }
}
