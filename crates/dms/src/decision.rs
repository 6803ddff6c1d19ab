//! Driver state decision rules

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alert::{AlertRecord, AlertRecorder};
use crate::config::DecisionConfig;
use crate::sensors::SensorStatus;
use crate::state::{AggregatedSignal, DriverState, EyeClosure};

/// Rule set used to classify the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSet {
    /// Seatbelt spike, pedal gating, eye closure, yawn and head tilt
    #[default]
    SensorGated,
    /// Blink rate or yawn only, no sensor input
    ThresholdOnly,
}

/// Individual signal that contributed to a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrowsinessCue {
    SeatbeltSpike,
    EyesClosed,
    Yawning,
    HeadTilt,
    HighBlinkRate,
}

/// Outcome of evaluating the rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub state: DriverState,
    /// Cues that were present, including ones suppressed by pedal activity
    pub cues: Vec<DrowsinessCue>,
}

/// Stateless decision engine; alerts go to the shared recorder
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: DecisionConfig,
    recorder: Arc<AlertRecorder>,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig, recorder: Arc<AlertRecorder>) -> Self {
        Self { config, recorder }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    pub fn recorder(&self) -> &Arc<AlertRecorder> {
        &self.recorder
    }

    /// Classify without side effects
    pub fn evaluate(&self, signal: &AggregatedSignal, sensors: &SensorStatus) -> Decision {
        match self.config.rule_set {
            RuleSet::SensorGated => self.evaluate_sensor_gated(signal, sensors),
            RuleSet::ThresholdOnly => self.evaluate_threshold_only(signal),
        }
    }

    /// Classify and record an alert for any non-awake outcome
    ///
    /// Alerts are repeated on every call while the condition holds. The
    /// alert timestamp is the signal's `updated_at_ms`.
    pub fn decide(
        &self,
        signal: &AggregatedSignal,
        sensors: &SensorStatus,
    ) -> (DriverState, Option<AlertRecord>) {
        let (decision, alert) = self.decide_detailed(signal, sensors);
        (decision.state, alert)
    }

    /// Same as [`decide`](Self::decide) but keeps the contributing cues
    pub fn decide_detailed(
        &self,
        signal: &AggregatedSignal,
        sensors: &SensorStatus,
    ) -> (Decision, Option<AlertRecord>) {
        let decision = self.evaluate(signal, sensors);
        debug!("Decision {} from cues {:?}", decision.state, decision.cues);

        let alert = decision
            .state
            .is_alerting()
            .then(|| self.recorder.record(decision.state, signal.updated_at_ms));
        (decision, alert)
    }

    fn evaluate_sensor_gated(&self, signal: &AggregatedSignal, sensors: &SensorStatus) -> Decision {
        if sensors.seatbelt_tension_spike {
            return Decision {
                state: DriverState::HighRisk,
                cues: vec![DrowsinessCue::SeatbeltSpike],
            };
        }

        let mut cues = Vec::new();
        if signal.face_detected && self.eyes_closed(&signal.eye_closure) {
            cues.push(DrowsinessCue::EyesClosed);
        }
        if signal.yawn_active {
            cues.push(DrowsinessCue::Yawning);
        }
        if signal.face_detected && signal.head_pose.max_tilt() > self.config.head_tilt_threshold_deg {
            cues.push(DrowsinessCue::HeadTilt);
        }

        let gated_in = sensors.vehicle_in_motion && !sensors.brake_active;
        let state = if gated_in && !cues.is_empty() && !sensors.accelerator_active {
            DriverState::Drowsy
        } else {
            DriverState::Awake
        };

        Decision { state, cues }
    }

    fn evaluate_threshold_only(&self, signal: &AggregatedSignal) -> Decision {
        let mut cues = Vec::new();
        if signal.blinks_per_minute > self.config.blink_rate_threshold {
            cues.push(DrowsinessCue::HighBlinkRate);
        }
        if signal.yawn_active {
            cues.push(DrowsinessCue::Yawning);
        }

        let state = if cues.is_empty() {
            DriverState::Awake
        } else {
            DriverState::Drowsy
        };
        Decision { state, cues }
    }

    fn eyes_closed(&self, closure: &EyeClosure) -> bool {
        match *closure {
            EyeClosure::AspectRatio(ear) => ear < self.config.ear_drowsy_threshold,
            EyeClosure::ClosedPercent(pct) => pct > self.config.closed_percent_threshold,
        }
    }
}
