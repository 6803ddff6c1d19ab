//! Driver Monitoring System (DMS)
//!
//! Temporal signal fusion and driver state decisions:
//! - Eye/mouth aspect ratios and head pose from facial landmarks
//! - Blink counting, blink rate and yawn persistence over time
//! - Pedal and seatbelt sensor activations with auto-expiry
//! - Awake / Drowsy / HighRisk classification with alert recording

pub mod aggregator;
pub mod alert;
pub mod clock;
pub mod config;
pub mod decision;
pub mod escalation;
pub mod extractor;
pub mod report;
pub mod sensors;
pub mod state;

pub use aggregator::TemporalAggregator;
pub use alert::{AlertRecord, AlertRecorder, AlertSink, DeliveryError, GeoPoint, LogSink};
pub use clock::{Clock, ManualClock};
pub use config::{AggregatorConfig, DecisionConfig, DmsConfig, SimulatedLocation};
pub use decision::{Decision, DecisionEngine, DrowsinessCue, RuleSet};
pub use escalation::DrowsinessEscalator;
pub use extractor::{FrameMeasurement, HeadPose, LandmarkPoint, LandmarkScheme, RatioExtractor};
pub use report::{FrameReport, PollReport};
pub use sensors::{Sensor, SensorStatus, SensorTracker};
pub use state::{AggregatedSignal, DriverState, EyeClosure, EyeClosureScale};

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::info;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Unknown sensor: {0}")]
    UnknownSensor(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("State lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &'static str) -> Result<MutexGuard<'a, T>, DmsError> {
    mutex.lock().map_err(|_| DmsError::LockPoisoned(name))
}

/// Driver monitoring session
///
/// One aggregator and one sensor tracker, each guarded by its own lock.
/// No lock is held while another component is called.
pub struct DmsModule {
    config: DmsConfig,
    extractor: RatioExtractor,
    aggregator: Mutex<TemporalAggregator>,
    sensors: Mutex<SensorTracker>,
    engine: DecisionEngine,
    last_state: Mutex<DriverState>,
    escalator: Mutex<DrowsinessEscalator>,
}

impl DmsModule {
    /// Create a new DMS module with configuration
    pub fn new(config: DmsConfig) -> Result<Self, DmsError> {
        let recorder = Arc::new(AlertRecorder::new(config.location.clone()));
        Self::with_recorder(config, recorder)
    }

    /// Create a module that records alerts into `recorder`
    pub fn with_recorder(config: DmsConfig, recorder: Arc<AlertRecorder>) -> Result<Self, DmsError> {
        validate(&config)?;
        info!(
            "Creating DMS module: rule set {:?}, eye closure scale {:?}",
            config.decision.rule_set, config.aggregator.eye_closure_scale
        );

        Ok(Self {
            extractor: RatioExtractor::new(&config),
            aggregator: Mutex::new(TemporalAggregator::new(config.aggregator.clone())),
            sensors: Mutex::new(SensorTracker::new()),
            engine: DecisionEngine::new(config.decision.clone(), recorder),
            last_state: Mutex::new(DriverState::default()),
            escalator: Mutex::new(DrowsinessEscalator::new(config.decision.escalation_limit)),
            config,
        })
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }

    /// Ratios for one frame, no state change
    pub fn extract(&self, landmarks: &[LandmarkPoint]) -> FrameMeasurement {
        self.extractor.extract(landmarks)
    }

    /// Fold a measurement into the session signal
    pub fn ingest(&self, measurement: &FrameMeasurement, now_ms: u64) -> Result<AggregatedSignal, DmsError> {
        Ok(lock(&self.aggregator, "aggregator")?.ingest(measurement, now_ms))
    }

    /// Record a sensor activation
    pub fn activate(&self, sensor: Sensor, now_ms: u64) -> Result<(), DmsError> {
        lock(&self.sensors, "sensors")?.activate(sensor, now_ms);
        Ok(())
    }

    /// Record a sensor activation by name
    pub fn activate_named(&self, name: &str, now_ms: u64) -> Result<Sensor, DmsError> {
        let sensor = name.parse::<Sensor>()?;
        self.activate(sensor, now_ms)?;
        Ok(sensor)
    }

    /// Current sensor flags, expiring stale ones
    pub fn snapshot(&self, now_ms: u64) -> Result<SensorStatus, DmsError> {
        Ok(lock(&self.sensors, "sensors")?.snapshot(now_ms))
    }

    /// Classify a signal/sensor pair, recording an alert when not awake
    pub fn decide(&self, signal: &AggregatedSignal, sensors: &SensorStatus) -> (DriverState, Option<AlertRecord>) {
        self.engine.decide(signal, sensors)
    }

    /// Full pipeline for one frame: extract, ingest, snapshot, decide
    pub fn process_frame(&self, landmarks: &[LandmarkPoint], now_ms: u64) -> Result<FrameReport, DmsError> {
        let measurement = self.extract(landmarks);
        self.process_measurement(measurement, now_ms)
    }

    /// Pipeline for an already extracted measurement
    pub fn process_measurement(&self, measurement: FrameMeasurement, now_ms: u64) -> Result<FrameReport, DmsError> {
        let signal = self.ingest(&measurement, now_ms)?;
        let sensors = self.snapshot(now_ms)?;
        let (decision, alert) = self.engine.decide_detailed(&signal, &sensors);
        let escalation = self.settle(decision.state, signal.updated_at_ms)?;

        Ok(FrameReport {
            measurement,
            signal,
            sensors,
            state: decision.state,
            cues: decision.cues,
            alert,
            escalation,
        })
    }

    /// Re-decide on the current signal and fresh sensor flags
    ///
    /// Repeats the alert on every poll while the condition holds.
    pub fn poll(&self, now_ms: u64) -> Result<PollReport, DmsError> {
        let mut signal = self.signal()?;
        signal.updated_at_ms = signal.updated_at_ms.max(now_ms);
        let sensors = self.snapshot(now_ms)?;
        let (state, alert) = self.engine.decide(&signal, &sensors);
        let escalation = self.settle(state, signal.updated_at_ms)?;
        Ok(PollReport {
            state,
            alert,
            escalation,
        })
    }

    /// Store the decided state and raise a HighRisk alert once drowsiness persists
    fn settle(&self, state: DriverState, at_ms: u64) -> Result<Option<AlertRecord>, DmsError> {
        *lock(&self.last_state, "last_state")? = state;
        let escalate = lock(&self.escalator, "escalator")?.observe(state);
        Ok(escalate.then(|| self.engine.recorder().record(DriverState::HighRisk, at_ms)))
    }

    /// Current aggregated signal
    pub fn signal(&self) -> Result<AggregatedSignal, DmsError> {
        Ok(lock(&self.aggregator, "aggregator")?.signal().clone())
    }

    /// Last state produced by a decision
    pub fn last_state(&self) -> Result<DriverState, DmsError> {
        Ok(*lock(&self.last_state, "last_state")?)
    }

    /// Alert history, oldest first
    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.engine.recorder().history()
    }

    pub fn recorder(&self) -> &Arc<AlertRecorder> {
        self.engine.recorder()
    }

    /// Reset driver state (on driver change); alert history is kept
    pub fn reset_state(&self) -> Result<(), DmsError> {
        lock(&self.aggregator, "aggregator")?.reset();
        lock(&self.sensors, "sensors")?.reset();
        *lock(&self.last_state, "last_state")? = DriverState::default();
        lock(&self.escalator, "escalator")?.reset();
        info!("Driver state reset");
        Ok(())
    }
}

fn validate(config: &DmsConfig) -> Result<(), DmsError> {
    if config.aggregator.blink_consecutive_frames == 0 {
        return Err(DmsError::Config("blink_consecutive_frames must be at least 1".into()));
    }
    if config.aggregator.blink_window_ms == 0 {
        return Err(DmsError::Config("blink_window_ms must be positive".into()));
    }
    if !(config.pose_depth.is_finite() && config.pose_depth > 0.0) {
        return Err(DmsError::Config(format!("pose_depth must be positive, got {}", config.pose_depth)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::tests::synthetic_face;

    const OPEN: f32 = 0.3;

    #[test]
    fn test_awake_driver() {
        let dms = DmsModule::new(DmsConfig::default()).unwrap();
        let report = dms.process_frame(&synthetic_face(OPEN, 0.1), 0).unwrap();
        assert!(report.measurement.face_detected);
        assert_eq!(report.state, DriverState::Awake);
        assert!(!report.has_alert());
        assert!(dms.alerts().is_empty());
    }

    #[test]
    fn test_yawn_then_accelerator() {
        let dms = DmsModule::new(DmsConfig::default()).unwrap();
        let report = dms.process_frame(&synthetic_face(OPEN, 0.8), 1_000).unwrap();
        assert_eq!(report.state, DriverState::Drowsy);
        assert_eq!(report.primary_cue(), Some(DrowsinessCue::Yawning));
        assert_eq!(report.alert.as_ref().map(|a| a.status), Some(DriverState::Drowsy));

        dms.activate_named("accelerator", 1_500).unwrap();
        let report = dms.process_frame(&synthetic_face(OPEN, 0.1), 2_000).unwrap();
        assert!(report.signal.yawn_active);
        assert_eq!(report.state, DriverState::Awake);

        // Accelerator expires after 3 s, yawn still within decay
        let report = dms.process_frame(&synthetic_face(OPEN, 0.1), 4_500).unwrap();
        assert_eq!(report.state, DriverState::Drowsy);
        assert_eq!(dms.alerts().len(), 2);
    }

    #[test]
    fn test_seatbelt_spike_is_high_risk() {
        let dms = DmsModule::new(DmsConfig::default()).unwrap();
        dms.activate(Sensor::Seatbelt, 0).unwrap();
        let report = dms.process_frame(&[], 500).unwrap();
        assert!(!report.measurement.face_detected);
        assert_eq!(report.state, DriverState::HighRisk);
        assert_eq!(report.primary_cue(), Some(DrowsinessCue::SeatbeltSpike));

        let report = dms.process_frame(&[], 2_000).unwrap();
        assert_eq!(report.state, DriverState::Awake);
        assert_eq!(dms.last_state().unwrap(), DriverState::Awake);
    }

    #[test]
    fn test_poll_repeats_alerts() {
        let dms = DmsModule::new(DmsConfig::default()).unwrap();
        dms.process_frame(&synthetic_face(OPEN, 0.8), 0).unwrap();
        let first = dms.poll(100).unwrap();
        let second = dms.poll(200).unwrap();
        assert_eq!(first.state, DriverState::Drowsy);
        assert_eq!(first.state, second.state);
        assert_eq!(second.alert.unwrap().timestamp_ms, 200);
        assert_eq!(dms.alerts().len(), 3);
    }

    #[test]
    fn test_unknown_sensor_leaves_state() {
        let dms = DmsModule::new(DmsConfig::default()).unwrap();
        assert!(matches!(dms.activate_named("wiper", 0), Err(DmsError::UnknownSensor(_))));
        assert_eq!(dms.snapshot(0).unwrap(), SensorStatus::default());
    }

    #[test]
    fn test_threshold_only_configuration() {
        let config = DmsConfig {
            decision: DecisionConfig {
                rule_set: RuleSet::ThresholdOnly,
                ..Default::default()
            },
            ..Default::default()
        };
        let dms = DmsModule::new(config).unwrap();
        dms.activate(Sensor::Seatbelt, 0).unwrap();
        let report = dms.process_frame(&synthetic_face(OPEN, 0.1), 100).unwrap();
        assert_eq!(report.state, DriverState::Awake);
    }

    #[test]
    fn test_reset_keeps_history() {
        let dms = DmsModule::new(DmsConfig::default()).unwrap();
        dms.process_frame(&synthetic_face(OPEN, 0.8), 0).unwrap();
        dms.reset_state().unwrap();
        assert!(!dms.signal().unwrap().yawn_active);
        assert_eq!(dms.last_state().unwrap(), DriverState::Awake);
        assert_eq!(dms.alerts().len(), 1);
    }

    #[test]
    fn test_invalid_config() {
        let config = DmsConfig {
            pose_depth: 0.0,
            ..Default::default()
        };
        assert!(matches!(DmsModule::new(config), Err(DmsError::Config(_))));
    }

    #[test]
    fn test_closed_percent_scale_open_eyes_are_awake() {
        let config = DmsConfig {
            aggregator: AggregatorConfig {
                eye_closure_scale: EyeClosureScale::ClosedPercent,
                ..Default::default()
            },
            ..Default::default()
        };
        let dms = DmsModule::new(config).unwrap();

        let report = dms.process_frame(&synthetic_face(0.35, 0.1), 0).unwrap();
        assert!(matches!(report.signal.eye_closure, EyeClosure::ClosedPercent(_)));
        assert_eq!(report.state, DriverState::Awake);
        assert!(report.cues.is_empty());

        let report = dms.process_frame(&synthetic_face(0.1, 0.1), 33).unwrap();
        assert_eq!(report.state, DriverState::Drowsy);
        assert_eq!(report.primary_cue(), Some(DrowsinessCue::EyesClosed));
    }

    #[test]
    fn test_sustained_drowsiness_escalates_once() {
        let dms = DmsModule::new(DmsConfig::default()).unwrap();
        let escalations: Vec<bool> = (0..6u64)
            .map(|i| {
                let report = dms.process_frame(&synthetic_face(OPEN, 0.8), i * 100).unwrap();
                assert_eq!(report.state, DriverState::Drowsy);
                report.escalation.is_some()
            })
            .collect();
        assert_eq!(escalations, vec![false, false, false, true, false, false]);

        let high_risk: Vec<AlertRecord> = dms
            .alerts()
            .into_iter()
            .filter(|a| a.status == DriverState::HighRisk)
            .collect();
        assert_eq!(high_risk.len(), 1);
        assert_eq!(high_risk[0].timestamp_ms, 300);
    }

    #[test]
    fn test_escalation_rearms_after_awake() {
        let dms = DmsModule::new(DmsConfig::default()).unwrap();
        for i in 0..4u64 {
            dms.process_frame(&synthetic_face(OPEN, 0.8), i * 100).unwrap();
        }
        // Accelerator turns the next decision Awake, which clears the streak
        dms.activate(Sensor::Accelerator, 500).unwrap();
        assert_eq!(dms.poll(500).unwrap().state, DriverState::Awake);

        let report = (0..4u64)
            .map(|i| dms.poll(4_000 + i * 100).unwrap())
            .last()
            .unwrap();
        assert_eq!(report.state, DriverState::Drowsy);
        assert!(report.escalation.is_some());
        let high_risk = dms.alerts().iter().filter(|a| a.status == DriverState::HighRisk).count();
        assert_eq!(high_risk, 2);
    }

    #[test]
    fn test_reset_clears_escalation_streak() {
        let dms = DmsModule::new(DmsConfig::default()).unwrap();
        for i in 0..3u64 {
            dms.process_frame(&synthetic_face(OPEN, 0.8), i * 100).unwrap();
        }
        dms.reset_state().unwrap();
        let report = dms.process_frame(&synthetic_face(OPEN, 0.8), 1_000).unwrap();
        assert!(report.escalation.is_none());
    }
}
