//! Temporal aggregation of per-frame ratios
//!
//! Turns noisy per-frame measurements into session signals:
//! - blink counting with consecutive-frame debounce
//! - blinks per minute over fixed 60 s windows
//! - yawn flag with a decay timer
//! - continuous eyes-closed duration

use tracing::debug;

use crate::config::AggregatorConfig;
use crate::extractor::FrameMeasurement;
use crate::state::{AggregatedSignal, EyeClosure};

/// Per-session aggregator; one instance per monitored driver
#[derive(Debug, Clone)]
pub struct TemporalAggregator {
    config: AggregatorConfig,
    signal: AggregatedSignal,
    /// Consecutive frames below the EAR threshold
    closed_frames: u32,
    /// Start of the current eyes-closed run
    closed_since_ms: Option<u64>,
    /// Start of the current blink window
    window_start_ms: Option<u64>,
    /// Last frame that crossed the yawn threshold
    last_yawn_ms: Option<u64>,
}

impl TemporalAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        let signal = AggregatedSignal {
            eye_closure: EyeClosure::from_ear(0.0, config.eye_closure_scale),
            ..Default::default()
        };
        Self {
            config,
            signal,
            closed_frames: 0,
            closed_since_ms: None,
            window_start_ms: None,
            last_yawn_ms: None,
        }
    }

    /// Fold one frame into the session state and return the new snapshot
    ///
    /// `now_ms` must be non-decreasing across calls.
    pub fn ingest(&mut self, measurement: &FrameMeasurement, now_ms: u64) -> AggregatedSignal {
        let window_start = *self.window_start_ms.get_or_insert(now_ms);
        let mut yawning = false;

        self.signal.face_detected = measurement.face_detected;
        if measurement.face_detected {
            self.update_eyes(measurement.ear, now_ms);
            self.signal.head_pose = measurement.head_pose;

            if measurement.mar > self.config.mar_threshold {
                yawning = true;
                self.signal.yawn_active = true;
                self.last_yawn_ms = Some(now_ms);
            }
        }

        if !yawning && self.signal.yawn_active {
            if let Some(last) = self.last_yawn_ms {
                if now_ms.saturating_sub(last) > self.config.yawn_decay_ms {
                    debug!("Yawn decayed after {} ms", now_ms.saturating_sub(last));
                    self.signal.yawn_active = false;
                }
            }
        }

        if now_ms.saturating_sub(window_start) >= self.config.blink_window_ms {
            debug!(
                "Blink window closed: {} blinks in {} ms",
                self.signal.blink_count,
                now_ms.saturating_sub(window_start)
            );
            self.signal.blinks_per_minute = self.signal.blink_count;
            self.signal.blink_count = 0;
            self.window_start_ms = Some(now_ms);
        }

        self.signal.updated_at_ms = now_ms;
        self.signal.clone()
    }

    fn update_eyes(&mut self, ear: f32, now_ms: u64) {
        self.signal.ear = ear;
        self.signal.eye_closure = EyeClosure::from_ear(ear, self.config.eye_closure_scale);

        if ear < self.config.ear_threshold {
            self.closed_frames += 1;
            let since = *self.closed_since_ms.get_or_insert(now_ms);
            self.signal.eyes_closed_ms = Some(now_ms.saturating_sub(since));

            if self.closed_frames >= self.config.blink_consecutive_frames {
                self.signal.blink_count += 1;
                self.signal.total_blinks += 1;
                self.closed_frames = 0;
                debug!("Blink registered (window count {})", self.signal.blink_count);
            }
        } else {
            self.closed_frames = 0;
            self.closed_since_ms = None;
            self.signal.eyes_closed_ms = None;
        }
    }

    /// Current snapshot without ingesting a frame
    pub fn signal(&self) -> &AggregatedSignal {
        &self.signal
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Reset state (on driver change)
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

impl Default for TemporalAggregator {
    fn default() -> Self {
        Self::new(AggregatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::EyeClosureScale;
    use proptest::prelude::*;

    fn frame(ear: f32, mar: f32) -> FrameMeasurement {
        FrameMeasurement {
            face_detected: true,
            ear,
            mar,
            ..Default::default()
        }
    }

    const OPEN: f32 = 0.3;
    const CLOSED: f32 = 0.1;

    #[test]
    fn test_blink_needs_two_consecutive_frames() {
        let mut agg = TemporalAggregator::default();
        agg.ingest(&frame(CLOSED, 0.0), 0);
        agg.ingest(&frame(OPEN, 0.0), 33);
        assert_eq!(agg.signal().blink_count, 0);

        agg.ingest(&frame(CLOSED, 0.0), 66);
        let s = agg.ingest(&frame(CLOSED, 0.0), 99);
        assert_eq!(s.blink_count, 1);
    }

    #[test]
    fn test_blink_resets_debounce_counter() {
        let mut agg = TemporalAggregator::default();
        for i in 0..5u64 {
            agg.ingest(&frame(CLOSED, 0.0), i * 33);
        }
        // 5 closed frames: blinks on frames 2 and 4
        assert_eq!(agg.signal().blink_count, 2);
    }

    #[test]
    fn test_no_face_frame_does_not_advance_debounce() {
        let mut agg = TemporalAggregator::default();
        agg.ingest(&frame(CLOSED, 0.0), 0);
        let s = agg.ingest(&FrameMeasurement::empty(), 33);
        assert!(!s.face_detected);
        assert_eq!(s.ear, CLOSED);
        assert_eq!(s.blink_count, 0);
        let s = agg.ingest(&frame(CLOSED, 0.0), 66);
        assert_eq!(s.blink_count, 1);
    }

    #[test]
    fn test_window_surfaces_rate_and_resets() {
        let mut agg = TemporalAggregator::default();
        agg.ingest(&frame(CLOSED, 0.0), 0);
        agg.ingest(&frame(CLOSED, 0.0), 100);
        agg.ingest(&frame(OPEN, 0.0), 200);

        let s = agg.ingest(&frame(OPEN, 0.0), 59_999);
        assert_eq!(s.blink_count, 1);
        assert_eq!(s.blinks_per_minute, 0);

        let s = agg.ingest(&frame(OPEN, 0.0), 60_000);
        assert_eq!(s.blinks_per_minute, 1);
        assert_eq!(s.blink_count, 0);

        // Rate holds until the next window closes
        let s = agg.ingest(&frame(OPEN, 0.0), 100_000);
        assert_eq!(s.blinks_per_minute, 1);
        let s = agg.ingest(&frame(OPEN, 0.0), 120_000);
        assert_eq!(s.blinks_per_minute, 0);
    }

    #[test]
    fn test_yawn_persists_through_decay() {
        let mut agg = TemporalAggregator::default();
        assert!(agg.ingest(&frame(OPEN, 0.8), 10_000).yawn_active);

        for t in (10_100..=14_900).step_by(100) {
            assert!(agg.ingest(&frame(OPEN, 0.1), t).yawn_active, "cleared at {}", t);
        }
        assert!(agg.ingest(&frame(OPEN, 0.1), 15_000).yawn_active);
        assert!(!agg.ingest(&frame(OPEN, 0.1), 15_001).yawn_active);
    }

    #[test]
    fn test_new_yawn_restarts_decay() {
        let mut agg = TemporalAggregator::default();
        agg.ingest(&frame(OPEN, 0.8), 0);
        agg.ingest(&frame(OPEN, 0.8), 4_000);
        assert!(agg.ingest(&frame(OPEN, 0.1), 8_000).yawn_active);
        assert!(!agg.ingest(&frame(OPEN, 0.1), 9_001).yawn_active);
    }

    #[test]
    fn test_yawn_decays_without_face() {
        let mut agg = TemporalAggregator::default();
        agg.ingest(&frame(OPEN, 0.8), 0);
        assert!(!agg.ingest(&FrameMeasurement::empty(), 6_000).yawn_active);
    }

    #[test]
    fn test_eyes_closed_duration() {
        let mut agg = TemporalAggregator::default();
        assert_eq!(agg.ingest(&frame(CLOSED, 0.0), 1_000).eyes_closed_ms, Some(0));
        assert_eq!(agg.ingest(&frame(CLOSED, 0.0), 1_500).eyes_closed_ms, Some(500));
        assert_eq!(agg.ingest(&frame(OPEN, 0.0), 1_600).eyes_closed_ms, None);
    }

    #[test]
    fn test_closed_percent_scale() {
        let mut agg = TemporalAggregator::new(AggregatorConfig {
            eye_closure_scale: EyeClosureScale::ClosedPercent,
            ..Default::default()
        });
        let s = agg.ingest(&frame(0.25, 0.0), 0);
        match s.eye_closure {
            EyeClosure::ClosedPercent(p) => assert!((p - 75.0).abs() < 1e-3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reset() {
        let mut agg = TemporalAggregator::default();
        agg.ingest(&frame(CLOSED, 0.9), 0);
        agg.ingest(&frame(CLOSED, 0.9), 33);
        agg.reset();
        assert_eq!(agg.signal(), &AggregatedSignal::default());
    }

    /// Reference blink count: runs of >= 2 closed frames, restarting after each blink
    fn reference_blinks(ears: &[f32], threshold: f32) -> u64 {
        let mut run = 0;
        let mut blinks = 0;
        for &ear in ears {
            if ear < threshold {
                run += 1;
                if run == 2 {
                    blinks += 1;
                    run = 0;
                }
            } else {
                run = 0;
            }
        }
        blinks
    }

    proptest! {
        #[test]
        fn prop_open_eyes_never_blink(ears in proptest::collection::vec(0.2f32..1.0, 1..300)) {
            let mut agg = TemporalAggregator::default();
            for (i, ear) in ears.iter().enumerate() {
                agg.ingest(&frame(*ear, 0.0), i as u64 * 33);
            }
            prop_assert_eq!(agg.signal().total_blinks, 0);
        }

        #[test]
        fn prop_blinks_match_reference(ears in proptest::collection::vec(prop_oneof![Just(0.1f32), Just(0.3f32)], 1..500)) {
            let mut agg = TemporalAggregator::default();
            for (i, ear) in ears.iter().enumerate() {
                agg.ingest(&frame(*ear, 0.0), i as u64 * 33);
            }
            prop_assert_eq!(agg.signal().total_blinks, reference_blinks(&ears, 0.2));
        }

        #[test]
        fn prop_windows_neither_lose_nor_double_count(
            ears in proptest::collection::vec(prop_oneof![Just(0.1f32), Just(0.3f32)], 1201),
        ) {
            // One frame every 100 ms for 120 s inclusive
            let mut agg = TemporalAggregator::default();
            let mut surfaced = 0u64;
            for (i, ear) in ears.iter().enumerate() {
                let now = i as u64 * 100;
                let before = agg.signal().blinks_per_minute;
                let s = agg.ingest(&frame(*ear, 0.0), now);
                if now > 0 && now % 60_000 == 0 {
                    surfaced += s.blinks_per_minute as u64;
                } else {
                    prop_assert_eq!(s.blinks_per_minute, before);
                }
            }
            prop_assert_eq!(surfaced, reference_blinks(&ears, 0.2));
            prop_assert_eq!(agg.signal().blink_count, 0);
        }
    }
}
