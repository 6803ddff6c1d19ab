//! Alert Manager Implementation

use std::collections::HashMap;

use dms::DriverState;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const HOUR_MS: u64 = 3_600_000;

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Minimum gap between notifications for the same driver state (ms)
    pub cooldown_ms: u64,
    /// Maximum notifications per hour before throttling
    pub max_alerts_per_hour: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 30_000,
            max_alerts_per_hour: 20,
        }
    }
}

impl AlertConfig {
    /// Notify on every alert
    pub fn unthrottled() -> Self {
        Self {
            cooldown_ms: 0,
            max_alerts_per_hour: usize::MAX,
        }
    }
}

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    High,
    Critical,
}

impl From<DriverState> for Severity {
    fn from(state: DriverState) -> Self {
        match state {
            DriverState::Awake => Severity::Low,
            DriverState::Drowsy => Severity::High,
            DriverState::HighRisk => Severity::Critical,
        }
    }
}

/// Notification history for one driver state
#[derive(Debug, Clone)]
struct AlertState {
    /// Last time this alert was sent
    last_fired_ms: u64,
    /// Number of times sent
    fire_count: usize,
}

/// Alert manager for notification deduplication and throttling
#[derive(Debug)]
pub struct AlertManager {
    /// Configuration
    config: AlertConfig,
    /// Alert states by driver state
    states: HashMap<DriverState, AlertState>,
    /// Alerts sent in current hour
    hourly_count: usize,
    /// Hour start time
    hour_start_ms: Option<u64>,
}

impl AlertManager {
    /// Create a new alert manager
    pub fn new(config: AlertConfig) -> Self {
        info!("Creating alert manager with config: {:?}", config);
        Self {
            config,
            states: HashMap::new(),
            hourly_count: 0,
            hour_start_ms: None,
        }
    }

    /// Check if a notification should go out for `status` at `now_ms`
    pub fn should_fire(&mut self, status: DriverState, now_ms: u64) -> bool {
        if !status.is_alerting() {
            debug!("Alert suppressed: driver is {}", status);
            return false;
        }

        // Reset hourly counter if needed
        let hour_start = *self.hour_start_ms.get_or_insert(now_ms);
        if now_ms.saturating_sub(hour_start) >= HOUR_MS {
            self.hourly_count = 0;
            self.hour_start_ms = Some(now_ms);
        }

        // Check hourly throttle
        if self.hourly_count >= self.config.max_alerts_per_hour {
            warn!("Alert throttled: max alerts per hour reached");
            return false;
        }

        // Check cooldown
        if let Some(state) = self.states.get(&status) {
            if now_ms.saturating_sub(state.last_fired_ms) < self.config.cooldown_ms {
                debug!("Alert suppressed: {} in cooldown period", status);
                return false;
            }
        }

        true
    }

    /// Record that a notification was sent
    pub fn record_fire(&mut self, status: DriverState, now_ms: u64) {
        self.hourly_count += 1;

        let state = self.states.entry(status).or_insert(AlertState {
            last_fired_ms: now_ms,
            fire_count: 0,
        });

        state.last_fired_ms = now_ms;
        state.fire_count += 1;

        info!("Alert sent: {} (count: {})", status, state.fire_count);
    }

    /// Forget cooldowns and the hourly count
    pub fn clear(&mut self) {
        self.states.clear();
        self.hourly_count = 0;
        self.hour_start_ms = None;
        info!("Alert throttling state cleared");
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_awake_never_fires() {
        let mut manager = AlertManager::default();
        assert!(!manager.should_fire(DriverState::Awake, 0));
        assert!(manager.should_fire(DriverState::Drowsy, 0));
    }

    #[test]
    fn test_cooldown() {
        let config = AlertConfig {
            cooldown_ms: 60_000,
            ..Default::default()
        };
        let mut manager = AlertManager::new(config);

        assert!(manager.should_fire(DriverState::Drowsy, 0));
        manager.record_fire(DriverState::Drowsy, 0);

        // Immediate duplicate should not fire, a different state should
        assert!(!manager.should_fire(DriverState::Drowsy, 1_000));
        assert!(manager.should_fire(DriverState::HighRisk, 1_000));

        assert!(manager.should_fire(DriverState::Drowsy, 60_000));
    }

    #[test]
    fn test_hourly_throttle() {
        let config = AlertConfig {
            cooldown_ms: 0,
            max_alerts_per_hour: 2,
        };
        let mut manager = AlertManager::new(config);
        for t in [0, 10] {
            assert!(manager.should_fire(DriverState::HighRisk, t));
            manager.record_fire(DriverState::HighRisk, t);
        }
        assert!(!manager.should_fire(DriverState::HighRisk, 20));
        assert!(manager.should_fire(DriverState::HighRisk, HOUR_MS));
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(Severity::from(DriverState::HighRisk), Severity::Critical);
        assert_eq!(Severity::from(DriverState::Drowsy), Severity::High);
        assert_eq!(Severity::from(DriverState::Awake), Severity::Low);
    }

    #[test]
    fn test_clear_lifts_cooldown_and_cap() {
        let config = AlertConfig {
            cooldown_ms: 60_000,
            max_alerts_per_hour: 1,
        };
        let mut manager = AlertManager::new(config);
        manager.record_fire(DriverState::Drowsy, 0);
        assert!(!manager.should_fire(DriverState::Drowsy, 1_000));
        assert!(!manager.should_fire(DriverState::HighRisk, 1_000));

        manager.clear();
        assert!(manager.should_fire(DriverState::Drowsy, 1_000));
    }
}
