//! Vehicle sensor activation tracking with auto-expiry

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::DmsError;

/// Discrete vehicle sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensor {
    Accelerator,
    Brake,
    /// Seatbelt tension spike
    Seatbelt,
}

impl Sensor {
    pub const ALL: [Sensor; 3] = [Sensor::Accelerator, Sensor::Brake, Sensor::Seatbelt];

    /// How long an activation stays live (milliseconds)
    pub const fn expiry_ms(&self) -> u64 {
        match self {
            Sensor::Accelerator | Sensor::Brake => 3_000,
            Sensor::Seatbelt => 2_000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sensor::Accelerator => "accelerator",
            Sensor::Brake => "brake",
            Sensor::Seatbelt => "seatbelt",
        }
    }

    fn index(&self) -> usize {
        match self {
            Sensor::Accelerator => 0,
            Sensor::Brake => 1,
            Sensor::Seatbelt => 2,
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sensor {
    type Err = DmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accelerator" => Ok(Sensor::Accelerator),
            "brake" => Ok(Sensor::Brake),
            "seatbelt" | "seatbelt_tension_spike" => Ok(Sensor::Seatbelt),
            _ => Err(DmsError::UnknownSensor(s.to_string())),
        }
    }
}

/// Point-in-time sensor flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorStatus {
    pub accelerator_active: bool,
    pub brake_active: bool,
    pub seatbelt_tension_spike: bool,
    /// No speed sensor is wired; the vehicle is always considered moving
    pub vehicle_in_motion: bool,
}

impl Default for SensorStatus {
    fn default() -> Self {
        Self {
            accelerator_active: false,
            brake_active: false,
            seatbelt_tension_spike: false,
            vehicle_in_motion: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SensorSlot {
    active: bool,
    last_activation_ms: Option<u64>,
}

/// Tracks sensor activations; flags expire on read
#[derive(Debug, Clone, Default)]
pub struct SensorTracker {
    slots: [SensorSlot; 3],
}

impl SensorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a sensor active as of `now_ms`
    pub fn activate(&mut self, sensor: Sensor, now_ms: u64) {
        let slot = &mut self.slots[sensor.index()];
        slot.active = true;
        slot.last_activation_ms = Some(now_ms);
        debug!("Sensor {} activated at {}", sensor, now_ms);
    }

    /// Activate by name; unknown names leave the tracker untouched
    pub fn activate_named(&mut self, name: &str, now_ms: u64) -> Result<Sensor, DmsError> {
        let sensor = name.parse::<Sensor>()?;
        self.activate(sensor, now_ms);
        Ok(sensor)
    }

    /// Expire stale activations and return the current flags
    ///
    /// A flag activated at `t0` reads true for `now` in `[t0, t0 + expiry)`.
    pub fn snapshot(&mut self, now_ms: u64) -> SensorStatus {
        for sensor in Sensor::ALL {
            let slot = &mut self.slots[sensor.index()];
            if let (true, Some(last)) = (slot.active, slot.last_activation_ms) {
                if now_ms.saturating_sub(last) >= sensor.expiry_ms() {
                    slot.active = false;
                    debug!("Sensor {} expired", sensor);
                }
            }
        }

        SensorStatus {
            accelerator_active: self.slots[Sensor::Accelerator.index()].active,
            brake_active: self.slots[Sensor::Brake.index()].active,
            seatbelt_tension_spike: self.slots[Sensor::Seatbelt.index()].active,
            vehicle_in_motion: true,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
