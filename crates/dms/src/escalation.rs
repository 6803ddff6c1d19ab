//! Escalation of sustained drowsiness to a high-risk alert

use tracing::warn;

use crate::state::DriverState;

/// Counts consecutive Drowsy decisions
///
/// Once the streak exceeds the limit a single escalation is raised. Both the
/// streak and the sent flag clear on the next Awake decision. HighRisk
/// decisions leave the streak as it is.
#[derive(Debug, Clone)]
pub struct DrowsinessEscalator {
    limit: u32,
    streak: u32,
    sent: bool,
}

impl DrowsinessEscalator {
    /// Escalate after more than `limit` consecutive Drowsy decisions; 0 disables
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            streak: 0,
            sent: false,
        }
    }

    /// Fold one decision in; true when an escalation should be raised now
    pub fn observe(&mut self, state: DriverState) -> bool {
        match state {
            DriverState::Awake => {
                self.streak = 0;
                self.sent = false;
                false
            }
            DriverState::HighRisk => false,
            DriverState::Drowsy => {
                self.streak = self.streak.saturating_add(1);
                if self.limit == 0 || self.sent || self.streak <= self.limit {
                    return false;
                }
                self.sent = true;
                warn!("Drowsy for {} consecutive decisions, escalating", self.streak);
                true
            }
        }
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn reset(&mut self) {
        self.streak = 0;
        self.sent = false;
    }
}
