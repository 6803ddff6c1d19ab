//! Alerting System
//!
//! Delivers recorded driver alerts to emergency contacts, with per-status
//! cooldown and hourly throttling of outbound notifications.

mod manager;
mod notifier;

pub use manager::{AlertConfig, AlertManager, Severity};
pub use notifier::{ContactKind, EmergencyContact, EmergencyNotifier, Notification};
