//! Emergency contact notification sink

use std::sync::Mutex;

use dms::{AlertRecord, AlertSink, DeliveryError, DriverState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::manager::{AlertConfig, AlertManager, Severity};

/// Who a contact is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    Emergency,
    Family,
    Medical,
    Assistance,
}

/// Person or service notified on alerts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub kind: ContactKind,
}

impl EmergencyContact {
    pub fn new(name: &str, phone: &str, kind: ContactKind) -> Self {
        Self {
            name: name.to_string(),
            phone: phone.to_string(),
            kind,
        }
    }

    /// Whether this contact is notified for `status`
    pub fn wants(&self, status: DriverState) -> bool {
        match status {
            DriverState::HighRisk => true,
            DriverState::Drowsy => self.kind == ContactKind::Family,
            DriverState::Awake => false,
        }
    }
}

/// Message produced for one contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub alert_id: u64,
    pub contact: EmergencyContact,
    pub severity: Severity,
    pub message: String,
}

/// Alert sink that notifies emergency contacts
///
/// Notifications are logged and kept in an outbox; an SMS gateway would sit
/// behind this.
pub struct EmergencyNotifier {
    contacts: Vec<EmergencyContact>,
    manager: Mutex<AlertManager>,
    outbox: Mutex<Vec<Notification>>,
}

impl EmergencyNotifier {
    pub fn new(contacts: Vec<EmergencyContact>, config: AlertConfig) -> Self {
        info!("Emergency notifier with {} contacts", contacts.len());
        Self {
            contacts,
            manager: Mutex::new(AlertManager::new(config)),
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Default contact list
    pub fn default_contacts() -> Vec<EmergencyContact> {
        vec![
            EmergencyContact::new("Emergency Services", "911", ContactKind::Emergency),
            EmergencyContact::new("Family Member 1", "+1-555-0123", ContactKind::Family),
            EmergencyContact::new("Medical Contact", "+1-555-0124", ContactKind::Medical),
            EmergencyContact::new("Roadside Assistance", "+1-555-0125", ContactKind::Assistance),
        ]
    }

    pub fn contacts(&self) -> &[EmergencyContact] {
        &self.contacts
    }

    /// Notifications sent so far
    pub fn sent(&self) -> Vec<Notification> {
        self.outbox
            .lock()
            .map(|o| o.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    /// Start throttling over (on driver change); sent notifications are kept
    pub fn reset(&self) {
        self.manager
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn message(record: &AlertRecord) -> String {
        let what = match record.status {
            DriverState::HighRisk => "HIGH RISK: possible driver emergency",
            DriverState::Drowsy => "Driver drowsiness detected",
            DriverState::Awake => "Driver alert",
        };
        format!(
            "{} near {} ({:.4}, {:.4})",
            what, record.address, record.location.lat, record.location.lng
        )
    }
}

impl Default for EmergencyNotifier {
    fn default() -> Self {
        Self::new(Self::default_contacts(), AlertConfig::default())
    }
}

impl AlertSink for EmergencyNotifier {
    fn deliver(&self, record: &AlertRecord) -> Result<(), DeliveryError> {
        let mut manager = self
            .manager
            .lock()
            .map_err(|e| DeliveryError::Unavailable(format!("Lock error: {}", e)))?;

        if !manager.should_fire(record.status, record.timestamp_ms) {
            debug!("Notification for alert #{} suppressed", record.id);
            return Ok(());
        }

        let recipients: Vec<&EmergencyContact> =
            self.contacts.iter().filter(|c| c.wants(record.status)).collect();
        if recipients.is_empty() {
            return Err(DeliveryError::Rejected(format!(
                "no contacts configured for {}",
                record.status
            )));
        }

        let message = Self::message(record);
        let severity = Severity::from(record.status);
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|e| DeliveryError::Unavailable(format!("Lock error: {}", e)))?;

        for contact in recipients {
            info!("Notifying {} ({}): {}", contact.name, contact.phone, message);
            outbox.push(Notification {
                alert_id: record.id,
                contact: contact.clone(),
                severity,
                message: message.clone(),
            });
        }
        manager.record_fire(record.status, record.timestamp_ms);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::AlertRecorder;
    use std::sync::Arc;

    #[test]
    fn test_high_risk_notifies_everyone() {
        let notifier = EmergencyNotifier::default();
        let recorder = AlertRecorder::default();
        let record = recorder.record(DriverState::HighRisk, 0);

        notifier.deliver(&record).unwrap();
        let sent = notifier.sent();
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|n| n.severity == Severity::Critical));
        assert!(sent[0].message.contains("San Francisco, CA, USA"));
    }

    #[test]
    fn test_drowsy_notifies_family_only() {
        let notifier = EmergencyNotifier::default();
        let record = AlertRecorder::default().record(DriverState::Drowsy, 0);

        notifier.deliver(&record).unwrap();
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].contact.kind, ContactKind::Family);
    }

    #[test]
    fn test_cooldown_suppresses_repeats_but_history_keeps_them() {
        let notifier = Arc::new(EmergencyNotifier::default());
        let recorder = AlertRecorder::default().with_sink(notifier.clone());

        recorder.record(DriverState::Drowsy, 0);
        recorder.record(DriverState::Drowsy, 1_000);
        recorder.record(DriverState::Drowsy, 31_000);

        assert_eq!(recorder.len(), 3);
        assert_eq!(notifier.sent().len(), 2);
    }

    #[test]
    fn test_reset_lifts_cooldown_and_keeps_outbox() {
        let notifier = Arc::new(EmergencyNotifier::default());
        let recorder = AlertRecorder::default().with_sink(notifier.clone());

        recorder.record(DriverState::Drowsy, 0);
        recorder.record(DriverState::Drowsy, 1_000);
        assert_eq!(notifier.sent().len(), 1);

        notifier.reset();
        assert_eq!(notifier.sent().len(), 1);
        recorder.record(DriverState::Drowsy, 2_000);
        assert_eq!(notifier.sent().len(), 2);
    }

    #[test]
    fn test_missing_contacts_is_rejected() {
        let notifier = EmergencyNotifier::new(
            vec![EmergencyContact::new("Medical Contact", "+1-555-0124", ContactKind::Medical)],
            AlertConfig::unthrottled(),
        );
        let record = AlertRecorder::default().record(DriverState::Drowsy, 0);
        assert!(matches!(notifier.deliver(&record), Err(DeliveryError::Rejected(_))));
    }
}
