//! Alert history
//!
//! Alerts other users sent to this user, as returned by
//! `GET /alerts/history`, and their resolution state.

use crate::error::SubmitError;
use crate::types::AlertType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Resolved,
}

/// One received alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: u64,
    pub sos_id: u64,
    pub contact_name: String,
    #[serde(default)]
    pub contact_phone: Option<String>,
    pub sender_name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Server-formatted `YYYY-MM-DD HH:MM:SS`
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub status: AlertStatus,
}

impl AlertRecord {
    /// One-line description for list rendering
    pub fn describe(&self) -> String {
        let kind = match self.alert_type {
            AlertType::Drop => "automatic drop detection",
            AlertType::Manual => "SOS",
        };
        format!("{} sent an {} alert", self.sender_name, kind)
    }

    pub fn map_url(&self) -> String {
        format!(
            "https://www.google.com/maps?q={},{}",
            self.latitude, self.longitude
        )
    }

    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }
}

/// Counts shown above the history list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HistorySummary {
    pub active: usize,
    pub resolved: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertHistory {
    pub alerts: Vec<AlertRecord>,
}

impl AlertHistory {
    pub fn summary(&self) -> HistorySummary {
        self.alerts
            .iter()
            .fold(HistorySummary::default(), |mut acc, alert| {
                match alert.status {
                    AlertStatus::Active => acc.active += 1,
                    AlertStatus::Resolved => acc.resolved += 1,
                }
                acc
            })
    }

    /// Mark an alert resolved locally after the backend confirmed it
    pub fn mark_resolved(&mut self, alert_id: u64) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) if alert.is_active() => {
                alert.status = AlertStatus::Resolved;
                true
            }
            _ => false,
        }
    }

    pub fn active(&self) -> impl Iterator<Item = &AlertRecord> {
        self.alerts.iter().filter(|a| a.is_active())
    }
}

/// Raw `GET /alerts/history` reply
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HistoryResponse {
    pub success: bool,
    #[serde(default)]
    pub alerts: Vec<AlertRecord>,
    #[serde(default)]
    pub message: Option<String>,
}

impl HistoryResponse {
    pub(crate) fn into_history(self) -> Result<AlertHistory, SubmitError> {
        if !self.success {
            return Err(SubmitError::rejected(
                None,
                self.message
                    .unwrap_or_else(|| "Failed to load alert history".to_string()),
            ));
        }
        Ok(AlertHistory {
            alerts: self.alerts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_history_json() -> &'static str {
        r#"{
            "success": true,
            "alerts": [
                {
                    "id": 11, "sos_id": 4, "contact_name": "Ben", "contact_phone": "555-0101",
                    "sender_name": "Ana", "latitude": 51.5, "longitude": -0.12,
                    "created_at": "2024-01-15 14:00:00", "type": "drop", "status": "active"
                },
                {
                    "id": 12, "sos_id": 5, "contact_name": "Ben", "contact_phone": "555-0101",
                    "sender_name": "Cy", "latitude": 40.7, "longitude": -74.0,
                    "created_at": "2024-01-16 09:30:00", "type": "manual", "status": "resolved"
                }
            ]
        }"#
    }

    fn history() -> AlertHistory {
        let response: HistoryResponse = serde_json::from_str(sample_history_json()).unwrap();
        response.into_history().unwrap()
    }

    #[test]
    fn test_parse_and_summarize() {
        let history = history();
        assert_eq!(history.alerts.len(), 2);
        assert_eq!(
            history.summary(),
            HistorySummary {
                active: 1,
                resolved: 1
            }
        );
    }

    #[test]
    fn test_describe_by_type() {
        let history = history();
        assert_eq!(
            history.alerts[0].describe(),
            "Ana sent an automatic drop detection alert"
        );
        assert_eq!(history.alerts[1].describe(), "Cy sent an SOS alert");
        assert_eq!(
            history.alerts[0].map_url(),
            "https://www.google.com/maps?q=51.5,-0.12"
        );
    }

    #[test]
    fn test_mark_resolved_only_once() {
        let mut history = history();
        assert!(history.mark_resolved(11));
        assert!(!history.mark_resolved(11));
        assert!(!history.mark_resolved(99));
        assert_eq!(history.summary().resolved, 2);
        assert_eq!(history.active().count(), 0);
    }

    #[test]
    fn test_failed_reply_is_rejection() {
        let json = r#"{"success": false, "message": "User ID is required"}"#;
        let response: HistoryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response.into_history().unwrap_err(),
            SubmitError::rejected(None, "User ID is required")
        );
    }
}
