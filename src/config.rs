//! Pipeline configuration
//!
//! Every constant of the drop-detection and dispatch pipeline lives here.
//! The manual and drop-triggered paths deliberately use different recording
//! holds, and dispatch eligibility uses a looser e-mail check than the
//! foreground coverage warning; both pairs are kept as separate settings.

use crate::contacts::EmailPolicy;
use crate::error::SosError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Magnitude delta (g-equivalent) above which a drop is detected
pub const DEFAULT_DROP_THRESHOLD: f64 = 2.5;

/// Accelerometer update interval
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 500;

/// Cancellable countdown before a detected drop fires an SOS
pub const DEFAULT_CONFIRMATION_WINDOW_SECS: u64 = 5;

/// Audio hold for a manually triggered SOS
pub const DEFAULT_MANUAL_RECORDING_SECS: u64 = 15;

/// Audio hold for a drop-triggered SOS
pub const DEFAULT_DROP_RECORDING_SECS: u64 = 10;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/api";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Environment variable overriding the backend base URL
pub const API_URL_ENV: &str = "GUARDIAN_API_URL";

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL, without trailing slash (e.g. `http://10.0.0.2:5000/api`)
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Join an endpoint path onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SosConfig {
    pub drop_threshold: f64,
    pub sample_interval_ms: u64,
    pub confirmation_window_secs: u64,
    pub manual_recording_secs: u64,
    pub drop_recording_secs: u64,
    /// Check deciding which contacts are sent for e-mail notification
    pub dispatch_email_policy: EmailPolicy,
    /// Check behind the foreground "no valid e-mail" warning
    pub verification_email_policy: EmailPolicy,
    pub backend: BackendConfig,
}

impl Default for SosConfig {
    fn default() -> Self {
        Self {
            drop_threshold: DEFAULT_DROP_THRESHOLD,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            confirmation_window_secs: DEFAULT_CONFIRMATION_WINDOW_SECS,
            manual_recording_secs: DEFAULT_MANUAL_RECORDING_SECS,
            drop_recording_secs: DEFAULT_DROP_RECORDING_SECS,
            dispatch_email_policy: EmailPolicy::ContainsAt,
            verification_email_policy: EmailPolicy::ContainsAtAndDot,
            backend: BackendConfig::default(),
        }
    }
}

impl SosConfig {
    /// Parse a JSON configuration; absent fields take their defaults
    ///
    /// The environment is not consulted. Use [`SosConfig::from_file`], or
    /// call [`SosConfig::apply_env`] afterwards, to honour `GUARDIAN_API_URL`.
    pub fn from_json(json: &str) -> Result<Self, SosError> {
        let config: SosConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self, SosError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_json(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Apply `GUARDIAN_API_URL` if it is set and non-empty
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.backend.base_url = url.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<(), SosError> {
        if !(self.drop_threshold.is_finite() && self.drop_threshold > 0.0) {
            return Err(SosError::Config(format!(
                "drop_threshold must be positive, got {}",
                self.drop_threshold
            )));
        }
        let durations = [
            ("sample_interval_ms", self.sample_interval_ms),
            ("confirmation_window_secs", self.confirmation_window_secs),
            ("manual_recording_secs", self.manual_recording_secs),
            ("drop_recording_secs", self.drop_recording_secs),
        ];
        for (name, value) in durations {
            if value == 0 {
                return Err(SosError::Config(format!("{} must be greater than zero", name)));
            }
        }
        if self.backend.base_url.trim().is_empty() {
            return Err(SosError::Config("backend.base_url is empty".to_string()));
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn confirmation_window(&self) -> Duration {
        Duration::from_secs(self.confirmation_window_secs)
    }

    /// Recording hold for the given path; manual and drop differ on purpose
    pub fn recording_hold(&self, alert_type: crate::types::AlertType) -> Duration {
        match alert_type {
            crate::types::AlertType::Manual => Duration::from_secs(self.manual_recording_secs),
            crate::types::AlertType::Drop => Duration::from_secs(self.drop_recording_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlertType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_source_constants() {
        let config = SosConfig::default();
        assert_eq!(config.drop_threshold, 2.5);
        assert_eq!(config.sample_interval(), Duration::from_millis(500));
        assert_eq!(config.confirmation_window(), Duration::from_secs(5));
        assert_eq!(config.recording_hold(AlertType::Manual), Duration::from_secs(15));
        assert_eq!(config.recording_hold(AlertType::Drop), Duration::from_secs(10));
        assert_eq!(config.dispatch_email_policy, EmailPolicy::ContainsAt);
        assert_eq!(config.verification_email_policy, EmailPolicy::ContainsAtAndDot);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SosConfig::from_json(
            r#"{"drop_threshold": 3.0, "backend": {"base_url": "http://10.0.0.2:5000/api"}}"#,
        )
        .unwrap();
        assert_eq!(config.drop_threshold, 3.0);
        assert_eq!(config.drop_recording_secs, 10);
        assert_eq!(config.backend.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.backend.endpoint("/sos"), "http://10.0.0.2:5000/api/sos");
    }

    #[test]
    fn test_api_url_override_applies_to_files_only() {
        let json = r#"{"backend": {"base_url": "http://10.0.0.2:5000/api"}}"#;
        let path =
            std::env::temp_dir().join(format!("guardian-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, json).unwrap();
        std::env::set_var(API_URL_ENV, " http://sos.example.com/api ");

        let parsed = SosConfig::from_json(json).unwrap();
        let loaded = SosConfig::from_file(&path);
        let mut applied = parsed.clone();
        applied.apply_env();
        std::env::remove_var(API_URL_ENV);
        let _ = std::fs::remove_file(&path);

        assert_eq!(parsed.backend.base_url, "http://10.0.0.2:5000/api");
        assert_eq!(loaded.unwrap().backend.base_url, "http://sos.example.com/api");
        assert_eq!(applied.backend.base_url, "http://sos.example.com/api");
    }

    #[test]
    fn test_policy_names_in_json() {
        let config = SosConfig::from_json(r#"{"dispatch_email_policy": "contains_at_and_dot"}"#)
            .unwrap();
        assert_eq!(config.dispatch_email_policy, EmailPolicy::ContainsAtAndDot);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            SosConfig::from_json(r#"{"drop_threshold": 0.0}"#),
            Err(SosError::Config(_))
        ));
        assert!(matches!(
            SosConfig::from_json(r#"{"confirmation_window_secs": 0}"#),
            Err(SosError::Config(_))
        ));
        assert!(matches!(
            SosConfig::from_json(r#"{"backend": {"base_url": " "}}"#),
            Err(SosError::Config(_))
        ));
        assert!(SosConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_endpoint_handles_trailing_slash() {
        let backend = BackendConfig {
            base_url: "http://host/api/".to_string(),
            ..BackendConfig::default()
        };
        assert_eq!(backend.endpoint("alerts/history"), "http://host/api/alerts/history");
    }
}
