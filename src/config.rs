//! Configuration management with serde serialization/deserialization
//!
//! Settings come from three layers: built-in defaults, an optional JSON file,
//! and command-line overrides applied by the CLI.

use crate::{validate_url, ProbeError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Username tried when none is configured.
pub const DEFAULT_USERNAME: &str = "admin";

/// Placeholder private-network target.
pub const DEFAULT_TARGET_URL: &str = "http://192.168.1.1:8080/";

/// A throughput line is printed after this many completed attempts.
pub const DEFAULT_REPORT_EVERY: u64 = 20;

/// In-flight probes allowed per available CPU.
pub const IN_FLIGHT_PER_CPU: usize = 20;

/// Main configuration structure for a probing run
///
/// # Examples
///
/// ```rust
/// use authprobe::Config;
///
/// let config = Config {
///     max_in_flight: 4,
///     target_url: "http://10.0.0.1/".to_string(),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Admission limit: probes allowed in flight at once (default: 20 per CPU)
    pub max_in_flight: usize,

    /// Fixed username paired with every candidate password (default: "admin")
    pub username: String,

    /// URL every probe is sent to
    pub target_url: String,

    /// Timeout for a single probe request (default: 10 seconds)
    pub request_timeout: Duration,

    /// Completed attempts between throughput reports (default: 20)
    pub report_every: u64,

    /// Accept self-signed or otherwise invalid TLS certificates (default: false)
    pub accept_invalid_certs: bool,

    /// Custom User-Agent header (default: reqwest's)
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            username: DEFAULT_USERNAME.to_string(),
            target_url: DEFAULT_TARGET_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            report_every: DEFAULT_REPORT_EVERY,
            accept_invalid_certs: false,
            user_agent: None,
        }
    }
}

impl Config {
    pub fn from_json(content: &str) -> Result<Self, ProbeError> {
        let config: Config = serde_json::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.max_in_flight == 0 {
            return Err(ProbeError::Configuration(
                "max_in_flight must be greater than 0".to_string(),
            ));
        }

        if self.report_every == 0 {
            return Err(ProbeError::Configuration(
                "report_every must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ProbeError::Configuration(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        validate_url(&self.target_url).map_err(|e| {
            ProbeError::Configuration(format!("invalid target URL '{}': {}", self.target_url, e))
        })?;

        Ok(())
    }
}

pub fn default_max_in_flight() -> usize {
    num_cpus::get().max(1) * IN_FLIGHT_PER_CPU
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_in_flight, num_cpus::get() * IN_FLIGHT_PER_CPU);
        assert_eq!(config.username, "admin");
        assert_eq!(config.target_url, "http://192.168.1.1:8080/");
        assert_eq!(config.report_every, 20);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(!config.accept_invalid_certs);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{ "username": "root", "max_in_flight": 3 }"#).unwrap();
        assert_eq!(config.username, "root");
        assert_eq!(config.max_in_flight, 3);
        assert_eq!(config.target_url, DEFAULT_TARGET_URL);
        assert_eq!(config.report_every, DEFAULT_REPORT_EVERY);
    }

    #[test]
    fn test_malformed_json() {
        let err = Config::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ProbeError::Serialization(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_limit = Config {
            max_in_flight: 0,
            ..Default::default()
        };
        assert!(zero_limit.validate().is_err());

        let zero_report = Config {
            report_every: 0,
            ..Default::default()
        };
        assert!(zero_report.validate().is_err());

        let zero_timeout = Config {
            request_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_timeout.validate().is_err());

        let bad_url = Config {
            target_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            bad_url.validate(),
            Err(ProbeError::Configuration(_))
        ));

        let ftp = Config {
            target_url: "ftp://192.168.1.1/".to_string(),
            ..Default::default()
        };
        assert!(ftp.validate().is_err());
    }
}
