use serde::Serialize;
use thiserror::Error;
use tokio::sync::AcquireError;

#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ProbeError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Semaphore acquire error: {0}")]
    Semaphore(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProbeError {
    /// Errors that mean the run itself is misconfigured and no further
    /// candidate can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProbeError::InvalidRequest(_) | ProbeError::Configuration(_)
        )
    }

    /// Errors that leave a single guess inconclusive; the run carries on.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProbeError::Network(_) | ProbeError::Connect(_) | ProbeError::Timeout(_)
        )
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ProbeError::Timeout(_) => ErrorSeverity::Low,
            ProbeError::Network(_) | ProbeError::Connect(_) => ErrorSeverity::Medium,
            ProbeError::InvalidRequest(_) | ProbeError::Configuration(_) => ErrorSeverity::High,
            _ => ErrorSeverity::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ProbeError::InvalidRequest(err.to_string())
        } else if err.is_timeout() {
            ProbeError::Timeout(err.to_string())
        } else if err.is_connect() {
            ProbeError::Connect(err.to_string())
        } else {
            ProbeError::Network(err.to_string())
        }
    }
}

impl From<AcquireError> for ProbeError {
    fn from(err: AcquireError) -> Self {
        ProbeError::Semaphore(err.to_string())
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        ProbeError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(err: serde_json::Error) -> Self {
        ProbeError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_and_transient_are_disjoint() {
        let errors = [
            ProbeError::InvalidRequest("x".into()),
            ProbeError::Network("x".into()),
            ProbeError::Connect("x".into()),
            ProbeError::Timeout("x".into()),
            ProbeError::Configuration("x".into()),
            ProbeError::Io("x".into()),
        ];
        for err in &errors {
            assert!(!(err.is_fatal() && err.is_transient()), "{err}");
        }
    }

    #[test]
    fn test_classification() {
        assert!(ProbeError::InvalidRequest("bad url".into()).is_fatal());
        assert!(ProbeError::Configuration("zero limit".into()).is_fatal());
        assert!(ProbeError::Connect("refused".into()).is_transient());
        assert!(ProbeError::Timeout("10s".into()).is_transient());
        assert!(!ProbeError::Io("eof".into()).is_transient());
    }

    #[test]
    fn test_severity() {
        assert_eq!(ProbeError::Timeout("t".into()).severity(), ErrorSeverity::Low);
        assert_eq!(ProbeError::Connect("c".into()).severity(), ErrorSeverity::Medium);
        assert_eq!(
            ProbeError::InvalidRequest("r".into()).severity(),
            ErrorSeverity::High
        );
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let json = serde_json::to_value(ProbeError::Connect("refused".into())).unwrap();
        assert_eq!(json["kind"], "connect");
        assert_eq!(json["message"], "refused");
    }
}
