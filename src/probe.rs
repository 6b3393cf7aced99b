//! Single credential checks against the target.
//!
//! A [`Prober`] turns one [`Credential`] into exactly one [`ProbeOutcome`].
//! [`HttpProber`] is the production implementation: an HTTP GET carrying
//! Basic credentials on a fresh connection.

use crate::{Config, ProbeError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION};
use reqwest::redirect::Policy;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Statuses below this are treated as accepted credentials.
pub const FAILURE_STATUS_FLOOR: u16 = 400;

/// Username/password pair tested by one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.username, self.password)
    }
}

#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    /// The server accepted the credentials.
    Success { status: u16 },
    /// The server rejected the credentials.
    Failure { status: u16 },
    /// The guess is inconclusive (timeout, refused connection, DNS).
    Transient(ProbeError),
    /// The run is misconfigured; no candidate can succeed.
    Fatal(ProbeError),
    /// The run was already stopping, so no request was made.
    Skipped,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success { .. })
    }

    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            ProbeOutcome::Success { .. } => "success",
            ProbeOutcome::Failure { .. } => "failure",
            ProbeOutcome::Transient(_) => "transient_error",
            ProbeOutcome::Fatal(_) => "fatal_error",
            ProbeOutcome::Skipped => "skipped",
        }
    }
}

pub fn classify_status(status: u16) -> ProbeOutcome {
    if status < FAILURE_STATUS_FLOOR {
        ProbeOutcome::Success { status }
    } else {
        ProbeOutcome::Failure { status }
    }
}

/// Maps a transport or build error onto an outcome. Only configuration
/// errors end the run; anything else leaves this one guess inconclusive.
pub fn classify_error(err: ProbeError) -> ProbeOutcome {
    if err.is_fatal() {
        return ProbeOutcome::Fatal(err);
    }
    if !err.is_transient() {
        warn!("Unexpected probe error, treating the guess as inconclusive: {}", err);
    }
    ProbeOutcome::Transient(err)
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, credential: &Credential) -> ProbeOutcome;
}

/// Issues `GET target` with an `Authorization: Basic` header.
///
/// Keep-alive is off: idle connections are never pooled and every request
/// asks the server to close, so each probe runs on its own connection.
/// Redirects are returned as-is rather than followed.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    target: String,
}

impl HttpProber {
    pub fn new(config: &Config) -> Result<Self, ProbeError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(0)
            .redirect(Policy::none())
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder
            .build()
            .map_err(|e| ProbeError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            target: config.target_url.clone(),
        })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, credential: &Credential) -> ProbeOutcome {
        let request = match self
            .client
            .get(self.target.as_str())
            .basic_auth(&credential.username, Some(&credential.password))
            .build()
        {
            Ok(request) => request,
            Err(e) => return ProbeOutcome::Fatal(ProbeError::InvalidRequest(e.to_string())),
        };

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => return classify_error(ProbeError::from(e)),
        };

        let status = response.status().as_u16();
        drop(response);

        debug!("Probe for user '{}' returned HTTP {}", credential.username, status);
        classify_status(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_boundaries() {
        assert!(classify_status(200).is_success());
        assert!(classify_status(204).is_success());
        assert!(classify_status(302).is_success());
        assert!(classify_status(399).is_success());
        assert!(matches!(classify_status(400), ProbeOutcome::Failure { status: 400 }));
        assert!(matches!(classify_status(401), ProbeOutcome::Failure { status: 401 }));
        assert!(matches!(classify_status(503), ProbeOutcome::Failure { status: 503 }));
    }

    #[test]
    fn test_classify_error() {
        assert!(matches!(
            classify_error(ProbeError::Connect("refused".into())),
            ProbeOutcome::Transient(_)
        ));
        assert!(matches!(
            classify_error(ProbeError::InvalidRequest("no host".into())),
            ProbeOutcome::Fatal(_)
        ));
        assert!(matches!(
            classify_error(ProbeError::Internal("odd".into())),
            ProbeOutcome::Transient(ProbeError::Internal(_))
        ));
    }

    #[test]
    fn test_credential_display() {
        assert_eq!(Credential::new("admin", "hunter2").to_string(), "admin:hunter2");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(ProbeOutcome::Success { status: 200 }.label(), "success");
        assert_eq!(ProbeOutcome::Skipped.label(), "skipped");
        assert_eq!(
            ProbeOutcome::Transient(ProbeError::Timeout("t".into())).label(),
            "transient_error"
        );
    }

    #[tokio::test]
    async fn test_unparseable_target_is_fatal() {
        let config = Config {
            target_url: String::new(),
            ..Default::default()
        };
        let prober = HttpProber::new(&config).unwrap();
        let outcome = prober.probe(&Credential::new("admin", "x")).await;
        assert!(matches!(outcome, ProbeOutcome::Fatal(ProbeError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_refused_connection_is_transient() {
        // Bind then drop to get a local port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = Config {
            target_url: format!("http://{addr}/"),
            request_timeout: std::time::Duration::from_secs(2),
            ..Default::default()
        };
        let prober = HttpProber::new(&config).unwrap();
        let outcome = prober.probe(&Credential::new("admin", "x")).await;
        assert!(matches!(outcome, ProbeOutcome::Transient(_)), "{outcome:?}");
    }
}
