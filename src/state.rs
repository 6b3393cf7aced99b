use crate::{Config, Credential, StopFlag};
use chrono::{DateTime, Utc};
use std::sync::OnceLock;
use std::time::Instant;
use uuid::Uuid;

/// Process-wide state of one probing run.
///
/// Only the stop flag sees concurrent writers. The start time is written once
/// by the dispatch loop and the discovered credential once by the coordinator;
/// both are `OnceLock`s so the first writer wins.
#[derive(Debug)]
pub struct RunState {
    id: Uuid,
    target: String,
    username: String,
    stop: StopFlag,
    started: OnceLock<(Instant, DateTime<Utc>)>,
    found: OnceLock<Credential>,
}

impl RunState {
    pub fn new(config: &Config, stop: StopFlag) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: config.target_url.clone(),
            username: config.username.clone(),
            stop,
            started: OnceLock::new(),
            found: OnceLock::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.is_stopping()
    }

    /// Records the start of the run on the first call; later calls return the
    /// original instant.
    pub fn mark_started(&self) -> Instant {
        self.started.get_or_init(|| (Instant::now(), Utc::now())).0
    }

    pub fn started(&self) -> Option<Instant> {
        self.started.get().map(|(instant, _)| *instant)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started.get().map(|(_, at)| *at)
    }

    /// Stores the winning credential. Must happen before the stop flag is set
    /// so that any reader observing the flag also sees the credential.
    pub fn record_found(&self, credential: Credential) -> bool {
        self.found.set(credential).is_ok()
    }

    /// The discovered credential, readable only once the run is stopping.
    pub fn discovered(&self) -> Option<&Credential> {
        if self.is_stopping() {
            self.found.get()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> RunState {
        RunState::new(&Config::default(), StopFlag::new())
    }

    #[test]
    fn test_new_state() {
        let state = state();
        assert_eq!(state.username(), "admin");
        assert_eq!(state.target(), "http://192.168.1.1:8080/");
        assert!(!state.is_stopping());
        assert!(state.started().is_none());
        assert!(state.started_at().is_none());
    }

    #[test]
    fn test_start_is_written_once() {
        let state = state();
        let first = state.mark_started();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert_eq!(state.mark_started(), first);
        assert_eq!(state.started(), Some(first));
    }

    #[test]
    fn test_first_found_wins() {
        let state = state();
        assert!(state.record_found(Credential::new("admin", "first")));
        assert!(!state.record_found(Credential::new("admin", "second")));

        assert!(state.discovered().is_none());
        state.stop_flag().set_stopping();
        assert_eq!(state.discovered().map(|c| c.password.as_str()), Some("first"));
    }
}
