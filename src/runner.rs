//! Dispatch loop: reads candidates, enforces admission and launches probes.

use crate::{
    candidate_from_line, decode_line, metrics, AdmissionGate, Completion, Config,
    ConsoleProgress, Coordinator, CoordinatorExit, CoordinatorReport, Credential, ProbeError,
    ProbeOutcome, Prober, ProgressSink, RunState, StopFlag,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

/// How a run ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Found { credential: Credential },
    Exhausted,
    Aborted { error: ProbeError },
    Interrupted,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub dispatched: u64,
    pub completed: u64,
    /// Comment and empty lines; never probed.
    pub lines_skipped: u64,
    pub failures: u64,
    pub transient_errors: u64,
    pub peak_in_flight: usize,
    pub elapsed_secs: f64,
    pub started_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn credential(&self) -> Option<&Credential> {
        match &self.outcome {
            RunOutcome::Found { credential } => Some(credential),
            _ => None,
        }
    }
}

/// Runs one credential search against a single target.
///
/// # Examples
///
/// ```rust,no_run
/// use authprobe::{Config, HttpProber, ProbeRunner};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let prober = HttpProber::new(&config)?;
///     let runner = ProbeRunner::new(config, prober);
///
///     let wordlist: &[u8] = b"# defaults\nadmin\npassword\n1234\n";
///     let summary = runner.run(wordlist).await?;
///     if let Some(credential) = summary.credential() {
///         println!("password is: '{}'", credential.password);
///     }
///     Ok(())
/// }
/// ```
pub struct ProbeRunner<P> {
    config: Config,
    prober: Arc<P>,
    progress: Arc<dyn ProgressSink>,
    stop: StopFlag,
}

impl<P: Prober + 'static> ProbeRunner<P> {
    pub fn new(config: Config, prober: P) -> Self {
        Self::with_shared_prober(config, Arc::new(prober))
    }

    pub fn with_shared_prober(config: Config, prober: Arc<P>) -> Self {
        Self {
            config,
            prober,
            progress: Arc::new(ConsoleProgress::stdout()),
            stop: StopFlag::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Uses an externally owned flag, letting the caller stop the run.
    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    pub async fn run<R>(&self, input: R) -> Result<RunSummary, ProbeError>
    where
        R: AsyncBufRead + Unpin,
    {
        let state = Arc::new(RunState::new(&self.config, self.stop.clone()));
        let span = info_span!("run", id = %state.id());
        self.dispatch(state, input).instrument(span).await
    }

    async fn dispatch<R>(&self, state: Arc<RunState>, mut input: R) -> Result<RunSummary, ProbeError>
    where
        R: AsyncBufRead + Unpin,
    {
        info!(
            "Probing {} as '{}' with up to {} requests in flight",
            state.target(),
            state.username(),
            self.config.max_in_flight
        );

        let gate = AdmissionGate::new(self.config.max_in_flight);
        let (tx, rx) = mpsc::channel(gate.capacity());
        let coordinator = Coordinator::new(
            state.clone(),
            gate.clone(),
            self.progress.clone(),
            self.config.report_every,
        );
        let mut coordinator: JoinHandle<CoordinatorReport> =
            tokio::spawn(coordinator.run(rx).in_current_span());

        let mut raw = Vec::new();
        let mut dispatched = 0u64;
        let mut lines_skipped = 0u64;
        let mut input_error = None;
        let mut early_exit = None;

        loop {
            raw.clear();
            let read = tokio::select! {
                biased;
                joined = &mut coordinator => {
                    early_exit = Some(joined);
                    break;
                }
                _ = state.stop_flag().stopped() => {
                    debug!("Stop requested while waiting for input");
                    break;
                }
                read = input.read_until(b'\n', &mut raw) => read,
            };

            match read {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to read candidate: {}", e);
                    state.stop_flag().set_stopping();
                    input_error = Some(ProbeError::from(e));
                    break;
                }
            }

            let line = decode_line(&raw);
            let Some(password) = candidate_from_line(&line) else {
                lines_skipped += 1;
                continue;
            };

            if state.is_stopping() {
                break;
            }

            state.mark_started();
            if gate.available() == 0 {
                trace!("Admission gate saturated, waiting for a slot");
            }
            let acquired = tokio::select! {
                biased;
                _ = state.stop_flag().stopped() => break,
                acquired = gate.acquire() => acquired,
            };
            let permit = match acquired {
                Ok(permit) => permit,
                Err(e) => {
                    debug!("Admission gate closed: {}", e);
                    break;
                }
            };

            // The coordinator may have stopped the run while we waited.
            if state.is_stopping() {
                permit.release();
                break;
            }

            dispatched += 1;
            metrics::set_in_flight(gate.in_flight());
            self.spawn_probe(
                Credential::new(state.username(), password),
                permit,
                state.clone(),
                tx.clone(),
            );
        }

        drop(tx);
        let joined = match early_exit {
            Some(joined) => joined,
            None => coordinator.await,
        };
        let report = joined.map_err(|e| ProbeError::Internal(format!("coordinator task: {e}")))?;

        if let Some(err) = input_error {
            return Err(err);
        }

        let outcome = match report.exit {
            // The join orders this read after the coordinator's writes.
            CoordinatorExit::Found => match state.discovered() {
                Some(credential) => RunOutcome::Found {
                    credential: credential.clone(),
                },
                None => {
                    return Err(ProbeError::Internal(
                        "run reported a success without a credential".to_string(),
                    ))
                }
            },
            CoordinatorExit::Aborted(error) => RunOutcome::Aborted { error },
            CoordinatorExit::Drained if state.is_stopping() => RunOutcome::Interrupted,
            CoordinatorExit::Drained => RunOutcome::Exhausted,
        };

        let summary = RunSummary {
            run_id: state.id(),
            outcome,
            dispatched,
            completed: report.completed,
            lines_skipped,
            failures: report.failures,
            transient_errors: report.transient_errors,
            peak_in_flight: gate.peak_in_flight(),
            elapsed_secs: state
                .started()
                .map(|started| started.elapsed().as_secs_f64())
                .unwrap_or_default(),
            started_at: state.started_at(),
        };

        info!(
            "Run finished: {} dispatched, {} completed, outcome {:?}",
            summary.dispatched, summary.completed, summary.outcome
        );
        Ok(summary)
    }

    fn spawn_probe(
        &self,
        credential: Credential,
        permit: crate::AdmissionPermit,
        state: Arc<RunState>,
        tx: mpsc::Sender<Completion>,
    ) {
        let prober = self.prober.clone();

        tokio::spawn(
            async move {
                let outcome = if state.is_stopping() {
                    ProbeOutcome::Skipped
                } else {
                    prober.probe(&credential).await
                };

                // A closed channel means the coordinator already stopped; the
                // rejected message drops here and its permit goes back to the gate.
                if let Err(rejected) = tx
                    .send(Completion {
                        credential,
                        outcome,
                        permit,
                    })
                    .await
                {
                    trace!(
                        "Discarding {} result after stop",
                        rejected.0.outcome.label()
                    );
                }
            }
            .in_current_span(),
        );
    }
}
