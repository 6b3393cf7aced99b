//! Serialized consumer of probe completions.
//!
//! The coordinator is the only writer of run statistics. It owns the counters,
//! releases admission slots, emits throughput reports and flips the stop flag
//! when a probe succeeds or the run turns out to be misconfigured.

use crate::{
    attempts_per_second, metrics, AdmissionGate, AdmissionPermit, Credential, ErrorSeverity,
    ProbeError, ProbeOutcome, RunState,
};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Sent by every probe task exactly once. Carries the task's admission permit,
/// which the coordinator releases after accounting for the outcome.
#[derive(Debug)]
pub struct Completion {
    pub credential: Credential,
    pub outcome: ProbeOutcome,
    pub permit: AdmissionPermit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputReport {
    pub completed: u64,
    pub elapsed: Duration,
    pub rate: f64,
}

impl ThroughputReport {
    pub fn new(completed: u64, elapsed: Duration) -> Self {
        Self {
            completed,
            elapsed,
            rate: attempts_per_second(completed, elapsed),
        }
    }
}

impl fmt::Display for ThroughputReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {} password attempts in {:.2} seconds, {:.2} req/sec",
            self.completed,
            self.elapsed.as_secs_f64(),
            self.rate
        )
    }
}

/// Receives periodic throughput reports.
pub trait ProgressSink: Send + Sync {
    fn report(&self, report: &ThroughputReport);
}

/// Writes one line per report, to stdout unless given another writer.
pub struct ConsoleProgress<W = io::Stdout> {
    out: Arc<Mutex<W>>,
}

impl ConsoleProgress {
    pub fn stdout() -> Self {
        Self::new(Arc::new(Mutex::new(io::stdout())))
    }
}

impl<W: Write + Send> ConsoleProgress<W> {
    /// Shares `out` with the caller, which may write its own lines to it.
    pub fn new(out: Arc<Mutex<W>>) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> ProgressSink for ConsoleProgress<W> {
    fn report(&self, report: &ThroughputReport) {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(out, "{report}").and_then(|_| out.flush()) {
            warn!("Failed to write progress: {}", e);
        }
    }
}

/// Sends reports to the log, keeping stdout free for machine-readable output.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, report: &ThroughputReport) {
        info!("{report}");
    }
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    reports: Mutex<Vec<ThroughputReport>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ThroughputReport> {
        match self.reports.lock() {
            Ok(reports) => reports.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, report: &ThroughputReport) {
        let mut reports = match self.reports.lock() {
            Ok(reports) => reports,
            Err(poisoned) => poisoned.into_inner(),
        };
        reports.push(*report);
    }
}

/// Why the coordinator loop ended.
#[derive(Debug, Clone)]
pub enum CoordinatorExit {
    /// A probe succeeded. The credential is in the run state; remaining
    /// completions are not consumed.
    Found,
    /// A probe hit a configuration error. That completion is counted.
    Aborted(ProbeError),
    /// Every sender hung up after its completion was counted.
    Drained,
}

#[derive(Debug, Clone)]
pub struct CoordinatorReport {
    pub exit: CoordinatorExit,
    pub completed: u64,
    pub failures: u64,
    pub transient_errors: u64,
    pub reports_emitted: u64,
}

pub struct Coordinator {
    state: Arc<RunState>,
    gate: AdmissionGate,
    progress: Arc<dyn ProgressSink>,
    report_every: u64,
    completed: u64,
    failures: u64,
    transient_errors: u64,
    reports_emitted: u64,
}

impl Coordinator {
    pub fn new(
        state: Arc<RunState>,
        gate: AdmissionGate,
        progress: Arc<dyn ProgressSink>,
        report_every: u64,
    ) -> Self {
        Self {
            state,
            gate,
            progress,
            report_every: report_every.max(1),
            completed: 0,
            failures: 0,
            transient_errors: 0,
            reports_emitted: 0,
        }
    }

    pub async fn run(mut self, mut completions: mpsc::Receiver<Completion>) -> CoordinatorReport {
        debug!("Coordinator started for run {}", self.state.id());

        while let Some(completion) = completions.recv().await {
            let Completion {
                credential,
                outcome,
                permit,
            } = completion;
            metrics::record_outcome(&outcome);

            match outcome {
                ProbeOutcome::Success { status } => {
                    info!("Credentials accepted (HTTP {}): {}", status, credential);
                    self.state.record_found(credential);
                    self.stop();
                    permit.release();
                    return self.finish(CoordinatorExit::Found);
                }
                ProbeOutcome::Fatal(err) => {
                    error!("Aborting run: {}", err);
                    self.completed += 1;
                    self.stop();
                    permit.release();
                    return self.finish(CoordinatorExit::Aborted(err));
                }
                ProbeOutcome::Failure { status } => {
                    self.failures += 1;
                    trace!("Rejected '{}' (HTTP {})", credential.password, status);
                }
                ProbeOutcome::Transient(err) => {
                    self.transient_errors += 1;
                    match err.severity() {
                        ErrorSeverity::Low => debug!("Probe inconclusive, carrying on: {}", err),
                        _ => warn!("Probe inconclusive, carrying on: {}", err),
                    }
                }
                ProbeOutcome::Skipped => {
                    trace!("Skipped '{}' after stop", credential.password);
                }
            }

            self.completed += 1;
            if self.completed % self.report_every == 0 {
                self.emit_report();
            }

            permit.release();
            metrics::set_in_flight(self.gate.in_flight());
        }

        self.finish(CoordinatorExit::Drained)
    }

    /// Sets the stop flag and wakes a dispatcher blocked on the gate.
    fn stop(&self) {
        if self.state.stop_flag().set_stopping() {
            debug!("Stop flag set by coordinator");
        }
        self.gate.close();
    }

    fn emit_report(&mut self) {
        let elapsed = self
            .state
            .started()
            .map(|started| started.elapsed())
            .unwrap_or_default();
        let report = ThroughputReport::new(self.completed, elapsed);
        metrics::set_rate(report.rate);
        self.progress.report(&report);
        self.reports_emitted += 1;
    }

    fn finish(self, exit: CoordinatorExit) -> CoordinatorReport {
        debug!(
            "Coordinator finished after {} completions: {:?}",
            self.completed, exit
        );
        CoordinatorReport {
            exit,
            completed: self.completed,
            failures: self.failures,
            transient_errors: self.transient_errors,
            reports_emitted: self.reports_emitted,
        }
    }
}
