//! # authprobe
//!
//! Concurrent HTTP Basic-Authentication credential testing against a single
//! target, for use on systems you are authorized to assess. Candidate
//! passwords are read line by line, each is tried with a fixed username, and
//! the run stops as soon as the server accepts one.
//!
//! ## Architecture
//!
//! | Component | Type | Role |
//! |-----------|------|------|
//! | Guarded flag | [`StopFlag`] | Write-once "stopping" state behind an `RwLock` |
//! | Admission gate | [`AdmissionGate`] | Semaphore bounding in-flight probes |
//! | Probe executor | [`Prober`], [`HttpProber`] | One GET with Basic credentials per candidate |
//! | Completion coordinator | [`Coordinator`] | Single task counting completions and releasing slots |
//! | Dispatch loop | [`ProbeRunner`] | Reads candidates, acquires slots, spawns probes |
//!
//! Every probe task sends exactly one [`Completion`] carrying its admission
//! permit. The coordinator releases the permit after accounting for it; once
//! the coordinator has stopped, the send fails and the permit is dropped with
//! the rejected message, so slots are never leaked.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use authprobe::{Config, HttpProber, ProbeRunner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         target_url: "http://192.168.1.1:8080/".to_string(),
//!         max_in_flight: 32,
//!         ..Default::default()
//!     };
//!     let prober = HttpProber::new(&config)?;
//!     let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//!
//!     let summary = ProbeRunner::new(config, prober).run(stdin).await?;
//!     println!("{:?}", summary.outcome);
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! authprobe --url http://192.168.1.1:8080/ --user admin run < wordlist.txt
//! authprobe -n 8 run --wordlist wordlist.txt --json
//! ```

/// Configuration and settings for a probing run
pub mod config;

/// Error types and error classification
pub mod error;

/// Write-once stop flag
pub mod flag;

/// Shared state of a run
pub mod state;

/// Admission gate bounding concurrent probes
pub mod gate;

/// Credential probes against the target
pub mod probe;

/// Completion coordinator and progress reporting
pub mod coordinator;

/// Dispatch loop and run summary
pub mod runner;

/// Command-line interface implementation
pub mod cli;

/// Metrics published through the `metrics` facade
pub mod metrics;

/// Utility functions and helpers
pub mod utils;


pub use cli::*;
pub use config::*;
pub use coordinator::*;
pub use error::*;
pub use flag::*;
pub use gate::*;
pub use probe::*;
pub use runner::*;
pub use state::*;
pub use utils::*;
