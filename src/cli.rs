use crate::{
    format_duration, Config, ConsoleProgress, HttpProber, LogProgress, ProbeRunner,
    ProgressSink, RunOutcome, RunSummary, StopFlag,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{info, warn};

/// Process exit status for a completed run.
pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "authprobe")]
#[command(about = "Concurrent HTTP Basic-Auth credential tester for authorized assessments")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'n',
        long,
        global = true,
        help = "Maximum number of probes in flight"
    )]
    pub max_in_flight: Option<usize>,

    #[arg(short, long, global = true, help = "Username to try")]
    pub user: Option<String>,

    #[arg(long, global = true, help = "Target URL")]
    pub url: Option<String>,

    #[arg(long, global = true, help = "Per-request timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, global = true, help = "Accept invalid TLS certificates")]
    pub insecure: bool,

    #[arg(long, global = true, help = "Custom User-Agent header")]
    pub user_agent: Option<String>,

    #[arg(long, global = true, help = "Serve Prometheus metrics on this address")]
    pub metrics_addr: Option<SocketAddr>,

    #[arg(long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Try every candidate password read from a wordlist or stdin
    Run {
        #[arg(short, long, help = "Wordlist file (one password per line, default: stdin)")]
        wordlist: Option<PathBuf>,

        #[arg(long, help = "Print the run summary as JSON")]
        json: bool,
    },

    /// Validate a configuration file
    Validate {
        #[arg(value_name = "FILE", help = "Configuration file to validate")]
        file: PathBuf,
    },
}

pub struct CliRunner {
    pub config: Config,
    pub stop: StopFlag,
}

impl CliRunner {
    pub fn new(config: Config, stop: StopFlag) -> Self {
        Self { config, stop }
    }

    /// Runs the command and returns the process exit status.
    pub async fn run(&self, command: Commands) -> Result<i32> {
        match command {
            Commands::Run { wordlist, json } => self.run_probe(wordlist, json).await,
            Commands::Validate { file } => self.validate_config(file).await,
        }
    }

    pub async fn run_probe(&self, wordlist: Option<PathBuf>, json: bool) -> Result<i32> {
        let input = open_wordlist(wordlist.as_ref()).await?;
        let stdout = Arc::new(Mutex::new(std::io::stdout()));
        self.probe_input(input, json, stdout).await
    }

    /// Runs one search over `input` and writes the result to `out`. With
    /// `json` the summary document is the only thing written there; progress
    /// goes to the log instead.
    pub async fn probe_input<R, W>(&self, input: R, json: bool, out: Arc<Mutex<W>>) -> Result<i32>
    where
        R: AsyncBufRead + Unpin,
        W: Write + Send + 'static,
    {
        let prober = HttpProber::new(&self.config).context("failed to build HTTP client")?;
        let progress: Arc<dyn ProgressSink> = if json {
            Arc::new(LogProgress)
        } else {
            Arc::new(ConsoleProgress::new(out.clone()))
        };
        let runner = ProbeRunner::new(self.config.clone(), prober)
            .with_progress(progress)
            .with_stop_flag(self.stop.clone());

        let summary = runner.run(input).await.context("probe run failed")?;

        let mut out = out
            .lock()
            .map_err(|_| anyhow::anyhow!("output stream lock poisoned"))?;
        if json {
            writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
        } else {
            print_summary(&summary, &mut *out)?;
        }
        out.flush()?;

        Ok(exit_code(&summary))
    }

    pub async fn validate_config(&self, config_path: PathBuf) -> Result<i32> {
        println!("Validating configuration: {}", config_path.display());

        let content = fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config = Config::from_json(&content)?;
        config.validate()?;

        println!("Configuration is valid:");
        println!("  Target URL: {}", config.target_url);
        println!("  Username: {}", config.username);
        println!("  Max in flight: {}", config.max_in_flight);
        println!("  Request timeout: {:?}", config.request_timeout);
        println!("  Report every: {} attempts", config.report_every);
        println!("  Accept invalid certs: {}", config.accept_invalid_certs);

        Ok(EXIT_OK)
    }
}

async fn open_wordlist(path: Option<&PathBuf>) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match path {
        Some(path) => {
            let file = fs::File::open(path)
                .await
                .with_context(|| format!("failed to open wordlist {}", path.display()))?;
            info!("Reading candidates from {}", path.display());
            Ok(Box::new(BufReader::new(file)))
        }
        None => {
            info!("Reading candidates from stdin");
            Ok(Box::new(BufReader::new(tokio::io::stdin())))
        }
    }
}

fn print_summary<W: Write>(summary: &RunSummary, out: &mut W) -> std::io::Result<()> {
    let elapsed = format_duration(Duration::from_secs_f64(summary.elapsed_secs));
    match &summary.outcome {
        RunOutcome::Found { credential } => {
            writeln!(out, "password is: '{}'", credential.password)?;
            info!("Found after {} attempts in {}", summary.completed, elapsed);
        }
        RunOutcome::Exhausted => {
            info!(
                "No credentials found after {} attempts in {}",
                summary.completed, elapsed
            );
        }
        RunOutcome::Aborted { error } => {
            warn!(
                "Run aborted after {} attempts in {}: {}",
                summary.completed, elapsed, error
            );
        }
        RunOutcome::Interrupted => {
            warn!("Run interrupted after {} attempts in {}", summary.completed, elapsed);
        }
    }
    Ok(())
}

pub fn exit_code(summary: &RunSummary) -> i32 {
    match summary.outcome {
        RunOutcome::Found { .. } | RunOutcome::Exhausted => EXIT_OK,
        RunOutcome::Aborted { .. } => EXIT_FAILURE,
        RunOutcome::Interrupted => EXIT_INTERRUPTED,
    }
}

/// Layers a JSON config file (if any) and command-line overrides over the
/// defaults, then validates the result.
pub async fn load_config(args: &Cli) -> Result<Config> {
    let config = match &args.config {
        Some(path) => {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read config {}", path.display()))?;
            Config::from_json(&content)?
        }
        None => Config::default(),
    };

    let config = apply_overrides(config, args);
    config.validate()?;

    info!("Configuration loaded successfully");
    info!("Target: {} as '{}'", config.target_url, config.username);
    info!("Max in flight: {}", config.max_in_flight);
    info!("Request timeout: {:?}", config.request_timeout);

    Ok(config)
}

pub fn apply_overrides(mut config: Config, args: &Cli) -> Config {
    if let Some(max_in_flight) = args.max_in_flight {
        config.max_in_flight = max_in_flight;
    }
    if let Some(user) = &args.user {
        config.username = user.clone();
    }
    if let Some(url) = &args.url {
        config.target_url = url.clone();
    }
    if let Some(timeout) = args.timeout {
        config.request_timeout = Duration::from_secs(timeout);
    }
    if args.insecure {
        config.accept_invalid_certs = true;
    }
    if let Some(user_agent) = &args.user_agent {
        config.user_agent = Some(user_agent.clone());
    }
    config
}

pub fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Credential, ProbeError};
    use uuid::Uuid;

    fn summary(outcome: RunOutcome) -> RunSummary {
        RunSummary {
            run_id: Uuid::new_v4(),
            outcome,
            dispatched: 3,
            completed: 3,
            lines_skipped: 1,
            failures: 2,
            transient_errors: 0,
            peak_in_flight: 2,
            elapsed_secs: 0.5,
            started_at: None,
        }
    }

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "authprobe",
            "-n",
            "4",
            "--user",
            "root",
            "--url",
            "http://10.0.0.1/",
            "--timeout",
            "3",
            "--insecure",
            "run",
            "--wordlist",
            "words.txt",
        ])
        .unwrap();

        let config = apply_overrides(Config::default(), &cli);
        assert_eq!(config.max_in_flight, 4);
        assert_eq!(config.username, "root");
        assert_eq!(config.target_url, "http://10.0.0.1/");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert!(config.accept_invalid_certs);
        assert!(matches!(
            cli.command,
            Commands::Run { wordlist: Some(_), json: false }
        ));
    }

    #[test]
    fn test_defaults_without_overrides() {
        let cli = Cli::try_parse_from(["authprobe", "run"]).unwrap();
        let config = apply_overrides(Config::default(), &cli);
        assert_eq!(config.username, "admin");
        assert_eq!(config.target_url, "http://192.168.1.1:8080/");
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["authprobe", "run", "--json", "-u", "operator"]).unwrap();
        assert_eq!(cli.user.as_deref(), Some("operator"));
        assert!(matches!(cli.command, Commands::Run { json: true, .. }));
    }

    #[test]
    fn test_validate_requires_file() {
        assert!(Cli::try_parse_from(["authprobe", "validate"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        let found = summary(RunOutcome::Found {
            credential: Credential::new("admin", "rightpass"),
        });
        assert_eq!(exit_code(&found), EXIT_OK);
        assert_eq!(exit_code(&summary(RunOutcome::Exhausted)), EXIT_OK);
        assert_eq!(
            exit_code(&summary(RunOutcome::Aborted {
                error: ProbeError::InvalidRequest("empty url".into())
            })),
            EXIT_FAILURE
        );
        assert_eq!(exit_code(&summary(RunOutcome::Interrupted)), EXIT_INTERRUPTED);
    }

    #[test]
    fn test_summary_json_shape() {
        let found = summary(RunOutcome::Found {
            credential: Credential::new("admin", "rightpass"),
        });
        let json = serde_json::to_value(&found).unwrap();
        assert_eq!(json["outcome"]["status"], "found");
        assert_eq!(json["outcome"]["credential"]["password"], "rightpass");
        assert_eq!(json["completed"], 3);
    }

    fn closed_port_config() -> Config {
        // Bind then drop so nothing listens; every attempt is refused quickly.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        Config {
            max_in_flight: 4,
            target_url: format!("http://{addr}/"),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    fn candidates(count: usize) -> Vec<u8> {
        (0..count).map(|i| format!("guess{i}\n")).collect::<String>().into_bytes()
    }

    #[tokio::test]
    async fn test_json_output_is_a_single_document() {
        let runner = CliRunner::new(closed_port_config(), StopFlag::new());
        let out = Arc::new(Mutex::new(Vec::new()));

        let input = candidates(25);
        let code = runner
            .probe_input(input.as_slice(), true, out.clone())
            .await
            .unwrap();
        assert_eq!(code, EXIT_OK);

        let written = out.lock().unwrap().clone();
        let json: serde_json::Value = serde_json::from_slice(&written).unwrap();
        assert_eq!(json["outcome"]["status"], "exhausted");
        assert_eq!(json["completed"], 25);
        assert_eq!(json["transient_errors"], 25);
    }

    #[tokio::test]
    async fn test_plain_output_carries_progress_lines() {
        let runner = CliRunner::new(closed_port_config(), StopFlag::new());
        let out = Arc::new(Mutex::new(Vec::new()));

        let input = candidates(25);
        runner
            .probe_input(input.as_slice(), false, out.clone())
            .await
            .unwrap();

        let written = String::from_utf8(out.lock().unwrap().clone()).unwrap();
        assert!(written.starts_with("Processed 20 password attempts in "), "{written}");
        assert_eq!(written.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_validate_config_file() {
        let path = std::env::temp_dir().join(format!("authprobe-{}.json", Uuid::new_v4()));
        tokio::fs::write(&path, r#"{ "target_url": "http://10.1.1.1/", "max_in_flight": 2 }"#)
            .await
            .unwrap();

        let runner = CliRunner::new(Config::default(), StopFlag::new());
        let code = runner.validate_config(path.clone()).await.unwrap();
        assert_eq!(code, EXIT_OK);

        tokio::fs::write(&path, r#"{ "max_in_flight": 0 }"#).await.unwrap();
        assert!(runner.validate_config(path.clone()).await.is_err());

        let _ = tokio::fs::remove_file(&path).await;
    }
}
