use anyhow::Result;
use authprobe::{load_config, metrics, setup_logging, Cli, CliRunner, StopFlag, EXIT_INTERRUPTED};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    setup_logging(args.verbose)?;

    info!("Starting authprobe v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_config(&args).await {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    if let Some(addr) = args.metrics_addr {
        metrics::install_prometheus(addr)?;
    }

    let stop = StopFlag::new();
    let cli_runner = CliRunner::new(config, stop.clone());

    let result = tokio::select! {
        result = cli_runner.run(args.command) => result,
        _ = shutdown_signal() => {
            stop.set_stopping();
            warn!("Received shutdown signal, stopping");
            Ok(EXIT_INTERRUPTED)
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Application error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn shutdown_signal() {
    let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
    }
}
