//! portfwd binary entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use portfwd::config::{BasicValidator, ConfigLoader, LoadedConfig, PortConflictValidator};
use portfwd::forwarder::ForwardingSupervisor;

/// portfwd - TCP port forwarder.
#[derive(Debug, Parser)]
#[command(name = "portfwd", version, about = "portfwd - TCP port forwarder")]
struct Args {
    /// Configuration file (TOML, or JSON with a .json extension)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short = 'D', long = "debug")]
    debug: bool,

    /// Validate the configuration, print the rules and exit
    #[arg(long = "check")]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let LoadedConfig { config, warnings } = ConfigLoader::new()
        .with_validator(BasicValidator::new())
        .with_validator(PortConflictValidator::new())
        .load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let rules = config.rules()?;

    if args.check {
        for warning in &warnings {
            eprintln!("warning: {warning}");
        }
        println!("{}: OK, {} forward(s)", args.config.display(), rules.len());
        for rule in &rules {
            println!("  {rule}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    // Validation ran before a subscriber existed; report its warnings now.
    portfwd::logging::init(&config.logging, args.debug).context("initializing logging")?;
    for warning in &warnings {
        warn!(field = %warning.field, "{}", warning.message);
    }
    info!(version = portfwd::VERSION, config = %args.config.display(), "portfwd starting");

    let mut supervisor =
        ForwardingSupervisor::new(rules, config.forwarding.session_settings());
    let reports = supervisor.start().await?;

    if !reports.iter().any(|r| r.is_bound()) {
        error!("No forwarder could be started");
        return Ok(ExitCode::FAILURE);
    }

    let interrupted = tokio::select! {
        () = supervisor.wait() => false,
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for Ctrl-C")?;
            true
        }
    };

    if interrupted {
        info!("Interrupted, shutting down");
        supervisor.shutdown().await;
    } else {
        info!("All forwarders stopped");
    }

    let stats = supervisor.stats();
    info!(
        sessions = stats.sessions_total,
        bytes_to_server = stats.bytes_client_to_server,
        bytes_to_client = stats.bytes_server_to_client,
        "portfwd stopped"
    );
    Ok(ExitCode::SUCCESS)
}
