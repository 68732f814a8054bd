use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{stdin, BufReader, Stdin};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use readiness_check::config::{config_path, load_config, CONFIG_DIR_ENV};
use readiness_check::orchestrator::{Orchestrator, PhaseGate};
use readiness_check::report::write_report_json;

/// readiness-check — open local TCP/UDP listeners, probe remote ports, report what got through.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "readiness-check",
    version,
    about = "Open local TCP/UDP listeners, probe remote ports, report what got through.",
    long_about = None
)]
struct Cli {
    /// Directory containing config.json. Defaults to $IAASTESTCONFIGDIR, then the current directory.
    #[arg(long = "config-dir")]
    config_dir: Option<PathBuf>,

    /// Local address the listeners bind to.
    #[arg(long = "bind-ip", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind_ip: IpAddr,

    /// Per-step timeout for remote probes in milliseconds. No timeout when omitted.
    #[arg(long = "dial-timeout-ms")]
    dial_timeout_ms: Option<u64>,

    /// Do not wait for Enter between phases.
    #[arg(long = "no-wait", default_value_t = false)]
    no_wait: bool,

    /// Delay applied at each pause, in milliseconds.
    #[arg(long = "settle-ms", default_value_t = 0)]
    settle_ms: u64,

    /// Also write the final counters as pretty JSON to this path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let path = config_path(cli.config_dir.as_deref());
    let config = load_config(&path).with_context(|| {
        format!("cannot start without a configuration (set --config-dir or {CONFIG_DIR_ENV})")
    })?;

    let settle = Duration::from_millis(cli.settle_ms);
    let gate: PhaseGate<BufReader<Stdin>> = if cli.no_wait {
        PhaseGate::unattended(settle)
    } else {
        PhaseGate::interactive(BufReader::new(stdin())).with_settle(settle)
    };

    let orchestrator = Orchestrator::new(config, gate)
        .with_bind_ip(cli.bind_ip)
        .with_dial_timeout(cli.dial_timeout_ms.map(Duration::from_millis));

    let outcome = orchestrator.run(&mut std::io::stdout()).await;

    if let Some(path) = cli.output.as_deref() {
        match write_report_json(path, &outcome.report) {
            Ok(()) => info!("Wrote JSON report to {}", path.display()),
            Err(e) => error!("Failed to write JSON to {}: {e:#}", path.display()),
        }
    }

    Ok(())
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
