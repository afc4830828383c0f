mod logging;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use sysvitals::config::{Config, OutputFormat, load_config, load_config_from_path};
use sysvitals::orchestrator::Orchestrator;
use sysvitals::sink::{JsonSink, TextSink};
use sysvitals::system::platform::host_name;

#[derive(Parser)]
#[command(
    name = "sysvitals",
    about = "Periodic per-core CPU and memory snapshot from OS counters"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sampling interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Label attached to every record (defaults to the hostname)
    #[arg(long, conflicts_with = "no_host")]
    host: Option<String>,

    /// Omit the host label
    #[arg(long, default_value_t = false)]
    no_host: bool,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Print a single snapshot taken one interval after the baseline, then exit
    #[arg(long, default_value_t = false, conflicts_with = "count")]
    once: bool,

    /// Exit after this many snapshots
    #[arg(long)]
    count: Option<u64>,

    /// Log filter when RUST_LOG is unset (e.g. `info`, `sysvitals=debug`)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);
    logging::init_tracing(&config.logging.level, config.logging.json)?;

    if config.general.interval_ms == 0 {
        return Err(eyre!("--interval-ms must be greater than 0"));
    }
    if cli.count == Some(0) {
        return Err(eyre!("--count must be greater than 0"));
    }

    let interval = Duration::from_millis(config.general.interval_ms);
    let host = resolve_host(&cli, &config);
    let orchestrator = match config.general.format {
        OutputFormat::Text => Orchestrator::new().with_sink(TextSink::stdout()),
        OutputFormat::Json => Orchestrator::new().with_sink(JsonSink::stdout()),
    }
    .with_host(host);

    if cli.once {
        return run_once(orchestrator, interval).await;
    }
    run(orchestrator, interval, cli.count).await
}

async fn run(orchestrator: Orchestrator, interval: Duration, count: Option<u64>) -> Result<()> {
    let mut running = orchestrator.start(interval);

    tokio::select! {
        signal = tokio::signal::ctrl_c() => signal?,
        // Without a count this only returns if the sampling task dies.
        _ = running.wait_for_cycles(count.unwrap_or(u64::MAX)) => {}
    }

    running.stop().await?;
    Ok(())
}

/// The very first sample has no baseline, so wait one interval before taking
/// the snapshot that gets printed.
async fn run_once(mut orchestrator: Orchestrator, interval: Duration) -> Result<()> {
    orchestrator.initialize();
    tokio::time::sleep(interval).await;
    orchestrator.cycle();
    orchestrator.teardown();
    Ok(())
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(ms) = cli.interval_ms {
        config.general.interval_ms = ms;
    }
    if let Some(ref host) = cli.host {
        config.general.host_label = host.clone();
    }
    if let Some(format) = cli.format {
        config.general.format = format;
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.log_json {
        config.logging.json = true;
    }

    config
}

fn resolve_host(cli: &Cli, config: &Config) -> Option<String> {
    if cli.no_host {
        return None;
    }
    if config.general.host_label.is_empty() {
        host_name()
    } else {
        Some(config.general.host_label.clone())
    }
}
