//! Dual-stream sampler entry point.
//!
//! Wires a loopback transport and a paired stamp publisher to the sampler,
//! runs one check, and exits with the report's status.

use anyhow::{Context, Result};
use clap::Parser;
use sampler_common::config::SamplerConfig;
use sampler_runtime::clock::{Clock, SystemClock};
use sampler_runtime::loopback::LoopbackTransport;
use sampler_runtime::publisher::PairedPublisher;
use sampler_runtime::report::SamplerReport;
use sampler_runtime::sampler::run_sampler_test;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Sampler command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "dual-stream-sampler",
    about = "Check that a camera and a depth stream deliver aligned, fresh stamps",
    version,
    long_about = None
)]
struct Args {
    /// Path to a sampler configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Primary image channel (overrides config file).
    #[arg(long, value_name = "CHANNEL")]
    primary: Option<String>,

    /// Depth image channel (overrides config file).
    #[arg(long, value_name = "CHANNEL")]
    depth: Option<String>,

    /// Overall wait deadline, e.g. "5s" (overrides config file).
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Freshness bound, e.g. "500ms" (overrides config file).
    #[arg(long, value_parser = humantime::parse_duration)]
    max_age: Option<Duration>,

    /// Poll interval, e.g. "100ms" (overrides config file).
    #[arg(long, value_parser = humantime::parse_duration)]
    poll_interval: Option<Duration>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// Print the report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    init_logging(&args.log_level);

    let mut config = load_config(&args)?;
    apply_overrides(&mut config, &args);

    if args.print_config {
        print!("{}", config.to_toml().context("Failed to render configuration")?);
        return Ok(ExitCode::SUCCESS);
    }

    config.validate().context("Invalid configuration")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        primary = %config.channels.primary,
        depth = %config.channels.depth,
        "Configuration loaded"
    );

    let report = run(&config)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{json}");
    } else {
        print_summary(&report);
    }

    Ok(ExitCode::from(report.exit_code()))
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!(
        "dual_stream_sampler={},sampler_runtime={},sampler_common={}",
        level, level, level
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `SAMPLER_CONFIG_PATH` environment variable
/// 3. `config/sampler.toml` (local development)
/// 4. Built-in defaults
fn load_config(args: &Args) -> Result<SamplerConfig> {
    // 1. Command-line argument (highest priority)
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return SamplerConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path));
    }

    // 2. Environment variable
    if let Ok(env_path) = std::env::var("SAMPLER_CONFIG_PATH") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from SAMPLER_CONFIG_PATH");
            return SamplerConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from SAMPLER_CONFIG_PATH={:?}", env_path)
            });
        }
        warn!(
            path = %env_path,
            "SAMPLER_CONFIG_PATH set but file does not exist, checking other locations"
        );
    }

    // 3. Local development path
    let local_path = PathBuf::from("config/sampler.toml");
    if local_path.exists() {
        info!(?local_path, "Loading config from local path");
        return SamplerConfig::from_file(&local_path)
            .with_context(|| format!("Failed to load config from {:?}", local_path));
    }

    // 4. Built-in defaults
    info!("No config file found, using built-in defaults");
    Ok(SamplerConfig::default())
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut SamplerConfig, args: &Args) {
    if let Some(primary) = &args.primary {
        config.channels.primary = primary.clone();
    }
    if let Some(depth) = &args.depth {
        config.channels.depth = depth.clone();
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }
    if let Some(max_age) = args.max_age {
        config.max_age = max_age;
    }
    if let Some(poll_interval) = args.poll_interval {
        config.poll_interval = poll_interval;
    }
}

/// Run one check against a loopback transport fed by a paired publisher.
fn run(config: &SamplerConfig) -> Result<SamplerReport> {
    let transport = LoopbackTransport::new(config.source.delivery);
    let primary = transport
        .advertise(&config.channels.primary)
        .context("Failed to advertise primary channel")?;
    let depth = transport
        .advertise(&config.channels.depth)
        .context("Failed to advertise depth channel")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut publisher = PairedPublisher::start(primary, depth, Arc::clone(&clock), &config.source)
        .context("Failed to start paired publisher")?;

    let report = run_sampler_test(&transport, clock.as_ref(), config);

    publisher.stop();
    info!(
        outcome = %report.outcome,
        final_state = %report.final_state,
        pairs_published = publisher.published(),
        "Sampler run complete"
    );
    Ok(report)
}

/// Print a human-readable summary on stdout.
fn print_summary(report: &SamplerReport) {
    println!("outcome: {}", report.outcome);
    for reading in [&report.primary, &report.depth] {
        match (reading.stamp, reading.age_secs) {
            (Some(stamp), Some(age)) => println!(
                "  {}: stamp {} age {:.3}s deliveries {}",
                reading.channel, stamp, age, reading.deliveries
            ),
            _ => println!("  {}: no sample ({} deliveries)", reading.channel, reading.deliveries),
        }
    }
    for failure in &report.failures {
        println!("  FAIL {failure}");
    }
}
