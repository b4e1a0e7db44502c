//! oppnet - trace-driven opportunistic routing simulation
//!
//! Replays a contact trace against one routing engine per host and reports
//! delivery statistics and per-node routing state.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use oppnet_core::HostAddress;
use oppnet_logging::{LogConfig, OppnetSubscriberBuilder};
use oppnet_routing::RoutingConfig;
use oppnet_sim::{DEFAULT_UPDATE_INTERVAL, NodeReport, RunSummary, Trace, TraceRunner};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "oppnet-sim",
    about = "Trace-driven opportunistic routing simulation",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write JSONL logs to this directory instead of the console
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a contact trace
    Run {
        /// Routing settings (TOML)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Contact and message event trace
        #[arg(short, long)]
        trace: PathBuf,

        /// Seconds between update ticks
        #[arg(short, long, default_value_t = DEFAULT_UPDATE_INTERVAL)]
        update_interval: f64,

        /// Print the routing state of every node at the end
        #[arg(short, long)]
        report: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a settings file and print the effective configuration
    Check {
        /// Routing settings (TOML)
        #[arg(short, long)]
        settings: PathBuf,
    },
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    summary: &'a RunSummary,
    reports: &'a [NodeReport],
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = match &cli.log_dir {
        Some(dir) => LogConfig::batch(dir.clone()),
        None => LogConfig::default(),
    };
    if cli.verbose {
        log_config.level = "debug".to_string();
    }
    let _log_guard = OppnetSubscriberBuilder::new()
        .with_config(log_config)
        .init()
        .context("failed to initialize logging")?;

    match cli.command {
        Commands::Run {
            settings,
            trace,
            update_interval,
            report,
            json,
        } => run(settings, trace, update_interval, report, json),
        Commands::Check { settings } => check(settings),
    }
}

fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<RoutingConfig> {
    match path {
        Some(path) => RoutingConfig::from_path(path)
            .with_context(|| format!("invalid settings file {}", path.display())),
        None => Ok(RoutingConfig::default()),
    }
}

fn run(
    settings: Option<PathBuf>,
    trace_path: PathBuf,
    update_interval: f64,
    report: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_settings(settings.as_ref())?;
    for warning in config.validate() {
        tracing::warn!(%warning, "Suspicious setting");
    }

    let trace: Trace<HostAddress> = Trace::from_path(&trace_path)
        .with_context(|| format!("invalid trace {}", trace_path.display()))?;

    let mut runner = TraceRunner::new(&config, trace.hosts(), update_interval)
        .context("settings cannot drive a simulation")?;
    let summary = runner.run(&trace);
    let reports = if report { runner.reports() } else { Vec::new() };

    if json {
        let output = JsonOutput {
            summary: &summary,
            reports: &reports,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let stats = &summary.stats;
    println!("run {}", summary.run_id);
    println!(
        "events: {}  ticks: {}  end: {:.1}s",
        summary.events, summary.ticks, summary.end_time
    );
    println!(
        "created: {}  relayed: {}  delivered: {}  ratio: {:.3}",
        stats.created,
        stats.relayed,
        stats.delivered,
        stats.delivery_ratio()
    );
    println!(
        "dropped: {}  expired: {}  aborted: {}",
        stats.dropped, stats.expired, stats.aborted
    );

    for node in reports {
        println!();
        println!("[{}]", node.node);
        print!("{}", node.report);
    }
    Ok(())
}

fn check(settings: PathBuf) -> anyhow::Result<()> {
    let config = load_settings(Some(&settings))?;
    print!("{}", config.to_toml_string()?);

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("# ok");
        return Ok(());
    }
    for warning in &warnings {
        println!("# warning: {}", warning);
    }
    anyhow::bail!("{} warning(s) in {}", warnings.len(), settings.display())
}
