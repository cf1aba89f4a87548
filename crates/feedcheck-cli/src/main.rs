//! feedcheck
//!
//! Classifies customer feedback by sentiment and category through an ordered
//! chain of hosted models, with a rule-based fallback when none answers.

use anyhow::Result;
use clap::{Parser, Subcommand};
use feedcheck_telemetry::MetricsCollector;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;
use tracing::info;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "feedcheck")]
#[command(about = "Feedback sentiment and category analysis", long_about = None)]
struct Cli {
    /// Configuration file path (YAML)
    #[arg(short, long, global = true, env = "FEEDCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Print Prometheus metrics to stderr when done
    #[arg(long, global = true)]
    metrics: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a single piece of feedback
    Analyze {
        /// Feedback text
        text: String,

        /// Tag to attach; repeatable
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Analyze a file with one feedback per line
    Batch {
        /// Input file
        file: PathBuf,

        /// Maximum analyses in flight
        #[arg(short = 'j', long, default_value = "8")]
        concurrency: usize,
    },

    /// Probe the upstream model service
    Health,

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let metrics_handle = if cli.metrics {
        Some(init_metrics()?)
    } else {
        None
    };

    let config = feedcheck_core::AnalyzerConfig::load(cli.config.as_deref())?;
    info!(models = config.upstream.models.len(), "Configuration loaded");

    let outcome = match cli.command {
        Command::Analyze { text, tags } => commands::analyze(&config, &text, &tags).await,
        Command::Batch { file, concurrency } => {
            commands::batch(&config, &file, concurrency).await
        }
        Command::Health => commands::health(&config).await,
        Command::Config => commands::show_config(&config),
    };

    if let Some(handle) = metrics_handle {
        eprintln!("{}", handle.render());
    }
    outcome
}

/// Initialize tracing/logging
///
/// Logs go to stderr so stdout carries only results.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("feedcheck=debug,feedcheck_analyzer=debug,feedcheck_classifiers=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("feedcheck=info,feedcheck_analyzer=info,feedcheck_classifiers=info")
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize metrics recorder and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    MetricsCollector::describe();

    info!("Metrics recorder initialized");
    Ok(handle)
}
