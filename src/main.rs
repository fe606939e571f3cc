//! Review Cascade command-line entry point.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use review_cascade::services::snapshot::measure_snapshot;
use review_cascade::{Orchestrator, OrchestratorConfig, ProgressReporter, ReportStatus};
use review_cascade_core::{AnalysisRequest, ExecutionStrategy};
use review_cascade_tools::builtin_descriptors;

#[derive(Debug, Parser)]
#[command(name = "review-cascade", version, about = "Multi-tool code analysis orchestrator")]
struct Cli {
    /// Orchestrator configuration file (TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Learning store file, overriding the configuration
    #[arg(long, global = true)]
    learning_store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List registered tools
    Tools {
        /// Only tools within this category
        #[arg(long)]
        category: Option<String>,
        /// List the built-in catalog instead of the registry
        #[arg(long)]
        catalog: bool,
    },
    /// Score and plan a request without running it
    Plan(RequestArgs),
    /// Run a request and print the report
    Run {
        #[command(flatten)]
        request: RequestArgs,
        /// Stream progress events to stderr
        #[arg(long)]
        progress: bool,
    },
    /// Print learning insights
    Insights,
}

#[derive(Debug, Args)]
struct RequestArgs {
    /// Repository snapshot directory
    snapshot: PathBuf,
    /// Requested categories; all when omitted
    #[arg(long, value_delimiter = ',')]
    categories: Vec<String>,
    /// sequential, parallel, priority_based or adaptive
    #[arg(long)]
    strategy: Option<ExecutionStrategy>,
    /// Project languages; detected from the snapshot when omitted
    #[arg(long, value_delimiter = ',')]
    languages: Vec<String>,
    /// Tools to favor
    #[arg(long, value_delimiter = ',')]
    prefer: Vec<String>,
    /// Tools never to run
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,
    /// Cumulative cost budget for priority-based execution
    #[arg(long)]
    budget: Option<f64>,
    /// Favor cheaper tools
    #[arg(long)]
    constrained: bool,
}

impl RequestArgs {
    fn to_request(&self) -> Result<AnalysisRequest> {
        let stats = measure_snapshot(&self.snapshot)?;
        let mut request = AnalysisRequest::new(
            Uuid::new_v4().to_string(),
            self.snapshot.to_string_lossy(),
        )
        .with_size(stats.file_count, stats.total_bytes);

        if !self.categories.is_empty() {
            request = request.with_categories(self.categories.iter().cloned());
        }
        if let Some(strategy) = self.strategy {
            request = request.with_strategy(strategy);
        }
        request = if self.languages.is_empty() {
            request.with_languages(stats.ranked_languages())
        } else {
            request.with_languages(self.languages.iter().cloned())
        };
        for tool in &self.prefer {
            request = request.prefer(tool);
        }
        for tool in &self.exclude {
            request = request.exclude(tool);
        }
        if let Some(budget) = self.budget {
            if !budget.is_finite() || budget < 0.0 {
                bail!("--budget must be a non-negative number");
            }
            request = request.with_budget(budget);
        }
        if self.constrained {
            request = request.constrained();
        }
        Ok(request)
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

fn load_config(path: Option<&Path>, learning_store: Option<PathBuf>) -> Result<OrchestratorConfig> {
    let mut config = match path {
        Some(path) => OrchestratorConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => OrchestratorConfig::default(),
    };
    if learning_store.is_some() {
        config.learning.store_path = learning_store;
    }
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = load_config(cli.config.as_deref(), cli.learning_store.clone())?;

    match cli.command {
        Command::Tools { category, catalog } => {
            let mut descriptors = if catalog {
                builtin_descriptors()
            } else {
                let orchestrator = Orchestrator::from_config(config)?;
                orchestrator.registry().list(category.as_deref())
            };
            if catalog {
                if let Some(category) = &category {
                    descriptors.retain(|d| d.category.starts_with(category.as_str()));
                }
            }
            descriptors.sort_by(|a, b| a.id.cmp(&b.id));
            print_json(&descriptors)?;
        }
        Command::Plan(args) => {
            let orchestrator = Orchestrator::from_config(config)?;
            let request = args.to_request()?;
            let planning = orchestrator.plan(&request)?;
            print_json(&planning)?;
        }
        Command::Run { request, progress } => {
            let orchestrator = Orchestrator::from_config(config)?;
            if orchestrator.registry().is_empty() {
                tracing::warn!("no tools registered; configure [provider] or [[tools]]");
            }
            let request = request.to_request()?;

            let cancel = CancellationToken::new();
            {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::warn!("interrupt received, cancelling request");
                        cancel.cancel();
                    }
                });
            }

            let reporter = if progress {
                let (reporter, mut events) = ProgressReporter::channel();
                tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        if let Ok(line) = serde_json::to_string(&event) {
                            eprintln!("{line}");
                        }
                    }
                });
                reporter
            } else {
                ProgressReporter::disabled()
            };

            let report = orchestrator.run_with(request, cancel, reporter).await;
            orchestrator.save_learning()?;
            print_json(&report)?;

            if report.status == ReportStatus::Failed {
                std::process::exit(2);
            }
        }
        Command::Insights => {
            let orchestrator = Orchestrator::from_config(config)?;
            if orchestrator.config().learning.store_path.is_none() {
                bail!(
                    "insights need a learning store; \
                     pass --learning-store or set learning.store_path"
                );
            }
            print_json(&orchestrator.learning().insights())?;
        }
    }

    Ok(())
}
