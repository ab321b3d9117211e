//! # Run Subcommand
//!
//! Drives the Midnight Ruler for one tenant against an in-memory store
//! seeded from a spans file. Every span in the file is offered to the
//! configured tenant, so spans of another tenant are quarantined exactly as
//! they would be in production.
//!
//! With `--once` a single run executes immediately and the report, the
//! ledger and the metrics exposition are printed. Without it the ruler
//! arms for local midnight and runs until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use gov_core::LedgerEvent;
use gov_law::{DirectoryLawSource, LawBook, ParserOptions};
use gov_metrics::MetricsCollector;
use gov_ruler::{FixedDrift, InMemoryRepository, MidnightRuler, RulerConfig, RunOutcome, RunReport};
use serde::Serialize;

/// Arguments for `gov run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Tenant configuration (JSON or YAML).
    #[arg(long)]
    pub tenant_config: PathBuf,

    /// Directory of `.law` files.
    #[arg(long)]
    pub laws: PathBuf,

    /// JSON array of active spans.
    #[arg(long)]
    pub spans: PathBuf,

    /// Run once immediately and exit.
    #[arg(long)]
    pub once: bool,

    /// Simulated clock drift in milliseconds.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub drift_ms: i64,

    /// Drift threshold in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub drift_threshold_ms: u64,

    /// Parse laws strictly.
    #[arg(long)]
    pub strict: bool,
}

/// What `gov run --once` prints.
#[derive(Debug, Serialize)]
pub struct OnceOutput {
    /// Run summary.
    pub report: RunReport,
    /// Ledger after the run.
    pub ledger: Vec<LedgerEvent>,
    /// Metrics exposition after the run.
    pub metrics: String,
}

/// A ruler wired to an in-memory repository.
pub struct LocalRuler {
    /// The ruler.
    pub ruler: MidnightRuler,
    /// Its repository.
    pub repository: Arc<InMemoryRepository>,
    /// Its metrics.
    pub metrics: Arc<MetricsCollector>,
    /// Tenant governed.
    pub tenant_id: String,
}

/// Execute `gov run`.
pub async fn run_ruler(args: &RunArgs) -> Result<u8> {
    let local = prepare(args, gov_metrics::global())?;

    if args.once {
        let output = run_once(&local).await;
        println!("{}", serde_json::to_string_pretty(&output.report)?);
        println!("{}", serde_json::to_string_pretty(&output.ledger)?);
        print!("{}", output.metrics);
        return Ok(match output.report.outcome {
            RunOutcome::Completed => 0,
            RunOutcome::AbortedClockDrift | RunOutcome::Failed => 1,
        });
    }

    local.ruler.start().context("failed to start the ruler")?;
    tracing::info!(tenant = %local.tenant_id, "ruler running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    local.ruler.stop().await;
    Ok(0)
}

/// Load configuration, laws and spans, and build the ruler.
pub fn prepare(args: &RunArgs, metrics: Arc<MetricsCollector>) -> Result<LocalRuler> {
    let tenant = crate::load_tenant_config(&args.tenant_config)?;
    let tenant_id = tenant.id.clone();
    let config = RulerConfig::new(tenant)?
        .with_drift_threshold(Duration::from_millis(args.drift_threshold_ms));

    let options = if args.strict {
        ParserOptions::strict()
    } else {
        ParserOptions::default()
    };
    let laws = LawBook::load_directory(&DirectoryLawSource::new(&args.laws), &options)
        .with_context(|| format!("failed to load laws from {}", args.laws.display()))?;
    if laws.is_empty() {
        tracing::warn!(dir = %args.laws.display(), "no laws found; every resource will be unmatched");
    }

    let repository = Arc::new(InMemoryRepository::new());
    for span in crate::load_spans(&args.spans)? {
        repository.seed_for(tenant_id.clone(), span);
    }

    let ruler = MidnightRuler::builder(config, Arc::new(laws), repository.clone())
        .drift_source(Arc::new(FixedDrift(args.drift_ms)))
        .metrics(metrics.clone())
        .build()?;

    Ok(LocalRuler {
        ruler,
        repository,
        metrics,
        tenant_id,
    })
}

/// One immediate run.
pub async fn run_once(local: &LocalRuler) -> OnceOutput {
    let report = local.ruler.run_now().await;
    OnceOutput {
        report,
        ledger: local.repository.events(&local.tenant_id),
        metrics: local.metrics.render(),
    }
}
