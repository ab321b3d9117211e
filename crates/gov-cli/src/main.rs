//! # gov CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gov_cli::check::{run_check, CheckArgs};
use gov_cli::eval::{run_eval, EvalArgs};
use gov_cli::run::{run_ruler, RunArgs};

/// Midnight Ruler governance toolchain.
///
/// Checks law files, evaluates a single span against a law, and drives the
/// daily scheduler against a local in-memory store.
#[derive(Parser, Debug)]
#[command(name = "gov", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse law files and print their id, scope, zone and hash.
    Check(CheckArgs),

    /// Evaluate one span against one law and print the outcome as JSON.
    Eval(EvalArgs),

    /// Run the Midnight Ruler for one tenant.
    Run(RunArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set.
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "gov CLI starting");

    let result = match cli.command {
        Commands::Check(args) => run_check(&args),
        Commands::Eval(args) => run_eval(&args),
        Commands::Run(args) => run_ruler(&args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
