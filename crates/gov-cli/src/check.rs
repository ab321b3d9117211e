//! # Check Subcommand
//!
//! Parses each law file and prints one line per law:
//!
//! ```text
//! midnight_deadline:1.0.0  scope=deliverable  clock=America/Sao_Paulo  sha256:9f2c…
//! ```
//!
//! Stops at the first file that does not parse.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use gov_core::LawDefinition;
use gov_law::{parse_law_with, ParserOptions};

/// Arguments for `gov check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Law files to parse.
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Reject unknown action tokens and unparsable conditions.
    #[arg(long)]
    pub strict: bool,
}

/// Execute `gov check`.
pub fn run_check(args: &CheckArgs) -> Result<u8> {
    let options = if args.strict {
        ParserOptions::strict()
    } else {
        ParserOptions::default()
    };

    for path in &args.files {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        match parse_law_with(&text, &options) {
            Ok(law) => println!("{}", summary_line(&law)),
            Err(e) => {
                println!("FAIL: {}: {e}", path.display());
                return Ok(1);
            }
        }
    }
    Ok(0)
}

/// One-line description of a parsed law.
pub fn summary_line(law: &LawDefinition) -> String {
    format!(
        "{}  scope={}  clock={}  {}",
        law.id,
        law.scope,
        law.clock.timezone,
        law.hash.as_deref().unwrap_or("-")
    )
}
