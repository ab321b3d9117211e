//! # gov-cli: The `gov` Command
//!
//! ## Subcommands
//!
//! - `gov check`: parse law files and print id, scope, zone and hash.
//! - `gov eval`: evaluate one span against one law.
//! - `gov run`: drive the Midnight Ruler against an in-memory store.
//!
//! ```bash
//! gov check laws/*.law --strict
//! gov eval --law laws/midnight_deadline.law --span span.json --now 2026-03-01T03:00:01Z
//! gov run --tenant-config tenant.yaml --laws laws/ --spans spans.json --once
//! ```
//!
//! Handlers return an exit code: 0 on success, 1 when the input is
//! rejected. Operational errors surface as `Err` and exit with 2.

pub mod check;
pub mod eval;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};
use gov_core::{GovernableSpan, TenantConfig};

/// Load a tenant configuration from JSON, or YAML when the extension is
/// `.yaml` or `.yml`.
pub fn load_tenant_config(path: &Path) -> Result<TenantConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read tenant config {}", path.display()))?;
    let config: TenantConfig = if is_yaml(path) {
        serde_yaml::from_str(&text)
            .with_context(|| format!("invalid YAML tenant config {}", path.display()))?
    } else {
        serde_json::from_str(&text)
            .with_context(|| format!("invalid JSON tenant config {}", path.display()))?
    };
    config
        .validate()
        .with_context(|| format!("tenant config {}", path.display()))?;
    Ok(config)
}

/// Load a single span from a JSON file.
pub fn load_span(path: &Path) -> Result<GovernableSpan> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read span {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid span JSON {}", path.display()))
}

/// Load a JSON array of spans.
pub fn load_spans(path: &Path) -> Result<Vec<GovernableSpan>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read spans {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("spans file {} must be a JSON array of spans", path.display()))
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}
