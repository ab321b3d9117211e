//! # Eval Subcommand
//!
//! Triage one span against one law, compose with the tenant's overlays, and
//! print the result as JSON. Nothing is stored and no actions run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use gov_core::action::obligations;
use gov_core::{
    build_evaluation_context, parse_timestamp, validate_span, GovernableSpan, LawDefinition,
    PolicyLayer, TenantConfig, Triage,
};
use gov_law::{compose_actions, evaluate_law, layer_proposals, parse_law, ExpressionFault};
use serde::Serialize;

/// Arguments for `gov eval`.
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Law file.
    #[arg(long)]
    pub law: PathBuf,

    /// Span JSON file.
    #[arg(long)]
    pub span: PathBuf,

    /// Tenant configuration (JSON or YAML). Defaults to the span's tenant in
    /// the law's zone with a quorum of 1.
    #[arg(long)]
    pub tenant_config: Option<PathBuf>,

    /// Evaluation instant (RFC 3339). Defaults to now.
    #[arg(long)]
    pub now: Option<String>,
}

/// What `gov eval` prints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalOutput {
    /// Law id.
    pub law_id: String,
    /// Law text hash.
    pub law_hash: Option<String>,
    /// Evaluation instant.
    pub now: DateTime<Utc>,
    /// Outcome.
    pub triage: Triage,
    /// Whether a branch matched.
    pub matched: bool,
    /// The law's own actions.
    pub proposed: Vec<String>,
    /// Actions after composing with the tenant's overlays.
    pub obligations: Vec<String>,
    /// Conditions that failed to evaluate.
    pub faults: Vec<ExpressionFault>,
}

/// Execute `gov eval`.
pub fn run_eval(args: &EvalArgs) -> Result<u8> {
    let text = std::fs::read_to_string(&args.law)
        .with_context(|| format!("failed to read {}", args.law.display()))?;
    let law = parse_law(&text).with_context(|| format!("failed to parse {}", args.law.display()))?;
    let span = crate::load_span(&args.span)?;
    let tenant = match &args.tenant_config {
        Some(path) => crate::load_tenant_config(path)?,
        None => TenantConfig::new(span.tenant_id.clone(), law.clock.timezone.clone(), 1),
    };
    let now = match &args.now {
        Some(raw) => parse_timestamp(raw)
            .with_context(|| format!("--now {raw:?} is not an RFC 3339 timestamp"))?,
        None => Utc::now(),
    };

    if let Err(e) = validate_span(&span) {
        println!("FAIL: {}: {e}", args.span.display());
        return Ok(1);
    }

    let output = evaluate(&law, &span, &tenant, now);
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(0)
}

/// Evaluate a validated span against `law` at `now`.
pub fn evaluate(
    law: &LawDefinition,
    span: &GovernableSpan,
    tenant: &TenantConfig,
    now: DateTime<Utc>,
) -> EvalOutput {
    let ctx = build_evaluation_context(span, tenant, now);
    let outcome = evaluate_law(law, &ctx);
    let composed = compose_actions(&layer_proposals(
        PolicyLayer::default(),
        &outcome.actions,
        &tenant.overlays,
    ));
    EvalOutput {
        law_id: law.id.clone(),
        law_hash: law.hash.clone(),
        now,
        triage: outcome.triage,
        matched: outcome.matched,
        proposed: obligations(&outcome.actions),
        obligations: obligations(&composed),
        faults: outcome.faults,
    }
}
