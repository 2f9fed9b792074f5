//! Engine wiring and the `scout discover` / `scout plan` commands.
//!
//! [`build_discovery`] turns a [`Config`] into a ready
//! [`Discovery`] engine: backend from `[search]`, a [`ChatModel`] as the
//! plan generator, and the judge selected by `[discovery].judge`.
//! [`run_discovery`] wraps one run with a request id, a document digest,
//! and a timestamp so CLI output and server responses can be correlated
//! with logs.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::Instrument;

use tablescout_core::discover::validate_input;
use tablescout_core::planner::{PlanOutcome, SearchPlanner};
use tablescout_core::prompt::GroupBounds;
use tablescout_core::search::SearchExecutor;
use tablescout_core::validator::{FitnessJudge, FitnessValidator, LexicalJudge};
use tablescout_core::{
    CancellationSignal, Discovery, DiscoveryError, DiscoveryReport, DiscoveryState, TargetField,
};

use crate::backend::create_backend;
use crate::config::Config;
use crate::fields::resolve_fields;
use crate::llm::ChatModel;

/// A [`DiscoveryReport`] plus request metadata.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub request_id: String,
    /// SHA-256 of the requirement document, hex encoded.
    pub document_digest: String,
    /// RFC 3339 timestamp of when the report was produced.
    pub generated_at: String,
    #[serde(flatten)]
    pub report: DiscoveryReport,
}

/// Build the discovery engine described by `config`.
pub fn build_discovery(config: &Config) -> Result<Discovery> {
    let backend = create_backend(&config.search)?;
    let model = Arc::new(ChatModel::new(&config.llm)?);

    let judge: Arc<dyn FitnessJudge> = match config.discovery.judge.as_str() {
        "llm" => model.clone(),
        _ => Arc::new(LexicalJudge),
    };

    let bounds = GroupBounds {
        min: config.discovery.min_groups,
        max: config.discovery.max_groups,
    };

    tracing::debug!(
        backend = backend.name(),
        model = model.model_name(),
        judge = judge.name(),
        "discovery engine configured"
    );

    Ok(Discovery::new(
        SearchPlanner::new(model, bounds),
        SearchExecutor::new(backend, config.search.page_size),
        FitnessValidator::new(judge),
    )
    .with_validation_concurrency(config.discovery.validation_concurrency))
}

pub fn document_digest(document: &str) -> String {
    hex::encode(Sha256::digest(document.as_bytes()))
}

/// Run one discovery and attach request metadata.
pub async fn run_discovery(
    discovery: &Discovery,
    document: &str,
    target_fields: &[TargetField],
    cancel: &CancellationSignal,
) -> Result<RunReport, DiscoveryError> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let digest = document_digest(document);
    let span = tracing::info_span!("discovery", request_id = %request_id, document = %&digest[..12]);

    let report = discovery
        .run(document, target_fields, cancel)
        .instrument(span)
        .await?;

    Ok(RunReport {
        request_id,
        document_digest: digest,
        generated_at: Utc::now().to_rfc3339(),
        report,
    })
}

/// Produce a plan without searching.
pub async fn run_planning(
    discovery: &Discovery,
    document: &str,
    target_fields: &[TargetField],
) -> Result<PlanOutcome, DiscoveryError> {
    validate_input(document, target_fields)?;
    Ok(discovery
        .planner()
        .plan_with_source(document, target_fields)
        .await)
}

fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))
}

/// `scout discover`: run discovery, honouring Ctrl-C between steps.
pub async fn run_discover(
    config: &Config,
    document_path: &Path,
    fields_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let document = read_document(document_path)?;
    let fields = resolve_fields(&document, fields_path)?;
    let discovery = build_discovery(config)?;

    let cancel = CancellationSignal::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            tracing::warn!(
                "interrupt received; stopping after the current step (Ctrl-C again to abort)"
            );
            cancel.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("second interrupt received; aborting");
                std::process::exit(130);
            }
        })
    };

    let result = run_discovery(&discovery, &document, &fields, &cancel).await;
    watcher.abort();
    let run = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_report(&run);
    }
    Ok(())
}

/// `scout plan`: print the search plan only.
pub async fn run_plan(
    config: &Config,
    document_path: &Path,
    fields_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let document = read_document(document_path)?;
    let fields = resolve_fields(&document, fields_path)?;
    let discovery = build_discovery(config)?;

    let outcome = run_planning(&discovery, &document, &fields).await?;

    if json {
        let out = serde_json::json!({
            "steps": outcome.plan.steps(),
            "plan_source": outcome.source,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("plan: {} ({} steps)", outcome.source, outcome.plan.len());
    println!();
    for (i, step) in outcome.plan.steps().iter().enumerate() {
        println!("{}. {}", i + 1, step.conceptual_group);
        println!("    query: {}", step.search_query);
        println!("    fields: {}", field_names(&step.target_fields));
        println!();
    }
    Ok(())
}

fn field_names(fields: &[TargetField]) -> String {
    if fields.is_empty() {
        return "(none)".to_string();
    }
    fields
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_report(run: &RunReport) {
    let report = &run.report;
    println!("request: {}", run.request_id);
    println!("plan: {} ({} steps)", report.plan_source, report.planned_steps);
    println!();

    for (i, result) in report.results.iter().enumerate() {
        println!("{}. {}", i + 1, result.conceptual_group);
        println!("    query: {}", result.search_query);
        println!("    fields: {}", field_names(&result.target_fields));
        if let Some(err) = &result.search_error {
            println!("    search error: {}", err);
        }
        if result.discovered_tables.is_empty() {
            println!(
                "    no matching tables ({} considered)",
                result.candidates_considered
            );
        } else {
            println!(
                "    tables ({} of {} considered):",
                result.discovered_tables.len(),
                result.candidates_considered
            );
            for table in &result.discovered_tables {
                println!(
                    "      - {}  (score {:.2})",
                    table.table_identity, table.relevance_score
                );
            }
        }
        println!();
    }

    if report.final_state == DiscoveryState::Cancelled {
        println!(
            "cancelled: {} of {} steps completed",
            report.results.len(),
            report.planned_steps
        );
    } else {
        println!("done: {} steps", report.results.len());
    }
}
