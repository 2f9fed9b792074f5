//! Discovery orchestration: plan, then search and validate step by step.
//!
//! # State Machine
//!
//! ```text
//! Planning ─▶ Executing(0) ─▶ Aggregated(0) ─▶ Executing(1) ─▶ … ─▶ Done
//!                  │                               │
//!                  └──────────── Cancelled ◀───────┘
//! ```
//!
//! 1. Ask the [`SearchPlanner`] for a plan (never fails; may fall back).
//! 2. For each step, in plan order:
//!    a. stop if the [`CancellationSignal`] is set, keeping results so far;
//!    b. run the step's query through the [`SearchExecutor`];
//!    c. validate every candidate against this step's fields only, with
//!       bounded concurrency;
//!    d. emit a [`DiscoveryResult`] with the retained candidates, even if
//!       none survived.
//!
//! Steps run one after another so a long plan can be abandoned between
//! steps; a validation batch that has started always finishes.

use std::collections::HashSet;
use std::fmt;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::cancel::CancellationSignal;
use crate::error::DiscoveryError;
use crate::models::{DiscoveryResult, SearchStep, TargetField};
use crate::planner::{PlanSource, SearchPlanner};
use crate::search::SearchExecutor;
use crate::validator::FitnessValidator;

/// Default number of candidate validations in flight per step.
pub const DEFAULT_VALIDATION_CONCURRENCY: usize = 4;

/// Orchestrator state, traced on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum DiscoveryState {
    Planning,
    Executing(usize),
    Aggregated(usize),
    Done,
    Cancelled,
}

impl fmt::Display for DiscoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryState::Planning => write!(f, "planning"),
            DiscoveryState::Executing(i) => write!(f, "executing({})", i),
            DiscoveryState::Aggregated(i) => write!(f, "aggregated({})", i),
            DiscoveryState::Done => write!(f, "done"),
            DiscoveryState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Everything a discovery run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryReport {
    /// How the plan was obtained.
    pub plan_source: PlanSource,
    /// Number of steps in the plan, including any not run due to cancellation.
    pub planned_steps: usize,
    /// `Done` or `Cancelled`.
    pub final_state: DiscoveryState,
    /// One result per completed step, in plan order.
    pub results: Vec<DiscoveryResult>,
}

/// The discovery engine. Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct Discovery {
    planner: SearchPlanner,
    executor: SearchExecutor,
    validator: FitnessValidator,
    validation_concurrency: usize,
}

impl Discovery {
    pub fn new(
        planner: SearchPlanner,
        executor: SearchExecutor,
        validator: FitnessValidator,
    ) -> Self {
        Self {
            planner,
            executor,
            validator,
            validation_concurrency: DEFAULT_VALIDATION_CONCURRENCY,
        }
    }

    /// Set the number of concurrent validations per step (minimum one).
    pub fn with_validation_concurrency(mut self, limit: usize) -> Self {
        self.validation_concurrency = limit.max(1);
        self
    }

    pub fn planner(&self) -> &SearchPlanner {
        &self.planner
    }

    /// Run discovery and return only the per-step results.
    pub async fn discover(
        &self,
        document: &str,
        target_fields: &[TargetField],
        cancel: &CancellationSignal,
    ) -> Result<Vec<DiscoveryResult>, DiscoveryError> {
        Ok(self.run(document, target_fields, cancel).await?.results)
    }

    /// Run discovery and return the full report.
    ///
    /// Only input-contract violations are returned as errors; search and
    /// judgment failures degrade to fewer results.
    pub async fn run(
        &self,
        document: &str,
        target_fields: &[TargetField],
        cancel: &CancellationSignal,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        validate_input(document, target_fields)?;

        let mut state = DiscoveryState::Planning;
        tracing::debug!(%state, fields = target_fields.len(), "discovery started");

        let outcome = self.planner.plan_with_source(document, target_fields).await;
        let planned_steps = outcome.plan.len();
        let mut results = Vec::with_capacity(planned_steps);

        for (i, step) in outcome.plan.steps().iter().enumerate() {
            if cancel.is_cancelled() {
                state = DiscoveryState::Cancelled;
                tracing::info!(
                    completed = results.len(),
                    planned = planned_steps,
                    "discovery cancelled before step {}",
                    i
                );
                break;
            }

            state = DiscoveryState::Executing(i);
            tracing::debug!(%state, group = %step.conceptual_group, "step started");

            results.push(self.run_step(step).await);

            state = DiscoveryState::Aggregated(i);
            tracing::debug!(%state, "step aggregated");
        }

        if state != DiscoveryState::Cancelled {
            state = DiscoveryState::Done;
        }
        tracing::info!(
            final_state = %state,
            plan = %outcome.source,
            groups = results.len(),
            tables = results.iter().map(|r| r.discovered_tables.len()).sum::<usize>(),
            "discovery finished"
        );

        Ok(DiscoveryReport {
            plan_source: outcome.source,
            planned_steps,
            final_state: state,
            results,
        })
    }

    async fn run_step(&self, step: &SearchStep) -> DiscoveryResult {
        let search = self.executor.execute(step).await;
        let considered = search.candidates.len();

        let verdicts: Vec<_> = stream::iter(search.candidates)
            .map(|candidate| async move {
                let verdict = self
                    .validator
                    .validate(&candidate, &step.target_fields, &step.conceptual_group)
                    .await;
                (candidate, verdict)
            })
            .buffered(self.validation_concurrency)
            .collect()
            .await;

        let discovered_tables: Vec<_> = verdicts
            .into_iter()
            .filter(|(_, verdict)| verdict.is_good_fit)
            .map(|(candidate, _)| candidate)
            .collect();

        tracing::info!(
            group = %step.conceptual_group,
            considered,
            retained = discovered_tables.len(),
            "step completed"
        );

        DiscoveryResult {
            conceptual_group: step.conceptual_group.clone(),
            search_query: step.search_query.clone(),
            target_fields: step.target_fields.clone(),
            discovered_tables,
            candidates_considered: considered,
            search_error: search.error,
        }
    }
}

/// Check the caller contract: a non-blank document and a well-formed field
/// list (no blank names, no case-insensitive duplicates).
pub fn validate_input(document: &str, target_fields: &[TargetField]) -> Result<(), DiscoveryError> {
    if document.trim().is_empty() {
        return Err(DiscoveryError::InvalidInput(
            "document must not be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for (i, field) in target_fields.iter().enumerate() {
        let key = field.name.trim().to_lowercase();
        if key.is_empty() {
            return Err(DiscoveryError::InvalidInput(format!(
                "target field {} has an empty name",
                i
            )));
        }
        if !seen.insert(key) {
            return Err(DiscoveryError::InvalidInput(format!(
                "duplicate target field: {}",
                field.name
            )));
        }
    }

    Ok(())
}
