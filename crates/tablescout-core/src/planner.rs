//! Search planning: decompose a requirement document into independent steps.
//!
//! A requirement document usually covers several unrelated informational
//! needs. Searching for all of them with one query makes the index rank
//! tables that fit none of them well, and checking candidates against every
//! field rejects tables that are a perfect fit for one need. The planner
//! splits the caller's target fields into conceptual groups, each with its
//! own focused query, so every group can be searched and validated alone.
//!
//! # Degradation
//!
//! Planning never fails. If the [`PlanGenerator`] errors, or proposes a plan
//! that does not survive [`resolve_plan`], the planner returns
//! [`fallback_plan`]: one `"general"` step over the whole document and the
//! full field list.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{SearchPlan, SearchStep, TargetField};
use crate::prompt::{GroupBounds, ProposedStep};
use crate::text::{collapse_whitespace, truncate_chars};

/// Group label used by the single-step fallback plan.
pub const FALLBACK_GROUP: &str = "general";

/// Maximum length, in characters, of the fallback plan's query.
pub const FALLBACK_QUERY_MAX_CHARS: usize = 1024;

/// Produces raw search groups for a requirement document.
///
/// Implementations are typically backed by a language model; the output is
/// untrusted and is validated by [`SearchPlanner`] before use.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate_plan(
        &self,
        document: &str,
        target_fields: &[TargetField],
        bounds: GroupBounds,
    ) -> Result<Vec<ProposedStep>>;
}

/// How a [`SearchPlan`] was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanSource {
    /// The generator's plan passed structural validation.
    Generated,
    /// The single-step fallback plan was used.
    Fallback { reason: String },
}

impl fmt::Display for PlanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanSource::Generated => write!(f, "generated"),
            PlanSource::Fallback { reason } => write!(f, "fallback ({})", reason),
        }
    }
}

/// A plan plus the way it was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanOutcome {
    pub plan: SearchPlan,
    pub source: PlanSource,
}

/// Builds a validated [`SearchPlan`] for a document.
#[derive(Clone)]
pub struct SearchPlanner {
    generator: Arc<dyn PlanGenerator>,
    bounds: GroupBounds,
}

impl SearchPlanner {
    pub fn new(generator: Arc<dyn PlanGenerator>, bounds: GroupBounds) -> Self {
        Self { generator, bounds }
    }

    /// Plan searches for `document`, returning only the plan.
    pub async fn plan(&self, document: &str, target_fields: &[TargetField]) -> SearchPlan {
        self.plan_with_source(document, target_fields).await.plan
    }

    /// Plan searches for `document`, reporting whether the fallback was used.
    pub async fn plan_with_source(
        &self,
        document: &str,
        target_fields: &[TargetField],
    ) -> PlanOutcome {
        if target_fields.is_empty() {
            tracing::info!("no target fields supplied; using a single descriptive step");
            return PlanOutcome {
                plan: fallback_plan(document, target_fields),
                source: PlanSource::Fallback {
                    reason: "no target fields supplied".to_string(),
                },
            };
        }

        let proposed = match self
            .generator
            .generate_plan(document, target_fields, self.bounds)
            .await
        {
            Ok(p) => p,
            Err(e) => return degraded(document, target_fields, format!("{:#}", e)),
        };

        match resolve_plan(&proposed, target_fields) {
            Ok(plan) => {
                tracing::info!(
                    steps = plan.len(),
                    groups = ?plan
                        .steps()
                        .iter()
                        .map(|s| s.conceptual_group.as_str())
                        .collect::<Vec<_>>(),
                    "search plan generated"
                );
                PlanOutcome {
                    plan,
                    source: PlanSource::Generated,
                }
            }
            Err(e) => degraded(document, target_fields, format!("invalid plan: {:#}", e)),
        }
    }
}

fn degraded(document: &str, target_fields: &[TargetField], reason: String) -> PlanOutcome {
    tracing::warn!(reason = %reason, "planning degraded; using single-step fallback plan");
    PlanOutcome {
        plan: fallback_plan(document, target_fields),
        source: PlanSource::Fallback { reason },
    }
}

/// The single-step plan used when no usable plan can be generated.
///
/// Its query is the document itself, whitespace-collapsed and truncated to
/// [`FALLBACK_QUERY_MAX_CHARS`]; its fields are the complete input list.
pub fn fallback_plan(document: &str, target_fields: &[TargetField]) -> SearchPlan {
    let collapsed = collapse_whitespace(document);
    let query = truncate_chars(&collapsed, FALLBACK_QUERY_MAX_CHARS).to_string();
    let step = SearchStep {
        conceptual_group: FALLBACK_GROUP.to_string(),
        search_query: query,
        target_fields: target_fields.to_vec(),
    };
    SearchPlan::single(step)
}

/// Validate raw groups and resolve their field names against `target_fields`.
///
/// Rejects the whole plan when there are no groups, a group name or query is
/// blank, a field name is not in `target_fields`, or a group claims no
/// fields. Names match case-insensitively; the resolved step carries the
/// caller's own [`TargetField`] values in the order the generator listed
/// them, without duplicates.
pub fn resolve_plan(proposed: &[ProposedStep], target_fields: &[TargetField]) -> Result<SearchPlan> {
    if proposed.is_empty() {
        bail!("plan has no groups");
    }

    let mut steps = Vec::with_capacity(proposed.len());
    for (i, group) in proposed.iter().enumerate() {
        let name = collapse_whitespace(&group.conceptual_group);
        if name.is_empty() {
            bail!("group {} has no name", i);
        }
        let query = collapse_whitespace(&group.search_query);
        if query.is_empty() {
            bail!("group '{}' has an empty search query", name);
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::new();
        for reference in &group.target_fields {
            let key = reference.trim().to_lowercase();
            let field = target_fields
                .iter()
                .find(|f| f.name.trim().to_lowercase() == key)
                .ok_or_else(|| {
                    anyhow::anyhow!("group '{}' references unknown field '{}'", name, reference)
                })?;
            if seen.insert(key) {
                fields.push(field.clone());
            }
        }
        if fields.is_empty() {
            bail!("group '{}' maps to no target fields", name);
        }

        steps.push(SearchStep {
            conceptual_group: name,
            search_query: query,
            target_fields: fields,
        });
    }

    SearchPlan::new(steps).ok_or_else(|| anyhow::anyhow!("plan has no groups"))
}
