//! Core data models used throughout Table Scout.
//!
//! These types represent the requirement fields, search plan, candidate
//! tables, and per-group results that flow through a single discovery
//! request. All of them are request-scoped value records: nothing here is
//! cached across requests or mutated after construction.

use serde::{Deserialize, Serialize};

/// A field the caller needs some table to supply.
///
/// The full list is extracted upstream from the requirement document and is
/// treated as the universe of fields a discovery request must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default)]
    pub description: String,
}

impl TargetField {
    pub fn new(
        name: impl Into<String>,
        field_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            description: description.into(),
        }
    }
}

/// One independently searchable conceptual group of a [`SearchPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStep {
    /// Short label for the informational need (e.g. `"live predictions"`).
    pub conceptual_group: String,
    /// A single focused natural-language sentence for semantic retrieval.
    pub search_query: String,
    /// Subset of the caller's target fields this group is responsible for.
    pub target_fields: Vec<TargetField>,
}

/// Ordered, non-empty sequence of search steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchPlan {
    steps: Vec<SearchStep>,
}

impl SearchPlan {
    /// Build a plan from steps. Returns `None` for an empty step list.
    pub fn new(steps: Vec<SearchStep>) -> Option<Self> {
        if steps.is_empty() {
            None
        } else {
            Some(Self { steps })
        }
    }

    /// A plan with exactly one step.
    pub fn single(step: SearchStep) -> Self {
        Self { steps: vec![step] }
    }

    pub fn steps(&self) -> &[SearchStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_steps(self) -> Vec<SearchStep> {
        self.steps
    }
}

/// A column of a candidate table's schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: String,
    #[serde(default)]
    pub description: String,
}

impl ColumnSchema {
    pub fn new(
        name: impl Into<String>,
        column_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            description: description.into(),
        }
    }
}

/// A table returned by the semantic search backend for one step.
///
/// Relevance is step-specific, so candidates are produced fresh for every
/// search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Fully qualified table identity (e.g. `"analytics.nfl.weekly_predictions"`).
    pub table_identity: String,
    /// Table-level description from the metadata index, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub schema: Vec<ColumnSchema>,
    /// Backend relevance score; higher is more relevant.
    pub relevance_score: f64,
}

/// Outcome of judging one candidate against one step's fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_good_fit: bool,
    pub reasoning: String,
}

impl ValidationResult {
    pub fn fit(reasoning: impl Into<String>) -> Self {
        Self {
            is_good_fit: true,
            reasoning: reasoning.into(),
        }
    }

    pub fn reject(reasoning: impl Into<String>) -> Self {
        Self {
            is_good_fit: false,
            reasoning: reasoning.into(),
        }
    }
}

/// Validated tables for one completed [`SearchStep`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryResult {
    pub conceptual_group: String,
    pub search_query: String,
    pub target_fields: Vec<TargetField>,
    /// Candidates judged a good fit, in backend relevance order. May be empty.
    pub discovered_tables: Vec<Candidate>,
    /// Number of candidates the search returned before validation.
    pub candidates_considered: usize,
    /// Backend failure for this step, if the search could not be performed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_error: Option<String>,
}
