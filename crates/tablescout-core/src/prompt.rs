//! Prompt assembly and response parsing for the language-model calls.
//!
//! The engine talks to a generation service twice: once to decompose a
//! requirement document into search groups, and once per candidate to judge
//! schema fitness. This module owns both halves of that contract (what we
//! send and what we accept back) so that transport adapters only move
//! strings.
//!
//! Responses are expected to be a single JSON object. Models often wrap it
//! in a fenced code block or a sentence of prose; [`extract_json_object`]
//! strips that before parsing.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::models::{Candidate, TargetField, ValidationResult};

/// A system + user message pair for a chat-style model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

/// A search group as proposed by the plan generator, before validation.
///
/// Field references are plain names; [`crate::planner::SearchPlanner`]
/// resolves them against the caller's list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProposedStep {
    #[serde(default)]
    pub conceptual_group: String,
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub target_fields: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PlanResponse {
    groups: Vec<ProposedStep>,
}

/// Bounds on the number of groups the planner asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupBounds {
    pub min: usize,
    pub max: usize,
}

impl Default for GroupBounds {
    fn default() -> Self {
        Self { min: 2, max: 6 }
    }
}

fn render_fields(fields: &[TargetField]) -> String {
    fields
        .iter()
        .map(|f| {
            let ty = if f.field_type.is_empty() {
                "unspecified"
            } else {
                f.field_type.as_str()
            };
            if f.description.is_empty() {
                format!("- {} ({})", f.name, ty)
            } else {
                format!("- {} ({}): {}", f.name, ty, f.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the plan-generation prompt.
///
/// The whole document is included, not just its field table, so the model
/// can recover the business context that separates one need from another.
pub fn plan_prompt(document: &str, fields: &[TargetField], bounds: GroupBounds) -> ChatPrompt {
    let system = format!(
        "You plan searches over a catalog of data tables.\n\
         Read the requirement document and split its informational needs into \
         between {min} and {max} distinct conceptual groups. Each group must be \
         searchable on its own, without relying on results from another group.\n\
         For each group:\n\
         1. Give it a short descriptive name.\n\
         2. Write exactly one declarative sentence describing the table that would \
         hold this data. Do not join unrelated needs in one sentence.\n\
         3. List the target fields this group is responsible for, using only the \
         exact field names supplied. A field may belong to more than one group \
         (for example a join key shared by two groups).\n\
         Respond with a single JSON object and nothing else:\n\
         {{\"groups\": [{{\"conceptual_group\": \"...\", \"search_query\": \"...\", \
         \"target_fields\": [\"...\"]}}]}}",
        min = bounds.min,
        max = bounds.max,
    );

    let user = format!(
        "Requirement document:\n<<<\n{}\n>>>\n\nTarget fields:\n{}",
        document.trim(),
        render_fields(fields)
    );

    ChatPrompt { system, user }
}

/// Build the fitness-judgment prompt for one candidate.
///
/// Only the step's own fields are shown: the model is never asked whether a
/// table covers the whole requirement.
pub fn fitness_prompt(
    candidate: &Candidate,
    fields: &[TargetField],
    conceptual_group: &str,
) -> ChatPrompt {
    let system = "You check whether a data table can supply a set of required fields.\n\
         Compare column meaning, not just column names: use the column types and \
         descriptions (a column `att` described as \"attendance count\" supplies a \
         field named `attendance`). Judge only the fields listed; other needs are \
         handled elsewhere.\n\
         Answer true only if every listed field can be supplied. If you are unsure, \
         answer false.\n\
         Respond with a single JSON object and nothing else:\n\
         {\"is_good_fit\": true|false, \"reasoning\": \"one or two sentences\"}"
        .to_string();

    let columns = candidate
        .schema
        .iter()
        .map(|c| {
            if c.description.is_empty() {
                format!("- {} ({})", c.name, c.column_type)
            } else {
                format!("- {} ({}): {}", c.name, c.column_type, c.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut user = format!(
        "Conceptual group: {}\n\nTable: {}\n",
        conceptual_group, candidate.table_identity
    );
    if let Some(desc) = &candidate.description {
        user.push_str(&format!("Table description: {}\n", desc));
    }
    user.push_str(&format!(
        "Columns:\n{}\n\nRequired fields:\n{}",
        columns,
        render_fields(fields)
    ));

    ChatPrompt { system, user }
}

/// Locate the JSON object in a model response.
///
/// Accepts a bare object, an object inside a fenced code block, or an object
/// surrounded by prose. Each `{` is tried in turn and the first one that
/// starts a complete JSON object wins, so stray braces in the prose on
/// either side are skipped.
pub fn extract_json_object(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    for (start, _) in trimmed.match_indices('{') {
        let rest = &trimmed[start..];
        let mut values =
            serde_json::Deserializer::from_str(rest).into_iter::<serde_json::Value>();
        if let Some(Ok(serde_json::Value::Object(_))) = values.next() {
            return Ok(&rest[..values.byte_offset()]);
        }
    }
    bail!("response contains no JSON object")
}

/// Parse a plan-generation response into raw groups.
pub fn parse_plan_response(text: &str) -> Result<Vec<ProposedStep>> {
    let json = extract_json_object(text)?;
    let parsed: PlanResponse =
        serde_json::from_str(json).context("plan response is not valid plan JSON")?;
    Ok(parsed.groups)
}

/// Parse a fitness-judgment response.
///
/// `is_good_fit` must be a JSON boolean; strings like `"yes"` or a missing
/// key are errors, which the validator turns into a rejection.
pub fn parse_fitness_response(text: &str) -> Result<ValidationResult> {
    let json = extract_json_object(text)?;
    let value: serde_json::Value =
        serde_json::from_str(json).context("fitness response is not valid JSON")?;

    let is_good_fit = value
        .get("is_good_fit")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| anyhow!("fitness response missing boolean is_good_fit"))?;
    let reasoning = value
        .get("reasoning")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .trim()
        .to_string();

    Ok(ValidationResult {
        is_good_fit,
        reasoning,
    })
}
