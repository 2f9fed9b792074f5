//! Context-scoped fitness validation.
//!
//! A candidate is only ever judged against the fields of the step that
//! retrieved it. A table that covers three of ten requirement fields is a
//! good result when those three are exactly what its step asked for.
//!
//! [`FitnessValidator`] wraps a [`FitnessJudge`] and fails closed: any
//! judgment error rejects the candidate.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Candidate, ColumnSchema, TargetField, ValidationResult};
use crate::text::{normalize_name, tokenize};

/// Decides whether a candidate's schema can supply a set of fields.
#[async_trait]
pub trait FitnessJudge: Send + Sync {
    /// Short label used in logs (e.g. `"llm"`, `"lexical"`).
    fn name(&self) -> &str;

    async fn judge_fitness(
        &self,
        candidate: &Candidate,
        target_fields: &[TargetField],
        conceptual_group: &str,
    ) -> Result<ValidationResult>;
}

/// Scoped, fail-closed validator used by the orchestrator.
#[derive(Clone)]
pub struct FitnessValidator {
    judge: Arc<dyn FitnessJudge>,
}

impl FitnessValidator {
    pub fn new(judge: Arc<dyn FitnessJudge>) -> Self {
        Self { judge }
    }

    /// Judge `candidate` against `target_fields` for one conceptual group.
    ///
    /// An empty field list accepts every candidate without consulting the
    /// judge. A judge error yields `is_good_fit = false` with the error as
    /// the reasoning.
    pub async fn validate(
        &self,
        candidate: &Candidate,
        target_fields: &[TargetField],
        conceptual_group: &str,
    ) -> ValidationResult {
        if target_fields.is_empty() {
            return ValidationResult::fit("no target fields to check for this group");
        }

        match self
            .judge
            .judge_fitness(candidate, target_fields, conceptual_group)
            .await
        {
            Ok(result) => {
                tracing::debug!(
                    judge = self.judge.name(),
                    group = conceptual_group,
                    table = %candidate.table_identity,
                    is_good_fit = result.is_good_fit,
                    reasoning = %result.reasoning,
                    "candidate judged"
                );
                result
            }
            Err(e) => {
                tracing::warn!(
                    judge = self.judge.name(),
                    group = conceptual_group,
                    table = %candidate.table_identity,
                    error = %e,
                    "fitness judgment failed; rejecting candidate"
                );
                ValidationResult::reject(format!("fitness judgment failed: {:#}", e))
            }
        }
    }
}

// ============ Lexical Judge ============

/// Deterministic judge that matches fields to columns by name and description.
///
/// A field is satisfied by a column when their normalized names are equal,
/// or when every term of the field name appears among the column's name and
/// description terms. A column `att` described as "attendance count"
/// therefore satisfies a field named `attendance`. The candidate fits only
/// when every field is satisfied.
///
/// Needs no network access, which makes it the default for offline catalogs
/// and the reference judge in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalJudge;

impl LexicalJudge {
    fn satisfies(field: &TargetField, column: &ColumnSchema) -> bool {
        let field_norm = normalize_name(&field.name);
        if !field_norm.is_empty() && field_norm == normalize_name(&column.name) {
            return true;
        }

        let field_terms = tokenize(&field.name);
        if field_terms.is_empty() {
            return false;
        }
        let mut column_terms: BTreeSet<String> = tokenize(&column.name);
        column_terms.extend(tokenize(&column.description));
        field_terms.is_subset(&column_terms)
    }

    /// Evaluate synchronously; the async trait method delegates here.
    pub fn evaluate(&self, candidate: &Candidate, target_fields: &[TargetField]) -> ValidationResult {
        let mut matched = Vec::new();
        let mut missing = Vec::new();

        for field in target_fields {
            match candidate
                .schema
                .iter()
                .find(|col| Self::satisfies(field, col))
            {
                Some(col) if col.name == field.name => matched.push(field.name.clone()),
                Some(col) => matched.push(format!("{} (as {})", field.name, col.name)),
                None => missing.push(field.name.clone()),
            }
        }

        if missing.is_empty() {
            ValidationResult::fit(format!("provides {}", matched.join(", ")))
        } else if matched.is_empty() {
            ValidationResult::reject(format!("missing {}", missing.join(", ")))
        } else {
            ValidationResult::reject(format!(
                "provides {} but missing {}",
                matched.join(", "),
                missing.join(", ")
            ))
        }
    }
}

#[async_trait]
impl FitnessJudge for LexicalJudge {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn judge_fitness(
        &self,
        candidate: &Candidate,
        target_fields: &[TargetField],
        _conceptual_group: &str,
    ) -> Result<ValidationResult> {
        Ok(self.evaluate(candidate, target_fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn predictions_table() -> Candidate {
        Candidate {
            table_identity: "analytics.nfl.weekly_predictions".to_string(),
            description: None,
            schema: vec![
                ColumnSchema::new("game_id", "STRING", ""),
                ColumnSchema::new("predicted_spread", "FLOAT64", ""),
                ColumnSchema::new("tier", "STRING", ""),
                ColumnSchema::new("model_version", "STRING", ""),
            ],
            relevance_score: 0.9,
        }
    }

    fn fields(names: &[&str]) -> Vec<TargetField> {
        names
            .iter()
            .map(|n| TargetField::new(*n, "STRING", ""))
            .collect()
    }

    struct ErrorJudge {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FitnessJudge for ErrorJudge {
        fn name(&self) -> &str {
            "error"
        }

        async fn judge_fitness(
            &self,
            _candidate: &Candidate,
            _target_fields: &[TargetField],
            _conceptual_group: &str,
        ) -> Result<ValidationResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            bail!("rate limited")
        }
    }

    #[test]
    fn test_lexical_scoped_to_group_fields() {
        let judge = LexicalJudge;
        let live = judge.evaluate(
            &predictions_table(),
            &fields(&["game_id", "predicted_spread", "tier"]),
        );
        assert!(live.is_good_fit, "{}", live.reasoning);

        let backtest = judge.evaluate(
            &predictions_table(),
            &fields(&["game_id", "actual_spread", "backtest_run_id"]),
        );
        assert!(!backtest.is_good_fit);
        assert!(backtest.reasoning.contains("missing actual_spread, backtest_run_id"));
        assert!(backtest.reasoning.contains("provides game_id"));
    }

    #[test]
    fn test_lexical_uses_column_descriptions() {
        let candidate = Candidate {
            table_identity: "ops.stadium.attendance".to_string(),
            description: None,
            schema: vec![ColumnSchema::new("att", "INT64", "attendance count")],
            relevance_score: 1.0,
        };
        let result = LexicalJudge.evaluate(&candidate, &fields(&["attendance"]));
        assert!(result.is_good_fit);
        assert_eq!(result.reasoning, "provides attendance (as att)");
    }

    #[test]
    fn test_lexical_name_normalization() {
        let result = LexicalJudge.evaluate(&predictions_table(), &fields(&["GameID", "Tier"]));
        assert!(result.is_good_fit, "{}", result.reasoning);
    }

    #[tokio::test]
    async fn test_validator_fails_closed() {
        let judge = Arc::new(ErrorJudge {
            calls: AtomicUsize::new(0),
        });
        let validator = FitnessValidator::new(judge.clone());
        let result = validator
            .validate(&predictions_table(), &fields(&["game_id"]), "live")
            .await;
        assert!(!result.is_good_fit);
        assert!(result.reasoning.contains("rate limited"));
        assert_eq!(judge.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validator_empty_fields_pass_without_judge() {
        let judge = Arc::new(ErrorJudge {
            calls: AtomicUsize::new(0),
        });
        let validator = FitnessValidator::new(judge.clone());
        let result = validator.validate(&predictions_table(), &[], "general").await;
        assert!(result.is_good_fit);
        assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
    }
}
