//! Semantic search backend abstraction and the per-step search executor.
//!
//! The [`SearchBackend`] trait is the only thing the engine knows about the
//! managed metadata index: a ranked-retrieval call taking a query and a page
//! size. [`SearchExecutor`] adapts one [`SearchStep`] into such a call and
//! never fails: a backend error turns into an empty step with the error
//! attached.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Candidate, SearchStep};

/// Ranked retrieval over indexed table metadata.
///
/// Implementations perform their own relevance ranking; the engine never
/// re-ranks what they return.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use tablescout_core::models::Candidate;
/// use tablescout_core::search::SearchBackend;
///
/// struct EmptyIndex;
///
/// #[async_trait]
/// impl SearchBackend for EmptyIndex {
///     fn name(&self) -> &str { "empty" }
///
///     async fn search(&self, _query: &str, _page_size: usize) -> Result<Vec<Candidate>> {
///         Ok(vec![])
///     }
/// }
/// ```
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Short backend label used in logs (e.g. `"catalog"`, `"http"`).
    fn name(&self) -> &str;

    /// Return at most `page_size` candidates for `query`, most relevant first.
    async fn search(&self, query: &str, page_size: usize) -> Result<Vec<Candidate>>;
}

/// Candidates produced for one step, plus the backend error if the search
/// could not be performed.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSearch {
    pub candidates: Vec<Candidate>,
    pub error: Option<String>,
}

/// Pure adapter from a [`SearchStep`] to a bounded backend call.
#[derive(Clone)]
pub struct SearchExecutor {
    backend: Arc<dyn SearchBackend>,
    page_size: usize,
}

impl SearchExecutor {
    /// Create an executor. A page size of zero is raised to one.
    pub fn new(backend: Arc<dyn SearchBackend>, page_size: usize) -> Self {
        Self {
            backend,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Issue the step's query and return candidates in backend order.
    pub async fn execute(&self, step: &SearchStep) -> StepSearch {
        match self
            .backend
            .search(&step.search_query, self.page_size)
            .await
        {
            Ok(mut candidates) => {
                candidates.truncate(self.page_size);
                tracing::debug!(
                    backend = self.backend.name(),
                    group = %step.conceptual_group,
                    candidates = candidates.len(),
                    "search returned"
                );
                StepSearch {
                    candidates,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    group = %step.conceptual_group,
                    error = %e,
                    "search failed; step continues with no candidates"
                );
                StepSearch {
                    candidates: Vec::new(),
                    error: Some(format!("{:#}", e)),
                }
            }
        }
    }
}

/// Min-max normalize raw scores to `[0.0, 1.0]`.
///
/// If all scores are equal, they are normalized to `1.0`.
pub fn normalize_scores(raw: &[f64]) -> Vec<f64> {
    if raw.is_empty() {
        return Vec::new();
    }

    let s_min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let s_max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    raw.iter()
        .map(|s| {
            if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (s - s_min) / (s_max - s_min)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::Mutex;

    fn candidate(id: &str, score: f64) -> Candidate {
        Candidate {
            table_identity: id.to_string(),
            description: None,
            schema: vec![],
            relevance_score: score,
        }
    }

    fn step(query: &str) -> SearchStep {
        SearchStep {
            conceptual_group: "g".to_string(),
            search_query: query.to_string(),
            target_fields: vec![],
        }
    }

    /// Returns a fixed list regardless of page size and records requests.
    struct FixedBackend {
        results: Vec<Candidate>,
        requests: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl SearchBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn search(&self, query: &str, page_size: usize) -> Result<Vec<Candidate>> {
            self.requests
                .lock()
                .unwrap()
                .push((query.to_string(), page_size));
            Ok(self.results.clone())
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl SearchBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        async fn search(&self, _query: &str, _page_size: usize) -> Result<Vec<Candidate>> {
            bail!("index unavailable")
        }
    }

    #[tokio::test]
    async fn test_execute_preserves_order_and_bounds_page() {
        let backend = Arc::new(FixedBackend {
            results: vec![
                candidate("t1", 0.9),
                candidate("t2", 0.95),
                candidate("t3", 0.1),
            ],
            requests: Mutex::new(Vec::new()),
        });
        let executor = SearchExecutor::new(backend.clone(), 2);

        let out = executor.execute(&step("weekly predictions")).await;

        let ids: Vec<&str> = out
            .candidates
            .iter()
            .map(|c| c.table_identity.as_str())
            .collect();
        assert_eq!(ids, vec!["t1", "t2"], "backend order kept, truncated to page");
        assert!(out.error.is_none());
        assert_eq!(
            backend.requests.lock().unwrap().as_slice(),
            &[("weekly predictions".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn test_execute_failure_yields_empty_step() {
        let executor = SearchExecutor::new(Arc::new(FailingBackend), 10);
        let out = executor.execute(&step("anything")).await;
        assert!(out.candidates.is_empty());
        assert!(out.error.unwrap().contains("index unavailable"));
    }

    #[test]
    fn test_zero_page_size_is_raised() {
        let executor = SearchExecutor::new(Arc::new(FailingBackend), 0);
        assert_eq!(executor.page_size(), 1);
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize_scores(&[]).is_empty());
    }

    #[test]
    fn test_normalize_range() {
        let result = normalize_scores(&[10.0, 5.0, 0.0]);
        assert!((result[0] - 1.0).abs() < 1e-9);
        assert!((result[1] - 0.5).abs() < 1e-9);
        assert!((result[2] - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_all_equal() {
        for score in normalize_scores(&[3.0, 3.0]) {
            assert!((score - 1.0).abs() < 1e-9);
        }
    }
}
