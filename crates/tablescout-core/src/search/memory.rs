//! In-memory [`SearchBackend`] over a static table catalog.
//!
//! Scores each table by how many distinct query terms occur in its identity,
//! description, column names, and column descriptions, then min-max
//! normalizes the scores. Tables that match no term are not returned.
//! Intended for offline runs and tests; production deployments point the
//! engine at the managed semantic index instead.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Candidate, ColumnSchema};
use crate::text::tokenize;

use super::{normalize_scores, SearchBackend};

/// A table entry as stored in a catalog file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogTable {
    pub identity: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub schema: Vec<ColumnSchema>,
}

/// Catalog file shape: `{"tables": [...]}`.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    tables: Vec<CatalogTable>,
}

struct IndexedTable {
    table: CatalogTable,
    terms: BTreeSet<String>,
}

/// In-memory catalog for offline discovery and tests.
pub struct InMemoryCatalog {
    tables: Vec<IndexedTable>,
}

impl InMemoryCatalog {
    pub fn new(tables: Vec<CatalogTable>) -> Self {
        let tables = tables
            .into_iter()
            .map(|table| {
                let mut terms = tokenize(&table.identity);
                if let Some(desc) = &table.description {
                    terms.extend(tokenize(desc));
                }
                for col in &table.schema {
                    terms.extend(tokenize(&col.name));
                    terms.extend(tokenize(&col.description));
                }
                IndexedTable { table, terms }
            })
            .collect();
        Self { tables }
    }

    /// Parse a catalog from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CatalogFile =
            serde_json::from_str(json).context("Failed to parse catalog JSON")?;
        Ok(Self::new(file.tables))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[async_trait]
impl SearchBackend for InMemoryCatalog {
    fn name(&self) -> &str {
        "catalog"
    }

    async fn search(&self, query: &str, page_size: usize) -> Result<Vec<Candidate>> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let matched: Vec<(&CatalogTable, f64)> = self
            .tables
            .iter()
            .filter_map(|t| {
                let hits = query_terms.intersection(&t.terms).count();
                (hits > 0).then_some((&t.table, hits as f64))
            })
            .collect();

        let raw: Vec<f64> = matched.iter().map(|(_, s)| *s).collect();
        let normalized = normalize_scores(&raw);

        let mut results: Vec<Candidate> = matched
            .into_iter()
            .zip(normalized)
            .map(|((table, _), score)| Candidate {
                table_identity: table.identity.clone(),
                description: table.description.clone(),
                schema: table.schema.clone(),
                relevance_score: score,
            })
            .collect();

        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.table_identity.cmp(&b.table_identity))
        });
        results.truncate(page_size);

        Ok(results)
    }
}
