//! Search backend construction and the remote HTTP index adapter.
//!
//! [`create_backend`] picks the backend from `[search].provider`:
//!
//! - `catalog` loads a JSON catalog file into an
//!   [`InMemoryCatalog`](tablescout_core::search::memory::InMemoryCatalog).
//! - `http` talks to a remote semantic index through [`HttpSearchBackend`].
//!
//! # Remote wire format
//!
//! Request: `POST {endpoint}` with `{"query": "...", "page_size": 10}`.
//!
//! Response:
//!
//! ```json
//! { "results": [
//!     { "identity": "analytics.nfl.backtest_runs",
//!       "description": "Backtest runs",
//!       "schema": [{"name": "game_id", "type": "STRING"}],
//!       "score": 0.87 } ] }
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use tablescout_core::models::{Candidate, ColumnSchema};
use tablescout_core::search::memory::InMemoryCatalog;
use tablescout_core::search::SearchBackend;

use crate::config::SearchConfig;
use crate::http::post_json_with_retry;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<RemoteTable>,
}

#[derive(Debug, Deserialize)]
struct RemoteTable {
    identity: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    schema: Vec<ColumnSchema>,
    #[serde(default)]
    score: f64,
}

impl From<RemoteTable> for Candidate {
    fn from(t: RemoteTable) -> Self {
        Candidate {
            table_identity: t.identity,
            description: t.description,
            schema: t.schema,
            relevance_score: t.score,
        }
    }
}

/// Client for a remote semantic table index.
pub struct HttpSearchBackend {
    endpoint: String,
    bearer: Option<String>,
    max_retries: u32,
    client: reqwest::Client,
}

impl HttpSearchBackend {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("search.endpoint required"))?;
        let bearer = match &config.api_key_env {
            Some(var) => Some(
                std::env::var(var).with_context(|| format!("{} not set", var))?,
            ),
            None => None,
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint,
            bearer,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn search(&self, query: &str, page_size: usize) -> Result<Vec<Candidate>> {
        let body = serde_json::json!({
            "query": query,
            "page_size": page_size,
        });
        let json = post_json_with_retry(
            &self.client,
            &self.endpoint,
            self.bearer.as_deref(),
            &body,
            self.max_retries,
            "search index",
        )
        .await?;

        let response: SearchResponse =
            serde_json::from_value(json).context("Invalid search index response")?;
        Ok(response.results.into_iter().map(Candidate::from).collect())
    }
}

/// Build the configured search backend.
pub fn create_backend(config: &SearchConfig) -> Result<Arc<dyn SearchBackend>> {
    match config.provider.as_str() {
        "catalog" => {
            let path = config
                .catalog_path
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("search.catalog_path required"))?;
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
            let catalog = InMemoryCatalog::from_json(&json)?;
            tracing::info!(tables = catalog.len(), path = %path.display(), "catalog loaded");
            Ok(Arc::new(catalog))
        }
        "http" => Ok(Arc::new(HttpSearchBackend::new(config)?)),
        other => anyhow::bail!("Unknown search provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_table_maps_to_candidate() {
        let response: SearchResponse = serde_json::from_str(
            r#"{"results": [
                {"identity": "a.b.c", "schema": [{"name": "x", "type": "INT64"}], "score": 0.5},
                {"identity": "a.b.d", "description": "desc"}
            ]}"#,
        )
        .unwrap();
        let candidates: Vec<Candidate> = response.results.into_iter().map(Candidate::from).collect();

        assert_eq!(candidates[0].table_identity, "a.b.c");
        assert_eq!(candidates[0].schema[0].column_type, "INT64");
        assert_eq!(candidates[0].relevance_score, 0.5);
        assert_eq!(candidates[1].description.as_deref(), Some("desc"));
        assert!(candidates[1].schema.is_empty());
    }

    #[test]
    fn test_catalog_backend_requires_readable_file() {
        let config = SearchConfig {
            provider: "catalog".to_string(),
            endpoint: None,
            api_key_env: None,
            catalog_path: Some("/nonexistent/catalog.json".into()),
            page_size: 10,
            timeout_secs: 30,
            max_retries: 3,
        };
        let err = create_backend(&config).err().unwrap();
        assert!(err.to_string().contains("Failed to read catalog"));
    }
}
