//! Tool trait and registry for the HTTP tool server.
//!
//! Discovery is exposed to agents as callable tools. Each tool declares an
//! OpenAI function-calling parameter schema, is listed by `GET /tools/list`,
//! and is invoked through `POST /tools/{name}`.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              ToolRegistry                │
//! │  ┌─────────────────┐ ┌────────────────┐  │
//! │  │ discover_tables │ │  plan_search   │  │
//! │  └─────────────────┘ └────────────────┘  │
//! │  ┌────────────────────────────────────┐  │
//! │  │     custom (Rust) tools            │  │
//! │  └────────────────────────────────────┘  │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!          run_server() → HTTP API
//! ```
//!
//! # Example
//!
//! ```rust
//! use tablescout::traits::ToolRegistry;
//!
//! let tools = ToolRegistry::with_builtins();
//! assert_eq!(tools.len(), 2);
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use tablescout_core::{CancellationSignal, Discovery, DiscoveryError, TargetField};

use crate::discover::{run_discovery, run_planning};
use crate::fields::extract_field_table;

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A tool that agents can discover and call.
///
/// Errors wrapping a [`DiscoveryError`] are reported as client errors (400);
/// any other error is a tool failure (500).
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route name (`POST /tools/{name}`); lowercase with underscores.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// Whether this tool ships with the server. Defaults to `false`.
    fn is_builtin(&self) -> bool {
        false
    }

    /// OpenAI function-calling JSON Schema for the parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute with the request body. The returned value is wrapped in
    /// `{ "result": ... }` by the server.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Tool metadata as returned by `GET /tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            builtin: tool.is_builtin(),
            parameters: tool.parameters_schema(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Per-call bridge to the discovery engine.
///
/// The server creates one per request. Its cancellation signal is set if the
/// client disconnects before the tool returns.
pub struct ToolContext {
    discovery: Arc<Discovery>,
    cancel: CancellationSignal,
}

impl ToolContext {
    pub fn new(discovery: Arc<Discovery>, cancel: CancellationSignal) -> Self {
        Self { discovery, cancel }
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    pub fn cancel_signal(&self) -> &CancellationSignal {
        &self.cancel
    }
}

/// Read `document` and `target_fields` from tool parameters.
///
/// When `target_fields` is absent the document's field table is used.
fn discovery_params(params: &Value) -> Result<(String, Vec<TargetField>), DiscoveryError> {
    let document = params
        .get("document")
        .and_then(|d| d.as_str())
        .ok_or_else(|| DiscoveryError::InvalidInput("document must be a string".to_string()))?
        .to_string();

    let fields = match params.get("target_fields") {
        None | Some(Value::Null) => extract_field_table(&document),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            DiscoveryError::InvalidInput(format!("target_fields is malformed: {}", e))
        })?,
    };

    Ok((document, fields))
}

fn discovery_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "document": { "type": "string", "description": "Full requirement document text" },
            "target_fields": {
                "type": "array",
                "description": "Fields to locate; defaults to the document's field table",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "type": { "type": "string" },
                        "description": { "type": "string" }
                    },
                    "required": ["name"]
                }
            }
        },
        "required": ["document"]
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tools
// ═══════════════════════════════════════════════════════════════════════

/// Full discovery: plan, search, and validate each conceptual group.
pub struct DiscoverTablesTool;

#[async_trait]
impl Tool for DiscoverTablesTool {
    fn name(&self) -> &str {
        "discover_tables"
    }

    fn description(&self) -> &str {
        "Find validated tables for each conceptual group of a requirement document"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        discovery_schema()
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let (document, fields) = discovery_params(&params)?;
        let run = run_discovery(ctx.discovery(), &document, &fields, ctx.cancel_signal()).await?;
        Ok(serde_json::to_value(&run)?)
    }
}

/// Planning only: returns the search steps without running them.
pub struct PlanSearchTool;

#[async_trait]
impl Tool for PlanSearchTool {
    fn name(&self) -> &str {
        "plan_search"
    }

    fn description(&self) -> &str {
        "Split a requirement document into conceptual search groups"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        discovery_schema()
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let (document, fields) = discovery_params(&params)?;
        let outcome = run_planning(ctx.discovery(), &document, &fields).await?;
        Ok(serde_json::json!({
            "steps": outcome.plan.steps(),
            "plan_source": outcome.source,
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry of built-in and custom tools.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with `discover_tables` and `plan_search`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DiscoverTablesTool));
        registry.register(Arc::new(PlanSearchTool));
        registry
    }

    /// Register a tool. Lookups return the first tool registered under a name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(registry.len(), 2);
        assert!(registry.find("discover_tables").is_some());
        assert!(registry.find("plan_search").is_some());
        assert!(registry.find("search").is_none());
    }

    #[test]
    fn test_discovery_params_defaults_to_document_table() {
        let params = serde_json::json!({
            "document": "| name | type |\n|---|---|\n| game_id | STRING |\n"
        });
        let (_, fields) = discovery_params(&params).unwrap();
        assert_eq!(fields, vec![TargetField::new("game_id", "STRING", "")]);
    }

    #[test]
    fn test_discovery_params_rejects_bad_shapes() {
        let missing = discovery_params(&serde_json::json!({})).unwrap_err();
        assert!(matches!(missing, DiscoveryError::InvalidInput(_)));

        let bad_fields = discovery_params(&serde_json::json!({
            "document": "doc",
            "target_fields": [{"type": "STRING"}]
        }))
        .unwrap_err();
        assert!(bad_fields.to_string().contains("target_fields is malformed"));
    }
}
