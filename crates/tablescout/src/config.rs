//! TOML configuration parsing and validation.
//!
//! ```toml
//! [search]
//! provider = "catalog"            # or "http"
//! catalog_path = "./catalog.json"
//! page_size = 10
//!
//! [llm]
//! provider = "openai"             # or "disabled"
//! model = "gpt-4o-mini"
//!
//! [discovery]
//! judge = "llm"                   # or "lexical"
//! validation_concurrency = 4
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub search: SearchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// `"catalog"` (local JSON catalog) or `"http"` (remote semantic index).
    pub provider: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Environment variable holding a bearer token for the `http` provider.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_page_size() -> usize {
    10
}
fn default_search_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            temperature: 0.0,
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

fn default_llm_provider() -> String {
    "disabled".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryConfig {
    /// `"lexical"` or `"llm"`.
    #[serde(default = "default_judge")]
    pub judge: String,
    #[serde(default = "default_validation_concurrency")]
    pub validation_concurrency: usize,
    #[serde(default = "default_min_groups")]
    pub min_groups: usize,
    #[serde(default = "default_max_groups")]
    pub max_groups: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            judge: default_judge(),
            validation_concurrency: default_validation_concurrency(),
            min_groups: default_min_groups(),
            max_groups: default_max_groups(),
        }
    }
}

fn default_judge() -> String {
    "lexical".to_string()
}
fn default_validation_concurrency() -> usize {
    4
}
fn default_min_groups() -> usize {
    2
}
fn default_max_groups() -> usize {
    6
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    // Validate search
    match config.search.provider.as_str() {
        "catalog" => {
            if config.search.catalog_path.is_none() {
                anyhow::bail!("search.catalog_path must be set when provider is 'catalog'");
            }
        }
        "http" => {
            if config.search.endpoint.is_none() {
                anyhow::bail!("search.endpoint must be set when provider is 'http'");
            }
        }
        other => anyhow::bail!(
            "Unknown search provider: '{}'. Must be catalog or http.",
            other
        ),
    }
    if config.search.page_size == 0 {
        anyhow::bail!("search.page_size must be >= 1");
    }

    // Validate llm
    match config.llm.provider.as_str() {
        "disabled" => {}
        "openai" => {
            if config.llm.model.is_none() {
                anyhow::bail!("llm.model must be specified when provider is 'openai'");
            }
        }
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    // Validate discovery
    match config.discovery.judge.as_str() {
        "lexical" => {}
        "llm" => {
            if !config.llm.is_enabled() {
                anyhow::bail!("discovery.judge = 'llm' requires an enabled [llm] provider");
            }
        }
        other => anyhow::bail!("Unknown judge: '{}'. Must be lexical or llm.", other),
    }
    if config.discovery.validation_concurrency == 0 {
        anyhow::bail!("discovery.validation_concurrency must be >= 1");
    }
    if config.discovery.min_groups == 0 {
        anyhow::bail!("discovery.min_groups must be >= 1");
    }
    if config.discovery.max_groups < config.discovery.min_groups {
        anyhow::bail!("discovery.max_groups must be >= discovery.min_groups");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate_config(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_catalog_config_uses_defaults() {
        let cfg = parse(
            r#"
[search]
provider = "catalog"
catalog_path = "catalog.json"
"#,
        )
        .unwrap();
        assert_eq!(cfg.search.page_size, 10);
        assert!(!cfg.llm.is_enabled());
        assert_eq!(cfg.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(cfg.discovery.judge, "lexical");
        assert_eq!(cfg.discovery.validation_concurrency, 4);
        assert_eq!((cfg.discovery.min_groups, cfg.discovery.max_groups), (2, 6));
        assert_eq!(cfg.server.bind, "127.0.0.1:7341");
    }

    #[test]
    fn test_llm_judge_requires_llm() {
        let err = parse(
            r#"
[search]
provider = "catalog"
catalog_path = "catalog.json"

[discovery]
judge = "llm"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("requires an enabled"));
    }

    #[test]
    fn test_openai_requires_model() {
        assert!(parse(
            r#"
[search]
provider = "catalog"
catalog_path = "catalog.json"

[llm]
provider = "openai"
"#,
        )
        .is_err());
    }

    #[test]
    fn test_rejects_unknown_providers_and_bad_bounds() {
        assert!(parse("[search]\nprovider = \"elastic\"\n").is_err());
        assert!(parse("[search]\nprovider = \"http\"\n").is_err());
        assert!(parse(
            "[search]\nprovider = \"http\"\nendpoint = \"http://x\"\npage_size = 0\n"
        )
        .is_err());
        assert!(parse(
            "[search]\nprovider = \"http\"\nendpoint = \"http://x\"\n\n[discovery]\nmin_groups = 4\nmax_groups = 3\n"
        )
        .is_err());
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/scout.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
