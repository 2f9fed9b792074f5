//! OpenAI-compatible chat model.
//!
//! [`ChatModel`] sends prompts built by [`tablescout_core::prompt`] to
//! `POST {base_url}/chat/completions` and hands the reply text back to the
//! core parsers. It implements both [`PlanGenerator`] and [`FitnessJudge`],
//! so one configured model can drive planning and validation.
//!
//! With `provider = "disabled"` every call fails with a descriptive error:
//! the planner then falls back to a single step, and an LLM judge would
//! reject every candidate.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;

use tablescout_core::models::{Candidate, TargetField, ValidationResult};
use tablescout_core::planner::PlanGenerator;
use tablescout_core::prompt::{
    fitness_prompt, parse_fitness_response, parse_plan_response, plan_prompt, ChatPrompt,
    GroupBounds, ProposedStep,
};
use tablescout_core::validator::FitnessJudge;

use crate::config::LlmConfig;
use crate::http::post_json_with_retry;

pub struct ChatModel {
    config: LlmConfig,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl ChatModel {
    /// Build a model from config. The API key is read from
    /// `config.api_key_env` now; a missing key only fails at call time.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let api_key = std::env::var(&config.api_key_env).ok();
        Ok(Self {
            config: config.clone(),
            client,
            api_key,
        })
    }

    /// Override the API key (used by tests and embedders).
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    pub fn model_name(&self) -> &str {
        self.config.model.as_deref().unwrap_or("disabled")
    }

    /// Send one system+user exchange and return the reply text.
    pub async fn complete(&self, prompt: &ChatPrompt) -> Result<String> {
        if !self.is_enabled() {
            anyhow::bail!("language model is disabled. Set [llm] provider in config.");
        }
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("{} not set", self.config.api_key_env))?;
        let model = self
            .config
            .model
            .as_ref()
            .ok_or_else(|| anyhow!("llm.model required"))?;

        let body = serde_json::json!({
            "model": model,
            "temperature": self.config.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
        });

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let json = post_json_with_retry(
            &self.client,
            &url,
            Some(api_key),
            &body,
            self.config.max_retries,
            "chat model",
        )
        .await?;

        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content` from a chat completion.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid chat response: missing choices[0].message.content"))
}

#[async_trait]
impl PlanGenerator for ChatModel {
    async fn generate_plan(
        &self,
        document: &str,
        target_fields: &[TargetField],
        bounds: GroupBounds,
    ) -> Result<Vec<ProposedStep>> {
        let reply = self
            .complete(&plan_prompt(document, target_fields, bounds))
            .await?;
        parse_plan_response(&reply)
    }
}

#[async_trait]
impl FitnessJudge for ChatModel {
    fn name(&self) -> &str {
        "llm"
    }

    async fn judge_fitness(
        &self,
        candidate: &Candidate,
        target_fields: &[TargetField],
        conceptual_group: &str,
    ) -> Result<ValidationResult> {
        let reply = self
            .complete(&fitness_prompt(candidate, target_fields, conceptual_group))
            .await?;
        parse_fitness_response(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"groups\": []}" } }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "{\"groups\": []}");

        let err = parse_chat_response(&serde_json::json!({ "choices": [] })).unwrap_err();
        assert!(err.to_string().contains("missing choices"));
    }

    #[tokio::test]
    async fn test_disabled_model_always_errors() {
        let model = ChatModel::new(&LlmConfig::default()).unwrap();
        assert!(!model.is_enabled());
        let err = model
            .generate_plan("doc", &[], GroupBounds::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }
}
