//! Language model clients.
//!
//! The [`LanguageModel`] trait is the seam to the external generation
//! function. Two backends are provided: a local Ollama server and any
//! OpenAI-compatible chat endpoint. [`create_model`] picks one from
//! configuration.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// External generation contract: prompt in, answer text out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier reported back with each answer (e.g. `"ollama:llama3.2"`).
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Build the configured backend.
pub fn create_model(config: &LlmConfig) -> Result<Box<dyn LanguageModel>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaModel::new(config)?)),
        "openai" => Ok(Box::new(OpenAiModel::new(config)?)),
        other => Err(Error::Configuration(format!(
            "unknown llm provider: '{other}'. Must be ollama or openai."
        ))),
    }
}

// ============ Ollama ============

/// Local Ollama server (`POST {endpoint}/api/generate`).
pub struct OllamaModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    label: String,
}

impl OllamaModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            label: format!("ollama:{}", config.model),
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn model_name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": 0.7,
                "num_predict": 1024,
            },
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("could not reach ollama: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("ollama error {status}: {detail}")));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("malformed ollama response: {e}")))?;

        Ok(json
            .get("response")
            .and_then(|r| r.as_str())
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

// ============ OpenAI-compatible ============

/// Any OpenAI-compatible chat completions endpoint
/// (`POST {endpoint}/chat/completions`). Requires `OPENAI_API_KEY`.
pub struct OpenAiModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    label: String,
    api_key: String,
}

impl OpenAiModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            Error::Configuration("OPENAI_API_KEY is required for the openai provider".into())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            label: format!("openai:{}", config.model),
            api_key,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn model_name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.7,
            "max_tokens": 1024,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("could not reach llm service: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("llm error {status}: {detail}")));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("malformed llm response: {e}")))?;

        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| Error::Generation("llm response contained no choices".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_rejects_unknown_provider() {
        let config = LlmConfig {
            provider: "smoke-signals".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            create_model(&config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn ollama_label_includes_model() {
        let config = LlmConfig::default();
        let model = OllamaModel::new(&config).unwrap();
        assert_eq!(model.model_name(), "ollama:llama3.2");
    }
}
