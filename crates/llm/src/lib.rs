//! Chat-completion client for digest generation.
//!
//! The summarization provider is consumed as a black-box text-completion
//! call: one system instruction, one user message, one completion back.
//! [`ChatCompletion`] is the seam the digest generator depends on, so tests
//! can substitute a canned client.

use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use serde_json::json;

#[async_trait::async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Settings for [`DeepSeekClient`]. The endpoint speaks the
/// OpenAI-compatible `/chat/completions` dialect, so pointing `base_url`
/// at any compatible provider works.
#[derive(Debug, Clone)]
pub struct DeepSeekConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DeepSeekClient {
    client: reqwest::Client,
    config: DeepSeekConfig,
}

impl DeepSeekClient {
    /// Fails when the API key is empty. The service must not start without
    /// a credential, and construction happens before any timer is spawned.
    pub fn new(config: DeepSeekConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            bail!("summarizer API key is not set");
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait::async_trait]
impl ChatCompletion for DeepSeekClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let endpoint = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let payload = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": self.config.temperature,
            "stream": false
        });

        tracing::debug!(model = %self.config.model, "requesting completion");
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            bail!("completion request failed ({status}): {body}");
        }

        body.get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(ToString::to_string)
            .ok_or_else(|| anyhow!("completion response missing text: {body}"))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: &str) -> DeepSeekConfig {
        DeepSeekConfig {
            api_key: key.to_string(),
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            temperature: 0.7,
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(DeepSeekClient::new(config("")).is_err());
        assert!(DeepSeekClient::new(config("   ")).is_err());
    }

    #[test]
    fn non_empty_api_key_constructs() {
        assert!(DeepSeekClient::new(config("sk-test")).is_ok());
    }
}
