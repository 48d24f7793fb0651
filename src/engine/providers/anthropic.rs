// Pawbird Engine — Anthropic Claude Generator
// Messages API, non-streaming.

use super::{clean_output, send_json};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::traits::TextGenerator;
use crate::engine::config::LlmConfig;
use crate::engine::http::{build_client, CircuitBreaker};
use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde_json::{json, Value};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    circuit: CircuitBreaker,
}

impl AnthropicGenerator {
    pub fn new(config: &LlmConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_string());
        AnthropicGenerator {
            client: build_client(),
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            circuit: CircuitBreaker::new("anthropic", 5, 60),
        }
    }

    /// Concatenate every text block in the response.
    fn extract_text(body: &Value) -> Option<String> {
        let text: String = body["content"]
            .as_array()?
            .iter()
            .filter(|b| b["type"] == "text")
            .filter_map(|b| b["text"].as_str())
            .collect();
        Some(clean_output(&text)).filter(|s| !s.is_empty())
    }
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f64) -> EngineResult<String> {
        let url = format!("{}/messages", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            // Anthropic caps temperature at 1.0
            "temperature": temperature.min(1.0),
            "messages": [{"role": "user", "content": prompt}],
        });
        info!("[llm] Anthropic request to {} model={}", url, self.model);

        let response = send_json(self.name(), &self.circuit, || {
            self.client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body)
        })
        .await?;

        Self::extract_text(&response)
            .ok_or_else(|| EngineError::generation(self.name(), "response carried no text block"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_blocks() {
        let body = json!({"content": [
            {"type": "text", "text": "blobs are "},
            {"type": "text", "text": "cheap now"}
        ]});
        assert_eq!(AnthropicGenerator::extract_text(&body).as_deref(), Some("blobs are cheap now"));
    }

    #[test]
    fn no_text_is_none() {
        assert!(AnthropicGenerator::extract_text(&json!({"content": []})).is_none());
        assert!(AnthropicGenerator::extract_text(&json!({"error": "x"})).is_none());
    }
}
