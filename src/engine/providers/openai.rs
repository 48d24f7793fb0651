// Pawbird Engine — OpenAI-Compatible Generator
// Handles: OpenAI, OpenRouter, Ollama and any OpenAI-compatible REST API.
// Non-streaming: a reply is one short completion.

use super::{clean_output, send_json};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::traits::TextGenerator;
use crate::engine::config::LlmConfig;
use crate::engine::http::{build_client, CircuitBreaker};
use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde_json::{json, Value};

pub struct OpenAiGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    circuit: CircuitBreaker,
}

impl OpenAiGenerator {
    pub fn new(config: &LlmConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_string());
        OpenAiGenerator {
            client: build_client(),
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            circuit: CircuitBreaker::new("openai", 5, 60),
        }
    }

    fn request_body(&self, prompt: &str, max_tokens: u32, temperature: f64) -> Value {
        json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": max_tokens,
            "temperature": temperature,
        })
    }

    fn extract_text(body: &Value) -> Option<String> {
        body["choices"].get(0)?["message"]["content"]
            .as_str()
            .map(clean_output)
            .filter(|s| !s.is_empty())
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f64) -> EngineResult<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = self.request_body(prompt, max_tokens, temperature);
        info!("[llm] OpenAI request to {} model={}", url, self.model);

        let response = send_json(self.name(), &self.circuit, || {
            self.client
                .post(&url)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
        })
        .await?;

        Self::extract_text(&response)
            .ok_or_else(|| EngineError::generation(self.name(), "response carried no message content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": " \"PeerDAS ships soon\" "}}]});
        assert_eq!(OpenAiGenerator::extract_text(&body).as_deref(), Some("PeerDAS ships soon"));
    }

    #[test]
    fn empty_or_missing_content_is_none() {
        assert!(OpenAiGenerator::extract_text(&json!({"choices": []})).is_none());
        let blank = json!({"choices": [{"message": {"content": "   "}}]});
        assert!(OpenAiGenerator::extract_text(&blank).is_none());
    }

    #[test]
    fn request_body_carries_sampling_params() {
        let cfg = LlmConfig { api_key: "k".into(), ..LlmConfig::default() };
        let g = OpenAiGenerator::new(&cfg);
        let body = g.request_body("hi", 60, 0.5);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 60);
        assert_eq!(body["messages"][0]["content"], "hi");
    }
}
