// Pawbird Engine — Text Generator Registry
// AnyGenerator wraps Box<dyn TextGenerator> so adding a new LLM backend
// never requires modifying the orchestrator — just implement the trait.

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicGenerator;
pub use openai::OpenAiGenerator;

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::traits::TextGenerator;
use crate::atoms::types::truncate_chars;
use crate::engine::config::{LlmConfig, ProviderKind};
use crate::engine::http::{is_retryable_status, parse_retry_after, retry_delay, CircuitBreaker, MAX_RETRIES};
use async_trait::async_trait;
use log::{error, warn};
use reqwest::RequestBuilder;
use serde_json::Value;

// ── Generator factory ──────────────────────────────────────────────────────

/// Type-erased text generator. Callers hold `AnyGenerator` (or an
/// `Arc<dyn TextGenerator>`) without knowing which backend is in use.
pub struct AnyGenerator(Box<dyn TextGenerator>);

impl AnyGenerator {
    /// Construct the right concrete generator from the `[llm]` section.
    pub fn from_config(config: &LlmConfig) -> EngineResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(EngineError::Config(format!(
                "llm.api_key is empty (set it in the config or via {})",
                crate::atoms::constants::ENV_LLM_API_KEY
            )));
        }
        let generator: Box<dyn TextGenerator> = match config.provider {
            ProviderKind::Anthropic => Box::new(AnthropicGenerator::new(config)),
            ProviderKind::OpenAI => Box::new(OpenAiGenerator::new(config)),
        };
        Ok(AnyGenerator(generator))
    }
}

#[async_trait]
impl TextGenerator for AnyGenerator {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f64) -> EngineResult<String> {
        self.0.generate(prompt, max_tokens, temperature).await
    }
}

// ── Shared request loop ────────────────────────────────────────────────────

/// Send a JSON request with retry + circuit breaker and return the parsed body.
///
/// `build` is called once per attempt since a `RequestBuilder` is consumed by `send`.
/// 429 is retried here (generation is cheap to retry, unlike platform writes).
pub(crate) async fn send_json<F>(provider: &str, circuit: &CircuitBreaker, build: F) -> EngineResult<Value>
where
    F: Fn() -> RequestBuilder,
{
    circuit.check().map_err(|msg| EngineError::generation(provider, msg))?;

    let mut last_error = String::new();
    let mut retry_after: Option<u64> = None;

    for attempt in 0..=MAX_RETRIES {
        if attempt > 0 {
            let delay = retry_delay(attempt - 1, retry_after.take()).await;
            warn!("[llm] {} retry {}/{} after {}ms", provider, attempt, MAX_RETRIES, delay.as_millis());
        }

        let response = match build().send().await {
            Ok(r) => r,
            Err(e) => {
                circuit.record_failure();
                last_error = format!("HTTP request failed: {}", e);
                continue;
            }
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body_text = response.text().await.unwrap_or_default();
            last_error = format!("API error {}: {}", status, truncate_chars(&body_text, 200));
            error!("[llm] {} error {}: {}", provider, status, truncate_chars(&body_text, 500));
            circuit.record_failure();

            // Auth errors are never retried
            if status == 401 || status == 403 {
                return Err(EngineError::generation(provider, last_error));
            }
            if is_retryable_status(status) || status == 429 {
                continue;
            }
            return Err(EngineError::generation(provider, last_error));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| EngineError::generation(provider, format!("malformed response: {}", e)))?;
        circuit.record_success();
        return Ok(body);
    }

    Err(EngineError::generation(provider, last_error))
}

/// Trim generator output and strip wrapping quotes models like to add.
pub(crate) fn clean_output(text: &str) -> String {
    let t = text.trim();
    let t = t
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(t);
    t.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_output_strips_quotes_and_whitespace() {
        assert_eq!(clean_output("  \"gm builders\"\n"), "gm builders");
        assert_eq!(clean_output("no quotes"), "no quotes");
        assert_eq!(clean_output("\"only leading"), "\"only leading");
    }

    #[test]
    fn factory_rejects_missing_key() {
        let cfg = LlmConfig::default();
        assert!(matches!(AnyGenerator::from_config(&cfg), Err(EngineError::Config(_))));
    }

    #[test]
    fn factory_picks_backend_by_kind() {
        let mut cfg = LlmConfig { api_key: "k".into(), ..LlmConfig::default() };
        assert_eq!(AnyGenerator::from_config(&cfg).unwrap().name(), "openai");
        cfg.provider = ProviderKind::Anthropic;
        assert_eq!(AnyGenerator::from_config(&cfg).unwrap().name(), "anthropic");
    }
}
