// ── Pawbird Atoms: Error Types ─────────────────────────────────────────────
// Single canonical error enum for the scheduler, built with `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by domain (I/O, Config, Transport, Generation…).
//   • The `#[from]` attribute wires std/external error conversions automatically.
//   • Transport and Generation errors are never fatal: the orchestrator catches
//     them at the tick boundary and turns them into "skip this item".
//   • No variant carries secret material (access tokens, API keys) in its message.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML config or catalog could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP / network failure (reqwest layer).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Microblogging platform read or write failure (auth, rate limit, API error).
    #[error("Transport error: {operation}: {message}")]
    Transport { operation: String, message: String },

    /// Text generator failure (quota, timeout, malformed response).
    #[error("Generation error: {provider}: {message}")]
    Generation { provider: String, message: String },

    /// Bot configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Account or tag catalog failed validation.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Catch-all for errors that do not yet have a dedicated variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl EngineError {
    /// Create a transport error with operation name and message.
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport { operation: operation.into(), message: message.into() }
    }

    /// Create a generation error with provider name and message.
    pub fn generation(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generation { provider: provider.into(), message: message.into() }
    }

    /// Create a catalog validation error.
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog(message.into())
    }
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError::Other(s)
    }
}

impl From<&str> for EngineError {
    fn from(s: &str) -> Self {
        EngineError::Other(s.to_string())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All fallible scheduler operations return this type.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display_includes_operation() {
        let e = EngineError::transport("fetch_mentions", "429 Too Many Requests");
        assert_eq!(e.to_string(), "Transport error: fetch_mentions: 429 Too Many Requests");
    }

    #[test]
    fn generation_error_display_includes_provider() {
        let e = EngineError::generation("openai", "timeout");
        assert_eq!(e.to_string(), "Generation error: openai: timeout");
    }

    #[test]
    fn string_converts_to_other() {
        let e: EngineError = "boom".into();
        assert!(matches!(e, EngineError::Other(ref s) if s == "boom"));
    }
}
