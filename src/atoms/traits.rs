// ── Pawbird Atoms: Collaborator Traits ────────────────────────────────────
// The orchestrator never talks to an SDK directly; it holds trait objects.
// Generators live in engine/providers; transports in engine/twitter and
// engine/dry_run.

use crate::atoms::error::EngineResult;
use crate::atoms::types::CandidateContent;
use async_trait::async_trait;

/// External text generator (LLM). Failures map to `EngineError::Generation`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short provider label for logs ("openai", "anthropic").
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f64) -> EngineResult<String>;
}

/// Microblogging platform transport. Failures map to `EngineError::Transport`.
///
/// Write calls expect text already truncated to the platform limit.
#[async_trait]
pub trait ContentTransport: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_recent_content(&self, account_id: &str, max_results: u32) -> EngineResult<Vec<CandidateContent>>;

    async fn fetch_mentions(&self, max_results: u32) -> EngineResult<Vec<CandidateContent>>;

    async fn fetch_trending(&self) -> EngineResult<Vec<String>>;

    /// Publish a new post, returning its id.
    async fn post(&self, text: &str) -> EngineResult<String>;

    /// Reply to `parent_id`, returning the new post id.
    async fn reply(&self, text: &str, parent_id: &str) -> EngineResult<String>;
}
