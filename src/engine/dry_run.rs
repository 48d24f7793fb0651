// Pawbird Engine — Dry-Run Transport
//
// Used when `bot.debug_mode` is on: writes are logged and never published.
// Reads are forwarded to a live transport when one is configured, otherwise
// they return nothing.

use crate::atoms::error::EngineResult;
use crate::atoms::traits::ContentTransport;
use crate::atoms::types::CandidateContent;
use async_trait::async_trait;
use log::info;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct DryRunTransport {
    reads: Option<Arc<dyn ContentTransport>>,
    /// Every write that would have been published, as (parent_id, text).
    published: Mutex<Vec<(Option<String>, String)>>,
}

impl DryRunTransport {
    pub fn new(reads: Option<Arc<dyn ContentTransport>>) -> Self {
        DryRunTransport { reads, published: Mutex::new(Vec::new()) }
    }

    pub fn published(&self) -> Vec<(Option<String>, String)> {
        self.published.lock().clone()
    }

    fn record(&self, parent_id: Option<&str>, text: &str) -> String {
        let id = format!("dry-run-{}", uuid::Uuid::new_v4());
        match parent_id {
            Some(parent) => info!("[dry-run] Would reply to {}: {}", parent, text),
            None => info!("[dry-run] Would post: {}", text),
        }
        self.published.lock().push((parent_id.map(str::to_string), text.to_string()));
        id
    }
}

#[async_trait]
impl ContentTransport for DryRunTransport {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn fetch_recent_content(&self, account_id: &str, max_results: u32) -> EngineResult<Vec<CandidateContent>> {
        match &self.reads {
            Some(t) => t.fetch_recent_content(account_id, max_results).await,
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_mentions(&self, max_results: u32) -> EngineResult<Vec<CandidateContent>> {
        match &self.reads {
            Some(t) => t.fetch_mentions(max_results).await,
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_trending(&self) -> EngineResult<Vec<String>> {
        match &self.reads {
            Some(t) => t.fetch_trending().await,
            None => Ok(Vec::new()),
        }
    }

    async fn post(&self, text: &str) -> EngineResult<String> {
        Ok(self.record(None, text))
    }

    async fn reply(&self, text: &str, parent_id: &str) -> EngineResult<String> {
        Ok(self.record(Some(parent_id), text))
    }
}
