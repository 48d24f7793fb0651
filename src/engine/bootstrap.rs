// Pawbird Engine — Startup Wiring
//
// Turns a loaded `BotConfig` into a ready orchestrator: catalogs from disk,
// the configured text generator, and either the live or the dry-run
// transport. Any error here is fatal for the process.

use crate::atoms::error::EngineResult;
use crate::atoms::traits::{ContentTransport, TextGenerator};
use crate::engine::config::BotConfig;
use crate::engine::dry_run::DryRunTransport;
use crate::engine::orchestrator::Orchestrator;
use crate::engine::providers::AnyGenerator;
use crate::engine::registry::AccountCatalog;
use crate::engine::tagger::TagCatalog;
use crate::engine::twitter::TwitterTransport;
use log::{info, warn};
use std::sync::Arc;

/// Live transport, or the dry-run wrapper when `debug_mode` is on.
///
/// In debug mode a missing access token is tolerated: reads come back empty.
pub async fn build_transport(config: &BotConfig) -> EngineResult<Arc<dyn ContentTransport>> {
    if !config.bot.debug_mode {
        return Ok(Arc::new(TwitterTransport::connect(&config.twitter).await?));
    }
    let reads: Option<Arc<dyn ContentTransport>> = if config.twitter.access_token.trim().is_empty() {
        warn!("[bootstrap] Debug mode without an access token: reads will be empty");
        None
    } else {
        Some(Arc::new(TwitterTransport::connect(&config.twitter).await?))
    };
    info!("[bootstrap] Debug mode: writes are logged, not published");
    Ok(Arc::new(DryRunTransport::new(reads)))
}

pub fn build_generator(config: &BotConfig) -> EngineResult<Arc<dyn TextGenerator>> {
    Ok(Arc::new(AnyGenerator::from_config(&config.llm)?))
}

/// Load both catalogs named in `[catalog]`.
pub fn load_catalogs(config: &BotConfig) -> EngineResult<(AccountCatalog, TagCatalog)> {
    let accounts = AccountCatalog::load(&config.catalog.accounts)?;
    let tags = TagCatalog::load(&config.catalog.tags)?;
    Ok((accounts, tags))
}

pub async fn build_orchestrator(config: BotConfig) -> EngineResult<Orchestrator> {
    config.validate()?;
    let (accounts, tags) = load_catalogs(&config)?;
    let generator = build_generator(&config)?;
    let transport = build_transport(&config).await?;
    Orchestrator::new(config, accounts, tags, transport, generator)
}
