// Pawbird Engine — Engagement Orchestrator
//
// Owns every piece of mutable scheduler state and exposes one method per
// timer: mention check, scheduled post, influencer rotation, hourly reset.
//
// Each tick is self-contained: collaborator failures are logged with the
// content/account id and become "no action" for that item. Nothing is
// retried within a tick; the next firing of the same timer is the retry.
//
// Only per-account timeline fetches in the rotation draw on the read pool.
//
// Locks (parking_lot) are never held across an await.

use crate::atoms::constants::{MAX_SCORE, TWEET_MAX_CHARS};
use crate::atoms::error::EngineResult;
use crate::atoms::traits::{ContentTransport, TextGenerator};
use crate::atoms::types::{truncate_chars, ConsumeKind, QuotaStatus, Resource};
use crate::engine::config::BotConfig;
use crate::engine::processed::ProcessedSet;
use crate::engine::prompts;
use crate::engine::quota::QuotaTracker;
use crate::engine::registry::{AccountCatalog, InfluencerRegistry};
use crate::engine::scorer::EngagementScorer;
use crate::engine::tagger::{ContentTagger, TagCatalog};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Type hint handed to the tagger for scheduled posts.
const SCHEDULED_POST_HINT: &str = "post";

// ── Tick report ────────────────────────────────────────────────────────────

/// Outcome counts for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Items returned by the transport.
    pub fetched: u32,
    /// Posts or replies actually published.
    pub acted: u32,
    /// Items passed over (already processed, stale, capped, not actionable).
    pub skipped: u32,
    /// Generator or transport failures.
    pub failed: u32,
    /// Quota admissions refused.
    pub quota_denied: u32,
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched={} acted={} skipped={} failed={} quota_denied={}",
            self.fetched, self.acted, self.skipped, self.failed, self.quota_denied
        )
    }
}

/// Clears the rotation in-flight flag when a pass ends, however it ends.
struct InflightGuard<'a>(&'a AtomicBool);

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn pace(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

// ── Orchestrator ───────────────────────────────────────────────────────────

pub struct Orchestrator {
    config: BotConfig,
    quota: QuotaTracker,
    registry: InfluencerRegistry,
    scorer: EngagementScorer,
    tagger: ContentTagger,
    transport: Arc<dyn ContentTransport>,
    generator: Arc<dyn TextGenerator>,
    processed: Mutex<ProcessedSet>,
    hourly_replies: AtomicU32,
    /// Mentions created before this instant are ignored.
    last_mention_check: Mutex<DateTime<Utc>>,
    rotation_inflight: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        config: BotConfig,
        accounts: AccountCatalog,
        tags: TagCatalog,
        transport: Arc<dyn ContentTransport>,
        generator: Arc<dyn TextGenerator>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let tz = config.timezone()?;
        let quota = QuotaTracker::from_config(&config.quota, tz);
        let registry = InfluencerRegistry::new(accounts, config.engagement.rotation_size, tz);
        let scorer = EngagementScorer::new(&config.engagement.keywords);
        let processed = Mutex::new(ProcessedSet::new(config.bot.processed_capacity));
        if let Some(w) = config.read_budget_warning() {
            warn!("[orchestrator] {}", w);
        }
        info!(
            "[orchestrator] Ready: {} tracked accounts, transport={}, generator={}, tz={}",
            registry.len(),
            transport.name(),
            generator.name(),
            tz
        );
        Ok(Orchestrator {
            config,
            quota,
            registry,
            scorer,
            tagger: ContentTagger::new(tags),
            transport,
            generator,
            processed,
            hourly_replies: AtomicU32::new(0),
            last_mention_check: Mutex::new(Utc::now()),
            rotation_inflight: AtomicBool::new(false),
        })
    }

    /// Override where the mention watermark starts (defaults to construction time).
    pub fn with_mention_watermark(self, at: DateTime<Utc>) -> Self {
        *self.last_mention_check.lock() = at;
        self
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub fn registry(&self) -> &InfluencerRegistry {
        &self.registry
    }

    pub fn hourly_replies(&self) -> u32 {
        self.hourly_replies.load(Ordering::Acquire)
    }

    pub fn last_mention_check(&self) -> DateTime<Utc> {
        *self.last_mention_check.lock()
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.processed.lock().contains(id)
    }

    pub fn quota_status(&self) -> (QuotaStatus, QuotaStatus) {
        (self.quota.status(Resource::Write), self.quota.status(Resource::Read))
    }

    fn hourly_cap_reached(&self) -> bool {
        self.hourly_replies() >= self.config.bot.max_replies_per_hour
    }

    async fn generate(&self, prompt: &str) -> EngineResult<String> {
        let text = self
            .generator
            .generate(prompt, self.config.llm.max_tokens, self.config.llm.temperature)
            .await?;
        Ok(truncate_chars(text.trim(), TWEET_MAX_CHARS).to_string())
    }

    // ── Mention check ──────────────────────────────────────────────────────

    /// Reply to new mentions, oldest-first as the transport returns them.
    pub async fn check_mentions(&self) -> TickReport {
        let mut report = TickReport::default();
        if !self.config.bot.auto_reply_enabled {
            debug!("[orchestrator] Auto-reply disabled, skipping mention check");
            return report;
        }
        if self.hourly_cap_reached() {
            info!(
                "[orchestrator] Hourly reply cap reached ({}/{}), skipping mention check",
                self.hourly_replies(),
                self.config.bot.max_replies_per_hour
            );
            report.skipped += 1;
            return report;
        }

        let pass_started = Utc::now();
        let since = self.last_mention_check();
        let mentions = match self.transport.fetch_mentions(self.config.engagement.mention_max_results).await {
            Ok(m) => m,
            Err(e) => {
                warn!("[orchestrator] Mention fetch failed: {}", e);
                report.failed += 1;
                return report;
            }
        };
        report.fetched = mentions.len() as u32;

        for mention in &mentions {
            if self.hourly_cap_reached() {
                info!("[orchestrator] Hourly reply cap reached mid-pass, stopping");
                break;
            }
            if mention.created_at < since {
                debug!("[orchestrator] Mention {} predates last check, skipping", mention.id);
                report.skipped += 1;
                continue;
            }
            // Claim before any side effect: a mention is attempted at most once.
            if !self.processed.lock().insert(&mention.id) {
                report.skipped += 1;
                continue;
            }

            let text = match self.generate(&prompts::mention_reply(mention)).await {
                Ok(t) if !t.is_empty() => t,
                Ok(_) => {
                    warn!("[orchestrator] Empty reply generated for mention {}", mention.id);
                    report.failed += 1;
                    continue;
                }
                Err(e) => {
                    warn!("[orchestrator] Reply generation failed for mention {}: {}", mention.id, e);
                    report.failed += 1;
                    continue;
                }
            };

            if !self.quota.try_consume(Resource::Write, ConsumeKind::PriorityReply) {
                info!("[orchestrator] Monthly write quota exhausted, stopping mention replies");
                report.quota_denied += 1;
                break;
            }

            match self.transport.reply(&text, &mention.id).await {
                Ok(reply_id) => {
                    let n = self.hourly_replies.fetch_add(1, Ordering::AcqRel) + 1;
                    report.acted += 1;
                    info!(
                        "[orchestrator] Replied to mention {} ({}), {}/{} this hour",
                        mention.id, reply_id, n, self.config.bot.max_replies_per_hour
                    );
                    pace(self.config.pacing.reply_delay()).await;
                }
                Err(e) => {
                    warn!("[orchestrator] Reply to mention {} failed: {}", mention.id, e);
                    report.failed += 1;
                }
            }
        }

        *self.last_mention_check.lock() = pass_started;
        info!("[orchestrator] Mention check done: {}", report);
        report
    }

    // ── Scheduled post ─────────────────────────────────────────────────────

    pub async fn post_scheduled(&self) -> TickReport {
        let mut report = TickReport::default();
        if !self.config.bot.auto_schedule_enabled {
            debug!("[orchestrator] Auto-schedule disabled, skipping scheduled post");
            return report;
        }

        // A failed trending fetch just means an untopical post.
        let trending = match self.transport.fetch_trending().await {
            Ok(t) => {
                report.fetched = t.len() as u32;
                t
            }
            Err(e) => {
                debug!("[orchestrator] Trending fetch failed, posting without topics: {}", e);
                Vec::new()
            }
        };

        let text = match self.generate(&prompts::scheduled_post(&trending)).await {
            Ok(t) if !t.is_empty() => t,
            Ok(_) => {
                warn!("[orchestrator] Empty scheduled post generated");
                report.failed += 1;
                return report;
            }
            Err(e) => {
                warn!("[orchestrator] Scheduled post generation failed: {}", e);
                report.failed += 1;
                return report;
            }
        };
        let text = self.tagger.annotate(&text, TWEET_MAX_CHARS, Some(SCHEDULED_POST_HINT));

        if !self.quota.try_consume(Resource::Write, ConsumeKind::Automated) {
            report.quota_denied += 1;
            return report;
        }
        match self.transport.post(&text).await {
            Ok(id) => {
                info!("[orchestrator] Scheduled post published ({})", id);
                report.acted += 1;
            }
            Err(e) => {
                warn!("[orchestrator] Scheduled post failed: {}", e);
                report.failed += 1;
            }
        }
        report
    }

    // ── Influencer rotation ────────────────────────────────────────────────

    /// One pass over the rotation subset; at most one reply per account.
    pub async fn run_rotation(&self) -> TickReport {
        let mut report = TickReport::default();
        if !self.config.bot.influencer_monitoring_enabled {
            debug!("[orchestrator] Influencer monitoring disabled, skipping rotation");
            return report;
        }
        if self.rotation_inflight.swap(true, Ordering::AcqRel) {
            info!("[orchestrator] Previous rotation pass still running, skipping");
            report.skipped += 1;
            return report;
        }
        let _inflight = InflightGuard(&self.rotation_inflight);

        let order = self.registry.rotation_order(Utc::now());
        info!("[orchestrator] Rotation pass over {} accounts", order.len());

        for account_id in &order {
            let Some(account) = self.registry.account(account_id) else {
                continue;
            };
            if !self.quota.can_consume(Resource::Read, ConsumeKind::Automated) {
                report.quota_denied += 1;
                continue;
            }
            if !self.registry.can_engage(account_id, Utc::now()) {
                debug!("[orchestrator] @{} at daily cap, skipping", account.username);
                report.skipped += 1;
                continue;
            }
            if !self.quota.try_consume(Resource::Read, ConsumeKind::Automated) {
                report.quota_denied += 1;
                continue;
            }

            let items = match self
                .transport
                .fetch_recent_content(account_id, self.config.engagement.fetch_max_results)
                .await
            {
                Ok(items) => items,
                Err(e) => {
                    warn!("[orchestrator] Fetch for @{} ({}) failed: {}", account.username, account_id, e);
                    report.failed += 1;
                    pace(self.config.pacing.account_delay()).await;
                    continue;
                }
            };
            report.fetched += items.len() as u32;

            let now = Utc::now();
            let candidate = items.iter().filter(|c| !self.is_processed(&c.id)).find(|c| {
                let score = self.scorer.score(c, account, now);
                debug!(
                    "[orchestrator] @{} post {} scored {}/{}",
                    account.username, c.id, score.total, MAX_SCORE
                );
                EngagementScorer::is_actionable(&score)
            });

            match candidate {
                None => report.skipped += 1,
                Some(content) => {
                    let text = match self.generate(&prompts::influencer_reply(account, content)).await {
                        Ok(t) if !t.is_empty() => Some(t),
                        Ok(_) => {
                            warn!("[orchestrator] Empty reply generated for {}", content.id);
                            report.failed += 1;
                            None
                        }
                        Err(e) => {
                            warn!("[orchestrator] Reply generation for {} failed: {}", content.id, e);
                            report.failed += 1;
                            None
                        }
                    };
                    if let Some(text) = text {
                        let text = self.tagger.annotate(&text, TWEET_MAX_CHARS, None);
                        if !self.quota.try_consume(Resource::Write, ConsumeKind::Automated) {
                            info!("[orchestrator] Write quota exhausted, ending rotation pass");
                            report.quota_denied += 1;
                            break;
                        }
                        if !self.registry.try_engage(account_id, Utc::now()) {
                            report.skipped += 1;
                        } else {
                            self.processed.lock().insert(&content.id);
                            match self.transport.reply(&text, &content.id).await {
                                Ok(reply_id) => {
                                    info!(
                                        "[orchestrator] Engaged @{} on {} ({})",
                                        account.username, content.id, reply_id
                                    );
                                    report.acted += 1;
                                    pace(self.config.pacing.reply_delay()).await;
                                }
                                Err(e) => {
                                    warn!("[orchestrator] Reply to {} (@{}) failed: {}", content.id, account.username, e);
                                    report.failed += 1;
                                }
                            }
                        }
                    }
                }
            }

            pace(self.config.pacing.account_delay()).await;
        }

        info!("[orchestrator] Rotation pass done: {}", report);
        report
    }

    // ── Hourly reset ───────────────────────────────────────────────────────

    /// Zero the hourly mention-reply counter, returning its previous value.
    pub fn reset_hourly(&self) -> u32 {
        let prev = self.hourly_replies.swap(0, Ordering::AcqRel);
        debug!("[orchestrator] Hourly reply counter reset (was {})", prev);
        prev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::error::EngineError;
    use crate::atoms::types::CandidateContent;
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl ContentTransport for Silent {
        fn name(&self) -> &str {
            "silent"
        }
        async fn fetch_recent_content(&self, _: &str, _: u32) -> EngineResult<Vec<CandidateContent>> {
            Ok(Vec::new())
        }
        async fn fetch_mentions(&self, _: u32) -> EngineResult<Vec<CandidateContent>> {
            Err(EngineError::transport("fetch_mentions", "offline"))
        }
        async fn fetch_trending(&self) -> EngineResult<Vec<String>> {
            Err(EngineError::transport("fetch_trending", "offline"))
        }
        async fn post(&self, _: &str) -> EngineResult<String> {
            Ok("p1".into())
        }
        async fn reply(&self, _: &str, _: &str) -> EngineResult<String> {
            Ok("r1".into())
        }
    }

    struct Echo;

    #[async_trait]
    impl TextGenerator for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn generate(&self, _: &str, _: u32, _: f64) -> EngineResult<String> {
            Ok("  rollups all the way down  ".into())
        }
    }

    fn orchestrator(config: BotConfig) -> Orchestrator {
        let accounts = AccountCatalog::parse(
            r#"
            [[account]]
            id = "1"
            username = "a"
            name = "A"
            priority = "high"
            max_replies_per_day = 1
            "#,
        )
        .unwrap();
        let tags = TagCatalog::parse("").unwrap();
        Orchestrator::new(config, accounts, tags, Arc::new(Silent), Arc::new(Echo)).unwrap()
    }

    #[test]
    fn report_display_lists_all_counts() {
        let r = TickReport { fetched: 3, acted: 1, skipped: 1, failed: 1, quota_denied: 0 };
        assert_eq!(r.to_string(), "fetched=3 acted=1 skipped=1 failed=1 quota_denied=0");
    }

    #[test]
    fn reset_hourly_returns_previous_count() {
        let o = orchestrator(BotConfig::default());
        o.hourly_replies.store(7, Ordering::Release);
        assert_eq!(o.reset_hourly(), 7);
        assert_eq!(o.hourly_replies(), 0);
    }

    #[test]
    fn rejects_invalid_config() {
        let mut cfg = BotConfig::default();
        cfg.bot.timezone = "Mars/Olympus".into();
        let accounts = AccountCatalog::parse("[[account]]\nid=\"1\"\nusername=\"a\"\nname=\"A\"\npriority=\"low\"\nmax_replies_per_day=1\n").unwrap();
        let result = Orchestrator::new(cfg, accounts, TagCatalog::parse("").unwrap(), Arc::new(Silent), Arc::new(Echo));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[tokio::test]
    async fn failed_mention_fetch_keeps_watermark() {
        let o = orchestrator(BotConfig::default());
        let before = o.last_mention_check();
        let report = o.check_mentions().await;
        assert_eq!(report.failed, 1);
        assert_eq!(o.last_mention_check(), before);
        assert_eq!(o.quota.status(Resource::Read).monthly_used, 0);
    }

    #[tokio::test]
    async fn scheduled_post_survives_trending_failure() {
        let mut cfg = BotConfig::default();
        cfg.pacing.reply_delay_secs = 0;
        let o = orchestrator(cfg);
        let report = o.post_scheduled().await;
        assert_eq!(report.acted, 1);
        assert_eq!(o.quota.status(Resource::Write).daily_used, 1);
        assert_eq!(o.quota.status(Resource::Read).monthly_used, 0);
    }

    #[tokio::test]
    async fn disabled_ticks_do_nothing() {
        let mut cfg = BotConfig::default();
        cfg.bot.auto_reply_enabled = false;
        cfg.bot.auto_schedule_enabled = false;
        cfg.bot.influencer_monitoring_enabled = false;
        let o = orchestrator(cfg);
        assert_eq!(o.check_mentions().await, TickReport::default());
        assert_eq!(o.post_scheduled().await, TickReport::default());
        assert_eq!(o.run_rotation().await, TickReport::default());
        assert_eq!(o.quota.status(Resource::Read).daily_used, 0);
    }

    #[tokio::test]
    async fn overlapping_rotation_is_skipped() {
        let o = orchestrator(BotConfig::default());
        o.rotation_inflight.store(true, Ordering::Release);
        let report = o.run_rotation().await;
        assert_eq!(report.skipped, 1);
        assert_eq!(report.fetched, 0);
        // The guard belongs to the running pass; the skipped one must not clear it.
        assert!(o.rotation_inflight.load(Ordering::Acquire));
    }
}
