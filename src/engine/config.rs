// Pawbird Engine — Bot Configuration
//
// Static options consumed once at startup from `pawbird.toml`.
// Every key is optional: missing sections fall back to `Default`.
// Secrets can be supplied through environment variables instead of the file.

use crate::atoms::constants::*;
use crate::atoms::error::{EngineError, EngineResult};
use chrono_tz::Tz;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Root ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub bot: BotSection,
    pub pacing: PacingConfig,
    pub quota: QuotaConfig,
    pub engagement: EngagementConfig,
    pub catalog: CatalogPaths,
    pub llm: LlmConfig,
    pub twitter: TwitterConfig,
}

// ── [bot] ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSection {
    /// Hourly cap on mention replies.
    pub max_replies_per_hour: u32,
    pub scheduled_post_interval_minutes: u64,
    pub mention_check_interval_minutes: u64,
    pub rotation_interval_minutes: u64,
    pub auto_reply_enabled: bool,
    pub auto_schedule_enabled: bool,
    pub influencer_monitoring_enabled: bool,
    /// Log writes instead of posting them.
    pub debug_mode: bool,
    /// IANA timezone used for daily/monthly rollovers.
    pub timezone: String,
    /// Bound on remembered processed ids.
    pub processed_capacity: usize,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            max_replies_per_hour: DEFAULT_MAX_REPLIES_PER_HOUR,
            scheduled_post_interval_minutes: DEFAULT_SCHEDULED_POST_INTERVAL_MINUTES,
            mention_check_interval_minutes: DEFAULT_MENTION_CHECK_INTERVAL_MINUTES,
            rotation_interval_minutes: DEFAULT_ROTATION_INTERVAL_MINUTES,
            auto_reply_enabled: true,
            auto_schedule_enabled: true,
            influencer_monitoring_enabled: true,
            debug_mode: false,
            timezone: "UTC".into(),
            processed_capacity: DEFAULT_PROCESSED_CAPACITY,
        }
    }
}

// ── [pacing] ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub reply_delay_secs: u64,
    pub account_delay_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            reply_delay_secs: DEFAULT_REPLY_DELAY_SECS,
            account_delay_secs: DEFAULT_ACCOUNT_DELAY_SECS,
        }
    }
}

impl PacingConfig {
    pub fn reply_delay(&self) -> Duration {
        Duration::from_secs(self.reply_delay_secs)
    }

    pub fn account_delay(&self) -> Duration {
        Duration::from_secs(self.account_delay_secs)
    }
}

// ── [quota] ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub monthly_write_limit: u32,
    pub monthly_read_limit: u32,
    /// Defaults to monthly / 30 when unset.
    pub daily_write_limit: Option<u32>,
    pub daily_read_limit: Option<u32>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            monthly_write_limit: DEFAULT_MONTHLY_WRITE_LIMIT,
            monthly_read_limit: DEFAULT_MONTHLY_READ_LIMIT,
            daily_write_limit: None,
            daily_read_limit: None,
        }
    }
}

impl QuotaConfig {
    pub fn daily_write(&self) -> u32 {
        self.daily_write_limit
            .unwrap_or(self.monthly_write_limit / DAYS_PER_QUOTA_MONTH)
    }

    pub fn daily_read(&self) -> u32 {
        self.daily_read_limit
            .unwrap_or(self.monthly_read_limit / DAYS_PER_QUOTA_MONTH)
    }
}

// ── [engagement] ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    /// Domain keywords that make a candidate relevant (lowercase substring match).
    pub keywords: Vec<String>,
    pub rotation_size: usize,
    pub fetch_max_results: u32,
    pub mention_max_results: u32,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            rotation_size: DEFAULT_ROTATION_SIZE,
            fetch_max_results: DEFAULT_FETCH_MAX_RESULTS,
            mention_max_results: DEFAULT_MENTION_MAX_RESULTS,
        }
    }
}

pub fn default_keywords() -> Vec<String> {
    [
        "ethereum", "eth", "fusaka", "peerdas", "rollup", "l2", "layer 2",
        "blob", "scaling", "danksharding", "eip", "validator", "staking",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// ── [catalog] ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogPaths {
    pub accounts: PathBuf,
    pub tags: PathBuf,
}

impl Default for CatalogPaths {
    fn default() -> Self {
        Self {
            accounts: PathBuf::from("config/influencers.toml"),
            tags: PathBuf::from("config/tags.toml"),
        }
    }
}

// ── [llm] ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAI,
            model: "gpt-4o-mini".into(),
            base_url: None,
            api_key: String::new(),
            max_tokens: 120,
            temperature: 0.8,
        }
    }
}

// ── [twitter] ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    pub base_url: String,
    /// OAuth 2.0 user-context access token.
    pub access_token: String,
    /// Where-On-Earth id for the trends endpoint (1 = worldwide).
    pub trends_woeid: u32,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twitter.com/2".into(),
            access_token: String::new(),
            trends_woeid: 1,
        }
    }
}

// ── Loading ────────────────────────────────────────────────────────────────

impl BotConfig {
    /// Parse a config from TOML text. Does not touch the environment.
    pub fn from_toml_str(content: &str) -> EngineResult<Self> {
        let config: BotConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file (missing file → defaults), then apply env overrides.
    /// Relative catalog paths are resolved against the config file's directory.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let mut cfg = Self::from_toml_str(&content)?;
            if let Some(dir) = path.parent() {
                cfg.catalog.accounts = resolve_relative(dir, &cfg.catalog.accounts);
                cfg.catalog.tags = resolve_relative(dir, &cfg.catalog.tags);
            }
            info!("[config] Loaded {}", path.display());
            cfg
        } else {
            info!("[config] {} not found, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Secrets from the environment win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(ENV_LLM_API_KEY) {
            if !key.is_empty() {
                self.llm.api_key = key;
            }
        }
        if let Ok(token) = std::env::var(ENV_TWITTER_TOKEN) {
            if !token.is_empty() {
                self.twitter.access_token = token;
            }
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.timezone()?;
        if self.bot.scheduled_post_interval_minutes == 0
            || self.bot.mention_check_interval_minutes == 0
            || self.bot.rotation_interval_minutes == 0
        {
            return Err(EngineError::Config("Schedule intervals must be at least 1 minute".into()));
        }
        if self.quota.daily_write() > self.quota.monthly_write_limit {
            return Err(EngineError::Config(format!(
                "daily_write_limit ({}) exceeds monthly_write_limit ({})",
                self.quota.daily_write(),
                self.quota.monthly_write_limit
            )));
        }
        if self.quota.daily_read() > self.quota.monthly_read_limit {
            return Err(EngineError::Config(format!(
                "daily_read_limit ({}) exceeds monthly_read_limit ({})",
                self.quota.daily_read(),
                self.quota.monthly_read_limit
            )));
        }
        if self.engagement.rotation_size == 0 {
            return Err(EngineError::Config("rotation_size must be at least 1".into()));
        }
        if self.bot.processed_capacity == 0 {
            return Err(EngineError::Config("processed_capacity must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(EngineError::Config(format!(
                "temperature {} out of range 0.0..=2.0",
                self.llm.temperature
            )));
        }
        Ok(())
    }

    /// Upper bound on the reads one day of rotation passes can spend. Mention
    /// checks and trending fetches do not draw on the read pool.
    pub fn projected_daily_reads(&self) -> u32 {
        if !self.bot.influencer_monitoring_enabled {
            return 0;
        }
        let passes = MINUTES_PER_DAY.div_ceil(self.bot.rotation_interval_minutes.max(1));
        let per_pass = u32::try_from(self.engagement.rotation_size).unwrap_or(u32::MAX);
        u32::try_from(passes).unwrap_or(u32::MAX).saturating_mul(per_pass)
    }

    /// Warning text when the rotation schedule would exhaust the monthly read
    /// limit before the month is out.
    pub fn read_budget_warning(&self) -> Option<String> {
        let projected = self.projected_daily_reads();
        let per_day = self.quota.monthly_read_limit / DAYS_PER_QUOTA_MONTH;
        (projected > per_day).then(|| {
            format!(
                "rotation may spend {} reads/day but monthly_read_limit {} allows {}/day; \
                 raise rotation_interval_minutes or lower rotation_size",
                projected, self.quota.monthly_read_limit, per_day
            )
        })
    }

    /// Parsed rollover timezone.
    pub fn timezone(&self) -> EngineResult<Tz> {
        self.bot
            .timezone
            .parse::<Tz>()
            .map_err(|e| EngineError::Config(format!("Invalid timezone '{}': {}", self.bot.timezone, e)))
    }
}

fn resolve_relative(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = BotConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.bot.max_replies_per_hour, DEFAULT_MAX_REPLIES_PER_HOUR);
        assert_eq!(cfg.quota.monthly_write_limit, 500);
        assert_eq!(cfg.quota.daily_write(), 16);
        assert_eq!(cfg.quota.daily_read(), 3);
        assert_eq!(cfg.llm.provider, ProviderKind::OpenAI);
        assert!(!cfg.bot.debug_mode);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let cfg = BotConfig::from_toml_str(
            r#"
[bot]
max_replies_per_hour = 3
debug_mode = true

[quota]
monthly_write_limit = 1500
daily_read_limit = 7

[llm]
provider = "anthropic"
model = "claude-3-haiku-20240307"
"#,
        )
        .unwrap();
        assert_eq!(cfg.bot.max_replies_per_hour, 3);
        assert!(cfg.bot.debug_mode);
        assert!(cfg.bot.auto_reply_enabled);
        assert_eq!(cfg.quota.daily_write(), 50);
        assert_eq!(cfg.quota.daily_read(), 7);
        assert_eq!(cfg.llm.provider, ProviderKind::Anthropic);
        assert_eq!(cfg.pacing.reply_delay_secs, DEFAULT_REPLY_DELAY_SECS);
    }

    #[test]
    fn default_rotation_fits_the_monthly_read_limit() {
        let cfg = BotConfig::default();
        assert_eq!(cfg.projected_daily_reads(), 3);
        assert!(cfg.projected_daily_reads() * DAYS_PER_QUOTA_MONTH <= cfg.quota.monthly_read_limit);
        assert!(cfg.read_budget_warning().is_none());
    }

    #[test]
    fn frequent_rotation_is_flagged() {
        let cfg = BotConfig::from_toml_str(
            "[bot]\nrotation_interval_minutes = 120\n[engagement]\nrotation_size = 10",
        )
        .unwrap();
        assert_eq!(cfg.projected_daily_reads(), 120);
        let warning = cfg.read_budget_warning().unwrap();
        assert!(warning.contains("120 reads/day"));

        let mut quiet = cfg.clone();
        quiet.bot.influencer_monitoring_enabled = false;
        assert_eq!(quiet.projected_daily_reads(), 0);
        assert!(quiet.read_budget_warning().is_none());
    }

    #[test]
    fn rejects_bad_timezone() {
        let err = BotConfig::from_toml_str("[bot]\ntimezone = \"Mars/Olympus\"").unwrap_err();
        assert!(err.to_string().contains("Invalid timezone"));
    }

    #[test]
    fn rejects_daily_over_monthly() {
        let err = BotConfig::from_toml_str("[quota]\nmonthly_write_limit = 10\ndaily_write_limit = 11")
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn rejects_zero_interval() {
        assert!(BotConfig::from_toml_str("[bot]\nrotation_interval_minutes = 0").is_err());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = BotConfig::load(Path::new("/nonexistent/pawbird.toml")).unwrap();
        assert_eq!(cfg.catalog.accounts, PathBuf::from("config/influencers.toml"));
    }
}
