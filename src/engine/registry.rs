// Pawbird Engine — Influencer Registry
//
// Static catalog of tracked accounts (loaded once from TOML) plus the
// per-account, per-day engagement counters.
//
//   • Counters reset lazily whenever the calendar day differs from the
//     stored `last_reset_day`; there is no reset timer.
//   • Unknown account ids never panic: checks return false, records no-op.
//   • Rotation order shuffles uniformly, then stable-partitions by priority,
//     so a lower tier can never starve a higher one.

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{Priority, TrackedAccount};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use log::{debug, info};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

// ── Catalog ────────────────────────────────────────────────────────────────

/// Root of an `influencers.toml` catalog file.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountCatalog {
    #[serde(default, rename = "account")]
    pub accounts: Vec<TrackedAccount>,
}

impl AccountCatalog {
    pub fn parse(content: &str) -> EngineResult<Self> {
        let catalog: AccountCatalog = toml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::catalog(format!("Cannot read account catalog {}: {}", path.display(), e))
        })?;
        let catalog = Self::parse(&content)?;
        info!("[registry] Loaded {} tracked accounts from {}", catalog.accounts.len(), path.display());
        Ok(catalog)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.accounts.is_empty() {
            return Err(EngineError::catalog("Account catalog is empty"));
        }
        let mut seen = HashSet::new();
        for a in &self.accounts {
            if a.id.trim().is_empty() {
                return Err(EngineError::catalog(format!("Account '{}' has an empty id", a.username)));
            }
            if a.username.trim().is_empty() {
                return Err(EngineError::catalog(format!("Account {} has an empty username", a.id)));
            }
            if a.max_replies_per_day == 0 {
                return Err(EngineError::catalog(format!(
                    "Account @{} must allow at least 1 reply per day",
                    a.username
                )));
            }
            if !seen.insert(a.id.as_str()) {
                return Err(EngineError::catalog(format!("Duplicate account id {}", a.id)));
            }
        }
        Ok(())
    }
}

// ── Daily counters ─────────────────────────────────────────────────────────

#[derive(Debug)]
struct DailyEngagementCounter {
    counts: HashMap<String, u32>,
    last_reset_day: NaiveDate,
}

impl DailyEngagementCounter {
    fn maybe_reset(&mut self, today: NaiveDate) {
        if self.last_reset_day != today {
            if !self.counts.is_empty() {
                info!("[registry] New day, resetting engagement counters for {} accounts", self.counts.len());
            }
            self.counts.clear();
            self.last_reset_day = today;
        }
    }

    fn count(&self, id: &str) -> u32 {
        self.counts.get(id).copied().unwrap_or(0)
    }
}

// ── Registry ───────────────────────────────────────────────────────────────

pub struct InfluencerRegistry {
    /// Catalog order, kept for deterministic iteration before shuffling.
    order: Vec<String>,
    accounts: HashMap<String, TrackedAccount>,
    rotation_size: usize,
    tz: Tz,
    counters: Mutex<DailyEngagementCounter>,
}

impl InfluencerRegistry {
    pub fn new(catalog: AccountCatalog, rotation_size: usize, tz: Tz) -> Self {
        Self::new_at(catalog, rotation_size, tz, Utc::now())
    }

    pub fn new_at(catalog: AccountCatalog, rotation_size: usize, tz: Tz, now: DateTime<Utc>) -> Self {
        let order = catalog.accounts.iter().map(|a| a.id.clone()).collect();
        let accounts = catalog.accounts.into_iter().map(|a| (a.id.clone(), a)).collect();
        InfluencerRegistry {
            order,
            accounts,
            rotation_size,
            tz,
            counters: Mutex::new(DailyEngagementCounter {
                counts: HashMap::new(),
                last_reset_day: now.with_timezone(&tz).date_naive(),
            }),
        }
    }

    fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    pub fn account(&self, id: &str) -> Option<&TrackedAccount> {
        self.accounts.get(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // ── Engagement caps ────────────────────────────────────────────────────

    pub fn can_engage(&self, id: &str, now: DateTime<Utc>) -> bool {
        let Some(account) = self.accounts.get(id) else {
            return false;
        };
        let mut counters = self.counters.lock();
        counters.maybe_reset(self.today(now));
        counters.count(id) < account.max_replies_per_day
    }

    /// Increment today's count. Returns whether anything was recorded: unknown
    /// ids and accounts already at their cap are left untouched.
    pub fn record_engagement(&self, id: &str, now: DateTime<Utc>) -> bool {
        self.try_engage(id, now)
    }

    /// Check and record as one critical section.
    pub fn try_engage(&self, id: &str, now: DateTime<Utc>) -> bool {
        let Some(account) = self.accounts.get(id) else {
            return false;
        };
        let mut counters = self.counters.lock();
        counters.maybe_reset(self.today(now));
        let current = counters.count(id);
        if current >= account.max_replies_per_day {
            debug!("[registry] @{} at daily cap ({}/{})", account.username, current, account.max_replies_per_day);
            return false;
        }
        counters.counts.insert(id.to_string(), current + 1);
        debug!(
            "[registry] Engagement with @{} recorded ({}/{})",
            account.username,
            current + 1,
            account.max_replies_per_day
        );
        true
    }

    pub fn engagements_today(&self, id: &str, now: DateTime<Utc>) -> u32 {
        let mut counters = self.counters.lock();
        counters.maybe_reset(self.today(now));
        counters.count(id)
    }

    // ── Rotation ───────────────────────────────────────────────────────────

    pub fn rotation_order(&self, now: DateTime<Utc>) -> Vec<String> {
        self.rotation_order_with(now, &mut rand::thread_rng())
    }

    /// Shuffle, then stable-partition into high → medium → low, then truncate.
    pub fn rotation_order_with<R: Rng + ?Sized>(&self, now: DateTime<Utc>, rng: &mut R) -> Vec<String> {
        // Touch the counters so a day boundary is observed even on idle passes.
        self.counters.lock().maybe_reset(self.today(now));

        let mut ids = self.order.clone();
        ids.shuffle(rng);

        let mut ordered = Vec::with_capacity(ids.len());
        for tier in [Priority::High, Priority::Medium, Priority::Low] {
            ordered.extend(
                ids.iter()
                    .filter(|id| self.accounts.get(id.as_str()).map(|a| a.priority) == Some(tier))
                    .cloned(),
            );
        }
        ordered.truncate(self.rotation_size);
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const CATALOG: &str = r#"
[[account]]
id = "A"
username = "alice"
name = "Alice"
expertise = ["research"]
response_style = "technical"
priority = "high"
max_replies_per_day = 2

[[account]]
id = "B"
username = "bob"
name = "Bob"
priority = "low"
max_replies_per_day = 1

[[account]]
id = "C"
username = "carol"
name = "Carol"
priority = "high"
max_replies_per_day = 1

[[account]]
id = "D"
username = "dave"
name = "Dave"
priority = "medium"
max_replies_per_day = 3
"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 3, 10, 0, 0).unwrap()
    }

    fn registry(rotation_size: usize) -> InfluencerRegistry {
        InfluencerRegistry::new_at(AccountCatalog::parse(CATALOG).unwrap(), rotation_size, chrono_tz::UTC, now())
    }

    #[test]
    fn parses_catalog() {
        let catalog = AccountCatalog::parse(CATALOG).unwrap();
        assert_eq!(catalog.accounts.len(), 4);
        assert_eq!(catalog.accounts[0].expertise, vec!["research"]);
        assert_eq!(catalog.accounts[1].response_style, "");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let dup = format!("{}\n[[account]]\nid = \"A\"\nusername = \"again\"\nname = \"x\"\npriority = \"low\"\nmax_replies_per_day = 1\n", CATALOG);
        let err = AccountCatalog::parse(&dup).unwrap_err();
        assert!(err.to_string().contains("Duplicate account id A"));
    }

    #[test]
    fn rejects_zero_cap_and_empty_catalog() {
        let zero = "[[account]]\nid = \"Z\"\nusername = \"z\"\nname = \"Z\"\npriority = \"high\"\nmax_replies_per_day = 0\n";
        assert!(matches!(AccountCatalog::parse(zero), Err(EngineError::Catalog(_))));
        assert!(matches!(AccountCatalog::parse(""), Err(EngineError::Catalog(_))));
    }

    #[test]
    fn rejects_unknown_priority() {
        let bad = "[[account]]\nid = \"Z\"\nusername = \"z\"\nname = \"Z\"\npriority = \"urgent\"\nmax_replies_per_day = 1\n";
        assert!(matches!(AccountCatalog::parse(bad), Err(EngineError::Toml(_))));
    }

    #[test]
    fn daily_cap_enforced() {
        let r = registry(10);
        let t = now();
        assert!(r.can_engage("A", t));
        assert!(r.record_engagement("A", t));
        assert!(r.can_engage("A", t));
        assert!(r.record_engagement("A", t));
        assert!(!r.can_engage("A", t));
        assert!(!r.record_engagement("A", t));
        assert_eq!(r.engagements_today("A", t), 2);
    }

    #[test]
    fn counters_reset_on_new_day() {
        let r = registry(10);
        let t = now();
        assert!(r.try_engage("C", t));
        assert!(!r.can_engage("C", t));
        let tomorrow = t + Duration::days(1);
        assert!(r.can_engage("C", tomorrow));
        assert_eq!(r.engagements_today("C", tomorrow), 0);
    }

    #[test]
    fn unknown_account_is_noop() {
        let r = registry(10);
        assert!(!r.can_engage("nobody", now()));
        assert!(!r.record_engagement("nobody", now()));
        assert_eq!(r.engagements_today("nobody", now()), 0);
        assert!(r.account("nobody").is_none());
    }

    #[test]
    fn rotation_puts_higher_tiers_first_for_every_seed() {
        let r = registry(10);
        for seed in 0..200u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let order = r.rotation_order_with(now(), &mut rng);
            assert_eq!(order.len(), 4);
            let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
            assert!(pos("A") < pos("D") && pos("C") < pos("D"));
            assert!(pos("A") < pos("B") && pos("C") < pos("B"));
            assert!(pos("D") < pos("B"));
        }
    }

    #[test]
    fn rotation_shuffles_within_tier() {
        let r = registry(10);
        let mut first_seen = HashSet::new();
        for seed in 0..64u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            first_seen.insert(r.rotation_order_with(now(), &mut rng)[0].clone());
        }
        assert!(first_seen.contains("A") && first_seen.contains("C"));
        assert_eq!(first_seen.len(), 2);
    }

    #[test]
    fn rotation_truncates_to_size() {
        let r = registry(2);
        let mut rng = StdRng::seed_from_u64(7);
        let order = r.rotation_order_with(now(), &mut rng);
        assert_eq!(order.len(), 2);
        assert!(order.iter().all(|id| id == "A" || id == "C"));
    }
}
