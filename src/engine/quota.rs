// Pawbird Engine — Write/Read Quota Tracker
//
// Tracks consumption of the two external API quota pools (write, read) across
// a calendar day and a calendar month in the configured timezone.
//
//   • Rollover is lazy: every check or record first compares the observed
//     day/month with the stored one and zeroes stale counters.
//   • `PriorityReply` bypasses the daily write cap, never the monthly cap.
//   • `try_consume` holds the lock across check + record so concurrent ticks
//     can never both pass the check for the last unit.
//   • In-memory only. A restart resets consumption.

use crate::atoms::types::{ConsumeKind, QuotaStatus, Resource};
use crate::engine::config::QuotaConfig;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use log::{debug, info, warn};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy)]
pub struct PoolLimits {
    pub daily: u32,
    pub monthly: u32,
}

#[derive(Debug)]
struct Pool {
    limits: PoolLimits,
    used_today: u32,
    used_this_month: u32,
    day: NaiveDate,
    month: (i32, u32),
}

impl Pool {
    fn new(limits: PoolLimits, today: NaiveDate) -> Self {
        Pool {
            limits,
            used_today: 0,
            used_this_month: 0,
            day: today,
            month: (today.year(), today.month()),
        }
    }

    fn maybe_reset(&mut self, resource: Resource, today: NaiveDate) {
        let month = (today.year(), today.month());
        if self.month != month {
            info!(
                "[quota] New month for {} pool ({} used last month), resetting",
                resource, self.used_this_month
            );
            self.month = month;
            self.used_this_month = 0;
        }
        if self.day != today {
            debug!("[quota] New day for {} pool ({} used yesterday), resetting", resource, self.used_today);
            self.day = today;
            self.used_today = 0;
        }
    }

    fn admits(&self, resource: Resource, kind: ConsumeKind) -> bool {
        if self.used_this_month >= self.limits.monthly {
            return false;
        }
        if resource == Resource::Write && kind != ConsumeKind::PriorityReply {
            return self.used_today < self.limits.daily;
        }
        true
    }

    /// Saturating so a priority reply past the daily cap cannot push
    /// `used_today` beyond `daily`.
    fn record(&mut self) {
        self.used_today = (self.used_today + 1).min(self.limits.daily);
        self.used_this_month = (self.used_this_month + 1).min(self.limits.monthly);
    }
}

#[derive(Debug)]
struct QuotaState {
    write: Pool,
    read: Pool,
}

impl QuotaState {
    fn pool_mut(&mut self, resource: Resource) -> &mut Pool {
        match resource {
            Resource::Write => &mut self.write,
            Resource::Read => &mut self.read,
        }
    }
}

/// Process-wide quota state for both pools. Share it behind an `Arc`.
pub struct QuotaTracker {
    tz: Tz,
    state: Mutex<QuotaState>,
}

impl QuotaTracker {
    pub fn new(write: PoolLimits, read: PoolLimits, tz: Tz) -> Self {
        Self::new_at(write, read, tz, Utc::now())
    }

    pub fn new_at(write: PoolLimits, read: PoolLimits, tz: Tz, now: DateTime<Utc>) -> Self {
        let today = now.with_timezone(&tz).date_naive();
        QuotaTracker {
            tz,
            state: Mutex::new(QuotaState {
                write: Pool::new(write, today),
                read: Pool::new(read, today),
            }),
        }
    }

    pub fn from_config(cfg: &QuotaConfig, tz: Tz) -> Self {
        let write = PoolLimits { daily: cfg.daily_write(), monthly: cfg.monthly_write_limit };
        let read = PoolLimits { daily: cfg.daily_read(), monthly: cfg.monthly_read_limit };
        info!(
            "[quota] Limits: write {}/day {}/month, read {}/day {}/month ({})",
            write.daily, write.monthly, read.daily, read.monthly, tz
        );
        Self::new(write, read, tz)
    }

    fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    // ── Admission ──────────────────────────────────────────────────────────

    pub fn can_consume(&self, resource: Resource, kind: ConsumeKind) -> bool {
        self.can_consume_at(resource, kind, Utc::now())
    }

    pub fn can_consume_at(&self, resource: Resource, kind: ConsumeKind, now: DateTime<Utc>) -> bool {
        let today = self.today(now);
        let mut state = self.state.lock();
        let pool = state.pool_mut(resource);
        pool.maybe_reset(resource, today);
        pool.admits(resource, kind)
    }

    /// Record one unit. Callers outside this module should prefer `try_consume`.
    pub fn record_consume(&self, resource: Resource, kind: ConsumeKind) {
        self.record_consume_at(resource, kind, Utc::now())
    }

    pub fn record_consume_at(&self, resource: Resource, kind: ConsumeKind, now: DateTime<Utc>) {
        let today = self.today(now);
        let mut state = self.state.lock();
        let pool = state.pool_mut(resource);
        pool.maybe_reset(resource, today);
        pool.record();
        debug!(
            "[quota] Recorded {} ({}): {}/{} today, {}/{} this month",
            resource, kind, pool.used_today, pool.limits.daily, pool.used_this_month, pool.limits.monthly
        );
    }

    /// Check and record as one critical section.
    /// Returns `false` (and records nothing) when the pool is exhausted.
    pub fn try_consume(&self, resource: Resource, kind: ConsumeKind) -> bool {
        self.try_consume_at(resource, kind, Utc::now())
    }

    pub fn try_consume_at(&self, resource: Resource, kind: ConsumeKind, now: DateTime<Utc>) -> bool {
        let today = self.today(now);
        let mut state = self.state.lock();
        let pool = state.pool_mut(resource);
        pool.maybe_reset(resource, today);
        if !pool.admits(resource, kind) {
            warn!(
                "[quota] {} ({}) denied: {}/{} today, {}/{} this month",
                resource, kind, pool.used_today, pool.limits.daily, pool.used_this_month, pool.limits.monthly
            );
            return false;
        }
        pool.record();
        debug!(
            "[quota] Consumed {} ({}): {}/{} today, {}/{} this month",
            resource, kind, pool.used_today, pool.limits.daily, pool.used_this_month, pool.limits.monthly
        );
        true
    }

    // ── Observability ──────────────────────────────────────────────────────

    pub fn status(&self, resource: Resource) -> QuotaStatus {
        self.status_at(resource, Utc::now())
    }

    pub fn status_at(&self, resource: Resource, now: DateTime<Utc>) -> QuotaStatus {
        let today = self.today(now);
        let mut state = self.state.lock();
        let can_tweet = {
            let write = state.pool_mut(Resource::Write);
            write.maybe_reset(Resource::Write, today);
            write.admits(Resource::Write, ConsumeKind::Automated)
        };
        let pool = state.pool_mut(resource);
        pool.maybe_reset(resource, today);
        QuotaStatus {
            resource,
            daily_used: pool.used_today,
            daily_limit: pool.limits.daily,
            monthly_used: pool.used_this_month,
            monthly_limit: pool.limits.monthly,
            can_tweet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn tracker(now: DateTime<Utc>) -> QuotaTracker {
        QuotaTracker::new_at(
            PoolLimits { daily: 16, monthly: 500 },
            PoolLimits { daily: 3, monthly: 100 },
            chrono_tz::UTC,
            now,
        )
    }

    #[test]
    fn daily_write_cap_with_priority_bypass() {
        let now = at(2025, 3, 10, 12);
        let q = tracker(now);
        for _ in 0..16 {
            assert!(q.can_consume_at(Resource::Write, ConsumeKind::Automated, now));
            q.record_consume_at(Resource::Write, ConsumeKind::Automated, now);
        }
        assert!(!q.can_consume_at(Resource::Write, ConsumeKind::Automated, now));
        assert!(q.can_consume_at(Resource::Write, ConsumeKind::PriorityReply, now));

        let status = q.status_at(Resource::Write, now);
        assert_eq!(status.daily_used, 16);
        assert_eq!(status.monthly_used, 16);
        assert!(!status.can_tweet);
    }

    #[test]
    fn priority_reply_never_exceeds_monthly() {
        let now = at(2025, 3, 10, 12);
        let q = QuotaTracker::new_at(
            PoolLimits { daily: 2, monthly: 3 },
            PoolLimits { daily: 1, monthly: 1 },
            chrono_tz::UTC,
            now,
        );
        assert!(q.try_consume_at(Resource::Write, ConsumeKind::Automated, now));
        assert!(q.try_consume_at(Resource::Write, ConsumeKind::Automated, now));
        assert!(q.try_consume_at(Resource::Write, ConsumeKind::PriorityReply, now));
        assert!(!q.try_consume_at(Resource::Write, ConsumeKind::PriorityReply, now));

        let status = q.status_at(Resource::Write, now);
        assert_eq!(status.monthly_used, 3);
        assert!(status.daily_used <= status.daily_limit);
    }

    #[test]
    fn counters_never_exceed_limits() {
        let now = at(2025, 3, 10, 12);
        let q = tracker(now);
        let kinds = [ConsumeKind::Automated, ConsumeKind::PriorityReply];
        for i in 0..1000 {
            let kind = kinds[i % 2];
            let resource = if i % 3 == 0 { Resource::Read } else { Resource::Write };
            q.try_consume_at(resource, kind, now);
            for r in [Resource::Write, Resource::Read] {
                let s = q.status_at(r, now);
                assert!(s.daily_used <= s.daily_limit);
                assert!(s.monthly_used <= s.monthly_limit);
            }
        }
    }

    #[test]
    fn daily_rollover_resets_before_check() {
        let day1 = at(2025, 3, 10, 23);
        let q = tracker(day1);
        for _ in 0..16 {
            assert!(q.try_consume_at(Resource::Write, ConsumeKind::Automated, day1));
        }
        assert!(!q.can_consume_at(Resource::Write, ConsumeKind::Automated, day1));

        let day2 = at(2025, 3, 11, 0);
        assert!(q.can_consume_at(Resource::Write, ConsumeKind::Automated, day2));
        let status = q.status_at(Resource::Write, day2);
        assert_eq!(status.daily_used, 0);
        assert_eq!(status.monthly_used, 16);
    }

    #[test]
    fn monthly_rollover_resets_both_counters() {
        let march = at(2025, 3, 31, 20);
        let q = QuotaTracker::new_at(
            PoolLimits { daily: 3, monthly: 3 },
            PoolLimits { daily: 1, monthly: 2 },
            chrono_tz::UTC,
            march,
        );
        for _ in 0..3 {
            assert!(q.try_consume_at(Resource::Write, ConsumeKind::Automated, march));
        }
        assert!(!q.try_consume_at(Resource::Write, ConsumeKind::PriorityReply, march));

        let april = at(2025, 4, 1, 1);
        let status = q.status_at(Resource::Write, april);
        assert_eq!(status.daily_used, 0);
        assert_eq!(status.monthly_used, 0);
        assert!(status.can_tweet);
        assert!(q.try_consume_at(Resource::Write, ConsumeKind::Automated, april));
    }

    #[test]
    fn monthly_cap_blocks_across_days() {
        let start = at(2025, 5, 1, 8);
        let q = QuotaTracker::new_at(
            PoolLimits { daily: 5, monthly: 7 },
            PoolLimits { daily: 1, monthly: 1 },
            chrono_tz::UTC,
            start,
        );
        for _ in 0..5 {
            assert!(q.try_consume_at(Resource::Write, ConsumeKind::Automated, start));
        }
        let next = at(2025, 5, 2, 8);
        assert!(q.try_consume_at(Resource::Write, ConsumeKind::Automated, next));
        assert!(q.try_consume_at(Resource::Write, ConsumeKind::Automated, next));
        assert!(!q.try_consume_at(Resource::Write, ConsumeKind::Automated, next));
        assert!(!q.can_consume_at(Resource::Write, ConsumeKind::PriorityReply, next));
    }

    #[test]
    fn read_pool_has_no_priority_bypass_but_is_independent() {
        let now = at(2025, 6, 1, 9);
        let q = tracker(now);
        for _ in 0..3 {
            assert!(q.try_consume_at(Resource::Read, ConsumeKind::Automated, now));
        }
        // The daily cap gates writes only; reads are bounded by the monthly ceiling.
        assert_eq!(q.status_at(Resource::Read, now).daily_used, 3);
        assert!(q.can_consume_at(Resource::Read, ConsumeKind::Automated, now));
        assert!(q.can_consume_at(Resource::Write, ConsumeKind::Automated, now));
    }

    #[test]
    fn rollover_follows_configured_timezone() {
        // 15:30 UTC on the 10th is already the 11th in Tokyo.
        let before = at(2025, 3, 10, 14);
        let q = QuotaTracker::new_at(
            PoolLimits { daily: 1, monthly: 10 },
            PoolLimits { daily: 1, monthly: 10 },
            chrono_tz::Asia::Tokyo,
            before,
        );
        assert!(q.try_consume_at(Resource::Write, ConsumeKind::Automated, before));
        assert!(!q.can_consume_at(Resource::Write, ConsumeKind::Automated, before));
        let after_tokyo_midnight = Utc.with_ymd_and_hms(2025, 3, 10, 15, 30, 0).unwrap();
        assert!(q.can_consume_at(Resource::Write, ConsumeKind::Automated, after_tokyo_midnight));
    }
}
