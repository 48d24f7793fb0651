// Pawbird Engine — Tick Scheduler
//
// One tokio task per enabled timer. Each task waits for its interval or the
// stop signal, whichever comes first, then runs one orchestrator tick.
// Stopping prevents future firings only: a tick already running finishes.

use crate::atoms::constants::HOURLY_RESET_INTERVAL_SECS;
use crate::engine::config::BotConfig;
use crate::engine::orchestrator::Orchestrator;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

// ── Stop signal ────────────────────────────────────────────────────────────

#[derive(Default)]
struct StopInner {
    stopped: AtomicBool,
    notify: Notify,
}

/// Cloneable shutdown flag shared by every timer task.
#[derive(Clone, Default)]
pub struct StopSignal(Arc<StopInner>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.stopped.store(true, Ordering::Release);
        self.0.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.0.stopped.load(Ordering::Acquire)
    }

    /// Resolves once `stop` has been called (immediately if it already was).
    pub async fn wait(&self) {
        // Register before checking the flag so a concurrent stop() is not lost.
        let notified = self.0.notify.notified();
        if self.is_stopped() {
            return;
        }
        notified.await;
    }
}

// ── Timers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    Mentions,
    ScheduledPost,
    Rotation,
    HourlyReset,
}

impl Timer {
    pub const ALL: [Timer; 4] = [Timer::Mentions, Timer::ScheduledPost, Timer::Rotation, Timer::HourlyReset];

    pub fn label(self) -> &'static str {
        match self {
            Timer::Mentions => "mentions",
            Timer::ScheduledPost => "scheduled-post",
            Timer::Rotation => "rotation",
            Timer::HourlyReset => "hourly-reset",
        }
    }

    pub fn period(self, config: &BotConfig) -> Duration {
        let minutes = |m: u64| Duration::from_secs(m.max(1) * 60);
        match self {
            Timer::Mentions => minutes(config.bot.mention_check_interval_minutes),
            Timer::ScheduledPost => minutes(config.bot.scheduled_post_interval_minutes),
            Timer::Rotation => minutes(config.bot.rotation_interval_minutes),
            Timer::HourlyReset => Duration::from_secs(HOURLY_RESET_INTERVAL_SECS),
        }
    }

    /// Disabled features get no task at all.
    pub fn enabled(self, config: &BotConfig) -> bool {
        match self {
            Timer::Mentions => config.bot.auto_reply_enabled,
            Timer::ScheduledPost => config.bot.auto_schedule_enabled,
            Timer::Rotation => config.bot.influencer_monitoring_enabled,
            Timer::HourlyReset => config.bot.auto_reply_enabled,
        }
    }

    async fn fire(self, orchestrator: &Orchestrator) {
        match self {
            Timer::Mentions => {
                orchestrator.check_mentions().await;
            }
            Timer::ScheduledPost => {
                let report = orchestrator.post_scheduled().await;
                info!("[scheduler] Scheduled post tick: {}", report);
            }
            Timer::Rotation => {
                orchestrator.run_rotation().await;
            }
            Timer::HourlyReset => {
                let prev = orchestrator.reset_hourly();
                info!("[scheduler] Hourly reply counter reset ({} replies last hour)", prev);
            }
        }
    }
}

async fn run_timer(timer: Timer, orchestrator: Arc<Orchestrator>, stop: StopSignal) {
    let period = timer.period(orchestrator.config());
    // First firing one full period after start.
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("[scheduler] {} timer every {}s", timer.label(), period.as_secs());

    loop {
        tokio::select! {
            _ = stop.wait() => break,
            _ = interval.tick() => {}
        }
        if stop.is_stopped() {
            break;
        }
        timer.fire(&orchestrator).await;
    }
    info!("[scheduler] {} timer stopped", timer.label());
}

/// Spawn every enabled timer. Tasks end after `stop` is signalled.
pub fn spawn(orchestrator: Arc<Orchestrator>, stop: &StopSignal) -> Vec<JoinHandle<()>> {
    Timer::ALL
        .into_iter()
        .filter(|t| t.enabled(orchestrator.config()))
        .map(|t| tokio::spawn(run_timer(t, Arc::clone(&orchestrator), stop.clone())))
        .collect()
}

/// Run until stopped, then wait for in-flight ticks to finish.
pub async fn run(orchestrator: Arc<Orchestrator>, stop: StopSignal) {
    let (write, read) = orchestrator.quota_status();
    info!(
        "[scheduler] Starting: writes {}/{} today, {}/{} month; reads {}/{} month",
        write.daily_used, write.daily_limit, write.monthly_used, write.monthly_limit, read.monthly_used, read.monthly_limit
    );
    let handles = spawn(orchestrator, &stop);
    if handles.is_empty() {
        warn!("[scheduler] Every feature is disabled, nothing to schedule");
        return;
    }
    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            warn!("[scheduler] Timer task ended abnormally: {}", e);
        }
    }
    info!("[scheduler] All timers stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_returns_after_stop() {
        let stop = StopSignal::new();
        let waiter = {
            let s = stop.clone();
            tokio::spawn(async move { s.wait().await })
        };
        tokio::task::yield_now().await;
        stop.stop();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert!(stop.is_stopped());
    }

    #[tokio::test]
    async fn wait_after_stop_is_immediate() {
        let stop = StopSignal::new();
        stop.stop();
        tokio::time::timeout(Duration::from_millis(100), stop.wait()).await.unwrap();
    }

    #[test]
    fn periods_follow_config() {
        let mut cfg = BotConfig::default();
        cfg.bot.mention_check_interval_minutes = 3;
        assert_eq!(Timer::Mentions.period(&cfg), Duration::from_secs(180));
        assert_eq!(Timer::ScheduledPost.period(&cfg), Duration::from_secs(240 * 60));
        assert_eq!(Timer::HourlyReset.period(&cfg), Duration::from_secs(3600));
    }

    #[test]
    fn disabled_features_have_no_timer() {
        let mut cfg = BotConfig::default();
        cfg.bot.auto_reply_enabled = false;
        let enabled: Vec<_> = Timer::ALL.into_iter().filter(|t| t.enabled(&cfg)).collect();
        assert_eq!(enabled, vec![Timer::ScheduledPost, Timer::Rotation]);
    }
}
