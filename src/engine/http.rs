// ── Pawbird Engine: HTTP Retry & Circuit-Breaker ─────────────────────────────
//
// Shared retry utilities used by the text generators and the platform transport.
//
// Features:
//   • Exponential backoff with ±25% jitter (base 1s, max 30s, 2 retries)
//   • Retryable statuses: 500, 502, 503, 504, 529 (+429 where the caller opts in)
//   • Respects `Retry-After` header
//   • Circuit breaker: N consecutive failures → fail fast for a cooldown
//
// A retry never spans ticks: once attempts are exhausted the error goes back
// to the orchestrator, which skips the item until the next timer firing.

use log::warn;
use rand::Rng;
use reqwest::Client;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

// ── Constants ──────────────────────────────────────────────────────────────

/// Default maximum number of retry attempts per request.
pub const MAX_RETRIES: u32 = 2;

/// Initial retry delay in milliseconds (doubles each attempt).
const INITIAL_RETRY_DELAY_MS: u64 = 1_000;

/// Maximum retry delay cap in milliseconds (30 seconds).
const MAX_RETRY_DELAY_MS: u64 = 30_000;

// ── Client factory ─────────────────────────────────────────────────────────

/// Shared client settings for every outbound collaborator.
pub fn build_client() -> Client {
    match Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .user_agent(concat!("pawbird/", env!("CARGO_PKG_VERSION")))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!("[http] Client builder failed, falling back to defaults (no timeouts): {}", e);
            Client::new()
        }
    }
}

// ── Retryable status detection ─────────────────────────────────────────────

/// Check if an HTTP status code represents a transient server-side error.
/// 429 is handled separately: the generator retries it, the transport does not.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 500 | 502 | 503 | 504 | 529)
}

// ── Backoff delay ──────────────────────────────────────────────────────────

/// Compute the backoff for a 0-based `attempt`, honouring `Retry-After`.
pub fn backoff_delay(attempt: u32, retry_after_secs: Option<u64>) -> Duration {
    let base_ms = INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt.min(10));
    let capped_ms = base_ms.min(MAX_RETRY_DELAY_MS);
    let delay_ms = if let Some(secs) = retry_after_secs {
        // Server-specified delay, capped at 60s and floored at our backoff
        (secs.min(60) * 1000).max(capped_ms)
    } else {
        capped_ms
    };
    Duration::from_millis(apply_jitter(delay_ms))
}

/// Sleep with exponential backoff + jitter. Returns the delay for logging.
pub async fn retry_delay(attempt: u32, retry_after_secs: Option<u64>) -> Duration {
    let delay = backoff_delay(attempt, retry_after_secs);
    tokio::time::sleep(delay).await;
    delay
}

/// Apply ±25% jitter to prevent thundering-herd effects.
fn apply_jitter(base_ms: u64) -> u64 {
    let jitter_range = (base_ms / 4) as i64;
    if jitter_range == 0 {
        return base_ms.max(100);
    }
    let offset = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
    (base_ms as i64 + offset).max(100) as u64
}

// ── Retry-After header parsing ─────────────────────────────────────────────

/// Parse Retry-After header value (integer seconds only).
pub fn parse_retry_after(header_value: &str) -> Option<u64> {
    header_value.trim().parse::<u64>().ok()
}

// ── Circuit Breaker ────────────────────────────────────────────────────────

/// Trips after N consecutive failures, then rejects requests for a cooldown
/// period before allowing a probe.
///
/// States:
///   Closed   — normal operation, requests pass through
///   Open     — rejecting requests (cooldown active)
///   HalfOpen — cooldown expired, one probe request allowed
pub struct CircuitBreaker {
    /// Label used in log lines ("twitter", "openai").
    name: &'static str,
    consecutive_failures: AtomicU32,
    /// Epoch seconds when the circuit was tripped open.
    tripped_at: AtomicU64,
    threshold: u32,
    cooldown_secs: u64,
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl CircuitBreaker {
    pub const fn new(name: &'static str, threshold: u32, cooldown_secs: u64) -> Self {
        Self {
            name,
            consecutive_failures: AtomicU32::new(0),
            tripped_at: AtomicU64::new(0),
            threshold,
            cooldown_secs,
        }
    }

    /// `Ok(())` if a request may go out, `Err(message)` while the circuit is open.
    pub fn check(&self) -> Result<(), String> {
        let failures = self.consecutive_failures.load(Ordering::Relaxed);
        if failures < self.threshold {
            return Ok(());
        }
        let elapsed = epoch_secs().saturating_sub(self.tripped_at.load(Ordering::Relaxed));
        if elapsed < self.cooldown_secs {
            Err(format!(
                "Circuit breaker open for {}: {} consecutive failures, cooling down for {}s",
                self.name,
                failures,
                self.cooldown_secs - elapsed
            ))
        } else {
            Ok(())
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.tripped_at.store(0, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        let prev = self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        if prev + 1 >= self.threshold {
            self.tripped_at.store(epoch_secs(), Ordering::Relaxed);
            warn!(
                "[circuit-breaker] {} tripped after {} consecutive failures, cooling down {}s",
                self.name,
                prev + 1,
                self.cooldown_secs
            );
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_client_builds_requests() {
        let req = build_client().get("http://localhost/health").build().unwrap();
        assert_eq!(req.url().path(), "/health");
    }

    #[test]
    fn retryable_statuses() {
        for s in [500, 502, 503, 504, 529] {
            assert!(is_retryable_status(s));
        }
        for s in [200, 400, 401, 403, 404, 429] {
            assert!(!is_retryable_status(s));
        }
    }

    #[test]
    fn parse_retry_after_valid() {
        assert_eq!(parse_retry_after("5"), Some(5));
        assert_eq!(parse_retry_after(" 30 "), Some(30));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn jitter_stays_in_range() {
        for base in [100, 1000, 5000, 30_000] {
            for _ in 0..50 {
                let result = apply_jitter(base);
                let lower = (base as f64 * 0.75) as u64;
                let upper = (base as f64 * 1.25) as u64;
                assert!(result >= lower.max(100) && result <= upper, "jitter({}) = {}", base, result);
            }
        }
    }

    #[test]
    fn backoff_honours_retry_after_floor_and_cap() {
        let d = backoff_delay(0, Some(10));
        assert!(d >= Duration::from_millis(7_500) && d <= Duration::from_millis(12_500));
        let capped = backoff_delay(0, Some(600));
        assert!(capped <= Duration::from_millis(75_000));
        let big_attempt = backoff_delay(20, None);
        assert!(big_attempt <= Duration::from_millis(37_500));
    }

    #[test]
    fn circuit_breaker_trips_and_recovers() {
        let cb = CircuitBreaker::new("test", 3, 60);
        assert!(cb.check().is_ok());
        cb.record_failure();
        cb.record_failure();
        assert!(cb.check().is_ok());
        cb.record_failure();
        let err = cb.check().unwrap_err();
        assert!(err.contains("test"));
        cb.record_success();
        assert!(cb.check().is_ok());
    }

    #[test]
    fn circuit_breaker_half_opens_after_cooldown() {
        let cb = CircuitBreaker::new("test", 1, 0);
        cb.record_failure();
        assert!(cb.check().is_ok());
    }
}
