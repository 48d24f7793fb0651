// ── Pawbird Atoms: Constants ───────────────────────────────────────────────
// All named constants for the crate live here.

// ── Platform limits ────────────────────────────────────────────────────────
/// Maximum post length on the microblogging platform, in characters.
pub const TWEET_MAX_CHARS: usize = 280;

// ── Quota defaults ─────────────────────────────────────────────────────────
// Free-tier API ceilings. Daily limits default to monthly / 30, floored.
pub const DEFAULT_MONTHLY_WRITE_LIMIT: u32 = 500;
pub const DEFAULT_MONTHLY_READ_LIMIT: u32 = 100;
pub const DAYS_PER_QUOTA_MONTH: u32 = 30;

// ── Scoring ────────────────────────────────────────────────────────────────
pub const SCORE_KEYWORD: u8 = 3;
pub const SCORE_ENGAGEMENT: u8 = 2;
pub const SCORE_TIMING: u8 = 2;
pub const SCORE_ORIGINAL: u8 = 1;
pub const SCORE_PRIORITY_HIGH: u8 = 2;
pub const SCORE_PRIORITY_MEDIUM: u8 = 1;
/// Sum of every component weight.
pub const MAX_SCORE: u8 = 10;
/// Minimum total for a candidate to be worth a reply.
pub const ACTIONABLE_SCORE: u8 = 5;

pub const ENGAGEMENT_MIN_REPOSTS: u64 = 10;
pub const ENGAGEMENT_MIN_LIKES: u64 = 50;
pub const ENGAGEMENT_MIN_REPLIES: u64 = 5;

/// Content younger than this looks too eager to reply to.
pub const MIN_CONTENT_AGE_SECS: i64 = 5 * 60;
/// Content older than this is no longer timely.
pub const MAX_CONTENT_AGE_SECS: i64 = 4 * 60 * 60;

// ── Rotation & pacing ──────────────────────────────────────────────────────
/// Accounts visited per pass; each visit spends one read.
pub const DEFAULT_ROTATION_SIZE: usize = 3;
pub const DEFAULT_REPLY_DELAY_SECS: u64 = 5;
pub const DEFAULT_ACCOUNT_DELAY_SECS: u64 = 2;

// ── Mentions ───────────────────────────────────────────────────────────────
pub const DEFAULT_MAX_REPLIES_PER_HOUR: u32 = 10;
/// Bound on remembered mention/content ids (oldest evicted first).
pub const DEFAULT_PROCESSED_CAPACITY: usize = 10_000;

// ── Fetch sizes ────────────────────────────────────────────────────────────
pub const DEFAULT_FETCH_MAX_RESULTS: u32 = 5;
pub const DEFAULT_MENTION_MAX_RESULTS: u32 = 10;

// ── Schedules (minutes) ────────────────────────────────────────────────────
pub const DEFAULT_SCHEDULED_POST_INTERVAL_MINUTES: u64 = 240;
pub const DEFAULT_MENTION_CHECK_INTERVAL_MINUTES: u64 = 15;
pub const MINUTES_PER_DAY: u64 = 24 * 60;
/// One pass a day keeps the default rotation within 100 reads a month.
pub const DEFAULT_ROTATION_INTERVAL_MINUTES: u64 = MINUTES_PER_DAY;
pub const HOURLY_RESET_INTERVAL_SECS: u64 = 3600;

// ── Environment overrides for secrets ──────────────────────────────────────
pub const ENV_LLM_API_KEY: &str = "PAWBIRD_LLM_API_KEY";
pub const ENV_TWITTER_TOKEN: &str = "PAWBIRD_TWITTER_TOKEN";
