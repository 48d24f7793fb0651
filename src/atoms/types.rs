// ── Pawbird Atoms: Pure Data Types ────────────────────────────────────────────
// Plain struct/enum definitions shared by every engine component.
// Atoms layer rule: no I/O, no side effects, no imports from engine/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Quota ──────────────────────────────────────────────────────────────────

/// One of the two independently tracked quota pools.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Write,
    Read,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Write => f.write_str("write"),
            Resource::Read => f.write_str("read"),
        }
    }
}

/// Why a quota unit is being consumed.
/// `PriorityReply` (answering a direct mention) bypasses the daily write cap
/// but never the monthly ceiling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConsumeKind {
    Automated,
    PriorityReply,
}

impl fmt::Display for ConsumeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumeKind::Automated => f.write_str("automated"),
            ConsumeKind::PriorityReply => f.write_str("priority-reply"),
        }
    }
}

/// Read-only snapshot of one quota pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotaStatus {
    pub resource: Resource,
    pub daily_used: u32,
    pub daily_limit: u32,
    pub monthly_used: u32,
    pub monthly_limit: u32,
    /// Whether an automated post would be admitted right now.
    pub can_tweet: bool,
}

// ── Tracked accounts ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => f.write_str("high"),
            Priority::Medium => f.write_str("medium"),
            Priority::Low => f.write_str("low"),
        }
    }
}

/// A catalogued account the bot monitors for engagement opportunities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedAccount {
    pub id: String,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub expertise: Vec<String>,
    #[serde(default)]
    pub response_style: String,
    pub priority: Priority,
    pub max_replies_per_day: u32,
}

// ── Candidate content ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicMetrics {
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub repost_count: u64,
}

/// A unit of externally-sourced timeline content (a post or a mention).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateContent {
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metrics: PublicMetrics,
    #[serde(default)]
    pub is_reply: bool,
}

// ── Scoring ────────────────────────────────────────────────────────────────

/// Per-component breakdown of a reply-worthiness score.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub keyword: u8,
    pub engagement: u8,
    pub timing: u8,
    pub original: u8,
    pub priority: u8,
    pub total: u8,
}

// ── Text helpers ───────────────────────────────────────────────────────────

/// Character count (Unicode scalar values), the unit platform limits use.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_chars_respects_multibyte() {
        let s = "héllo wörld";
        assert_eq!(truncate_chars(s, 4), "héll");
        assert_eq!(truncate_chars(s, 100), s);
        assert_eq!(char_len(truncate_chars("🚀🚀🚀", 2)), 2);
    }

    #[test]
    fn priority_orders_high_first() {
        let mut p = vec![Priority::Low, Priority::High, Priority::Medium];
        p.sort();
        assert_eq!(p, vec![Priority::High, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn consume_kind_serializes_kebab() {
        let s = serde_json::to_string(&ConsumeKind::PriorityReply).unwrap();
        assert_eq!(s, "\"priority-reply\"");
    }
}
