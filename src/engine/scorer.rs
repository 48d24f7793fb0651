// Pawbird Engine — Engagement Candidate Scorer
//
// Additive, deterministic reply-worthiness score in 0..=10.
// Pure: no I/O, no clock reads (the caller passes `now`).

use crate::atoms::constants::*;
use crate::atoms::types::{CandidateContent, Priority, ScoreBreakdown, TrackedAccount};
use chrono::{DateTime, Utc};

pub struct EngagementScorer {
    /// Lowercased domain keywords.
    keywords: Vec<String>,
}

impl EngagementScorer {
    pub fn new(keywords: &[String]) -> Self {
        EngagementScorer {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn score(&self, content: &CandidateContent, account: &TrackedAccount, now: DateTime<Utc>) -> ScoreBreakdown {
        let text = content.text.to_lowercase();

        let keyword = if self.keywords.iter().any(|k| text.contains(k.as_str())) {
            SCORE_KEYWORD
        } else {
            0
        };

        let m = &content.metrics;
        let engagement = if m.repost_count > ENGAGEMENT_MIN_REPOSTS
            || m.like_count > ENGAGEMENT_MIN_LIKES
            || m.reply_count > ENGAGEMENT_MIN_REPLIES
        {
            SCORE_ENGAGEMENT
        } else {
            0
        };

        // Too fresh looks automated, too stale is no longer timely.
        let age_secs = (now - content.created_at).num_seconds();
        let timing = if age_secs > MIN_CONTENT_AGE_SECS && age_secs < MAX_CONTENT_AGE_SECS {
            SCORE_TIMING
        } else {
            0
        };

        let original = if content.is_reply { 0 } else { SCORE_ORIGINAL };

        let priority = match account.priority {
            Priority::High => SCORE_PRIORITY_HIGH,
            Priority::Medium => SCORE_PRIORITY_MEDIUM,
            Priority::Low => 0,
        };

        ScoreBreakdown {
            keyword,
            engagement,
            timing,
            original,
            priority,
            total: keyword + engagement + timing + original + priority,
        }
    }

    pub fn is_actionable(breakdown: &ScoreBreakdown) -> bool {
        breakdown.total >= ACTIONABLE_SCORE
    }
}
