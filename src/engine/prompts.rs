// Pawbird Engine — Prompt Builders
// Plain string templates handed to the text generator. Each asks for a single
// post body with no hashtags or links: references are appended by the tagger.

use crate::atoms::constants::TWEET_MAX_CHARS;
use crate::atoms::types::{CandidateContent, TrackedAccount};

/// Reply to someone who mentioned the bot.
pub fn mention_reply(mention: &CandidateContent) -> String {
    format!(
        "Someone mentioned our account with this post:\n\n\"{}\"\n\n\
         Write a friendly, concise reply (under {} characters) that answers or \
         acknowledges them. No hashtags, no links, no quotes around the reply.",
        mention.text.trim(),
        TWEET_MAX_CHARS
    )
}

/// Reply to a tracked account's post, in the tone the catalog asks for.
pub fn influencer_reply(account: &TrackedAccount, content: &CandidateContent) -> String {
    let expertise = if account.expertise.is_empty() {
        "the Ethereum ecosystem".to_string()
    } else {
        account.expertise.join(", ")
    };
    let style = if account.response_style.trim().is_empty() {
        "thoughtful and technical"
    } else {
        account.response_style.trim()
    };
    format!(
        "@{} ({}) works on {} and just posted:\n\n\"{}\"\n\n\
         Write a reply under {} characters that adds something substantive. \
         Tone: {}. No hashtags, no links, no quotes around the reply.",
        account.username,
        account.name,
        expertise,
        content.text.trim(),
        TWEET_MAX_CHARS,
        style
    )
}

/// Standalone scheduled post, optionally riffing on what is trending.
pub fn scheduled_post(trending: &[String]) -> String {
    let mut prompt = format!(
        "Write one original post (under {} characters) about Ethereum scaling: \
         rollups, blobs, PeerDAS or the Fusaka upgrade. Be specific and upbeat. \
         No hashtags, no links.",
        TWEET_MAX_CHARS
    );
    let topics: Vec<&str> = trending.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).take(5).collect();
    if !topics.is_empty() {
        prompt.push_str(&format!(
            "\n\nTrending right now: {}. Tie in one of these only if it fits naturally.",
            topics.join(", ")
        ));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::{Priority, PublicMetrics};
    use chrono::Utc;

    fn content(text: &str) -> CandidateContent {
        CandidateContent {
            id: "1".into(),
            author_id: "2".into(),
            text: text.into(),
            created_at: Utc::now(),
            metrics: PublicMetrics::default(),
            is_reply: false,
        }
    }

    #[test]
    fn influencer_prompt_uses_profile() {
        let account = TrackedAccount {
            id: "2".into(),
            username: "dankrad".into(),
            name: "Dankrad".into(),
            expertise: vec!["danksharding".into(), "kzg".into()],
            response_style: "curious".into(),
            priority: Priority::High,
            max_replies_per_day: 1,
        };
        let p = influencer_reply(&account, &content("blobs are underpriced"));
        assert!(p.contains("@dankrad"));
        assert!(p.contains("danksharding, kzg"));
        assert!(p.contains("Tone: curious"));
        assert!(p.contains("blobs are underpriced"));
    }

    #[test]
    fn scheduled_prompt_lists_at_most_five_trends() {
        let trends: Vec<String> = (0..8).map(|i| format!("t{}", i)).collect();
        let p = scheduled_post(&trends);
        assert!(p.contains("t4"));
        assert!(!p.contains("t5"));
        assert!(!scheduled_post(&[]).contains("Trending"));
    }

    #[test]
    fn mention_prompt_quotes_text() {
        assert!(mention_reply(&content("  what is PeerDAS? ")).contains("\"what is PeerDAS?\""));
    }
}
