// Pawbird Engine — X (Twitter) API v2 Transport
//
// Talks to the v2 REST API with an OAuth 2.0 user-context bearer token.
// The authenticated account is resolved once at connect time via /users/me
// so mention lookups know which timeline to read.
//
// Retry policy:
//   • Reads retry transient 5xx responses (see engine::http).
//   • Writes are never retried: a timed-out POST may still have landed.
//   • 429 is never retried. It surfaces as a Transport error and the
//     orchestrator skips the item until its next tick.

use crate::atoms::constants::TWEET_MAX_CHARS;
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::traits::ContentTransport;
use crate::atoms::types::{truncate_chars, CandidateContent, PublicMetrics};
use crate::engine::config::TwitterConfig;
use crate::engine::http::{build_client, is_retryable_status, retry_delay, CircuitBreaker, MAX_RETRIES};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};

const TWEET_FIELDS: &str = "created_at,public_metrics,referenced_tweets,author_id";

/// The v2 timeline endpoints reject `max_results` outside this range.
const MIN_PAGE: u32 = 5;
const MAX_PAGE: u32 = 100;

// ── API Types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ApiProblem>,
}

#[derive(Debug, Deserialize)]
struct ApiProblem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: String,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id: String,
    text: String,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    public_metrics: Option<ApiMetrics>,
    #[serde(default)]
    referenced_tweets: Vec<ApiReference>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiMetrics {
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    like_count: u64,
}

#[derive(Debug, Deserialize)]
struct ApiReference {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ApiTrend {
    trend_name: String,
}

#[derive(Debug, Deserialize)]
struct ApiCreated {
    id: String,
}

impl ApiTweet {
    /// Tweets without `created_at` are dropped: the orchestrator filters on age.
    fn into_candidate(self, fallback_author: &str) -> Option<CandidateContent> {
        let created_at = self.created_at?;
        let metrics = self.public_metrics.unwrap_or_default();
        let is_reply = self.referenced_tweets.iter().any(|r| r.kind == "replied_to");
        Some(CandidateContent {
            id: self.id,
            author_id: self.author_id.unwrap_or_else(|| fallback_author.to_string()),
            text: self.text,
            created_at,
            metrics: PublicMetrics {
                reply_count: metrics.reply_count,
                like_count: metrics.like_count,
                repost_count: metrics.retweet_count,
            },
            is_reply,
        })
    }
}

fn parse_timeline(body: Value, fallback_author: &str) -> EngineResult<Vec<CandidateContent>> {
    let resp: ApiResponse<Vec<ApiTweet>> = serde_json::from_value(body)?;
    // An empty timeline comes back with no `data` key at all.
    Ok(resp
        .data
        .unwrap_or_default()
        .into_iter()
        .filter_map(|t| t.into_candidate(fallback_author))
        .collect())
}

fn describe_problems(problems: &[ApiProblem]) -> String {
    problems
        .iter()
        .map(|p| if p.detail.is_empty() { p.title.clone() } else { format!("{}: {}", p.title, p.detail) })
        .collect::<Vec<_>>()
        .join("; ")
}

// ── Transport ──────────────────────────────────────────────────────────────

pub struct TwitterTransport {
    client: Client,
    base_url: String,
    access_token: String,
    trends_woeid: u32,
    user_id: String,
    username: String,
    circuit: CircuitBreaker,
}

impl TwitterTransport {
    /// Build the transport and verify credentials against /users/me.
    pub async fn connect(config: &TwitterConfig) -> EngineResult<Self> {
        if config.access_token.trim().is_empty() {
            return Err(EngineError::Config(format!(
                "twitter.access_token is empty (set it in the config or via {})",
                crate::atoms::constants::ENV_TWITTER_TOKEN
            )));
        }
        let mut transport = TwitterTransport {
            client: build_client(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            trends_woeid: config.trends_woeid,
            user_id: String::new(),
            username: String::new(),
            circuit: CircuitBreaker::new("twitter", 5, 300),
        };
        let body = transport.get_json("users/me", &transport.url("/users/me"), &[]).await?;
        let resp: ApiResponse<ApiUser> = serde_json::from_value(body)?;
        let me = resp
            .data
            .ok_or_else(|| EngineError::transport("users/me", describe_problems(&resp.errors)))?;
        info!("[twitter] Authenticated as @{} ({})", me.username, me.id);
        transport.user_id = me.id;
        transport.username = me.username;
        Ok(transport)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.access_token))
    }

    /// GET with retry on transient 5xx. Returns the JSON body.
    async fn get_json(&self, operation: &str, url: &str, query: &[(&str, String)]) -> EngineResult<Value> {
        self.circuit.check().map_err(|m| EngineError::transport(operation, m))?;

        let mut last_error = String::new();
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = retry_delay(attempt - 1, None).await;
                warn!("[twitter] {} retry {}/{} after {}ms", operation, attempt, MAX_RETRIES, delay.as_millis());
            }
            let response = match self.authed(self.client.get(url)).query(query).send().await {
                Ok(r) => r,
                Err(e) => {
                    self.circuit.record_failure();
                    last_error = format!("HTTP request failed: {}", e);
                    continue;
                }
            };
            let status = response.status().as_u16();
            if response.status().is_success() {
                self.circuit.record_success();
                return Ok(response.json().await?);
            }
            let text = response.text().await.unwrap_or_default();
            last_error = format!("API error {}: {}", status, truncate_chars(&text, 200));
            if status == 429 {
                // Rate limits are not failures of the service.
                return Err(EngineError::transport(operation, format!("rate limited: {}", last_error)));
            }
            self.circuit.record_failure();
            if !is_retryable_status(status) {
                break;
            }
        }
        Err(EngineError::transport(operation, last_error))
    }

    /// Single-shot POST /tweets.
    async fn create_tweet(&self, operation: &str, body: Value) -> EngineResult<String> {
        self.circuit.check().map_err(|m| EngineError::transport(operation, m))?;

        let response = self
            .authed(self.client.post(self.url("/tweets")))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                self.circuit.record_failure();
                EngineError::transport(operation, format!("HTTP request failed: {}", e))
            })?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            if status != 429 {
                self.circuit.record_failure();
            }
            return Err(EngineError::transport(
                operation,
                format!("API error {}: {}", status, truncate_chars(&text, 200)),
            ));
        }
        self.circuit.record_success();
        let resp: ApiResponse<ApiCreated> = response.json().await?;
        resp.data
            .map(|c| c.id)
            .ok_or_else(|| EngineError::transport(operation, describe_problems(&resp.errors)))
    }
}

fn page_size(max_results: u32) -> String {
    max_results.clamp(MIN_PAGE, MAX_PAGE).to_string()
}

#[async_trait]
impl ContentTransport for TwitterTransport {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn fetch_recent_content(&self, account_id: &str, max_results: u32) -> EngineResult<Vec<CandidateContent>> {
        let url = self.url(&format!("/users/{}/tweets", account_id));
        let query = [
            ("max_results", page_size(max_results)),
            ("tweet.fields", TWEET_FIELDS.to_string()),
            ("exclude", "retweets".to_string()),
        ];
        let body = self.get_json("fetch_recent_content", &url, &query).await?;
        let mut items = parse_timeline(body, account_id)?;
        // The API floors page size at 5; honour smaller requests locally.
        items.truncate(max_results as usize);
        debug!("[twitter] {} recent posts for {}", items.len(), account_id);
        Ok(items)
    }

    async fn fetch_mentions(&self, max_results: u32) -> EngineResult<Vec<CandidateContent>> {
        let url = self.url(&format!("/users/{}/mentions", self.user_id));
        let query = [
            ("max_results", page_size(max_results)),
            ("tweet.fields", TWEET_FIELDS.to_string()),
        ];
        let body = self.get_json("fetch_mentions", &url, &query).await?;
        let mut items = parse_timeline(body, "")?;
        items.truncate(max_results as usize);
        Ok(items)
    }

    async fn fetch_trending(&self) -> EngineResult<Vec<String>> {
        let url = self.url(&format!("/trends/by/woeid/{}", self.trends_woeid));
        let body = self.get_json("fetch_trending", &url, &[]).await?;
        let resp: ApiResponse<Vec<ApiTrend>> = serde_json::from_value(body)?;
        Ok(resp.data.unwrap_or_default().into_iter().map(|t| t.trend_name).collect())
    }

    async fn post(&self, text: &str) -> EngineResult<String> {
        let text = truncate_chars(text, TWEET_MAX_CHARS);
        self.create_tweet("post", json!({ "text": text })).await
    }

    async fn reply(&self, text: &str, parent_id: &str) -> EngineResult<String> {
        let text = truncate_chars(text, TWEET_MAX_CHARS);
        self.create_tweet(
            "reply",
            json!({
                "text": text,
                "reply": { "in_reply_to_tweet_id": parent_id },
            }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timeline_with_metrics_and_reply_flag() {
        let body = json!({
            "data": [
                {
                    "id": "100",
                    "text": "Fusaka is live",
                    "author_id": "42",
                    "created_at": "2025-12-03T16:00:00.000Z",
                    "public_metrics": {"retweet_count": 12, "reply_count": 3, "like_count": 80, "quote_count": 1}
                },
                {
                    "id": "101",
                    "text": "@someone agreed",
                    "created_at": "2025-12-03T16:05:00.000Z",
                    "referenced_tweets": [{"type": "replied_to", "id": "99"}]
                }
            ],
            "meta": {"result_count": 2}
        });
        let items = parse_timeline(body, "42").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].metrics, PublicMetrics { reply_count: 3, like_count: 80, repost_count: 12 });
        assert!(!items[0].is_reply);
        assert!(items[1].is_reply);
        assert_eq!(items[1].author_id, "42");
    }

    #[test]
    fn empty_timeline_has_no_data_key() {
        let body = json!({"meta": {"result_count": 0}});
        assert!(parse_timeline(body, "1").unwrap().is_empty());
    }

    #[test]
    fn tweets_without_timestamp_are_dropped() {
        let body = json!({"data": [{"id": "1", "text": "x"}]});
        assert!(parse_timeline(body, "1").unwrap().is_empty());
    }

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(page_size(1), "5");
        assert_eq!(page_size(10), "10");
        assert_eq!(page_size(500), "100");
    }

    #[test]
    fn problems_are_joined() {
        let problems = vec![
            ApiProblem { title: "Unauthorized".into(), detail: String::new() },
            ApiProblem { title: "Forbidden".into(), detail: "suspended".into() },
        ];
        assert_eq!(describe_problems(&problems), "Unauthorized; Forbidden: suspended");
    }

    #[tokio::test]
    async fn connect_requires_token() {
        let cfg = TwitterConfig::default();
        assert!(matches!(TwitterTransport::connect(&cfg).await, Err(EngineError::Config(_))));
    }
}
