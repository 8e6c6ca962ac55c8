//! Normalization of `UserTweets` GraphQL payloads into [`Post`]s.
//!
//! Both acquisition strategies see the same payload: the direct API returns
//! it as the response body, the browser intercepts it off the wire.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::app::{NotifierError, Result};
use crate::domain::Post;

const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

const INSTRUCTION_PATHS: [&str; 2] = [
    "/data/user/result/timeline_v2/timeline/instructions",
    "/data/user/result/timeline/timeline/instructions",
];

/// Outcome of normalizing one timeline entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Post(Post),
    Skipped { entry_id: String, reason: String },
}

/// Normalize every tweet entry of a timeline payload, newest-first as served.
///
/// Fails only when the payload has no recognizable instruction list.
pub fn extract(payload: &Value, fallback_author: &str) -> Result<Vec<Extracted>> {
    let instructions = INSTRUCTION_PATHS
        .iter()
        .find_map(|path| payload.pointer(path))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            NotifierError::Extraction("payload has no timeline instructions".into())
        })?;

    let entries = instructions
        .iter()
        .filter(|i| i["type"] == "TimelineAddEntries")
        .filter_map(|i| i["entries"].as_array())
        .flatten()
        .filter(|e| {
            e["entryId"]
                .as_str()
                .is_some_and(|id| id.starts_with("tweet-"))
        });

    let mut extracted = Vec::new();
    for entry in entries {
        let entry_id = entry["entryId"].as_str().unwrap_or_default().to_string();
        let result = entry.pointer("/content/itemContent/tweet_results/result");
        let outcome = match result {
            Some(result) => convert(result, fallback_author),
            None => Err("entry carries no tweet result".to_string()),
        };
        extracted.push(match outcome {
            Ok(post) => Extracted::Post(post),
            Err(reason) => Extracted::Skipped { entry_id, reason },
        });
    }
    Ok(extracted)
}

/// Parse a raw response body and keep only the posts, logging what was skipped.
pub fn posts_from_body(body: &str, fallback_author: &str) -> Result<Vec<Post>> {
    let payload: Value = serde_json::from_str(body)?;
    Ok(keep_posts(extract(&payload, fallback_author)?))
}

pub fn keep_posts(extracted: Vec<Extracted>) -> Vec<Post> {
    extracted
        .into_iter()
        .filter_map(|item| match item {
            Extracted::Post(post) => Some(post),
            Extracted::Skipped { entry_id, reason } => {
                warn!(entry = %entry_id, %reason, "Skipping timeline entry");
                None
            }
        })
        .collect()
}

fn convert(result: &Value, fallback_author: &str) -> std::result::Result<Post, String> {
    // TweetWithVisibilityResults wraps the tweet one level down.
    let tweet = match result.get("tweet") {
        Some(inner) if result.get("legacy").is_none() => inner,
        _ => result,
    };
    let legacy = tweet
        .get("legacy")
        .ok_or_else(|| "missing legacy payload".to_string())?;

    let id = legacy["id_str"]
        .as_str()
        .or_else(|| tweet["rest_id"].as_str())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| "missing id".to_string())?;

    let raw_created = legacy["created_at"].as_str().unwrap_or_default();
    let created_at = parse_created_at(raw_created)
        .ok_or_else(|| format!("unparseable created_at {:?}", raw_created))?;

    let text = legacy["full_text"].as_str().unwrap_or_default();
    if text.is_empty() {
        debug!(id, "Tweet has no text");
    }

    let author = ["/core/user_results/result/legacy/screen_name", "/core/user_results/result/core/screen_name"]
        .iter()
        .find_map(|path| tweet.pointer(path).and_then(Value::as_str))
        .unwrap_or(fallback_author);

    let mut post = Post::new(id, author, text);
    post.created_at = created_at;
    post.media_urls = media_urls(legacy);
    post.is_retweet = legacy.get("retweeted_status_result").is_some() || text.starts_with("RT @");
    Ok(post)
}

fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, CREATED_AT_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn media_urls(legacy: &Value) -> Vec<String> {
    let media = legacy
        .pointer("/extended_entities/media")
        .or_else(|| legacy.pointer("/entities/media"))
        .and_then(Value::as_array);

    media
        .map(|items| {
            items
                .iter()
                .filter_map(|m| m["media_url_https"].as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
