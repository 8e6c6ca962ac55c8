//! Delivery of eligible posts to the notification channel.

pub mod discord;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::app::{NotifierError, Result};
use crate::domain::Post;
use crate::filter::DEFAULT_KEYWORD;
use crate::store::NotifiedLedger;

pub use discord::{DiscordConfig, DiscordSink};

/// Rich attachment rendered by the channel under the message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub color: u32,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Embed {
    /// Timestamp in the `2018-10-10T20:19:24.000Z` form channels expect.
    pub fn timestamp_string(&self) -> Option<String> {
        self.timestamp
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// A notification channel.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn send(&self, content: &str, embed: Option<&Embed>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnFailure {
    /// Stop the batch at the first failed send
    #[default]
    Abort,
    /// Log the failure and keep going; the run still fails at the end
    Continue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Pause between consecutive messages in milliseconds (default: 1000)
    pub delay_ms: u64,

    pub on_failure: OnFailure,

    /// Embed title (default: the filter keyword)
    pub title: String,

    /// Embed color as 0xRRGGBB (default: green)
    pub color: u32,

    /// Plain message text sent alongside the embed
    pub content: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            delay_ms: 1000,
            on_failure: OnFailure::Abort,
            title: DEFAULT_KEYWORD.to_string(),
            color: 0x00ff00,
            content: String::new(),
        }
    }
}

impl DispatchConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: Vec<String>,
    pub skipped_no_media: Vec<String>,
    pub failed: Vec<(String, String)>,
}

pub struct Dispatcher<'a> {
    sink: &'a dyn Sink,
    config: DispatchConfig,
    web_base: String,
}

impl<'a> Dispatcher<'a> {
    pub fn new(sink: &'a dyn Sink, config: DispatchConfig, web_base: impl Into<String>) -> Self {
        Self {
            sink,
            config,
            web_base: web_base.into(),
        }
    }

    pub fn embed_for(&self, post: &Post) -> Option<Embed> {
        let image = post.first_media()?;
        let link = post.permalink(&self.web_base);
        Some(Embed {
            title: self.config.title.clone(),
            description: link,
            url: None,
            image_url: Some(image.to_string()),
            color: self.config.color,
            timestamp: Some(post.created_at),
        })
    }

    /// Deliver `posts` oldest-first, marking each in the ledger only after
    /// the channel accepted it.
    pub async fn dispatch(&self, posts: Vec<Post>, ledger: &mut NotifiedLedger) -> Result<DispatchReport> {
        let mut posts = posts;
        posts.sort_by(Post::chronological);

        let mut report = DispatchReport::default();
        for post in posts {
            let Some(embed) = self.embed_for(&post) else {
                info!(id = %post.id, "Skipping post without media");
                report.skipped_no_media.push(post.id);
                continue;
            };

            if !report.sent.is_empty() || !report.failed.is_empty() {
                tokio::time::sleep(self.config.delay()).await;
            }

            info!(id = %post.id, url = %embed.description, "Sending notification");
            match self.sink.send(&self.config.content, Some(&embed)).await {
                Ok(()) => {
                    ledger.add(&post.id)?;
                    report.sent.push(post.id);
                }
                Err(e) if self.config.on_failure == OnFailure::Continue => {
                    warn!(id = %post.id, error = %e, "Delivery failed, continuing");
                    report.failed.push((post.id, e.to_string()));
                }
                Err(e) => {
                    error!(id = %post.id, error = %e, "Delivery failed, aborting batch");
                    return Err(e);
                }
            }
        }
        Ok(report)
    }
}

impl DispatchReport {
    /// Fail when any delivery failed, after the whole batch was attempted.
    pub fn into_result(self) -> Result<Self> {
        if self.failed.is_empty() {
            return Ok(self);
        }
        let ids: Vec<&str> = self.failed.iter().map(|(id, _)| id.as_str()).collect();
        Err(NotifierError::Delivery(format!(
            "{} notification(s) failed: {}",
            self.failed.len(),
            ids.join(", ")
        )))
    }
}


#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::TempDir;
    use tokio::time::Instant;

    use super::testing::RecordingSink;
    use super::*;

    fn post(id: &str, minute: u32, media: bool) -> Post {
        let mut post = Post::new(id, "ekusas55000", "サスケ・ディナー");
        post.created_at = Utc.with_ymd_and_hms(2025, 1, 1, 12, minute, 0).unwrap();
        if media {
            post.media_urls = vec![format!("https://pbs.twimg.com/media/{}.jpg", id)];
        }
        post
    }

    fn open_ledger(dir: &TempDir) -> NotifiedLedger {
        NotifiedLedger::open(dir.path().join("notified.json")).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivers_oldest_first_with_pacing() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open_ledger(&dir);
        let sink = RecordingSink::default();
        let dispatcher = Dispatcher::new(&sink, DispatchConfig::default(), "https://x.com");
        let start = Instant::now();

        let report = dispatcher
            .dispatch(vec![post("5", 5, true), post("3", 3, true), post("4", 4, true)], &mut ledger)
            .await
            .unwrap();

        assert_eq!(report.sent, vec!["3", "4", "5"]);
        assert_eq!(sink.sent_ids(), vec!["3", "4", "5"]);
        assert_eq!(ledger.ids(), &["3", "4", "5"]);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_timestamp_orders_by_snowflake() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open_ledger(&dir);
        let sink = RecordingSink::default();
        let dispatcher = Dispatcher::new(&sink, DispatchConfig::default(), "https://x.com");

        let report = dispatcher
            .dispatch(vec![post("10", 0, true), post("9", 0, true)], &mut ledger)
            .await
            .unwrap();
        assert_eq!(report.sent, vec!["9", "10"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_posts_without_media_are_skipped_and_not_marked() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open_ledger(&dir);
        let sink = RecordingSink::default();
        let dispatcher = Dispatcher::new(&sink, DispatchConfig::default(), "https://x.com");

        let report = dispatcher
            .dispatch(vec![post("2", 2, false), post("1", 1, true)], &mut ledger)
            .await
            .unwrap();

        assert_eq!(report.sent, vec!["1"]);
        assert_eq!(report.skipped_no_media, vec!["2"]);
        assert!(!ledger.contains("2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_aborts_without_marking() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open_ledger(&dir);
        let sink = RecordingSink::failing_on(&["2"]);
        let dispatcher = Dispatcher::new(&sink, DispatchConfig::default(), "https://x.com");

        let err = dispatcher
            .dispatch(vec![post("3", 3, true), post("2", 2, true), post("1", 1, true)], &mut ledger)
            .await
            .unwrap_err();

        assert!(matches!(err, NotifierError::Delivery(_)));
        assert_eq!(ledger.ids(), &["1"]);
        assert_eq!(sink.sent_ids(), vec!["1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continue_mode_finishes_batch_then_fails() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open_ledger(&dir);
        let sink = RecordingSink::failing_on(&["2"]);
        let config = DispatchConfig {
            on_failure: OnFailure::Continue,
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(&sink, config, "https://x.com");

        let report = dispatcher
            .dispatch(vec![post("3", 3, true), post("2", 2, true), post("1", 1, true)], &mut ledger)
            .await
            .unwrap();

        assert_eq!(report.sent, vec!["1", "3"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(ledger.ids(), &["1", "3"]);
        assert!(report.into_result().is_err());
    }

    #[test]
    fn test_embed_shape() {
        let sink = RecordingSink::default();
        let dispatcher = Dispatcher::new(&sink, DispatchConfig::default(), "https://x.com/");
        let embed = dispatcher.embed_for(&post("42", 7, true)).unwrap();

        assert_eq!(embed.title, "サスケ・ディナー");
        assert_eq!(embed.description, "https://x.com/ekusas55000/status/42");
        assert_eq!(embed.image_url.as_deref(), Some("https://pbs.twimg.com/media/42.jpg"));
        assert_eq!(embed.color, 0x00ff00);
        assert_eq!(embed.timestamp_string().unwrap(), "2025-01-01T12:07:00.000Z");
    }
}
