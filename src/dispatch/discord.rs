use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::app::{NotifierError, Result};
use crate::dispatch::{Embed, Sink};
use crate::fetcher::{FetchRequest, Fetcher};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token
    pub token: String,

    /// Channel that receives the notifications
    pub channel_id: String,

    /// API root (default: https://discord.com/api/v10)
    pub api_base: Option<String>,
}

impl DiscordConfig {
    pub fn messages_url(&self) -> String {
        let base = self
            .api_base
            .as_deref()
            .unwrap_or("https://discord.com/api/v10")
            .trim_end_matches('/');
        format!("{}/channels/{}/messages", base, self.channel_id)
    }
}

#[derive(Debug, Deserialize)]
struct RateLimited {
    retry_after: f64,
}

/// Posts channel messages through the bot API.
pub struct DiscordSink<'a> {
    fetcher: &'a dyn Fetcher,
    config: &'a DiscordConfig,
}

impl<'a> DiscordSink<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, config: &'a DiscordConfig) -> Self {
        Self { fetcher, config }
    }
}

fn embed_json(embed: &Embed) -> Value {
    let mut value = json!({
        "title": embed.title,
        "description": embed.description,
        "color": embed.color,
    });
    if let Some(ref url) = embed.url {
        value["url"] = json!(url);
    }
    if let Some(ref image) = embed.image_url {
        value["image"] = json!({ "url": image });
    }
    if let Some(ts) = embed.timestamp_string() {
        value["timestamp"] = json!(ts);
    }
    value
}

#[async_trait]
impl Sink for DiscordSink<'_> {
    async fn send(&self, content: &str, embed: Option<&Embed>) -> Result<()> {
        let embeds: Vec<Value> = embed.map(embed_json).into_iter().collect();
        let body = json!({ "content": content, "embeds": embeds });

        let request = FetchRequest::post(self.config.messages_url())
            .header("authorization", format!("Bot {}", self.config.token))
            .json(&body)?;
        let response = self.fetcher.request(request).await?;

        if response.status == 429 {
            let retry_after = response
                .json::<RateLimited>()
                .map(|r| r.retry_after)
                .unwrap_or_default();
            return Err(NotifierError::Delivery(format!(
                "rate limited by Discord, retry after {:.1}s",
                retry_after
            )));
        }
        if !response.is_success() {
            let status = response.status;
            let body: String = response.body.chars().take(300).collect();
            return Err(NotifierError::Delivery(format!(
                "Discord responded with status {}: {}",
                status, body
            )));
        }

        debug!(status = response.status, "Discord accepted message");
        Ok(())
    }
}
