use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One normalized post from the watched account.
///
/// Identity is the platform id alone: two posts with equal ids are the same
/// item no matter which acquisition strategy produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_handle: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub media_urls: Vec<String>,
    pub is_retweet: bool,
}

impl Post {
    pub fn new(id: impl Into<String>, author_handle: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author_handle: author_handle.into(),
            text: text.into(),
            created_at: Utc::now(),
            media_urls: Vec::new(),
            is_retweet: false,
        }
    }

    /// Public link to the post under `web_base` (e.g. `https://x.com`).
    pub fn permalink(&self, web_base: &str) -> String {
        format!(
            "{}/{}/status/{}",
            web_base.trim_end_matches('/'),
            self.author_handle,
            self.id
        )
    }

    pub fn first_media(&self) -> Option<&str> {
        self.media_urls
            .iter()
            .map(String::as_str)
            .find(|url| !url.is_empty())
    }

    /// Chronological order: creation time, then snowflake id (numeric when
    /// both ids are digits, which makes shorter ids older).
    pub fn chronological(a: &Post, b: &Post) -> Ordering {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| compare_ids(&a.id, &b.id))
    }
}

fn compare_ids(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());
    if numeric(a) && numeric(b) {
        let a = a.trim_start_matches('0');
        let b = b.trim_start_matches('0');
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}

impl PartialEq for Post {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Post {}

impl Hash for Post {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
