use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::Post;
use crate::store::NotifiedLedger;

pub const DEFAULT_KEYWORD: &str = "サスケ・ディナー";
pub const DEFAULT_REPOST_MARKER: &str = "RT @";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Substring a post must contain to be announced
    pub keyword: String,

    /// Prefix identifying reposts, which are never announced
    pub repost_marker: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            keyword: DEFAULT_KEYWORD.to_string(),
            repost_marker: DEFAULT_REPOST_MARKER.to_string(),
        }
    }
}

/// Decides which fetched posts deserve a notification.
#[derive(Debug, Clone)]
pub struct FilterEngine {
    keyword: String,
    repost_marker: String,
}

impl FilterEngine {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            keyword: config.keyword.clone(),
            repost_marker: config.repost_marker.clone(),
        }
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn is_repost(&self, post: &Post) -> bool {
        post.is_retweet || post.text.starts_with(&self.repost_marker)
    }

    pub fn is_eligible(&self, post: &Post, ledger: &NotifiedLedger) -> bool {
        !ledger.contains(&post.id) && post.text.contains(&self.keyword) && !self.is_repost(post)
    }

    /// Eligible posts in fetch order, first occurrence of each id only.
    pub fn select(&self, posts: &[Post], ledger: &NotifiedLedger) -> Vec<Post> {
        let mut seen = HashSet::new();
        posts
            .iter()
            .filter(|post| self.is_eligible(post, ledger))
            .filter(|post| seen.insert(post.id.as_str()))
            .cloned()
            .collect()
    }
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}
