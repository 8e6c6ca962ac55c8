//! Fetching the watched account's recent posts.

pub mod api;
pub mod browser;
pub mod chrome;
pub mod collector;
pub mod config;
pub mod timeline;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::{NotifierError, Result};
use crate::domain::Post;

pub use api::TimelineApi;
pub use browser::SharedBrowser;
pub use chrome::BrowserTimeline;
pub use collector::{Collector, CollectorState};
pub use config::{AcquisitionConfig, BrowserConfig};

/// A source of recent posts from one account.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Up to `limit` recent posts by `target`, newest-first.
    async fn fetch_recent_posts(&self, target: &str, limit: usize) -> Result<Vec<Post>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionStrategy {
    #[default]
    Api,
    Browser,
}

impl fmt::Display for AcquisitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api => write!(f, "api"),
            Self::Browser => write!(f, "browser"),
        }
    }
}

impl FromStr for AcquisitionStrategy {
    type Err = NotifierError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(Self::Api),
            "browser" => Ok(Self::Browser),
            other => Err(NotifierError::Config(format!(
                "Unknown acquisition strategy: {} (expected api or browser)",
                other
            ))),
        }
    }
}
