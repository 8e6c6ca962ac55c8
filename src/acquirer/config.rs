use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::acquirer::AcquisitionStrategy;

/// What to watch and how to fetch it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// `api` (direct GraphQL requests) or `browser` (headless Chrome interception)
    pub strategy: AcquisitionStrategy,

    /// Screen name of the watched account
    pub target: String,

    /// Maximum number of recent posts to fetch per run (default: 200)
    pub limit: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            strategy: AcquisitionStrategy::Api,
            target: "ekusas55000".to_string(),
            limit: 200,
        }
    }
}

/// Configuration for the headless browser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Whether to run the browser in headless mode (default: true)
    pub headless: bool,

    /// Path to a Chrome/Chromium binary; auto-detected when unset
    pub executable: Option<String>,

    /// User agent string to use; the HTTP client's profile when unset
    pub user_agent: Option<String>,

    /// GraphQL operation whose responses are intercepted (default: UserTweets)
    pub operation: String,

    /// Interval between page scrolls in milliseconds (default: 1000)
    pub scroll_interval_ms: u64,

    /// Interval between checks of the intercepted responses in milliseconds (default: 1000)
    pub poll_interval_ms: u64,

    /// How long to wait for a batch with new posts before giving up, in seconds (default: 10)
    pub wait_timeout_secs: u64,

    /// Page navigation timeout in seconds (default: 30)
    pub navigation_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            user_agent: None,
            operation: "UserTweets".to_string(),
            scroll_interval_ms: 1000,
            poll_interval_ms: 1000,
            wait_timeout_secs: 10,
            navigation_timeout_secs: 30,
        }
    }
}

impl BrowserConfig {
    pub fn scroll_interval(&self) -> Duration {
        Duration::from_millis(self.scroll_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    /// Whether an intercepted request URL belongs to the watched operation.
    pub fn matches_operation(&self, url: &str) -> bool {
        let path = url.split('?').next().unwrap_or(url);
        path.ends_with(&format!("/{}", self.operation))
    }
}
