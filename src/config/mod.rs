//! Configuration management.
//!
//! Configuration is read from `./data/config.toml` (or `CONFIG_PATH`).
//! Every section is optional and falls back to defaults; command-line flags
//! and environment variables are applied on top. `dinner-notifier init`
//! writes a commented template.

pub mod platform;

pub use platform::PlatformConfig;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::acquirer::{AcquisitionConfig, AcquisitionStrategy, BrowserConfig};
use crate::auth::RetryPolicy;
use crate::dispatch::{DiscordConfig, DispatchConfig};
use crate::domain::Credentials;
use crate::fetcher::{FetcherConfig, ProxyConfig};
use crate::filter::FilterConfig;
use crate::store::session::DEFAULT_EXPIRY_DAYS;

pub const DEFAULT_CONFIG_PATH: &str = "./data/config.toml";
pub const DEFAULT_NOTIFIED_PATH: &str = "./data/notified.json";
pub const DEFAULT_COOKIE_CACHE_PATH: &str = "./data/twitter-cookies.json";
pub const MAX_SESSION_EXPIRY_DAYS: i64 = 3650;

/// Login credentials of the watching account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    pub username: String,
    pub password: String,
    /// Answer to email confirmation challenges
    pub email: Option<String>,
    /// Base32 TOTP seed for two-factor challenges
    pub otp_secret: Option<String>,
}

impl TwitterConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            identifier: self.username.clone(),
            secret: self.password.clone(),
            email: self.email.clone().filter(|e| !e.is_empty()),
            otp_secret: self.otp_secret.clone().filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Ledger of already-notified post ids
    pub notified: PathBuf,
    /// Cached session cookies
    pub cookie_cache: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            notified: PathBuf::from(DEFAULT_NOTIFIED_PATH),
            cookie_cache: PathBuf::from(DEFAULT_COOKIE_CACHE_PATH),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Days a cached session stays valid (default: 7, at most 3650)
    pub expiry_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry_days: DEFAULT_EXPIRY_DAYS,
        }
    }
}

impl SessionConfig {
    pub fn expiry(&self) -> chrono::Duration {
        chrono::Duration::try_days(self.expiry_days)
            .unwrap_or_else(|| chrono::Duration::days(DEFAULT_EXPIRY_DAYS))
    }
}

/// Main configuration struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub twitter: TwitterConfig,
    pub discord: DiscordConfig,
    pub acquisition: AcquisitionConfig,
    pub browser: BrowserConfig,
    pub filter: FilterConfig,
    pub dispatch: DispatchConfig,
    pub fetcher: FetcherConfig,
    pub paths: PathsConfig,
    pub session: SessionConfig,
    pub login_retry: RetryPolicy,
    pub platform: PlatformConfig,
}

/// Values supplied on the command line or through the environment. Each
/// one that is set replaces the corresponding file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub notified_path: Option<PathBuf>,
    pub cookie_cache_path: Option<PathBuf>,
    pub strategy: Option<AcquisitionStrategy>,
    pub proxy_server: Option<String>,
    pub proxy_username: Option<String>,
    pub proxy_password: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub discord_token: Option<String>,
    pub discord_channel_id: Option<String>,
}

impl Config {
    /// Load configuration from `path`.
    ///
    /// A missing file yields the defaults; an unreadable or invalid one is
    /// an error. Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<(), ConfigError> {
        if let Some(ref path) = overrides.notified_path {
            self.paths.notified = path.clone();
        }
        if let Some(ref path) = overrides.cookie_cache_path {
            self.paths.cookie_cache = path.clone();
        }
        if let Some(strategy) = overrides.strategy {
            self.acquisition.strategy = strategy;
        }
        if let Some(ref username) = overrides.username {
            self.twitter.username = username.clone();
        }
        if let Some(ref password) = overrides.password {
            self.twitter.password = password.clone();
        }
        if let Some(ref token) = overrides.discord_token {
            self.discord.token = token.clone();
        }
        if let Some(ref channel) = overrides.discord_channel_id {
            self.discord.channel_id = channel.clone();
        }
        if let Some(ref server) = overrides.proxy_server.as_ref().filter(|s| !s.trim().is_empty()) {
            let proxy = ProxyConfig::from_server(
                server,
                overrides.proxy_username.clone(),
                overrides.proxy_password.clone(),
            )
            .map_err(|e| ConfigError::Invalid(vec![e.to_string()]))?;
            self.fetcher.proxy = Some(proxy);
        }
        Ok(())
    }

    /// Every problem that would make a run fail, so they can all be
    /// reported at once.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.discord.token.trim().is_empty() {
            problems.push("discord.token is required".to_string());
        }
        if self.discord.channel_id.trim().is_empty() {
            problems.push("discord.channel_id is required".to_string());
        }
        if self.acquisition.target.trim().is_empty() {
            problems.push("acquisition.target is required".to_string());
        }
        if self.acquisition.limit == 0 {
            problems.push("acquisition.limit must be at least 1".to_string());
        }
        if self.filter.keyword.is_empty() {
            problems.push("filter.keyword must not be empty".to_string());
        }
        if !(1..=MAX_SESSION_EXPIRY_DAYS).contains(&self.session.expiry_days) {
            problems.push(format!(
                "session.expiry_days must be between 1 and {}",
                MAX_SESSION_EXPIRY_DAYS
            ));
        }
        if self.login_retry.max_attempts == 0 {
            problems.push("login_retry.max_attempts must be at least 1".to_string());
        }
        if self.browser.operation.trim().is_empty() {
            problems.push("browser.operation must not be empty".to_string());
        }
        if self.browser.scroll_interval_ms == 0 {
            problems.push("browser.scroll_interval_ms must be at least 1".to_string());
        }
        if self.browser.poll_interval_ms == 0 {
            problems.push("browser.poll_interval_ms must be at least 1".to_string());
        }
        if self.browser.wait_timeout_secs == 0 {
            problems.push("browser.wait_timeout_secs must be at least 1".to_string());
        }
        if let Some(ref proxy) = self.fetcher.proxy {
            if proxy.host.is_empty() || proxy.port == 0 {
                problems.push(format!("fetcher.proxy is invalid: {}", proxy.url()));
            }
        }
        problems
    }

    /// Like [`validate`](Self::validate), but as a single error.
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// Write the commented template to `path`. Refuses to overwrite unless `force`.
    pub fn write_template(path: &Path, force: bool) -> Result<(), ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    pub fn default_config_content() -> String {
        r##"# dinner-notifier configuration
#
# Every section is optional. Values can also be supplied through the
# environment (see `dinner-notifier --help`).

[twitter]
# Account used to read the timeline. Only needed when no valid session is cached.
username = ""
password = ""
# email = "me@example.com"          # answers email confirmation challenges
# otp_secret = "BASE32SECRET"       # answers two-factor challenges

[discord]
token = ""
channel_id = ""

[acquisition]
# "api" requests the timeline directly; "browser" reads it from headless Chrome.
strategy = "api"
target = "ekusas55000"
limit = 200

[filter]
keyword = "サスケ・ディナー"
repost_marker = "RT @"

[dispatch]
# Pause between messages (milliseconds)
delay_ms = 1000
# "abort" stops at the first failed message; "continue" tries the rest.
on_failure = "abort"
title = "サスケ・ディナー"
color = 65280

[paths]
notified = "./data/notified.json"
cookie_cache = "./data/twitter-cookies.json"

[session]
expiry_days = 7

[login_retry]
max_attempts = 5
base_delay_ms = 1000
max_delay_ms = 30000

[fetcher]
timeout_secs = 30
# [fetcher.proxy]
# host = "127.0.0.1"
# port = 8080
# protocol = "http"

[browser]
headless = true
scroll_interval_ms = 1000
poll_interval_ms = 1000
wait_timeout_secs = 10
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Config file already exists at {0} (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("Invalid configuration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}
