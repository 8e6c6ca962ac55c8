use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Cookie names the platform uses for the two session tokens.
pub const AUTH_TOKEN_COOKIE: &str = "auth_token";
pub const CSRF_TOKEN_COOKIE: &str = "ct0";

/// Authenticated session against the platform.
///
/// Serialized in the cache file as `{"auth_token", "ct0", "savedAt"}` with
/// `savedAt` in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "auth_token")]
    pub auth_token: String,
    #[serde(rename = "ct0")]
    pub csrf_token: String,
    #[serde(rename = "savedAt", with = "chrono::serde::ts_milliseconds")]
    pub saved_at: DateTime<Utc>,
}

impl Session {
    pub fn new(auth_token: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            csrf_token: csrf_token.into(),
            saved_at: Utc::now(),
        }
    }

    /// Both tokens present. A session with only one of them is unusable.
    pub fn is_complete(&self) -> bool {
        !self.auth_token.is_empty() && !self.csrf_token.is_empty()
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.saved_at)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, expiry: Duration) -> bool {
        self.age(now) < expiry
    }

    /// `Cookie` header value carrying both tokens.
    pub fn cookie_header(&self) -> String {
        format!(
            "{}={}; {}={}",
            AUTH_TOKEN_COOKIE, self.auth_token, CSRF_TOKEN_COOKIE, self.csrf_token
        )
    }
}

/// Login credentials for the watching account.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub identifier: String,
    pub secret: String,
    pub email: Option<String>,
    /// Base32 TOTP seed for two-factor challenges.
    pub otp_secret: Option<String>,
}
