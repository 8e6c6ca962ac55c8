use serde::{Deserialize, Serialize};

/// Public bearer token of the platform's own web client.
pub const WEB_BEARER_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

/// Endpoints and identifiers of the watched platform.
///
/// GraphQL query ids rotate when the web client is redeployed, so they are
/// configurable rather than baked in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Web origin used for profile pages and permalinks
    pub web_base: String,

    /// REST API origin (guest activation, login flow)
    pub api_base: String,

    /// GraphQL API root
    pub graphql_base: String,

    pub bearer_token: String,

    pub user_tweets_query_id: String,

    pub user_by_screen_name_query_id: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            web_base: "https://x.com".to_string(),
            api_base: "https://api.x.com".to_string(),
            graphql_base: "https://x.com/i/api/graphql".to_string(),
            bearer_token: WEB_BEARER_TOKEN.to_string(),
            user_tweets_query_id: "E3opETHurmVJflFsUBVuUQ".to_string(),
            user_by_screen_name_query_id: "G3KGOASz96M-Qu0nwmGXNg".to_string(),
        }
    }
}

impl PlatformConfig {
    pub fn guest_activate_url(&self) -> String {
        format!("{}/1.1/guest/activate.json", self.api_base.trim_end_matches('/'))
    }

    pub fn onboarding_task_url(&self) -> String {
        format!("{}/1.1/onboarding/task.json", self.api_base.trim_end_matches('/'))
    }

    pub fn graphql_url(&self, query_id: &str, operation: &str) -> String {
        format!(
            "{}/{}/{}",
            self.graphql_base.trim_end_matches('/'),
            query_id,
            operation
        )
    }

    pub fn profile_url(&self, screen_name: &str) -> String {
        format!("{}/{}", self.web_base.trim_end_matches('/'), screen_name)
    }

    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.bearer_token)
    }

    /// Cookie domain for the web origin, e.g. `.x.com`.
    pub fn cookie_domain(&self) -> String {
        let host = url::Url::parse(&self.web_base)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "x.com".to_string());
        format!(".{}", host.trim_start_matches("www."))
    }
}
