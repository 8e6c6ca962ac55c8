use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::acquirer::timeline;
use crate::acquirer::PostSource;
use crate::app::{NotifierError, Result};
use crate::auth::RetryPolicy;
use crate::config::PlatformConfig;
use crate::domain::{Post, Session};
use crate::fetcher::{FetchRequest, Fetcher, RequestHeaders};

/// Feature switches the web client sends with timeline queries. The server
/// rejects queries that omit any it considers required.
fn graphql_features() -> Value {
    json!({
        "hidden_profile_subscriptions_enabled": true,
        "highlights_tweets_tab_ui_enabled": true,
        "subscriptions_verification_info_is_identity_verified_enabled": true,
        "subscriptions_verification_info_verified_since_enabled": true,
        "responsive_web_twitter_article_notes_tab_enabled": true,
        "rweb_tipjar_consumption_enabled": true,
        "responsive_web_graphql_exclude_directive_enabled": true,
        "verified_phone_label_enabled": false,
        "creator_subscriptions_tweet_preview_api_enabled": true,
        "responsive_web_graphql_timeline_navigation_enabled": true,
        "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false,
        "communities_web_enable_tweet_community_results_fetch": true,
        "c9s_tweet_anatomy_moderator_badge_enabled": true,
        "articles_preview_enabled": true,
        "responsive_web_edit_tweet_api_enabled": true,
        "graphql_is_translatable_rweb_tweet_is_translatable_enabled": true,
        "view_counts_everywhere_api_enabled": true,
        "longform_notetweets_consumption_enabled": true,
        "responsive_web_twitter_article_tweet_consumption_enabled": true,
        "tweet_awards_web_tipping_enabled": false,
        "creator_subscriptions_quote_tweet_preview_enabled": false,
        "freedom_of_speech_not_reach_fetch_enabled": true,
        "standardized_nudges_misinfo": true,
        "tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled": true,
        "rweb_video_timestamps_enabled": true,
        "longform_notetweets_rich_text_read_enabled": true,
        "longform_notetweets_inline_media_enabled": true,
        "responsive_web_enhance_cards_enabled": false,
    })
}

/// Direct GraphQL timeline requests authenticated by session cookies.
pub struct TimelineApi<'a> {
    fetcher: &'a dyn Fetcher,
    session: &'a Session,
    platform: &'a PlatformConfig,
    retry: RetryPolicy,
}

impl<'a> TimelineApi<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, session: &'a Session, platform: &'a PlatformConfig) -> Self {
        Self {
            fetcher,
            session,
            platform,
            retry: RetryPolicy::acquisition(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn headers(&self) -> RequestHeaders {
        RequestHeaders::from([
            ("authorization", self.platform.authorization()),
            ("cookie", self.session.cookie_header()),
            ("x-csrf-token", self.session.csrf_token.clone()),
            ("x-twitter-auth-type", "OAuth2Session".to_string()),
            ("x-twitter-active-user", "yes".to_string()),
            ("x-twitter-client-language", "en".to_string()),
            ("content-type", "application/json".to_string()),
        ])
    }

    async fn query(&self, query_id: &str, operation: &str, variables: Value) -> Result<Value> {
        let base = self.platform.graphql_url(query_id, operation);
        let url = url::Url::parse_with_params(
            &base,
            &[
                ("variables", variables.to_string()),
                ("features", graphql_features().to_string()),
            ],
        )?;
        let request = FetchRequest::get(url.as_str()).headers(self.headers());

        self.retry
            .run(operation, |attempt| {
                let request = request.clone();
                async move {
                    debug!(operation, attempt, "GraphQL request");
                    let response = self.fetcher.request(request).await?.error_for_status()?;
                    response.json::<Value>()
                }
            })
            .await
    }

    /// Resolve a screen name to the account's numeric id.
    pub async fn user_id(&self, screen_name: &str) -> Result<String> {
        let payload = self
            .query(
                &self.platform.user_by_screen_name_query_id,
                "UserByScreenName",
                json!({ "screen_name": screen_name, "withSafetyModeUserFields": true }),
            )
            .await?;

        payload
            .pointer("/data/user/result/rest_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                NotifierError::Extraction(format!("user {} not found", screen_name))
            })
    }
}

#[async_trait]
impl PostSource for TimelineApi<'_> {
    async fn fetch_recent_posts(&self, target: &str, limit: usize) -> Result<Vec<Post>> {
        let user_id = self.user_id(target).await?;
        info!(target, %user_id, "Resolved watched account");

        let payload = self
            .query(
                &self.platform.user_tweets_query_id,
                "UserTweets",
                json!({
                    "userId": user_id,
                    "count": limit,
                    "includePromotedContent": false,
                    "withQuickPromoteEligibilityTweetFields": false,
                    "withVoice": true,
                    "withV2Timeline": true,
                }),
            )
            .await?;

        let mut posts = timeline::keep_posts(timeline::extract(&payload, target)?);
        posts.truncate(limit);
        info!(count = posts.len(), "Fetched posts");
        Ok(posts)
    }
}
