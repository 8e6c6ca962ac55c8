use std::collections::HashSet;
use std::hash::Hash;

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, EventLoadingFinished, EventResponseReceived, GetResponseBodyParams, RequestId,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::acquirer::collector::{self, TaskGuard};
use crate::acquirer::{timeline, BrowserConfig, PostSource, SharedBrowser};
use crate::app::{NotifierError, Result};
use crate::config::PlatformConfig;
use crate::domain::session::{AUTH_TOKEN_COOKIE, CSRF_TOKEN_COOKIE};
use crate::domain::{Post, Session};

const SCROLL_SCRIPT: &str =
    "window.scrollTo({ top: document.body.scrollHeight, behavior: 'smooth' })";

fn browser_err(context: &str) -> impl Fn(chromiumoxide::error::CdpError) -> NotifierError + '_ {
    move |e| NotifierError::Browser(format!("{}: {}", context, e))
}

/// Loads the profile page in headless Chrome and reads the timeline
/// responses the page itself requests.
pub struct BrowserTimeline<'a> {
    browser: &'a SharedBrowser,
    session: &'a Session,
    platform: &'a PlatformConfig,
}

impl<'a> BrowserTimeline<'a> {
    pub fn new(browser: &'a SharedBrowser, session: &'a Session, platform: &'a PlatformConfig) -> Self {
        Self {
            browser,
            session,
            platform,
        }
    }

    fn session_cookies(&self) -> Result<Vec<CookieParam>> {
        let domain = self.platform.cookie_domain();
        [
            (AUTH_TOKEN_COOKIE, &self.session.auth_token),
            (CSRF_TOKEN_COOKIE, &self.session.csrf_token),
        ]
        .into_iter()
        .map(|(name, value)| {
            CookieParam::builder()
                .name(name)
                .value(value.as_str())
                .domain(domain.as_str())
                .path("/")
                .secure(true)
                .build()
                .map_err(|e| NotifierError::Browser(format!("Invalid cookie {}: {}", name, e)))
        })
        .collect()
    }

    async fn collect_from(&self, page: &Page, target: &str, limit: usize) -> Result<Vec<Post>> {
        let config = self.browser.config().clone();

        page.set_user_agent(self.browser.user_agent())
            .await
            .map_err(browser_err("Failed to set user agent"))?;
        page.set_cookies(self.session_cookies()?)
            .await
            .map_err(browser_err("Failed to install session cookies"))?;

        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(browser_err("Failed to subscribe to responses"))?;
        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(browser_err("Failed to subscribe to loading events"))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = TaskGuard::default();

        let intercept_page = page.clone();
        let mut tracker = ResponseTracker::new(config.clone());
        tasks.push(tokio::spawn(async move {
            loop {
                let ready = tokio::select! {
                    Some(event) = responses.next() => {
                        tracker.on_response(&event.request_id, &event.response.url)
                    }
                    Some(event) = finished.next() => tracker.on_finished(&event.request_id),
                    else => break,
                };
                let Some(request_id) = ready else {
                    continue;
                };

                match response_body(&intercept_page, request_id).await {
                    Ok(body) => {
                        if tx.send(body).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to read intercepted response"),
                }
            }
        }));

        let profile = self.platform.profile_url(target);
        info!(url = %profile, "Opening profile page");
        tokio::time::timeout(config.navigation_timeout(), page.goto(profile.as_str()))
            .await
            .map_err(|_| NotifierError::Browser(format!("Timed out loading {}", profile)))?
            .map_err(browser_err("Navigation failed"))?;

        let scroll_page = page.clone();
        let scroll_interval = config.scroll_interval();
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scroll_interval);
            loop {
                ticker.tick().await;
                if let Err(e) = scroll_page.evaluate(SCROLL_SCRIPT).await {
                    debug!(error = %e, "Scroll failed");
                }
            }
        }));

        let posts = collector::collect(
            &mut rx,
            limit,
            config.poll_interval(),
            config.wait_timeout(),
            |body| match timeline::posts_from_body(body, target) {
                Ok(posts) => posts,
                Err(e) => {
                    debug!(error = %e, "Ignoring unrecognized timeline response");
                    Vec::new()
                }
            },
        )
        .await;

        drop(tasks);
        info!(count = posts.len(), "Collected posts");
        Ok(posts)
    }
}

/// Pairs `Network.responseReceived` with `Network.loadingFinished` for the
/// same request. A body can be read only once both have arrived, and CDP may
/// deliver them in either order.
struct ResponseTracker<Id> {
    config: BrowserConfig,
    /// Timeline responses whose body is still loading
    pending: HashSet<Id>,
    /// Finished requests whose response event has not been seen yet
    finished_early: HashSet<Id>,
    /// Non-timeline responses whose finish event is still to come
    ignored: HashSet<Id>,
}

impl<Id: Clone + Eq + Hash> ResponseTracker<Id> {
    fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            pending: HashSet::new(),
            finished_early: HashSet::new(),
            ignored: HashSet::new(),
        }
    }

    /// Returns the id when its body is ready to read.
    fn on_response(&mut self, id: &Id, url: &str) -> Option<Id> {
        let already_finished = self.finished_early.remove(id);
        if !self.config.matches_operation(url) {
            if !already_finished {
                self.ignored.insert(id.clone());
            }
            return None;
        }

        debug!(url, "Intercepted timeline response");
        if already_finished {
            Some(id.clone())
        } else {
            self.pending.insert(id.clone());
            None
        }
    }

    /// Returns the id when its body is ready to read.
    fn on_finished(&mut self, id: &Id) -> Option<Id> {
        if self.pending.remove(id) {
            return Some(id.clone());
        }
        if !self.ignored.remove(id) {
            self.finished_early.insert(id.clone());
        }
        None
    }

    #[cfg(test)]
    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.finished_early.is_empty() && self.ignored.is_empty()
    }
}

async fn response_body(page: &Page, request_id: RequestId) -> Result<String> {
    let response = page
        .execute(GetResponseBodyParams::new(request_id))
        .await
        .map_err(browser_err("Failed to fetch response body"))?;
    decode_body(&response.body, response.base64_encoded)
}

fn decode_body(body: &str, base64_encoded: bool) -> Result<String> {
    if !base64_encoded {
        return Ok(body.to_string());
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(body)
        .map_err(|e| NotifierError::Extraction(format!("Invalid base64 body: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| NotifierError::Extraction(format!("Response body is not UTF-8: {}", e)))
}

#[async_trait]
impl PostSource for BrowserTimeline<'_> {
    async fn fetch_recent_posts(&self, target: &str, limit: usize) -> Result<Vec<Post>> {
        let page = self.browser.new_page().await?;
        let result = self.collect_from(&page, target, limit).await;
        if let Err(e) = page.close().await {
            warn!(error = %e, "Failed to close page");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMELINE_URL: &str =
        "https://x.com/i/api/graphql/E3opETHurmVJflFsUBVuUQ/UserTweets?variables=%7B%7D";

    fn tracker() -> ResponseTracker<String> {
        ResponseTracker::new(BrowserConfig::default())
    }

    #[test]
    fn test_body_ready_when_finished_follows_response() {
        let mut tracker = tracker();
        assert_eq!(tracker.on_response(&"7".to_string(), TIMELINE_URL), None);
        assert_eq!(tracker.on_finished(&"7".to_string()), Some("7".to_string()));
        assert!(tracker.is_idle());
    }

    #[test]
    fn test_body_ready_when_finished_arrives_first() {
        let mut tracker = tracker();
        assert_eq!(tracker.on_finished(&"7".to_string()), None);
        assert_eq!(tracker.on_response(&"7".to_string(), TIMELINE_URL), Some("7".to_string()));
        assert!(tracker.is_idle());
    }

    #[test]
    fn test_finished_without_matching_response_is_held() {
        let mut tracker = tracker();
        assert_eq!(tracker.on_response(&"1".to_string(), TIMELINE_URL), None);
        assert_eq!(tracker.on_finished(&"2".to_string()), None);
        assert_eq!(tracker.on_finished(&"2".to_string()), None);
        assert!(!tracker.is_idle());
        assert_eq!(tracker.on_finished(&"1".to_string()), Some("1".to_string()));
    }

    #[test]
    fn test_other_urls_are_never_read() {
        let mut tracker = tracker();
        let profile = "https://x.com/ekusas55000";
        let other_query = "https://x.com/i/api/graphql/abc/UserByScreenName?variables=%7B%7D";

        assert_eq!(tracker.on_response(&"3".to_string(), profile), None);
        assert_eq!(tracker.on_finished(&"3".to_string()), None);
        assert_eq!(tracker.on_finished(&"4".to_string()), None);
        assert_eq!(tracker.on_response(&"4".to_string(), other_query), None);
        assert!(tracker.is_idle());
    }

    #[test]
    fn test_decode_plain_body() {
        assert_eq!(decode_body("{\"a\":1}", false).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_decode_base64_body() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("{\"data\":{}}");
        assert_eq!(decode_body(&encoded, true).unwrap(), "{\"data\":{}}");
        assert!(decode_body("%%%", true).is_err());
    }

    #[test]
    fn test_session_cookies_target_platform_domain() {
        let browser = SharedBrowser::new(Default::default(), None);
        let session = Session::new("tok", "csrf");
        let platform = PlatformConfig::default();
        let cookies = BrowserTimeline::new(&browser, &session, &platform)
            .session_cookies()
            .unwrap();

        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "auth_token");
        assert_eq!(cookies[0].value, "tok");
        assert_eq!(cookies[1].name, "ct0");
        assert_eq!(cookies[0].domain.as_deref(), Some(".x.com"));
    }
}
