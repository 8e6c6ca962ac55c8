//! Session acquisition: cached cookies first, a fresh login otherwise.

pub mod flow;
pub mod retry;

use tracing::info;

use crate::app::{NotifierError, Result};
use crate::config::PlatformConfig;
use crate::domain::session::{AUTH_TOKEN_COOKIE, CSRF_TOKEN_COOKIE};
use crate::domain::{Credentials, Session};
use crate::fetcher::Fetcher;
use crate::store::SessionStore;

pub use flow::{CookieJar, LoginFlow};
pub use retry::RetryPolicy;

pub struct Authenticator<'a> {
    store: &'a SessionStore,
    fetcher: &'a dyn Fetcher,
    platform: &'a PlatformConfig,
    retry: RetryPolicy,
}

impl<'a> Authenticator<'a> {
    pub fn new(
        store: &'a SessionStore,
        fetcher: &'a dyn Fetcher,
        platform: &'a PlatformConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            fetcher,
            platform,
            retry,
        }
    }

    /// A usable session: the cached one when still fresh, else a new login.
    pub async fn obtain_session(&self, credentials: &Credentials) -> Result<Session> {
        if let Some(session) = self.store.load() {
            info!("Using cached session");
            return Ok(session);
        }
        self.refresh(credentials).await
    }

    /// Log in regardless of the cache and overwrite it on success.
    pub async fn refresh(&self, credentials: &Credentials) -> Result<Session> {
        if credentials.identifier.is_empty() || credentials.secret.is_empty() {
            return Err(NotifierError::Auth(
                "no cached session and no login credentials configured".into(),
            ));
        }

        let max_attempts = self.retry.max_attempts;
        let jar = self
            .retry
            .run("login", |attempt| {
                info!(attempt, max_attempts, "Logging in");
                LoginFlow::new(self.fetcher, self.platform).login(credentials)
            })
            .await?;

        let session = session_from_cookies(&jar)?;
        self.store.save(&session)?;
        info!(path = %self.store.path().display(), "Login succeeded, session cached");
        Ok(session)
    }
}

fn session_from_cookies(jar: &CookieJar) -> Result<Session> {
    let auth_token = jar.get(AUTH_TOKEN_COOKIE).unwrap_or_default();
    let csrf_token = jar.get(CSRF_TOKEN_COOKIE).unwrap_or_default();
    if auth_token.is_empty() || csrf_token.is_empty() {
        return Err(NotifierError::Auth(format!(
            "login did not yield both {} and {} cookies",
            AUTH_TOKEN_COOKIE, CSRF_TOKEN_COOKIE
        )));
    }
    Ok(Session::new(auth_token, csrf_token))
}
