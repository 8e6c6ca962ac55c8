use std::sync::Arc;

use tracing::{debug, info};

use crate::acquirer::{AcquisitionStrategy, BrowserTimeline, PostSource, SharedBrowser, TimelineApi};
use crate::app::pipeline::{self, RunSummary};
use crate::app::Result;
use crate::auth::Authenticator;
use crate::config::Config;
use crate::dispatch::{DiscordSink, Dispatcher};
use crate::domain::Session;
use crate::fetcher::{Fetcher, SharedFetcher};
use crate::filter::FilterEngine;
use crate::store::{NotifiedLedger, SessionStore};

/// Owns every long-lived resource of one process: configuration, the
/// session cache, the shared HTTP client and the shared browser.
///
/// Consumers borrow from it; [`shutdown`](Self::shutdown) releases what was
/// started.
pub struct AppContext {
    pub config: Config,
    pub session_store: SessionStore,
    pub fetcher: SharedFetcher,
    pub browser: SharedBrowser,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        let session_store = SessionStore::new(&config.paths.cookie_cache, config.session.expiry());
        let fetcher = SharedFetcher::new(config.fetcher.clone());
        let browser = SharedBrowser::new(config.browser.clone(), config.fetcher.proxy.clone());
        Self {
            config,
            session_store,
            fetcher,
            browser,
        }
    }

    /// Build around a prepared HTTP client (tests, alternate transports).
    pub fn with_fetcher(config: Config, client: Arc<dyn Fetcher>) -> Self {
        let mut context = Self::new(config);
        context.fetcher = SharedFetcher::with_factory(context.config.fetcher.clone(), move |_| Ok(client.clone()));
        context
    }

    pub fn authenticator(&self) -> Authenticator<'_> {
        Authenticator::new(
            &self.session_store,
            &self.fetcher,
            &self.config.platform,
            self.config.login_retry,
        )
    }

    pub async fn session(&self) -> Result<Session> {
        self.authenticator()
            .obtain_session(&self.config.twitter.credentials())
            .await
    }

    /// The configured acquisition strategy, bound to `session`.
    pub fn source<'a>(&'a self, session: &'a Session) -> Box<dyn PostSource + 'a> {
        debug!(strategy = %self.config.acquisition.strategy, "Selecting acquisition strategy");
        match self.config.acquisition.strategy {
            AcquisitionStrategy::Api => Box::new(TimelineApi::new(&self.fetcher, session, &self.config.platform)),
            AcquisitionStrategy::Browser => {
                Box::new(BrowserTimeline::new(&self.browser, session, &self.config.platform))
            }
        }
    }

    /// One complete cycle: session, ledger, fetch, filter, notify.
    pub async fn run_cycle(&self) -> Result<RunSummary> {
        let session = self.session().await?;
        let mut ledger = NotifiedLedger::open(&self.config.paths.notified)?;

        let source = self.source(&session);
        let filter = FilterEngine::new(&self.config.filter);
        let sink = DiscordSink::new(&self.fetcher, &self.config.discord);
        let dispatcher = Dispatcher::new(&sink, self.config.dispatch.clone(), &self.config.platform.web_base);

        pipeline::run_once(
            source.as_ref(),
            &self.config.acquisition.target,
            self.config.acquisition.limit,
            &mut ledger,
            &filter,
            &dispatcher,
        )
        .await
    }

    /// Release the shared browser and HTTP client. Never fails; problems are
    /// logged.
    pub async fn shutdown(self) {
        debug!("Releasing shared resources");
        self.browser.release().await;
        self.fetcher.release().await;
        info!("Cleanup complete");
    }
}
