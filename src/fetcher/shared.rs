use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::app::Result;
use crate::fetcher::{FetchRequest, FetchResponse, Fetcher, FetcherConfig, HttpFetcher};

type Factory = dyn Fn(&FetcherConfig) -> Result<Arc<dyn Fetcher>> + Send + Sync;

/// Process-wide HTTP client, built on first use.
///
/// Every caller awaits the same initialization, so concurrent first requests
/// never construct two clients. Owned by the application context and
/// released explicitly on shutdown.
pub struct SharedFetcher {
    config: FetcherConfig,
    factory: Box<Factory>,
    cell: OnceCell<Arc<dyn Fetcher>>,
}

impl SharedFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self::with_factory(config, |config| {
            Ok(Arc::new(HttpFetcher::new(config)?) as Arc<dyn Fetcher>)
        })
    }

    /// Use a custom constructor for the underlying client.
    pub fn with_factory<F>(config: FetcherConfig, factory: F) -> Self
    where
        F: Fn(&FetcherConfig) -> Result<Arc<dyn Fetcher>> + Send + Sync + 'static,
    {
        Self {
            config,
            factory: Box::new(factory),
            cell: OnceCell::new(),
        }
    }

    pub async fn client(&self) -> Result<Arc<dyn Fetcher>> {
        let client = self
            .cell
            .get_or_try_init(|| async {
                debug!("Initializing shared HTTP client");
                (self.factory)(&self.config)
            })
            .await?;
        Ok(client.clone())
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// Tear down the client if it was ever built.
    pub async fn release(self) {
        if let Some(client) = self.cell.into_inner() {
            drop(client);
            info!("Released shared HTTP client");
        }
    }
}

#[async_trait]
impl Fetcher for SharedFetcher {
    async fn request(&self, request: FetchRequest) -> Result<FetchResponse> {
        self.client().await?.request(request).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::fetcher::testing::{respond, ScriptedFetcher};

    fn counting(count: Arc<AtomicUsize>) -> SharedFetcher {
        SharedFetcher::with_factory(FetcherConfig::default(), move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(ScriptedFetcher::always(respond(200, "ok"))) as Arc<dyn Fetcher>)
        })
    }

    #[tokio::test]
    async fn test_lazy_until_first_use() {
        let count = Arc::new(AtomicUsize::new(0));
        let shared = counting(count.clone());
        assert!(!shared.is_initialized());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let response = shared.request(FetchRequest::get("https://x.com")).await.unwrap();
        assert_eq!(response.body, "ok");
        assert!(shared.is_initialized());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_instance() {
        let count = Arc::new(AtomicUsize::new(0));
        let shared = counting(count.clone());

        let (a, b, c) = tokio::join!(shared.client(), shared.client(), shared.client());
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_init_is_retried_on_next_call() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();
        let shared = SharedFetcher::with_factory(FetcherConfig::default(), move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(crate::app::NotifierError::Config("boom".into()))
            } else {
                Ok(Arc::new(ScriptedFetcher::always(respond(200, ""))) as Arc<dyn Fetcher>)
            }
        });

        assert!(shared.client().await.is_err());
        assert!(shared.client().await.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_release_without_use_is_a_noop() {
        let count = Arc::new(AtomicUsize::new(0));
        counting(count.clone()).release().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
