use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::acquirer::BrowserConfig;
use crate::app::{NotifierError, Result};
use crate::fetcher::http_fetcher::DEFAULT_USER_AGENT;
use crate::fetcher::ProxyConfig;

struct Running {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// Process-wide headless Chrome, launched on the first page request and
/// closed by [`release`](Self::release).
pub struct SharedBrowser {
    config: BrowserConfig,
    proxy: Option<ProxyConfig>,
    cell: OnceCell<Running>,
}

impl SharedBrowser {
    pub fn new(config: BrowserConfig, proxy: Option<ProxyConfig>) -> Self {
        Self {
            config,
            proxy,
            cell: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    pub fn is_launched(&self) -> bool {
        self.cell.initialized()
    }

    pub fn user_agent(&self) -> &str {
        self.config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    /// Command-line switches passed to Chrome.
    pub fn launch_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "--no-sandbox",
            "--disable-gpu",
            "--disable-dev-shm-usage",
            "--disable-software-rasterizer",
            "--disable-blink-features=AutomationControlled",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(format!("--user-agent={}", self.user_agent()));

        if let Some(ref proxy) = self.proxy {
            if proxy.has_credentials() {
                warn!("Proxy credentials are not supported by the browser strategy; connecting without them");
            }
            args.push(proxy.chrome_arg());
        }
        args
    }

    async fn launch(&self) -> Result<Running> {
        let mut builder = LaunchConfig::builder().args(self.launch_args());
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = self.config.executable {
            builder = builder.chrome_executable(path);
        }

        let launch_config = builder
            .build()
            .map_err(|e| NotifierError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(launch_config).await.map_err(|e| {
            NotifierError::Browser(format!(
                "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                e
            ))
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler event error");
                }
            }
        });

        info!(headless = self.config.headless, "Launched headless browser");
        Ok(Running { browser, handler })
    }

    /// A fresh blank page, launching the browser if needed.
    pub async fn new_page(&self) -> Result<Page> {
        let running = self.cell.get_or_try_init(|| self.launch()).await?;
        running
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| NotifierError::Browser(format!("Failed to create page: {}", e)))
    }

    /// Close the browser if it was ever launched.
    pub async fn release(self) {
        let Some(mut running) = self.cell.into_inner() else {
            return;
        };
        if let Err(e) = running.browser.close().await {
            warn!(error = %e, "Failed to close browser");
        }
        if let Err(e) = running.browser.wait().await {
            warn!(error = %e, "Failed to wait for browser exit");
        }
        running.handler.abort();
        info!("Closed headless browser");
    }
}
