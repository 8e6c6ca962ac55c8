use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tracing::debug;

use crate::app::{NotifierError, Result};
use crate::fetcher::{FetchRequest, FetchResponse, Fetcher, FetcherConfig};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36";

/// The client identity presented on every request: a desktop Chrome
/// User-Agent with the client hints and accept headers that browser sends.
#[derive(Debug, Clone)]
pub struct ClientProfile {
    pub user_agent: String,
    pub headers: Vec<(&'static str, String)>,
}

impl Default for ClientProfile {
    fn default() -> Self {
        Self::chrome()
    }
}

impl ClientProfile {
    pub fn chrome() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: vec![
                ("accept", "*/*".to_string()),
                ("accept-language", "en-US,en;q=0.9".to_string()),
                (
                    "sec-ch-ua",
                    r#""Google Chrome";v="135", "Not-A.Brand";v="8", "Chromium";v="135""#.to_string(),
                ),
                ("sec-ch-ua-mobile", "?0".to_string()),
                ("sec-ch-ua-platform", r#""Windows""#.to_string()),
                ("sec-fetch-dest", "empty".to_string()),
                ("sec-fetch-mode", "cors".to_string()),
                ("sec-fetch-site", "same-site".to_string()),
            ],
        }
    }

    pub fn with_user_agent(mut self, user_agent: Option<&str>) -> Self {
        if let Some(ua) = user_agent {
            self.user_agent = ua.to_string();
        }
        self
    }

    fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            let value = HeaderValue::from_str(value).map_err(|e| {
                NotifierError::Config(format!("Invalid profile header {}: {}", name, e))
            })?;
            map.insert(HeaderName::from_static(*name), value);
        }
        Ok(map)
    }
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let profile = ClientProfile::chrome().with_user_agent(config.user_agent.as_deref());

        let mut builder = Client::builder()
            .user_agent(profile.user_agent.as_str())
            .default_headers(profile.header_map()?)
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true);

        if let Some(ref proxy) = config.proxy {
            debug!(proxy = %proxy.url(), "Routing requests through proxy");
            builder = builder.proxy(proxy.to_reqwest()?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn request(&self, request: FetchRequest) -> Result<FetchResponse> {
        let FetchRequest {
            method,
            url,
            headers,
            body,
        } = request;

        debug!(%method, %url, "HTTP request");
        let mut builder = self.client.request(method, &url);
        for (name, value) in headers.iter() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        debug!(status, %url, bytes = body.len(), "HTTP response");
        Ok(FetchResponse {
            url,
            status,
            headers,
            body,
        })
    }
}
