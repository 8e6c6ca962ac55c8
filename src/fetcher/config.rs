use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::{NotifierError, Result};

/// Configuration for the outbound HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,

    /// Override for the profile's User-Agent
    pub user_agent: Option<String>,

    /// Forward proxy for every request
    pub proxy: Option<ProxyConfig>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: None,
            proxy: None,
        }
    }
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// `http` when unset
    pub protocol: Option<String>,
}

impl ProxyConfig {
    /// Parse a `PROXY_SERVER` style value: `host:port`, `http://host:port`
    /// or `https://host:port`.
    pub fn from_server(
        server: &str,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        let invalid = || {
            NotifierError::Config(format!(
                "Invalid proxy server: {}. Expected format: host:port, http://host:port or https://host:port",
                server
            ))
        };

        let server = server.trim();
        let normalized = if server.contains("://") {
            server.to_string()
        } else {
            format!("http://{}", server)
        };
        let url = url::Url::parse(&normalized).map_err(|_| invalid())?;
        let host = url.host_str().ok_or_else(invalid)?.to_string();
        let port = url.port_or_known_default().ok_or_else(invalid)?;

        Ok(Self {
            host,
            port,
            username: username.filter(|u| !u.is_empty()),
            password: password.filter(|p| !p.is_empty()),
            protocol: Some(url.scheme().to_string()),
        })
    }

    pub fn scheme(&self) -> &str {
        self.protocol.as_deref().unwrap_or("http")
    }

    /// Proxy URL without credentials.
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.host, self.port)
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }

    pub fn to_reqwest(&self) -> Result<reqwest::Proxy> {
        let mut proxy = reqwest::Proxy::all(self.url())?;
        if let Some((user, pass)) = self.credentials() {
            proxy = proxy.basic_auth(user, pass);
        }
        Ok(proxy)
    }

    /// Chrome launch flag. Chrome takes no credentials on the command line,
    /// so authenticated proxies only apply to the HTTP client.
    pub fn chrome_arg(&self) -> String {
        format!("--proxy-server={}", self.url())
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host_port_defaults_to_http() {
        let proxy = ProxyConfig::from_server("10.0.0.1:8080", None, None).unwrap();
        assert_eq!(proxy.host, "10.0.0.1");
        assert_eq!(proxy.port, 8080);
        assert_eq!(proxy.url(), "http://10.0.0.1:8080");
    }

    #[test]
    fn test_https_scheme_and_credentials() {
        let proxy = ProxyConfig::from_server(
            "https://proxy.example.com:3128",
            Some("user".into()),
            Some("pass".into()),
        )
        .unwrap();
        assert_eq!(proxy.scheme(), "https");
        assert!(proxy.has_credentials());
        assert_eq!(proxy.chrome_arg(), "--proxy-server=https://proxy.example.com:3128");
        assert!(proxy.to_reqwest().is_ok());
    }

    #[test]
    fn test_half_credentials_are_ignored() {
        let proxy =
            ProxyConfig::from_server("proxy:1080", Some("user".into()), Some(String::new())).unwrap();
        assert!(!proxy.has_credentials());
    }

    #[test]
    fn test_invalid_server() {
        assert!(ProxyConfig::from_server("http://", None, None).is_err());
        assert!(ProxyConfig::from_server("exa mple:80", None, None).is_err());
    }

    #[test]
    fn test_defaults() {
        let config = FetcherConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.proxy.is_none());
    }
}
