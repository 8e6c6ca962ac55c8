pub mod config;
pub mod http_fetcher;
pub mod shared;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::app::{NotifierError, Result};

pub use config::{FetcherConfig, ProxyConfig};
pub use http_fetcher::{ClientProfile, HttpFetcher};
pub use shared::SharedFetcher;

/// Outbound headers, normalized to one lower-cased map regardless of the
/// shape the caller built them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders(BTreeMap<String, String>);

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any previous value under the same name.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0
            .insert(name.as_ref().trim().to_ascii_lowercase(), value.into());
    }

    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for RequestHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

impl<K: AsRef<str>, V: Into<String>> From<HashMap<K, V>> for RequestHeaders {
    fn from(map: HashMap<K, V>) -> Self {
        map.into_iter().collect()
    }
}

impl<K: AsRef<str>, V: Into<String>> From<BTreeMap<K, V>> for RequestHeaders {
    fn from(map: BTreeMap<K, V>) -> Self {
        map.into_iter().collect()
    }
}

impl<K: AsRef<str>, V: Into<String>> From<Vec<(K, V)>> for RequestHeaders {
    fn from(pairs: Vec<(K, V)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: AsRef<str>, V: Into<String>, const N: usize> From<[(K, V); N]> for RequestHeaders {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub headers: RequestHeaders,
    pub body: Option<String>,
}

impl FetchRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: RequestHeaders::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn headers(mut self, headers: impl Into<RequestHeaders>) -> Self {
        for (name, value) in headers.into().0 {
            self.headers.0.insert(name, value);
        }
        self
    }

    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// JSON body with the matching content type.
    pub fn json<T: serde::Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_string(value)?;
        Ok(self.header("content-type", "application/json").body(body))
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.header_values(name).next()
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `(name, value)` pairs from every `Set-Cookie` header.
    pub fn set_cookies(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.header_values("set-cookie").filter_map(|raw| {
            let pair = raw.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then_some((name, value.trim()))
        })
    }

    /// Turn a non-2xx response into [`NotifierError::Status`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(self.into_status_error())
    }

    /// The [`NotifierError::Status`] describing this response, body truncated.
    pub fn into_status_error(self) -> NotifierError {
        let body: String = self.body.chars().take(300).collect();
        NotifierError::Status {
            status: self.status,
            url: self.url,
            body,
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Outbound HTTP(S) used by login and acquisition.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request. Non-2xx statuses come back as responses; only
    /// transport failures are errors.
    async fn request(&self, request: FetchRequest) -> Result<FetchResponse>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_from_map() {
        let mut map = HashMap::new();
        map.insert("Content-Type", "application/json");
        map.insert("X-Csrf-Token", "abc");
        let headers = RequestHeaders::from(map);
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("x-csrf-token"), Some("abc"));
    }

    #[test]
    fn test_headers_from_pair_sequence() {
        let headers = RequestHeaders::from(vec![
            ("Accept".to_string(), "*/*".to_string()),
            ("ACCEPT".to_string(), "application/json".to_string()),
        ]);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("accept"), Some("application/json"));
    }

    #[test]
    fn test_headers_from_iterator_of_pairs() {
        let source = [("a", "1"), ("b", "2")];
        let headers: RequestHeaders = source.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(headers.get("A"), Some("1"));
        assert_eq!(headers.get("b"), Some("2"));
    }

    #[test]
    fn test_all_shapes_normalize_identically() {
        let from_array = RequestHeaders::from([("User-Agent", "ua"), ("Cookie", "x=1")]);
        let from_vec = RequestHeaders::from(vec![("user-agent", "ua"), ("cookie", "x=1")]);
        let from_map: RequestHeaders =
            BTreeMap::from([("COOKIE", "x=1"), ("USER-AGENT", "ua")]).into();
        assert_eq!(from_array, from_vec);
        assert_eq!(from_vec, from_map);
    }

    #[test]
    fn test_request_builder_merges_headers() {
        let request = FetchRequest::get("https://x.com")
            .header("Authorization", "Bearer a")
            .headers([("authorization", "Bearer b"), ("x-twitter-active-user", "yes")]);
        assert_eq!(request.headers.get("authorization"), Some("Bearer b"));
        assert_eq!(request.headers.len(), 2);
    }

    #[test]
    fn test_set_cookie_parsing() {
        let response = FetchResponse {
            url: "https://x.com".into(),
            status: 200,
            headers: vec![
                ("Set-Cookie".into(), "ct0=abc; Path=/; Secure".into()),
                ("set-cookie".into(), "auth_token=tok; HttpOnly".into()),
                ("content-type".into(), "application/json".into()),
                ("set-cookie".into(), "garbage".into()),
            ],
            body: String::new(),
        };
        let cookies: Vec<_> = response.set_cookies().collect();
        assert_eq!(cookies, vec![("ct0", "abc"), ("auth_token", "tok")]);
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let response = FetchResponse {
            url: "https://x.com".into(),
            status: 200,
            headers: vec![
                ("Content-Type".into(), "application/json".into()),
                ("x-rate-limit-remaining".into(), "49".into()),
                ("X-Rate-Limit-Remaining".into(), "48".into()),
            ],
            body: String::new(),
        };
        let name = String::from("content-type");
        assert_eq!(response.header(&name), Some("application/json"));
        assert_eq!(response.header("X-RATE-LIMIT-REMAINING"), Some("49"));
        assert_eq!(response.header_values("x-rate-limit-remaining").count(), 2);
        assert_eq!(response.header("retry-after"), None);
    }

    #[test]
    fn test_error_for_status() {
        let ok = FetchResponse {
            url: "u".into(),
            status: 204,
            headers: vec![],
            body: String::new(),
        };
        assert!(ok.error_for_status().is_ok());

        let unavailable = FetchResponse {
            url: "u".into(),
            status: 503,
            headers: vec![],
            body: "Service Unavailable".into(),
        };
        let err = unavailable.error_for_status().unwrap_err();
        assert!(err.is_transient());
    }
}
