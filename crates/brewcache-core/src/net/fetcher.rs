//! Request/response types and the `Fetch` capability.
//!
//! Only plain GET requests exist here: the cache manager intercepts and
//! replays GETs, nothing else.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::FetchError;

/// User agent sent with every request (GitHub's API rejects requests without one)
const USER_AGENT: &str = concat!("brewcache/", env!("CARGO_PKG_VERSION"));

/// An outgoing GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    url: Url,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self { url }
    }

    /// Parse an absolute URL into a request.
    pub fn parse(url: &str) -> Result<Self, FetchError> {
        let url = Url::parse(url).map_err(|e| FetchError::invalid_url(url, e))?;
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Key the response is stored under in a cache bucket.
    pub fn cache_key(&self) -> &str {
        self.url.as_str()
    }
}

/// A captured response: status, headers and the full body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub url: String,
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default, with = "body_base64")]
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(url: impl Into<String>, status: u16, body: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            status,
            headers: Vec::new(),
            body,
        }
    }

    /// True for any 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Bodies are stored as standard base64 strings. Byte arrays written by
/// older builds are still accepted.
mod body_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Encoded {
        Base64(String),
        Bytes(Vec<u8>),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Encoded::deserialize(deserializer)? {
            Encoded::Base64(text) => STANDARD.decode(text).map_err(de::Error::custom),
            Encoded::Bytes(bytes) => Ok(bytes),
        }
    }
}

/// The network capability: perform a request and capture its response.
///
/// A non-success status is still a successful fetch; only transport
/// failures are errors.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// `Fetch` backed by a shared `reqwest::Client`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher. `timeout` of `None` lets a hung request wait forever.
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        debug!(url = %request.url(), "GET");

        let response = self
            .client
            .get(request.url().clone())
            .header(header::ACCEPT, "*/*")
            .send()
            .await?;

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
        let body = response.bytes().await?.to_vec();

        debug!(%url, status, bytes = body.len(), "Response received");

        Ok(Response {
            url,
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parse_and_key() {
        let request = Request::parse("http://localhost:8080/index.html").unwrap();
        assert_eq!(request.cache_key(), "http://localhost:8080/index.html");
        assert_eq!(request.url().host_str(), Some("localhost"));
    }

    #[test]
    fn test_request_parse_rejects_relative() {
        assert!(matches!(
            Request::parse("./index.html"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_response_is_ok() {
        assert!(Response::new("u", 200, vec![]).is_ok());
        assert!(Response::new("u", 204, vec![]).is_ok());
        assert!(!Response::new("u", 304, vec![]).is_ok());
        assert!(!Response::new("u", 404, vec![]).is_ok());
    }

    #[test]
    fn test_response_body_serializes_as_base64() {
        let response = Response::new("u", 200, vec![0, 159, 146, 150, b'A']);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["body"], "AJ+SlkE=");

        let back: Response = serde_json::from_value(json).unwrap();
        assert_eq!(back.body, response.body);
    }

    #[test]
    fn test_response_accepts_byte_array_body() {
        let json = r#"{"url":"u","status":200,"body":[104,105]}"#;
        let response: Response = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), "hi");

        let missing: Response = serde_json::from_str(r#"{"url":"u","status":204}"#).unwrap();
        assert!(missing.body.is_empty());
    }

    #[test]
    fn test_response_rejects_invalid_base64_body() {
        let json = r#"{"url":"u","status":200,"body":"not base64!"}"#;
        assert!(serde_json::from_str::<Response>(json).is_err());
    }
}
