use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{CensusError, Result, server_error};

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Blocking GET, the only network operation the client needs.
///
/// [`HttpTransport`] is the production implementation. Anything else
/// (recorded replies, canned fixtures) can be plugged into
/// [`Client`](crate::Client) instead.
pub trait Transport {
    fn get(&self, url: &str) -> Result<HttpReply>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str) -> Result<HttpReply> {
        (**self).get(url)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn get(&self, url: &str) -> Result<HttpReply> {
        (**self).get(url)
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(verify: bool) -> Result<Self> {
        Self::with_timeout(verify, Duration::from_secs(60))
    }

    pub fn with_timeout(verify: bool, timeout: Duration) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("censusapi-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("censusapi-rs")),
        );

        let mut builder = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(timeout);

        if !verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build().map_err(|source| CensusError::Http {
            url: String::new(),
            source,
        })?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<HttpReply> {
        tracing::debug!(url, "GET");
        let wrap = |source: reqwest::Error| CensusError::Http {
            url: url.to_string(),
            source,
        };
        let resp = self.http.get(url).send().map_err(wrap)?;
        let status = resp.status().as_u16();
        let body = resp.text().map_err(wrap)?;
        Ok(HttpReply { status, body })
    }
}

/// GETs a metadata document and deserializes it. Non-success statuses become
/// [`CensusError::MalformedQuery`].
pub(crate) fn fetch_json<T, D>(transport: &T, url: &str) -> Result<D>
where
    T: Transport + ?Sized,
    D: DeserializeOwned,
{
    let reply = transport.get(url)?;
    let status = reply.status_code();
    if !status.is_success() {
        return Err(server_error(status, url, &reply.body));
    }
    serde_json::from_str::<D>(&reply.body).map_err(|e| CensusError::decode(url, e))
}
