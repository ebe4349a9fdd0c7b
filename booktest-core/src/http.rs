/// HTTP client for driving the API under test. A thin wrapper for
/// `reqwest::blocking::Client` that
/// * applies the configured base URL, timeout and JSON headers, and
/// * captures request/response narration for the attached reporter.
use http::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::*;

use crate::{config::Config, reporter::Reporter};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HttpError: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to deserialize http response into the specified type: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error("request builder already consumed")]
    BuilderConsumed,
}

#[derive(Debug, Clone)]
pub struct LogRequest {
    pub method: reqwest::Method,
    pub url: url::Url,
    pub headers: HeaderMap,
    /// JSON body as sent, when the request carried one.
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LogResponse {
    /// `None` when the request never produced a response.
    pub status: Option<u16>,
    pub headers: HeaderMap,
    pub body: String,
    pub elapsed: Duration,
}

/// One request/response exchange, as forwarded to the reporter.
#[derive(Debug, Clone)]
pub struct Log {
    pub request: LogRequest,
    pub response: LogResponse,
}

/// A completed HTTP exchange. The body is read eagerly so validators can
/// inspect it any number of times.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: reqwest::StatusCode,
    pub headers: HeaderMap,
    pub text: String,
    pub elapsed: Duration,
}

impl Response {
    pub fn status(&self) -> reqwest::StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string, `None` when absent or not UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_str(&self.text)?)
    }

    pub fn json_value(&self) -> Result<serde_json::Value, Error> {
        Ok(serde_json::from_str(&self.text)?)
    }

    /// Wall time from dispatch to the body being read.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    fn read(res: reqwest::blocking::Response, started: Instant) -> Response {
        let status = res.status();
        let headers = res.headers().clone();
        let text = res.text().unwrap_or_default();
        Response {
            status,
            headers,
            text,
            elapsed: started.elapsed(),
        }
    }
}

/// Client bound to one base URL.
///
/// ```rust,ignore
/// let client = Client::new(&Config::shared())?;
/// let res = client.post("/booking").json(&booking).send()?;
/// ```
#[derive(Clone)]
pub struct Client {
    inner: reqwest::blocking::Client,
    base_url: String,
    narrate: bool,
    reporter: Option<Arc<dyn Reporter>>,
}

impl Client {
    /// Construct from configuration: base URL, timeout, and the JSON
    /// headers the target API insists on seeing spelled out.
    pub fn new(config: &Config) -> Result<Client, Error> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let inner = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers)
            .build()?;

        let base_url = config.base_url();
        debug!("client initialized with base url: {base_url}");
        Ok(Client {
            inner,
            base_url,
            narrate: config.log_requests() || config.log_responses(),
            reporter: None,
        })
    }

    /// Attach a reporting sink. Without one, narration is a silent no-op.
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Client {
        self.reporter = Some(reporter);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn get(&self, path: impl AsRef<str>) -> RequestBuilder {
        self.request(reqwest::Method::GET, path.as_ref())
    }

    pub fn post(&self, path: impl AsRef<str>) -> RequestBuilder {
        self.request(reqwest::Method::POST, path.as_ref())
    }

    pub fn put(&self, path: impl AsRef<str>) -> RequestBuilder {
        self.request(reqwest::Method::PUT, path.as_ref())
    }

    pub fn patch(&self, path: impl AsRef<str>) -> RequestBuilder {
        self.request(reqwest::Method::PATCH, path.as_ref())
    }

    pub fn delete(&self, path: impl AsRef<str>) -> RequestBuilder {
        self.request(reqwest::Method::DELETE, path.as_ref())
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = self.endpoint_url(path);
        debug!("{method} {url}");
        RequestBuilder {
            inner: Some(self.inner.request(method, url)),
            client: self.inner.clone(),
            reporter: self.narrate.then(|| self.reporter.clone()).flatten(),
            body: None,
        }
    }

    /// Join a path onto the base URL; absolute URLs pass through.
    fn endpoint_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        }
    }
}

pub struct RequestBuilder {
    inner: Option<reqwest::blocking::RequestBuilder>,
    client: reqwest::blocking::Client,
    reporter: Option<Arc<dyn Reporter>>,
    body: Option<String>,
}

impl RequestBuilder {
    pub fn json<T: serde::Serialize + ?Sized>(mut self, json: &T) -> RequestBuilder {
        self.body = serde_json::to_string(json).ok();
        self.inner = self.inner.take().map(|inner| inner.json(json));
        self
    }

    pub fn query<T: serde::Serialize + ?Sized>(mut self, query: &T) -> RequestBuilder {
        self.inner = self.inner.take().map(|inner| inner.query(query));
        self
    }

    pub fn header<K, V>(mut self, key: K, value: V) -> RequestBuilder
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.inner = self.inner.take().map(|inner| inner.header(key, value));
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> RequestBuilder {
        self.inner = self.inner.take().map(|inner| inner.headers(headers));
        self
    }

    pub fn send(mut self) -> Result<Response, Error> {
        let req = self
            .inner
            .take()
            .ok_or(Error::BuilderConsumed)?
            .build()?;

        let log_request = LogRequest {
            method: req.method().clone(),
            url: req.url().clone(),
            headers: req.headers().clone(),
            body: self.body.clone(),
        };

        let started = Instant::now();
        match self.client.execute(req) {
            Ok(res) => {
                let response = Response::read(res, started);
                self.narrate(
                    log_request,
                    LogResponse {
                        status: Some(response.status.as_u16()),
                        headers: response.headers.clone(),
                        body: response.text.clone(),
                        elapsed: response.elapsed,
                    },
                );
                Ok(response)
            }
            Err(e) => {
                warn!("request failed: {e}");
                self.narrate(
                    log_request,
                    LogResponse {
                        elapsed: started.elapsed(),
                        ..LogResponse::default()
                    },
                );
                Err(e.into())
            }
        }
    }

    fn narrate(&self, request: LogRequest, response: LogResponse) {
        if let Some(reporter) = &self.reporter {
            reporter.on_http_call(&Log { request, response });
        }
    }
}
