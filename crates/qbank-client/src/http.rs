//! reqwest-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, instrument, trace};

use qbank_core::{ApiUrl, Method, Response, Transport, TransportError, TransportRequest};

use crate::config::ClientConfig;

/// HTTP transport for API requests.
///
/// Every status the server answers with is returned as a [`Response`];
/// only failures to get an answer at all become [`TransportError`]s.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    api: ApiUrl,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport from client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built
    /// (e.g. TLS backend initialisation failure).
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::InvalidRequest {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api: config.api_url.clone(),
            timeout: config.timeout,
        })
    }

    /// Returns the API base URL this transport sends to.
    pub fn api(&self) -> &ApiUrl {
        &self.api
    }

    fn headers(request: &TransportRequest) -> Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TransportError::InvalidRequest {
                    message: format!("invalid header name '{}': {}", name, e),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| TransportError::InvalidRequest {
                message: format!("invalid characters in '{}' header", name),
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    fn map_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                duration_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        }
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(api = %self.api, method = %request.method, path = %request.path))]
    async fn send(&self, request: TransportRequest) -> Result<Response, TransportError> {
        let url = self.api.endpoint(&request.path);
        debug!(%url, "HTTP request");
        trace!(query = ?request.query, "query parameters");

        let mut builder = self
            .client
            .request(to_reqwest(request.method), &url)
            .headers(Self::headers(&request)?);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;

        let status = response.status().as_u16();
        trace!(status, "HTTP response");

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

        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        Ok(Response {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}
