//! HTTP execution.
//!
//! One attempt per call, no retries. Any HTTP status is a successful
//! execution; only transport failures are errors.

use crate::error::{TransportError, TransportErrorKind};
use crate::marshal::{RequestDescriptor, RequestPayload};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use std::time::Duration;
use tracing::{debug, instrument};

/// Unmapped HTTP result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawResponse {
    pub status: u16,
    /// Reason phrase, when known
    pub status_text: Option<String>,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends a request descriptor over the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(
        &self,
        request: &RequestDescriptor,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError>;
}

/// [`HttpExecutor`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestExecutor {
    client: reqwest::Client,
}

impl ReqwestExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(
        &self,
        request: &RequestDescriptor,
        timeout: Duration,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        let url = request.url().map_err(|e| {
            TransportError::new(
                TransportErrorKind::InvalidRequest,
                format!("invalid URL '{}{}': {e}", request.base_url, request.path),
            )
        })?;

        let mut builder = self
            .client
            .request(reqwest::Method::from(request.method), url)
            .timeout(timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(cookie) = request.cookie_header() {
            builder = builder.header(COOKIE, cookie);
        }

        builder = match &request.body {
            None => builder,
            Some(RequestPayload::Json(value)) => builder.json(value),
            Some(RequestPayload::Form(fields)) => builder.form(fields),
            Some(RequestPayload::Multipart(fields)) => {
                let form = fields
                    .iter()
                    .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                        form.text(name.clone(), value.clone())
                    });
                builder.multipart(form)
            }
            Some(RequestPayload::Raw {
                bytes,
                content_type,
            }) => builder
                .header(CONTENT_TYPE, content_type)
                .body(bytes.clone()),
        };

        Ok(builder)
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn execute(
        &self,
        request: &RequestDescriptor,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        let response = self.build(request, timeout)?.send().await?;

        let status = response.status();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        debug!(
            status = status.as_u16(),
            bytes = body.len(),
            content_type = content_type.as_deref().unwrap_or(""),
            "Response received"
        );

        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().map(str::to_string),
            headers,
            content_type,
            body,
        })
    }
}
