//! Transport to the remote collector
//!
//! The [`Transport`] trait is the only thing consumers know about the
//! network: hand over one encoded request, learn whether it was accepted.
//! [`HttpTransport`] is the production implementation; it posts a
//! form-encoded body and treats anything but a 2xx response as failure.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};

use crate::codec;
use crate::config::ConsumerConfig;
use crate::error::{Error, Result};

/// How the `data` field of a request is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    /// base64 of a single JSON envelope, sent as `data=...&gzip=0`
    Base64,
    /// base64 of a gzipped JSON array, sent as `data_list=...&gzip=1`
    GzipBase64,
}

/// One encoded request body, ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    pub data: String,
    pub encoding: ContentEncoding,
}

impl DeliveryRequest {
    /// A single serialized envelope
    pub fn single(payload: &str) -> Self {
        Self {
            data: codec::encode_single(payload),
            encoding: ContentEncoding::Base64,
        }
    }

    /// A batch of serialized envelopes, in send order
    pub fn batch(payloads: &[String]) -> Result<Self> {
        Ok(Self {
            data: codec::encode_batch(payloads)?,
            encoding: ContentEncoding::GzipBase64,
        })
    }

    /// Form field name carrying the data
    pub fn field_name(&self) -> &'static str {
        match self.encoding {
            ContentEncoding::Base64 => "data",
            ContentEncoding::GzipBase64 => "data_list",
        }
    }

    /// `application/x-www-form-urlencoded` body
    pub fn form_body(&self) -> String {
        let gzip = match self.encoding {
            ContentEncoding::Base64 => 0,
            ContentEncoding::GzipBase64 => 1,
        };
        format!(
            "{}={}&gzip={}",
            self.field_name(),
            urlencoding::encode(&self.data),
            gzip
        )
    }
}

/// Delivers encoded requests to the collector.
///
/// `Ok(())` means the collector confirmed receipt; every other outcome is an
/// error.
pub trait Transport: Send + Sync {
    fn deliver(&self, request: &DeliveryRequest) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn deliver(&self, request: &DeliveryRequest) -> Result<()> {
        (**self).deliver(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn deliver(&self, request: &DeliveryRequest) -> Result<()> {
        (**self).deliver(request)
    }
}

/// Blocking HTTP transport.
///
/// Owns a current-thread tokio runtime and blocks on each request, so it must
/// not be called from inside another tokio runtime.
pub struct HttpTransport {
    http_client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    server_url: String,
    max_retries: usize,
}

impl HttpTransport {
    /// Create a transport from consumer configuration
    ///
    /// Returns an error if `server_url` is missing or the client cannot be built.
    pub fn new(config: &ConsumerConfig) -> Result<Self> {
        let server_url = config
            .server_url
            .clone()
            .ok_or_else(|| Error::Config("consumer.server_url is required".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("tally-core/", env!("CARGO_PKG_VERSION"))),
        );

        let timeout = Duration::from_millis(config.request_timeout_ms);
        let http_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Config(format!("failed to create runtime: {}", e)))?;

        Ok(Self {
            http_client,
            runtime,
            server_url,
            max_retries: config.max_retries,
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    async fn post(&self, body: String) -> Result<()> {
        let response = self
            .http_client
            .post(&self.server_url)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Delivery(format!(
                "API error ({}): {}",
                status, error_text
            )))
        }
    }

    /// Retries transient failures (5xx, timeouts, connection errors) with
    /// exponential backoff, up to `max_retries` extra attempts.
    async fn post_with_retry(&self, body: String) -> Result<()> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(100);

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying delivery (attempt {}/{}), waiting {:?}",
                    attempt + 1,
                    self.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(5));
            }

            match self.post(body.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if is_retryable_error(&e) => {
                    tracing::warn!("Transient error delivering events: {}", e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Delivery("max retries exceeded".to_string())))
    }
}

impl Transport for HttpTransport {
    fn deliver(&self, request: &DeliveryRequest) -> Result<()> {
        self.runtime.block_on(self.post_with_retry(request.form_body()))
    }
}

/// Check if a delivery error is transient
fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Delivery(msg) => msg.starts_with("API error (5") || msg.contains("request failed"),
        _ => false,
    }
}
