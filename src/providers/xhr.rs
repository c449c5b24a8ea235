//! XHR-style provider.
//!
//! Models a host `XMLHttpRequest` capability as two phases: the exchange
//! first reports its headers, then its completed body. Both phases share
//! the request's timeout window, and losing either race aborts the exchange.
//! Which body representations a response offers is decided once, from the
//! host's [`PlatformCapabilities`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use tracing::{debug, instrument, warn};

use crate::error::{RequestError, TransportError};
use crate::headers::Headers;
use crate::options::{Body, Credentials, RequestOptions};
use crate::registry::Provider;
use crate::response::{
    BodyBuffer, BodyCapabilities, BodySource, EventEmitter, Response, ResponseHead,
};
use crate::task::{AbortSignal, ExchangeGuard};
use crate::url_util::{generate_request_url, redact_credentials, resolve_auth};

/// Features the host exposes to XHR responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCapabilities {
    /// Responses can be read as blobs.
    pub blob: bool,
    /// Blobs can be converted to array buffers.
    pub array_buffer: bool,
    /// A form-data container is available.
    pub form_data: bool,
    /// Blobs can be read back (required for blob response types).
    pub file_reader: bool,
}

impl PlatformCapabilities {
    /// Every feature present.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            blob: true,
            array_buffer: true,
            form_data: true,
            file_reader: true,
        }
    }

    /// Body representations a response can produce on this platform.
    #[must_use]
    pub fn body_capabilities(&self) -> BodyCapabilities {
        BodyCapabilities {
            array_buffer: self.blob && self.array_buffer,
            blob: self.blob,
            form_data: self.form_data,
        }
    }
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self::full()
    }
}

/// Arguments for `open`/`send` on a host XHR object.
#[derive(Debug, Clone)]
pub struct XhrRequest {
    /// HTTP method.
    pub method: Method,
    /// Request URL with query pairs and cache busting applied.
    pub url: String,
    /// False when the caller asked to block the main thread.
    pub asynchronous: bool,
    /// Basic-auth user passed to `open`.
    pub user: Option<String>,
    /// Basic-auth password passed to `open`.
    pub password: Option<String>,
    /// Maps to `withCredentials`.
    pub with_credentials: bool,
    /// Ask the host for a blob response.
    pub blob_response: bool,
    /// Request headers.
    pub headers: Headers,
    /// Serialized body.
    pub body: Option<Bytes>,
}

/// The head of an XHR exchange (`readyState` 2).
#[derive(Debug, Clone, Default)]
pub struct XhrHead {
    /// Status code.
    pub status: u16,
    /// Reason phrase; empty means `OK`.
    pub status_text: String,
    /// `getAllResponseHeaders()` output.
    pub raw_headers: String,
    /// `responseURL`, when the host exposes it.
    pub response_url: Option<String>,
}

/// One in-flight XHR exchange.
#[async_trait]
pub trait XhrExchange: Send {
    /// Resolves when headers have been received.
    async fn headers_received(&mut self) -> Result<XhrHead, TransportError>;

    /// Resolves with the full body once the exchange is done.
    async fn done(&mut self) -> Result<Bytes, TransportError>;

    /// Aborts the exchange. Must be idempotent.
    fn abort(&mut self);
}

/// Host XHR capability.
#[async_trait]
pub trait XhrTransport: Send + Sync {
    /// Opens and sends the request.
    async fn send(&self, request: XhrRequest) -> Result<Box<dyn XhrExchange>, TransportError>;
}

/// Provider over a host XHR capability.
pub struct XhrProvider {
    transport: Arc<dyn XhrTransport>,
    platform: PlatformCapabilities,
}

impl XhrProvider {
    /// Creates a provider for a platform with every feature present.
    #[must_use]
    pub fn new(transport: Arc<dyn XhrTransport>) -> Self {
        Self::with_platform(transport, PlatformCapabilities::full())
    }

    /// Creates a provider for a platform with the given features.
    #[must_use]
    pub fn with_platform(transport: Arc<dyn XhrTransport>, platform: PlatformCapabilities) -> Self {
        Self {
            transport,
            platform,
        }
    }

    fn build_request(&self, url: String, options: &RequestOptions) -> XhrRequest {
        let (user, password) = resolve_auth(options, None).unzip();
        XhrRequest {
            method: options.method.clone(),
            url,
            asynchronous: !options.block_main_thread,
            user,
            password,
            with_credentials: options.credentials == Some(Credentials::Include),
            blob_response: self.platform.file_reader && self.platform.blob,
            headers: options.headers.clone(),
            body: options.body.as_ref().map(Body::to_bytes),
        }
    }
}

impl fmt::Debug for XhrProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XhrProvider")
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

/// Parses `Name: value` lines separated by CRLF; other lines are skipped.
fn parse_raw_headers(raw: &str) -> Headers {
    raw.split("\r\n")
        .filter_map(|line| line.split_once(": "))
        .collect()
}

#[async_trait]
impl Provider for XhrProvider {
    #[instrument(skip_all, fields(url = %redact_credentials(url), method = %options.method))]
    async fn request(
        &self,
        url: &str,
        options: RequestOptions,
        signal: AbortSignal,
    ) -> Result<Response, RequestError> {
        let request_url = generate_request_url(url, &options.query, options.cache_bust);
        let redacted = redact_credentials(&request_url);
        let guard = ExchangeGuard::start(&redacted, options.effective_timeout(), signal);
        let request = self.build_request(request_url, &options);

        let mut exchange = guard
            .run(async {
                self.transport
                    .send(request)
                    .await
                    .map(LiveExchange::new)
                    .map_err(|e| RequestError::transport(&redacted, e))
            })
            .await?;

        let head = guard
            .run(async {
                exchange
                    .headers_received()
                    .await
                    .map_err(|e| RequestError::transport(&redacted, e))
            })
            .await
            .inspect_err(|error| debug!(error = %error, "Aborting XHR before headers"))?;

        let headers = parse_raw_headers(&head.raw_headers);
        let response_url = head
            .response_url
            .or_else(|| headers.get("x-request-url").map(str::to_string))
            .unwrap_or_default();
        let status_text = if head.status_text.is_empty() {
            "OK".to_string()
        } else {
            head.status_text
        };

        let head = ResponseHead {
            status: head.status,
            status_text,
            url: response_url,
            headers,
            request_options: options,
        };
        let body = XhrBody {
            url: redacted,
            exchange,
        };
        Ok(Response::new(
            head,
            Box::new(body),
            self.platform.body_capabilities(),
            guard,
        ))
    }
}

/// An exchange that is aborted when dropped before its body completed.
///
/// Dropping covers every early exit: a lost timeout or cancel race, a
/// transport error, and the caller dropping the task or the response.
struct LiveExchange {
    exchange: Box<dyn XhrExchange>,
    completed: bool,
}

impl LiveExchange {
    fn new(exchange: Box<dyn XhrExchange>) -> Self {
        Self {
            exchange,
            completed: false,
        }
    }

    async fn headers_received(&mut self) -> Result<XhrHead, TransportError> {
        self.exchange.headers_received().await
    }

    async fn done(&mut self) -> Result<Bytes, TransportError> {
        let body = self.exchange.done().await?;
        self.completed = true;
        Ok(body)
    }
}

impl Drop for LiveExchange {
    fn drop(&mut self) {
        if !self.completed {
            self.exchange.abort();
        }
    }
}

/// Second phase of an XHR exchange.
struct XhrBody {
    url: String,
    exchange: LiveExchange,
}

#[async_trait]
impl BodySource for XhrBody {
    async fn collect(
        self: Box<Self>,
        events: &EventEmitter,
        guard: &ExchangeGuard,
    ) -> Result<Bytes, RequestError> {
        let Self { url, mut exchange } = *self;
        let bytes = guard
            .run(async {
                exchange
                    .done()
                    .await
                    .map_err(|e| RequestError::transport(&url, e))
            })
            .await
            .inspect_err(|error| warn!(url = %url, error = %error, "Aborting XHR body read"))?;

        let mut buffer = BodyBuffer::new(events);
        if !bytes.is_empty() {
            buffer.push(bytes);
        }
        Ok(buffer.finish())
    }
}
