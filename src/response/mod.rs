//! Provider-independent response with a one-shot body.
//!
//! A [`Response`] carries immutable metadata (status, URL, headers, the
//! options that produced it) and a body that can be materialized exactly
//! once, through any one of [`text`](Response::text),
//! [`json`](Response::json), [`array_buffer`](Response::array_buffer),
//! [`blob`](Response::blob) or [`form_data`](Response::form_data).
//!
//! # Body lifecycle
//!
//! - **unconsumed** until a body read starts
//! - **consumed** from then on, whether the read succeeds or fails
//!
//! Every later read fails with [`RequestError::BodyAlreadyConsumed`]. Reads
//! of a representation the provider cannot produce fail with
//! [`RequestError::UnsupportedBodyType`] without consuming the body.
//!
//! # Example
//!
//! ```
//! use courier::{Headers, Response};
//!
//! # async fn example() -> Result<(), courier::RequestError> {
//! let response = Response::from_bytes(200, "http://example.com/", Headers::new(), "hello");
//! assert!(response.ok());
//! assert_eq!(response.text().await?, "hello");
//! assert!(response.text().await.is_err());
//! # Ok(())
//! # }
//! ```

mod body;
mod events;
mod payload;

pub use body::BodyCapabilities;
pub use events::{EventKind, ResponseEvent, Subscription};
pub use payload::{Blob, FormData};

pub(crate) use body::{BodyBuffer, BodySource, BufferedBody, StreamBody};
pub(crate) use events::EventEmitter;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{BodyKind, RequestError};
use crate::headers::Headers;
use crate::options::RequestOptions;
use crate::task::ExchangeGuard;

/// Response metadata assembled by a provider.
#[derive(Debug, Clone)]
pub(crate) struct ResponseHead {
    pub(crate) status: u16,
    pub(crate) status_text: String,
    pub(crate) url: String,
    pub(crate) headers: Headers,
    pub(crate) request_options: RequestOptions,
}

/// The response to a request, independent of the provider that produced it.
pub struct Response {
    head: ResponseHead,
    capabilities: BodyCapabilities,
    body: Mutex<Option<Box<dyn BodySource>>>,
    used: AtomicBool,
    events: EventEmitter,
    guard: ExchangeGuard,
}

impl Response {
    pub(crate) fn new(
        head: ResponseHead,
        body: Box<dyn BodySource>,
        capabilities: BodyCapabilities,
        guard: ExchangeGuard,
    ) -> Self {
        Self {
            head,
            capabilities,
            body: Mutex::new(Some(body)),
            used: AtomicBool::new(false),
            events: EventEmitter::new(),
            guard,
        }
    }

    /// Creates a response whose body is already in memory.
    ///
    /// Useful for custom providers and tests. The status text is the
    /// canonical reason phrase for `status`.
    pub fn from_bytes(
        status: u16,
        url: impl Into<String>,
        headers: Headers,
        body: impl Into<Bytes>,
    ) -> Self {
        let status_text = StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default()
            .to_string();
        let head = ResponseHead {
            status,
            status_text,
            url: url.into(),
            headers,
            request_options: RequestOptions::default(),
        };
        Self::new(
            head,
            Box::new(BufferedBody::new(body.into())),
            BodyCapabilities::all(),
            ExchangeGuard::unguarded(),
        )
    }

    /// Replaces the recorded request options.
    #[must_use]
    pub fn with_request_options(mut self, options: RequestOptions) -> Self {
        self.head.request_options = options;
        self
    }

    /// HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.head.status
    }

    /// Reason phrase.
    #[must_use]
    pub fn status_text(&self) -> &str {
        &self.head.status_text
    }

    /// True iff `200 <= status < 300`.
    #[must_use]
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.head.status)
    }

    /// URL of the response; after redirects, the final URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.head.url
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.head.headers
    }

    /// Options of the request that produced this response, including the
    /// final redirect count and method.
    #[must_use]
    pub fn request_options(&self) -> &RequestOptions {
        &self.head.request_options
    }

    /// Body representations this response can produce.
    #[must_use]
    pub fn capabilities(&self) -> BodyCapabilities {
        self.capabilities
    }

    /// True once a body read has started.
    #[must_use]
    pub fn body_used(&self) -> bool {
        self.used.load(Ordering::SeqCst)
    }

    /// Subscribes to one lifecycle event variant.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&ResponseEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, listener)
    }

    /// Reads the body as text, replacing invalid UTF-8 sequences.
    ///
    /// # Errors
    ///
    /// Fails if the body was already read, or with the transport, timeout or
    /// cancellation error that interrupted the read.
    pub async fn text(&self) -> Result<String, RequestError> {
        let bytes = self.read_body(BodyKind::Text).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads the body as text and parses it as JSON.
    ///
    /// # Errors
    ///
    /// As [`text`](Self::text), plus [`RequestError::Json`] for malformed JSON.
    pub async fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        let bytes = self.read_body(BodyKind::Json).await?;
        let text = String::from_utf8_lossy(&bytes);
        serde_json::from_str(&text).map_err(|source| RequestError::Json { source })
    }

    /// Reads the raw body bytes.
    ///
    /// # Errors
    ///
    /// As [`text`](Self::text), plus [`RequestError::UnsupportedBodyType`].
    pub async fn array_buffer(&self) -> Result<Bytes, RequestError> {
        self.read_body(BodyKind::ArrayBuffer).await
    }

    /// Reads the body as a [`Blob`] tagged with the response content type.
    ///
    /// # Errors
    ///
    /// As [`array_buffer`](Self::array_buffer).
    pub async fn blob(&self) -> Result<Blob, RequestError> {
        let bytes = self.read_body(BodyKind::Blob).await?;
        let content_type = self.head.headers.get("content-type").map(str::to_string);
        Ok(Blob::new(bytes, content_type))
    }

    /// Reads the body as urlencoded [`FormData`].
    ///
    /// # Errors
    ///
    /// As [`array_buffer`](Self::array_buffer).
    pub async fn form_data(&self) -> Result<FormData, RequestError> {
        let bytes = self.read_body(BodyKind::FormData).await?;
        Ok(FormData::parse(&String::from_utf8_lossy(&bytes)))
    }

    fn take_body(&self) -> Result<Box<dyn BodySource>, RequestError> {
        let mut slot = self.body.lock().unwrap_or_else(PoisonError::into_inner);
        let body = slot.take().ok_or(RequestError::BodyAlreadyConsumed)?;
        self.used.store(true, Ordering::SeqCst);
        Ok(body)
    }

    async fn read_body(&self, kind: BodyKind) -> Result<Bytes, RequestError> {
        if self.body_used() {
            return Err(RequestError::BodyAlreadyConsumed);
        }
        if !self.capabilities.supports(kind) {
            return Err(RequestError::unsupported(kind));
        }
        let body = self.take_body()?;
        debug!(url = %self.head.url, kind = %kind, "reading response body");

        self.events.emit(&ResponseEvent::Start);
        let bytes = body.collect(&self.events, &self.guard).await?;
        self.events.emit(&ResponseEvent::End {
            total_bytes: bytes.len() as u64,
        });
        Ok(bytes)
    }

    /// Aborts an in-flight body read, as if the originating task was cancelled.
    pub fn abort(&self) {
        self.guard.signal().abort();
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.head.status)
            .field("status_text", &self.head.status_text)
            .field("url", &self.head.url)
            .field("headers", &self.head.headers)
            .field("body_used", &self.body_used())
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}
