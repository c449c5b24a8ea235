//! Fetch-style provider.
//!
//! Wraps a host `fetch` capability ([`FetchTransport`]) in the common
//! [`Response`] contract. The transport is opaque: it receives a fully
//! prepared [`FetchRequest`] and answers with status, headers and a body
//! stream. Redirects are the host's business. Cache busting both adds the
//! `_` query value and asks the host to reload.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use reqwest::Method;
use tracing::{debug, instrument};

use crate::error::{RequestError, TransportError};
use crate::headers::Headers;
use crate::options::{Body, Credentials, RequestOptions};
use crate::registry::Provider;
use crate::response::{BodyCapabilities, Response, ResponseHead, StreamBody};
use crate::task::{AbortSignal, ExchangeGuard};
use crate::url_util::{basic_auth_header, generate_request_url, redact_credentials, resolve_auth};

/// Cache mode forwarded to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Host default.
    #[default]
    Default,
    /// Bypass caches and store the fresh response.
    Reload,
}

/// A request ready for the host fetch API.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Request URL with query pairs applied.
    pub url: String,
    /// HTTP method.
    pub method: Method,
    /// Lower-cased request headers.
    pub headers: Headers,
    /// Request payload.
    pub body: Option<Body>,
    /// Cache mode.
    pub cache: CacheMode,
    /// Credentials mode, when the caller chose one.
    pub credentials: Option<Credentials>,
}

/// What the host fetch API answered.
pub struct FetchReply {
    /// Status code.
    pub status: u16,
    /// Reason phrase; empty means `OK`.
    pub status_text: String,
    /// Response headers.
    pub headers: Headers,
    /// Whether the native response can produce form data.
    pub supports_form_data: bool,
    /// Body chunks.
    pub body: BoxStream<'static, Result<Bytes, TransportError>>,
}

impl fmt::Debug for FetchReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchReply")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .field("supports_form_data", &self.supports_form_data)
            .finish_non_exhaustive()
    }
}

/// Host fetch capability.
#[async_trait]
pub trait FetchTransport: Send + Sync {
    /// Performs the fetch and resolves with the response head.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchReply, TransportError>;
}

/// Provider over a host fetch capability.
pub struct FetchProvider {
    transport: Arc<dyn FetchTransport>,
}

impl FetchProvider {
    /// Creates a provider over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn FetchTransport>) -> Self {
        Self { transport }
    }
}

impl fmt::Debug for FetchProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchProvider").finish_non_exhaustive()
    }
}

fn build_request(url: String, options: &RequestOptions) -> FetchRequest {
    let mut headers = Headers::new();
    for (name, value) in &options.headers {
        headers.append(&name.to_ascii_lowercase(), value);
    }
    if !headers.has("authorization")
        && let Some((user, password)) = resolve_auth(options, None)
    {
        headers.append("authorization", basic_auth_header(&user, &password));
    }

    FetchRequest {
        url,
        method: options.method.clone(),
        headers,
        body: options.body.clone(),
        cache: if options.cache_bust {
            CacheMode::Reload
        } else {
            CacheMode::Default
        },
        credentials: options.credentials,
    }
}

#[async_trait]
impl Provider for FetchProvider {
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
        let request = build_request(request_url.clone(), &options);

        let reply = guard
            .run(async {
                self.transport
                    .fetch(request)
                    .await
                    .map_err(|e| RequestError::transport(&redacted, e))
            })
            .await?;
        debug!(status = reply.status, "Fetch resolved");

        let capabilities = BodyCapabilities {
            form_data: reply.supports_form_data,
            ..BodyCapabilities::all()
        };
        let status_text = if reply.status_text.is_empty() {
            "OK".to_string()
        } else {
            reply.status_text
        };
        let head = ResponseHead {
            status: reply.status,
            status_text,
            url: request_url,
            headers: reply.headers,
            request_options: options,
        };
        Ok(Response::new(
            head,
            Box::new(StreamBody::new(redacted, reply.body)),
            capabilities,
            guard,
        ))
    }
}
