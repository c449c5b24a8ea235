//! Outbound HTTP exchange used by the socket provider.
//!
//! [`Transport`] sends one request and returns the response head plus a
//! streaming body; it never follows redirects or applies timeouts itself.
//! [`ReqwestTransport`] is the production implementation.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, Method, Proxy};
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

use crate::constants::DEFAULT_CONNECT_TIMEOUT;
use crate::error::TransportError;
use crate::headers::Headers;
use crate::options::SocketOptions;

/// One outbound exchange, fully resolved.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// Target URL without credentials.
    pub url: Url,
    /// HTTP method.
    pub method: Method,
    /// Headers written on the wire.
    pub headers: Headers,
    /// Serialized body.
    pub body: Option<Bytes>,
    /// Proxy URL without credentials.
    pub proxy: Option<Url>,
    /// Socket options.
    pub socket: Option<SocketOptions>,
}

/// Response head plus a body stream.
pub struct InboundResponse {
    /// Status code.
    pub status: u16,
    /// Reason phrase.
    pub status_text: String,
    /// Raw header lines, one entry per received field.
    pub headers: Vec<(String, String)>,
    /// Body chunks; dropping the stream closes the connection.
    pub body: BoxStream<'static, Result<Bytes, TransportError>>,
}

impl fmt::Debug for InboundResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Sends a single HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and resolves once the response head arrived.
    async fn send(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError>;
}

/// reqwest-backed transport.
///
/// Redirects are never followed here and environment proxies are ignored.
/// Requests without a proxy or socket options share one pooled client.
#[derive(Debug, Default)]
pub struct ReqwestTransport {
    shared: OnceCell<Client>,
}

impl ReqwestTransport {
    /// Creates a transport. The underlying client is built on first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn client_for(&self, request: &OutboundRequest) -> Result<Client, TransportError> {
        if request.proxy.is_none() && request.socket.is_none() {
            let client = self
                .shared
                .get_or_try_init(|| async { base_client_builder().build() })
                .await?;
            return Ok(client.clone());
        }

        let mut builder = base_client_builder();
        if let Some(proxy) = &request.proxy {
            debug!(proxy = %proxy, "Routing request through proxy");
            builder = builder.proxy(Proxy::all(proxy.as_str())?);
        }
        if let Some(socket) = request.socket {
            builder = apply_socket_options(builder, socket);
        }
        Ok(builder.build()?)
    }
}

fn base_client_builder() -> ClientBuilder {
    Client::builder()
        .redirect(Policy::none())
        .no_proxy()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .gzip(true)
}

fn apply_socket_options(mut builder: ClientBuilder, socket: SocketOptions) -> ClientBuilder {
    if let Some(delay) = socket.keep_alive {
        builder = builder.tcp_keepalive(delay);
    }
    if let Some(no_delay) = socket.no_delay {
        builder = builder.tcp_nodelay(no_delay);
    }
    if let Some(timeout) = socket.timeout {
        builder = builder.read_timeout(timeout);
    }
    builder
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError> {
        let client = self.client_for(&request).await?;

        let mut builder = client.request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        debug!(status = status.as_u16(), "Received response head");

        Ok(InboundResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: response
                .bytes_stream()
                .map(|chunk| chunk.map_err(TransportError::from))
                .boxed(),
        })
    }
}
