//! Redirect-following socket provider.
//!
//! [`SocketProvider`] performs requests over a [`Transport`] (reqwest by
//! default) and owns everything above the wire: basic and proxy
//! authorization, the default `user-agent`, the redirect decision table and
//! the timeout/cancellation race. One timeout window, fixed when the request
//! starts, covers every redirect hop and the body read.

mod redirect;
mod transport;

pub use transport::{InboundResponse, OutboundRequest, ReqwestTransport, Transport};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, info, instrument};
use url::Url;

use crate::constants::FORM_CONTENT_TYPE;
use crate::error::RequestError;
use crate::headers::Headers;
use crate::options::{Body, RedirectOptions, RequestOptions};
use crate::registry::Provider;
use crate::response::{BodyCapabilities, Response, ResponseHead, StreamBody};
use crate::task::{AbortSignal, ExchangeGuard};
use crate::url_util::{basic_auth_header, generate_request_url, redact_credentials, resolve_auth};
use crate::user_agent::default_user_agent;

use redirect::{RedirectAction, decide};

/// Response headers that keep their value intact; every other header except
/// `set-cookie` is split on `", "` into separate values.
const SINGLE_VALUED_HEADERS: [&str; 17] = [
    "age",
    "authorization",
    "content-length",
    "content-type",
    "etag",
    "expires",
    "from",
    "host",
    "if-modified-since",
    "if-unmodified-since",
    "last-modified",
    "location",
    "max-forwards",
    "proxy-authorization",
    "referer",
    "retry-after",
    "user-agent",
];

/// Server-side provider with redirect following.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use courier::{Client, ProviderRegistry, RequestOptions, SocketProvider};
///
/// # async fn example() -> Result<(), courier::RequestError> {
/// let client = Client::new(ProviderRegistry::with_default(Arc::new(SocketProvider::new())));
/// let response = client
///     .get("http://example.com/", RequestOptions::new().redirect_limit(3))
///     .await?;
/// println!("{}", response.text().await?);
/// # Ok(())
/// # }
/// ```
pub struct SocketProvider {
    transport: Arc<dyn Transport>,
}

impl SocketProvider {
    /// Creates a provider backed by [`ReqwestTransport`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_transport(Arc::new(ReqwestTransport::new()))
    }

    /// Creates a provider over a custom transport.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl Default for SocketProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SocketProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl Provider for SocketProvider {
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
        let mut current =
            Url::parse(&request_url).map_err(|e| RequestError::invalid_url(&redacted, e))?;
        let mut options = options;

        loop {
            let hop_url = redact_credentials(current.as_str());
            let outbound = prepare(&current, &options, &hop_url)?;
            let target = outbound.url.clone();
            debug!(url = %hop_url, method = %outbound.method, redirect_count = options.redirect.count, "Sending request");

            let inbound = guard
                .run(async {
                    self.transport
                        .send(outbound)
                        .await
                        .map_err(|e| RequestError::transport(&hop_url, e))
                })
                .await?;

            let location = inbound
                .headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("location"))
                .map(|(_, value)| value.as_str());

            match decide(inbound.status, location, &current, &hop_url, &options)? {
                RedirectAction::Deliver => {
                    debug!(url = %hop_url, status = inbound.status, "Delivering response");
                    let head = ResponseHead {
                        status: inbound.status,
                        status_text: inbound.status_text,
                        url: target.to_string(),
                        headers: normalize_headers(inbound.headers),
                        request_options: options,
                    };
                    let body = StreamBody::new(hop_url, inbound.body);
                    return Ok(Response::new(
                        head,
                        Box::new(body),
                        BodyCapabilities::all(),
                        guard,
                    ));
                }
                RedirectAction::Follow {
                    location,
                    method,
                    keep_body,
                } => {
                    info!(
                        status = inbound.status,
                        from = %hop_url,
                        to = %redact_credentials(location.as_str()),
                        method = %method,
                        redirect_count = options.redirect.count + 1,
                        "Following redirect"
                    );
                    options = next_hop(options, method, keep_body, None);
                    if location.origin() != current.origin() {
                        debug!(to = %redact_credentials(location.as_str()), "Dropping credentials on cross-origin redirect");
                        options = without_auth(options);
                    }
                    current = location;
                }
                RedirectAction::UseProxy { proxy } => {
                    info!(
                        from = %hop_url,
                        proxy = %redact_credentials(&proxy),
                        redirect_count = options.redirect.count + 1,
                        "Retrying through proxy"
                    );
                    let method = options.method.clone();
                    options = next_hop(options, method, true, Some(proxy));
                }
            }
        }
    }
}

/// Options for the next hop of a redirect chain.
fn next_hop(
    options: RequestOptions,
    method: Method,
    keep_body: bool,
    proxy: Option<String>,
) -> RequestOptions {
    let redirect = RedirectOptions {
        count: options.redirect.count + 1,
        ..options.redirect
    };
    RequestOptions {
        method,
        body: if keep_body { options.body } else { None },
        proxy: proxy.or(options.proxy),
        redirect,
        ..options
    }
}

/// Options with every origin-bound credential removed.
fn without_auth(mut options: RequestOptions) -> RequestOptions {
    options.user = None;
    options.password = None;
    options.auth = None;
    options.headers.delete("authorization");
    options.headers.delete("cookie");
    options
}

/// Resolves auth, proxy and default headers for one hop.
fn prepare(
    url: &Url,
    options: &RequestOptions,
    redacted: &str,
) -> Result<OutboundRequest, RequestError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(RequestError::invalid_url(
            redacted,
            format!("unsupported scheme {}", url.scheme()),
        ));
    }

    let mut headers = options.headers.clone();
    if !headers.has("authorization")
        && let Some((user, password)) = resolve_auth(options, Some(url))
    {
        headers.set("authorization", basic_auth_header(&user, &password));
    }
    if !headers.has("user-agent") {
        headers.set("user-agent", default_user_agent());
    }
    if options.body.as_ref().is_some_and(Body::is_form) && !headers.has("content-type") {
        headers.set("content-type", FORM_CONTENT_TYPE);
    }

    let proxy = match options.proxy.as_deref() {
        Some(proxy) => Some(prepare_proxy(proxy, &mut headers)?),
        None => None,
    };

    Ok(OutboundRequest {
        url: without_credentials(url),
        method: options.method.clone(),
        headers,
        body: options.body.as_ref().map(Body::to_bytes),
        proxy,
        socket: options.socket,
    })
}

/// Parses the proxy URL, moving embedded credentials into `proxy-authorization`.
fn prepare_proxy(proxy: &str, headers: &mut Headers) -> Result<Url, RequestError> {
    let redacted = redact_credentials(proxy);
    let parsed = Url::parse(proxy).map_err(|e| RequestError::invalid_url(&redacted, e))?;
    if !headers.has("proxy-authorization")
        && let Some((user, password)) = resolve_auth(&RequestOptions::default(), Some(&parsed))
    {
        headers.set("proxy-authorization", basic_auth_header(&user, &password));
    }
    Ok(without_credentials(&parsed))
}

fn without_credentials(url: &Url) -> Url {
    let mut stripped = url.clone();
    // only fails for URLs that cannot carry credentials
    let _ = stripped.set_username("");
    let _ = stripped.set_password(None);
    stripped
}

fn normalize_headers(raw: Vec<(String, String)>) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in raw {
        let name = name.to_ascii_lowercase();
        if name == "set-cookie" || SINGLE_VALUED_HEADERS.contains(&name.as_str()) {
            headers.append(&name, value);
        } else {
            for part in value.split(", ") {
                headers.append(&name, part);
            }
        }
    }
    headers
}
