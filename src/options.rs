//! Request options understood by the facade and the providers.
//!
//! [`RequestOptions`] is a plain value: public fields plus consuming builder
//! setters. Providers read the fields they support and ignore the rest.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use courier::{Body, Method, RequestOptions};
//!
//! let options = RequestOptions::new()
//!     .method(Method::POST)
//!     .header("Content-Type", "application/json")
//!     .body(Body::text(r#"{"foo":"bar"}"#))
//!     .timeout(Duration::from_secs(5))
//!     .keep_original_method(true);
//!
//! assert_eq!(options.method, Method::POST);
//! assert!(options.follow_redirects);
//! ```

use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;

use crate::constants::DEFAULT_REDIRECT_LIMIT;
use crate::headers::Headers;
use crate::response::FormData;

/// Request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// Form fields, serialized as `application/x-www-form-urlencoded`.
    Form(FormData),
}

impl Body {
    /// Creates a text body.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Creates a binary body.
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Serializes the body to the bytes written on the wire.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Self::Text(text) => Bytes::copy_from_slice(text.as_bytes()),
            Self::Bytes(bytes) => bytes.clone(),
            Self::Form(form) => Bytes::from(form.to_urlencoded()),
        }
    }

    /// Returns true for form bodies, which carry an implied content type.
    #[must_use]
    pub fn is_form(&self) -> bool {
        matches!(self, Self::Form(_))
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<FormData> for Body {
    fn from(form: FormData) -> Self {
        Self::Form(form)
    }
}

/// Credentials mode forwarded to browser-style transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Credentials {
    /// Never send cookies or auth.
    Omit,
    /// Send credentials to same-origin URLs only.
    #[default]
    SameOrigin,
    /// Always send credentials.
    Include,
}

/// Redirect policy carried across a redirect chain.
///
/// `count` is the number of redirects already followed; providers report the
/// final value on [`Response::request_options`](crate::Response::request_options).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectOptions {
    /// Maximum redirects a chain may follow.
    pub limit: usize,
    /// Redirects followed so far.
    pub count: usize,
    /// Keep non-GET/HEAD methods on 301/302 instead of rewriting to GET.
    pub keep_original_method: bool,
}

impl Default for RedirectOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_REDIRECT_LIMIT,
            count: 0,
            keep_original_method: false,
        }
    }
}

/// Socket-level options for the socket transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SocketOptions {
    /// TCP keep-alive initial delay.
    pub keep_alive: Option<Duration>,
    /// Disable Nagle's algorithm.
    pub no_delay: Option<bool>,
    /// Idle read timeout on the socket.
    pub timeout: Option<Duration>,
}

/// Options for a single request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// HTTP method (GET by default).
    pub method: Method,
    /// Request headers.
    pub headers: Headers,
    /// Request payload.
    pub body: Option<Body>,
    /// Timeout window; `None` or zero disables it.
    pub timeout: Option<Duration>,
    /// Credentials mode for browser-style transports.
    pub credentials: Option<Credentials>,
    /// Defeat caches for this request.
    pub cache_bust: bool,
    /// Basic-auth user.
    pub user: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
    /// Basic-auth as `user:password`, used when `user`/`password` are incomplete.
    pub auth: Option<String>,
    /// Query pairs appended to the URL.
    pub query: Vec<(String, String)>,
    /// Proxy URL (socket provider).
    pub proxy: Option<String>,
    /// Follow 3xx responses (socket provider).
    pub follow_redirects: bool,
    /// Redirect chain policy (socket provider).
    pub redirect: RedirectOptions,
    /// Socket options (socket provider).
    pub socket: Option<SocketOptions>,
    /// Open the XHR synchronously (XHR provider).
    pub block_main_thread: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: Headers::new(),
            body: None,
            timeout: None,
            credentials: None,
            cache_bust: false,
            user: None,
            password: None,
            auth: None,
            query: Vec::new(),
            proxy: None,
            follow_redirects: true,
            redirect: RedirectOptions::default(),
            socket: None,
            block_main_thread: false,
        }
    }
}

impl RequestOptions {
    /// Creates default options (GET, follow redirects, no timeout).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set a request header, replacing previous values.
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Replace all request headers.
    #[must_use]
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Set the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the timeout window.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the credentials mode.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Enable or disable cache busting.
    #[must_use]
    pub fn cache_bust(mut self, enable: bool) -> Self {
        self.cache_bust = enable;
        self
    }

    /// Set the basic-auth user.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the basic-auth password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set basic auth as `user:password`.
    #[must_use]
    pub fn auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    /// Append a query pair.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Route the request through a proxy.
    #[must_use]
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Enable or disable redirect following.
    #[must_use]
    pub fn follow_redirects(mut self, enable: bool) -> Self {
        self.follow_redirects = enable;
        self
    }

    /// Set the redirect limit.
    #[must_use]
    pub fn redirect_limit(mut self, limit: usize) -> Self {
        self.redirect.limit = limit;
        self
    }

    /// Keep non-GET/HEAD methods across 301/302 redirects.
    #[must_use]
    pub fn keep_original_method(mut self, keep: bool) -> Self {
        self.redirect.keep_original_method = keep;
        self
    }

    /// Set socket options.
    #[must_use]
    pub fn socket_options(mut self, socket: SocketOptions) -> Self {
        self.socket = Some(socket);
        self
    }

    /// Open XHR requests synchronously.
    #[must_use]
    pub fn block_main_thread(mut self, block: bool) -> Self {
        self.block_main_thread = block;
        self
    }

    /// The effective timeout window: `None` when unset or zero.
    ///
    /// Windows too long to schedule (such as `Duration::MAX`) never fire.
    #[must_use]
    pub fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.filter(|timeout| !timeout.is_zero())
    }
}
