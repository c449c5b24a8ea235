//! Error types shared by the facade, the registry and every provider.
//!
//! Every failure a caller can observe is a [`RequestError`]. Each kind is a
//! distinct variant with a stable [`RequestError::name`], so a timeout can be
//! told apart from a transport failure or a second body read without string
//! matching.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Body representation requested from a [`Response`](crate::Response).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// UTF-8 text.
    Text,
    /// Parsed JSON (text composed with a parse step).
    Json,
    /// Raw bytes.
    ArrayBuffer,
    /// Bytes tagged with their content type.
    Blob,
    /// `application/x-www-form-urlencoded` fields.
    FormData,
}

impl fmt::Display for BodyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::ArrayBuffer => "ArrayBuffer",
            Self::Blob => "Blob",
            Self::FormData => "FormData",
        };
        f.write_str(name)
    }
}

/// Errors reported by an underlying transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Error from the reqwest-backed socket transport.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Failure reported by a host-provided transport (fetch, XHR, mocks).
    #[error("{0}")]
    Failed(String),
}

impl TransportError {
    /// Creates a transport failure from a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Redirect policy violations.
///
/// A redirect chain either resolves to a terminal response or fails with
/// exactly one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RedirectError {
    /// A status that requires a `Location` header arrived without one.
    #[error("HTTP {status} from {url} is missing the Location header it requires")]
    MissingLocation {
        /// Redacted URL that produced the redirect.
        url: String,
        /// Redirect status code.
        status: u16,
    },

    /// The chain would exceed the configured limit.
    #[error("too many redirects requesting {url} (limit {limit})")]
    TooManyRedirects {
        /// Redacted URL that produced the redirect beyond the limit.
        url: String,
        /// Configured redirect limit.
        limit: usize,
    },

    /// A 3xx status this layer does not follow (306 and unknown codes).
    #[error("unhandled redirect status {status} from {url}")]
    UnhandledStatus {
        /// Redacted URL that produced the status.
        url: String,
        /// Status code.
        status: u16,
    },
}

impl RedirectError {
    /// Creates a missing-Location error.
    pub fn missing_location(url: impl Into<String>, status: u16) -> Self {
        Self::MissingLocation {
            url: url.into(),
            status,
        }
    }

    /// Creates a too-many-redirects error.
    pub fn too_many_redirects(url: impl Into<String>, limit: usize) -> Self {
        Self::TooManyRedirects {
            url: url.into(),
            limit,
        }
    }

    /// Creates an unhandled-status error.
    pub fn unhandled_status(url: impl Into<String>, status: u16) -> Self {
        Self::UnhandledStatus {
            url: url.into(),
            status,
        }
    }
}

/// Errors surfaced to callers of [`request`](crate::request) and of the
/// body-read methods on [`Response`](crate::Response).
#[derive(Debug, Error)]
pub enum RequestError {
    /// The timer won the race against the transport.
    #[error("request to {url} timed out after {}ms", .timeout.as_millis())]
    Timeout {
        /// Redacted request URL.
        url: String,
        /// Configured timeout window.
        timeout: Duration,
    },

    /// The caller cancelled the request.
    #[error("request to {url} was cancelled")]
    Cancelled {
        /// Redacted request URL.
        url: String,
    },

    /// A body-read method was called on a response whose body was already read.
    #[error("body already read")]
    BodyAlreadyConsumed,

    /// The provider cannot produce the requested body representation.
    #[error("{kind} bodies are not supported by this provider")]
    UnsupportedBodyType {
        /// Requested representation.
        kind: BodyKind,
    },

    /// Redirect policy violation.
    #[error(transparent)]
    Redirect(#[from] RedirectError),

    /// Network failure surfaced from the transport.
    #[error("network error requesting {url}: {source}")]
    Transport {
        /// Redacted request URL.
        url: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// No registry entry matched and no default provider is set.
    #[error("no provider matches {url} and no default provider is set")]
    Dispatch {
        /// Requested URL.
        url: String,
    },

    /// The request or proxy URL could not be parsed.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// The body text was not valid JSON.
    #[error("invalid JSON body: {source}")]
    Json {
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
}

impl RequestError {
    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            url: url.into(),
            timeout,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Creates an unsupported-body error.
    #[must_use]
    pub fn unsupported(kind: BodyKind) -> Self {
        Self::UnsupportedBodyType { kind }
    }

    /// Creates a transport error.
    pub fn transport(url: impl Into<String>, source: impl Into<TransportError>) -> Self {
        Self::Transport {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Creates a dispatch error.
    pub fn dispatch(url: impl Into<String>) -> Self {
        Self::Dispatch { url: url.into() }
    }

    /// Creates an invalid-URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable name of the error kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "TimeoutError",
            Self::Cancelled { .. } => "CancelError",
            Self::BodyAlreadyConsumed => "BodyAlreadyConsumedError",
            Self::UnsupportedBodyType { .. } => "UnsupportedBodyTypeError",
            Self::Redirect(_) => "RedirectConfigurationError",
            Self::Transport { .. } => "TransportError",
            Self::Dispatch { .. } => "DispatchError",
            Self::InvalidUrl { .. } => "InvalidUrlError",
            Self::Json { .. } => "SyntaxError",
        }
    }

    /// Returns true if the timer preempted the transport.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if the caller cancelled the request.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns true if this is a redirect policy violation.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect(_))
    }

    /// Returns the redirect error, if any.
    #[must_use]
    pub fn as_redirect(&self) -> Option<&RedirectError> {
        match self {
            Self::Redirect(error) => Some(error),
            _ => None,
        }
    }
}
