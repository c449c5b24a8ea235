//! Courier Library
//!
//! One request/response contract over several transports: a socket-backed
//! HTTP provider for servers, plus fetch-style and XHR-style providers for
//! hosts that expose those capabilities. Callers see the same [`Response`]
//! and [`Headers`] no matter which provider did the I/O.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`headers`] - Case-insensitive header multimap
//! - [`options`] - Request options and request bodies
//! - [`response`] - One-shot response bodies and lifecycle events
//! - [`registry`] - Provider dispatch table with default fallback
//! - [`providers`] - Socket (redirect-following), fetch and XHR providers
//! - [`client`] - Request facade and method shortcuts
//! - [`task`] - Cancellable deferred results and timeout races
//!
//! # Example
//!
//! ```no_run
//! use courier::{RequestOptions, get};
//!
//! # async fn example() -> Result<(), courier::RequestError> {
//! let response = get("https://example.com/data.json", RequestOptions::new()).await?;
//! let value: serde_json::Value = response.json().await?;
//! println!("{} -> {value}", response.status());
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod constants;
pub mod error;
pub mod headers;
pub mod options;
pub mod providers;
pub mod registry;
pub mod response;
pub mod task;
mod url_util;
mod user_agent;

// Re-export commonly used types
pub use client::{Client, default_client, delete, get, post, put, request, set_default_provider};
pub use error::{BodyKind, RedirectError, RequestError, TransportError};
pub use headers::Headers;
pub use options::{Body, Credentials, RedirectOptions, RequestOptions, SocketOptions};
pub use providers::{FetchProvider, SocketProvider, XhrProvider};
pub use registry::{Provider, ProviderRegistry, ProviderTest, Registration, provider_fn};
pub use response::{
    Blob, BodyCapabilities, EventKind, FormData, Response, ResponseEvent, Subscription,
};
pub use task::{AbortSignal, Task};

pub use reqwest::Method;
