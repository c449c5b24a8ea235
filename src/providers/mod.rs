//! Provider implementations.
//!
//! - [`socket`] - Server-side provider with redirect following (reqwest)
//! - [`fetch`] - Provider over a host fetch capability
//! - [`xhr`] - Two-phase provider over a host XHR capability
//!
//! The fetch and XHR providers never touch the network themselves; the host
//! supplies the transport through [`FetchTransport`] and [`XhrTransport`].

pub mod fetch;
pub mod socket;
pub mod xhr;

pub use fetch::{CacheMode, FetchProvider, FetchReply, FetchRequest, FetchTransport};
pub use socket::{InboundResponse, OutboundRequest, ReqwestTransport, SocketProvider, Transport};
pub use xhr::{PlatformCapabilities, XhrExchange, XhrHead, XhrProvider, XhrRequest, XhrTransport};
