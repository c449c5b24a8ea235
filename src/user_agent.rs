//! Shared User-Agent string for provider traffic.
//!
//! Single source for the UA format so every provider identifies the same way.

/// Product token used in the User-Agent header.
const PRODUCT: &str = "courier";

/// Default User-Agent injected by the socket provider when the caller sets none.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("{PRODUCT}/{version} (rust; reqwest)")
}
