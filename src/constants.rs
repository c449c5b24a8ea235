//! Defaults shared by the providers (redirects, timeouts, cache busting).

use std::time::Duration;

/// Default maximum number of redirects a chain may follow.
pub const DEFAULT_REDIRECT_LIMIT: usize = 15;

/// Default connect timeout for the socket transport (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Query parameter carrying the cache-busting timestamp.
pub const CACHE_BUST_PARAM: &str = "_";

/// Placeholder substituted for basic-auth credentials in error messages and logs.
pub const REDACTED_CREDENTIALS: &str = "(redacted)";

/// Content type applied to form bodies that do not declare one.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
