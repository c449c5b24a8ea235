//! Provider dispatch table.
//!
//! The [`ProviderRegistry`] maps URL/option tests to providers. Matching walks
//! the entries newest-first and the first test that accepts the request wins;
//! when nothing matches, the default provider (if any) is used.
//!
//! A registry is an ordinary value: construct as many as needed and inject one
//! into a [`Client`](crate::Client). Clones share the same table.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use courier::{ProviderRegistry, SocketProvider};
//!
//! let registry = ProviderRegistry::new();
//! let handle = registry.register("http://example.com/", Arc::new(SocketProvider::new()));
//! assert_eq!(registry.len(), 1);
//! handle.dispose();
//! assert!(registry.is_empty());
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::error::RequestError;
use crate::options::RequestOptions;
use crate::response::Response;
use crate::task::AbortSignal;

/// Performs the network operation for a URL and options.
///
/// `signal` is triggered when the caller cancels; implementations must stop
/// their transport when it fires. Timeouts are the provider's responsibility.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Issues the request and resolves once the response head is available.
    async fn request(
        &self,
        url: &str,
        options: RequestOptions,
        signal: AbortSignal,
    ) -> Result<Response, RequestError>;
}

/// Adapter turning an async closure into a [`Provider`].
pub struct ProviderFn<F> {
    f: F,
}

/// Wraps `f` as a provider.
///
/// ```
/// use courier::{Headers, Response, provider_fn};
///
/// let provider = provider_fn(|url, _options, _signal| async move {
///     Ok(Response::from_bytes(200, url, Headers::new(), "stub"))
/// });
/// # let _ = provider;
/// ```
pub fn provider_fn<F, Fut>(f: F) -> ProviderFn<F>
where
    F: Fn(String, RequestOptions, AbortSignal) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, RequestError>> + Send,
{
    ProviderFn { f }
}

#[async_trait]
impl<F, Fut> Provider for ProviderFn<F>
where
    F: Fn(String, RequestOptions, AbortSignal) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, RequestError>> + Send,
{
    async fn request(
        &self,
        url: &str,
        options: RequestOptions,
        signal: AbortSignal,
    ) -> Result<Response, RequestError> {
        (self.f)(url.to_string(), options, signal).await
    }
}

impl<F> fmt::Debug for ProviderFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderFn").finish_non_exhaustive()
    }
}

type Predicate = dyn Fn(&str, &RequestOptions) -> bool + Send + Sync;

/// How a registry entry decides whether it handles a request.
#[derive(Clone)]
pub enum ProviderTest {
    /// Exact string equality with the URL.
    Exact(String),
    /// Regex matching anywhere in the URL.
    Pattern(Regex),
    /// Arbitrary predicate over URL and options.
    Predicate(Arc<Predicate>),
}

impl ProviderTest {
    /// Creates a predicate test.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str, &RequestOptions) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// Returns true if this test accepts the request.
    #[must_use]
    pub fn matches(&self, url: &str, options: &RequestOptions) -> bool {
        match self {
            Self::Exact(expected) => expected == url,
            Self::Pattern(pattern) => pattern.is_match(url),
            Self::Predicate(predicate) => predicate(url, options),
        }
    }
}

impl fmt::Debug for ProviderTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(url) => f.debug_tuple("Exact").field(url).finish(),
            Self::Pattern(pattern) => f.debug_tuple("Pattern").field(&pattern.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for ProviderTest {
    fn from(url: &str) -> Self {
        Self::Exact(url.to_string())
    }
}

impl From<String> for ProviderTest {
    fn from(url: String) -> Self {
        Self::Exact(url)
    }
}

impl From<Regex> for ProviderTest {
    fn from(pattern: Regex) -> Self {
        Self::Pattern(pattern)
    }
}

struct Entry {
    id: u64,
    test: ProviderTest,
    provider: Arc<dyn Provider>,
}

#[derive(Default)]
struct RegistryInner {
    entries: RwLock<Vec<Entry>>,
    default_provider: RwLock<Option<Arc<dyn Provider>>>,
    next_id: AtomicU64,
}

/// Ordered `(test, provider)` table plus an optional default provider.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    inner: Arc<RegistryInner>,
}

impl ProviderRegistry {
    /// Creates an empty registry with no default provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry that falls back to `provider`.
    #[must_use]
    pub fn with_default(provider: Arc<dyn Provider>) -> Self {
        let registry = Self::new();
        registry.set_default_provider(provider);
        registry
    }

    /// Appends an entry. Later registrations are checked first.
    ///
    /// The returned handle removes exactly this entry.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn register(
        &self,
        test: impl Into<ProviderTest>,
        provider: Arc<dyn Provider>,
    ) -> Registration {
        let test = test.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(id, test = ?test, "Registering provider");
        let mut entries = self
            .inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        entries.push(Entry { id, test, provider });
        Registration {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Sets the provider used when no entry matches.
    pub fn set_default_provider(&self, provider: Arc<dyn Provider>) {
        *self
            .inner
            .default_provider
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(provider);
    }

    /// Removes the default provider.
    pub fn clear_default_provider(&self) {
        *self
            .inner
            .default_provider
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Number of registered entries, excluding the default.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no entries are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds the provider for a request.
    ///
    /// Tests are evaluated against a snapshot of the table, so registrations
    /// made by a predicate do not affect the current match.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Dispatch`] when nothing matches and no default
    /// provider is set.
    pub fn match_provider(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Arc<dyn Provider>, RequestError> {
        let snapshot: Vec<(ProviderTest, Arc<dyn Provider>)> = self
            .inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|entry| (entry.test.clone(), Arc::clone(&entry.provider)))
            .collect();

        if let Some((_, provider)) = snapshot
            .into_iter()
            .rev()
            .find(|(test, _)| test.matches(url, options))
        {
            return Ok(provider);
        }

        self.inner
            .default_provider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| RequestError::dispatch(url))
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let has_default = self
            .inner
            .default_provider
            .read()
            .map(|provider| provider.is_some())
            .unwrap_or_default();
        f.debug_struct("ProviderRegistry")
            .field("entries", &self.len())
            .field("has_default", &has_default)
            .finish()
    }
}

/// Handle returned by [`ProviderRegistry::register`].
#[derive(Debug)]
pub struct Registration {
    id: u64,
    registry: Weak<RegistryInner>,
}

impl Registration {
    /// Removes the entry. Idempotent; never touches other entries.
    pub fn dispose(&self) {
        if let Some(inner) = self.registry.upgrade() {
            let mut entries = inner.entries.write().unwrap_or_else(PoisonError::into_inner);
            let before = entries.len();
            entries.retain(|entry| entry.id != self.id);
            if entries.len() != before {
                debug!(id = self.id, "Removed provider registration");
            }
        }
    }
}
