//! Request facade.
//!
//! A [`Client`] resolves a provider through its [`ProviderRegistry`] and
//! invokes it, returning a cancellable [`Task`]. The free functions
//! ([`request`], [`get`], ...) use a process-wide client whose registry falls
//! back to the [`SocketProvider`].

use std::sync::{Arc, OnceLock};

use reqwest::Method;
use tracing::{debug, instrument};

use crate::options::RequestOptions;
use crate::providers::SocketProvider;
use crate::registry::{Provider, ProviderRegistry};
use crate::response::Response;
use crate::task::{AbortSignal, Task};
use crate::url_util::redact_credentials;

/// Entry point that dispatches requests to providers.
#[derive(Debug, Clone, Default)]
pub struct Client {
    registry: ProviderRegistry,
}

impl Client {
    /// Creates a client over `registry`.
    #[must_use]
    pub fn new(registry: ProviderRegistry) -> Self {
        Self { registry }
    }

    /// The registry this client dispatches through.
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Sets the provider used when no registry entry matches.
    pub fn set_default_provider(&self, provider: Arc<dyn Provider>) {
        self.registry.set_default_provider(provider);
    }

    /// Issues a request.
    ///
    /// A dispatch failure is reported through the returned task, never as a
    /// panic or a synchronous error.
    #[instrument(level = "debug", skip_all, fields(url = %redact_credentials(url), method = %options.method))]
    pub fn request(&self, url: &str, options: RequestOptions) -> Task<Response> {
        let provider = match self.registry.match_provider(url, &options) {
            Ok(provider) => provider,
            Err(error) => {
                debug!(error = %error, "No provider for request");
                return Task::rejected(error);
            }
        };

        let signal = AbortSignal::new();
        let provider_signal = signal.clone();
        let target = url.to_string();
        Task::new(signal, redact_credentials(url), async move {
            provider.request(&target, options, provider_signal).await
        })
    }

    /// Issues a GET request.
    pub fn get(&self, url: &str, options: RequestOptions) -> Task<Response> {
        self.request(url, options.method(Method::GET))
    }

    /// Issues a POST request.
    pub fn post(&self, url: &str, options: RequestOptions) -> Task<Response> {
        self.request(url, options.method(Method::POST))
    }

    /// Issues a PUT request.
    pub fn put(&self, url: &str, options: RequestOptions) -> Task<Response> {
        self.request(url, options.method(Method::PUT))
    }

    /// Issues a DELETE request.
    pub fn delete(&self, url: &str, options: RequestOptions) -> Task<Response> {
        self.request(url, options.method(Method::DELETE))
    }
}

static DEFAULT_CLIENT: OnceLock<Client> = OnceLock::new();

/// The process-wide client used by the free functions.
///
/// Its registry starts empty with a [`SocketProvider`] default.
pub fn default_client() -> &'static Client {
    DEFAULT_CLIENT.get_or_init(|| {
        Client::new(ProviderRegistry::with_default(Arc::new(SocketProvider::new())))
    })
}

/// Issues a request through the default client.
pub fn request(url: &str, options: RequestOptions) -> Task<Response> {
    default_client().request(url, options)
}

/// Issues a GET request through the default client.
pub fn get(url: &str, options: RequestOptions) -> Task<Response> {
    default_client().get(url, options)
}

/// Issues a POST request through the default client.
pub fn post(url: &str, options: RequestOptions) -> Task<Response> {
    default_client().post(url, options)
}

/// Issues a PUT request through the default client.
pub fn put(url: &str, options: RequestOptions) -> Task<Response> {
    default_client().put(url, options)
}

/// Issues a DELETE request through the default client.
pub fn delete(url: &str, options: RequestOptions) -> Task<Response> {
    default_client().delete(url, options)
}

/// Replaces the default client's fallback provider for subsequent requests.
pub fn set_default_provider(provider: Arc<dyn Provider>) {
    default_client().set_default_provider(provider);
}
