//! URL helpers shared by the providers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use url::{Url, form_urlencoded};

use crate::constants::{CACHE_BUST_PARAM, REDACTED_CREDENTIALS};
use crate::options::RequestOptions;

static LAST_CACHE_BUST: AtomicU64 = AtomicU64::new(0);

/// Milliseconds since the epoch, bumped so every call returns a larger value.
pub(crate) fn next_cache_bust() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default();
    let previous = LAST_CACHE_BUST
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    now.max(previous + 1)
}

/// Appends `query` pairs (and a cache-busting value) to `url`, before any fragment.
pub(crate) fn generate_request_url(url: &str, query: &[(String, String)], cache_bust: bool) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    serializer.extend_pairs(query.iter());
    if cache_bust {
        serializer.append_pair(CACHE_BUST_PARAM, &next_cache_bust().to_string());
    }
    let extra = serializer.finish();
    if extra.is_empty() {
        return url.to_string();
    }

    let (base, fragment) = url.find('#').map_or((url, ""), |index| url.split_at(index));
    let separator = match base.find('?') {
        None => "?",
        Some(_) if base.ends_with('?') || base.ends_with('&') => "",
        Some(_) => "&",
    };
    format!("{base}{separator}{extra}{fragment}")
}

/// Replaces any `user:password@` section of `url` with `(redacted)@`.
pub(crate) fn redact_credentials(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let authority_start = scheme_end + 3;
    let authority_end = url[authority_start..]
        .find(['/', '?', '#'])
        .map_or(url.len(), |offset| authority_start + offset);
    match url[authority_start..authority_end].rfind('@') {
        Some(at) => format!(
            "{}{REDACTED_CREDENTIALS}{}",
            &url[..authority_start],
            &url[authority_start + at..]
        ),
        None => url.to_string(),
    }
}

/// `Basic` authorization value with percent-encoded components.
pub(crate) fn basic_auth_header(user: &str, password: &str) -> String {
    let credentials = format!(
        "{}:{}",
        urlencoding::encode(user),
        urlencoding::encode(password)
    );
    format!("Basic {}", STANDARD.encode(credentials))
}

fn decode_component(component: &str) -> String {
    urlencoding::decode(component).map_or_else(|_| component.to_string(), |decoded| decoded.into_owned())
}

/// Basic-auth credentials for a request.
///
/// Explicit `user` and `password` win; otherwise `auth` is split on the first
/// `:` and percent-decoded; otherwise a lone `user` or `password` is used with
/// the other half empty; finally, credentials embedded in `url` are used.
pub(crate) fn resolve_auth(options: &RequestOptions, url: Option<&Url>) -> Option<(String, String)> {
    if let (Some(user), Some(password)) = (&options.user, &options.password) {
        return Some((user.clone(), password.clone()));
    }
    if let Some(auth) = &options.auth {
        let (user, password) = auth.split_once(':').unwrap_or((auth.as_str(), ""));
        return Some((decode_component(user), decode_component(password)));
    }
    if options.user.is_some() || options.password.is_some() {
        return Some((
            options.user.clone().unwrap_or_default(),
            options.password.clone().unwrap_or_default(),
        ));
    }
    let url = url?;
    if url.username().is_empty() && url.password().is_none() {
        return None;
    }
    Some((
        decode_component(url.username()),
        decode_component(url.password().unwrap_or_default()),
    ))
}
