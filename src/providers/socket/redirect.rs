//! Redirect decision table for the socket provider.
//!
//! `decide` is pure: given the status of a response and the redirect context
//! of the request that produced it, it says whether to deliver the response,
//! follow a new location, retry through a proxy, or fail.

use reqwest::Method;
use url::Url;

use crate::error::{RedirectError, RequestError};
use crate::options::RequestOptions;

/// What to do with a response head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RedirectAction {
    /// Hand the response to the caller.
    Deliver,
    /// Request `location` with `method`; the body is only resent when the
    /// method is unchanged.
    Follow {
        location: Url,
        method: Method,
        keep_body: bool,
    },
    /// Repeat the same request through `proxy`.
    UseProxy { proxy: String },
}

/// Applies the redirect policy to one response.
///
/// `url` is the redacted URL used in errors; `current` is the URL that
/// produced the response and is the base for relative `Location` values.
pub(crate) fn decide(
    status: u16,
    location: Option<&str>,
    current: &Url,
    url: &str,
    options: &RequestOptions,
) -> Result<RedirectAction, RequestError> {
    if !(300..400).contains(&status) || !options.follow_redirects {
        return Ok(RedirectAction::Deliver);
    }

    let method = &options.method;
    let (next_method, proxy) = match status {
        300 | 304 => return Ok(RedirectAction::Deliver),
        301 | 302 => {
            let rewrite = !options.redirect.keep_original_method
                && *method != Method::GET
                && *method != Method::HEAD;
            (if rewrite { Method::GET } else { method.clone() }, false)
        }
        303 => (Method::GET, false),
        305 => (method.clone(), true),
        307 => (method.clone(), false),
        _ => return Err(RedirectError::unhandled_status(url, status).into()),
    };

    let redirect = &options.redirect;
    if redirect.count + 1 > redirect.limit {
        return Err(RedirectError::too_many_redirects(url, redirect.limit).into());
    }

    let location = location
        .filter(|location| !location.trim().is_empty())
        .ok_or_else(|| RedirectError::missing_location(url, status))?;

    if proxy {
        return Ok(RedirectAction::UseProxy {
            proxy: location.to_string(),
        });
    }

    let resolved = current
        .join(location)
        .map_err(|e| RequestError::invalid_url(location, e))?;
    let keep_body = next_method == *method;
    Ok(RedirectAction::Follow {
        location: resolved,
        method: next_method,
        keep_body,
    })
}
