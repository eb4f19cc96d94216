//! Cache-Control middleware for host applications.
//!
//! The purge pipeline only pays off when the CDN holds pages for a long
//! time, so embedding hosts mount this layer on their public routes. It
//! stamps `s-maxage=<max_age>, must-revalidate` on cacheable responses and
//! leaves everything else untouched.

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, header},
    middleware::Next,
    response::Response,
};

/// Shared state for [`cache_control_layer`].
#[derive(Clone)]
pub struct CacheControlState {
    pub max_age_seconds: u64,
}

/// Decide whether a request may produce a long-cacheable response.
///
/// Writes, credentialed requests, and requests carrying a session cookie
/// must not be shared through the CDN.
pub fn should_cache(request: &Request<Body>) -> bool {
    let method = request.method();
    if method != Method::GET && method != Method::HEAD {
        return false;
    }
    if request.headers().contains_key(header::AUTHORIZATION) {
        return false;
    }
    if let Some(cookie) = request
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        && cookie.contains("session")
    {
        return false;
    }
    true
}

/// Stamp the surrogate cache lifetime on cacheable successful responses.
///
/// A handler that already set `Cache-Control` wins.
pub async fn cache_control_layer(
    State(state): State<CacheControlState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let cacheable = should_cache(&request);
    let mut response = next.run(request).await;

    if cacheable
        && response.status().is_success()
        && !response.headers().contains_key(header::CACHE_CONTROL)
        && let Ok(value) = format!("s-maxage={}, must-revalidate", state.max_age_seconds).parse()
    {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }

    response
}
