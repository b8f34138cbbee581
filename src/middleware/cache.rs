//! Response cache headers.
//!
//! Dynamic responses default to uncacheable. Anything that already set its
//! own `Cache-Control` (static file services in particular) is left alone.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::config::CacheConfig;

pub enum CachePolicy {
    /// `max_age = 0`: forbid caching outright.
    NoStore,
    MaxAge(HeaderValue),
}

impl CachePolicy {
    pub fn from_config(cache: &CacheConfig) -> Self {
        if cache.max_age == 0 {
            CachePolicy::NoStore
        } else {
            HeaderValue::from_str(&format!("max-age={}", cache.max_age))
                .map(CachePolicy::MaxAge)
                .unwrap_or(CachePolicy::NoStore)
        }
    }
}

pub async fn apply_cache_policy(
    policy: Arc<CachePolicy>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    if response.headers().contains_key(header::CACHE_CONTROL) {
        return response;
    }
    match &*policy {
        CachePolicy::NoStore => {
            let headers = response.headers_mut();
            headers.insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-store, must-revalidate"),
            );
            headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
            headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
        }
        CachePolicy::MaxAge(value) => {
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, value.clone());
        }
    }
    response
}
