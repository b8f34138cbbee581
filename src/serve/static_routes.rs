//! Static resource routes.
//!
//! Entries are installed in reverse declaration order so that, when
//! prefixes overlap, a later declaration takes precedence over an earlier
//! one. Root entries (`route = "/"`) claim the router's fallback slot; the
//! caller decides what the fallback is when no entry claims it.

use axum::http::{header, HeaderName, HeaderValue};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, warn};

use crate::config::{CacheConfig, CorsPolicy, StaticEntry};

/// Build the static router. The returned flag is true when a root entry
/// claimed the fallback slot.
pub fn build(entries: &[StaticEntry], cache: &CacheConfig) -> (Router, bool) {
    let mut router = Router::new();
    let mut root_taken = false;

    for entry in entries.iter().rev() {
        let route = if entry.route == "/" {
            "/"
        } else {
            entry.route.trim_end_matches('/')
        };
        debug!(route, path = %entry.path, file = entry.file, "installing static route");

        let cors = cors_layer(entry.cors.as_ref());
        let cache_header = cache_value(cache);

        if entry.file {
            let service = ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::CACHE_CONTROL,
                    cache_header,
                ))
                .layer(CompressionLayer::new())
                .option_layer(cors)
                .service(ServeFile::new(&entry.path));
            router = router.route_service(route, service);
        } else {
            let service = ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::CACHE_CONTROL,
                    cache_header,
                ))
                .layer(CompressionLayer::new())
                .option_layer(cors)
                .service(ServeDir::new(&entry.path));
            if route == "/" {
                if root_taken {
                    warn!(path = %entry.path, "root static route already claimed, skipping");
                    continue;
                }
                root_taken = true;
                router = router.fallback_service(service);
            } else {
                router = router.nest_service(route, service);
            }
        }
    }

    (router, root_taken)
}

fn cors_layer(policy: Option<&CorsPolicy>) -> Option<CorsLayer> {
    match policy {
        None | Some(CorsPolicy::Enabled(false)) => None,
        Some(CorsPolicy::Enabled(true)) => Some(CorsLayer::permissive()),
        Some(CorsPolicy::Custom(options)) => {
            let exposed: Vec<HeaderName> = options
                .exposed_headers
                .iter()
                .filter_map(|name| name.parse().ok())
                .collect();
            Some(CorsLayer::permissive().expose_headers(exposed))
        }
    }
}

fn cache_value(cache: &CacheConfig) -> HeaderValue {
    if cache.max_age == 0 {
        HeaderValue::from_static("no-cache, no-store, must-revalidate")
    } else {
        HeaderValue::from_str(&format!("max-age={}", cache.max_age))
            .unwrap_or_else(|_| HeaderValue::from_static("no-cache"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::io::Write;
    use tower::ServiceExt;

    fn fixture_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("hello.txt")).unwrap();
        writeln!(file, "hello static").unwrap();
        dir
    }

    fn cache() -> CacheConfig {
        CacheConfig { max_age: 3600 }
    }

    #[tokio::test]
    async fn serves_a_directory_under_its_prefix() {
        let dir = fixture_dir();
        let entries = vec![StaticEntry {
            route: "/assets/".to_string(),
            path: dir.path().to_string_lossy().into_owned(),
            file: false,
            cors: None,
        }];
        let (router, root_taken) = build(&entries, &cache());
        assert!(!root_taken);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/assets/hello.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "max-age=3600"
        );
    }

    #[tokio::test]
    async fn single_file_entries_serve_one_route() {
        let dir = fixture_dir();
        let entries = vec![StaticEntry {
            route: "/hello".to_string(),
            path: dir
                .path()
                .join("hello.txt")
                .to_string_lossy()
                .into_owned(),
            file: true,
            cors: Some(CorsPolicy::Enabled(true)),
        }];
        let (router, _) = build(&entries, &cache());

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/hello")
                    .header(header::ORIGIN, "https://other.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn root_directory_claims_the_fallback() {
        let dir = fixture_dir();
        let entries = vec![StaticEntry {
            route: "/".to_string(),
            path: dir.path().to_string_lossy().into_owned(),
            file: false,
            cors: None,
        }];
        let (router, root_taken) = build(&entries, &cache());
        assert!(root_taken);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/hello.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
