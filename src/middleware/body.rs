//! JSON body parsing with per-route limits.
//!
//! Limits are resolved per request path: an exact rule beats any wildcard
//! rule, and among wildcard rules (`/prefix/*`) the longest prefix wins.
//! Oversized and malformed bodies are answered directly here; they never
//! reach route code.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use serde_json::Value;

use super::accept::type_is;
use crate::config::BodyConfig;

/// Parsed JSON body, available to route code as a request extension.
#[derive(Clone)]
pub struct ParsedBody(pub Arc<Value>);

/// Resolved body-parsing rules, built once from configuration.
pub struct BodyRules {
    default_limit: usize,
    default_strict: bool,
    routes: Vec<(String, usize, Option<bool>)>,
}

impl BodyRules {
    pub fn new(config: &BodyConfig) -> Self {
        Self {
            default_limit: config.default_limit,
            default_strict: config.strict,
            routes: config
                .routes
                .iter()
                .map(|rule| (rule.path.clone(), rule.limit, rule.strict))
                .collect(),
        }
    }

    /// The limit and strictness for a request path.
    pub fn resolve(&self, path: &str) -> (usize, bool) {
        let mut best: Option<(&str, usize, Option<bool>)> = None;
        for (pattern, limit, strict) in &self.routes {
            if let Some(prefix) = pattern.strip_suffix("/*") {
                let matches = path == prefix || path.starts_with(&format!("{prefix}/"));
                if !matches {
                    continue;
                }
                // wildcard never beats an exact match already found
                let replace = match best {
                    Some((current, _, _)) => {
                        current.ends_with("/*") && pattern.len() > current.len()
                    }
                    None => true,
                };
                if replace {
                    best = Some((pattern, *limit, *strict));
                }
            } else if path == pattern {
                best = Some((pattern, *limit, *strict));
            }
        }
        match best {
            Some((_, limit, strict)) => (limit, strict.unwrap_or(self.default_strict)),
            None => (self.default_limit, self.default_strict),
        }
    }
}

pub async fn parse_json_body(
    rules: Arc<BodyRules>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    if !type_is(content_type.as_deref(), &["json", "+json"]) {
        return next.run(request).await;
    }

    let (limit, strict) = rules.resolve(request.uri().path());
    let (mut parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (StatusCode::PAYLOAD_TOO_LARGE, "Content is too large").into_response();
        }
    };

    if !bytes.is_empty() {
        let value: Value = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(_) => {
                return (StatusCode::BAD_REQUEST, "Invalid JSON.").into_response();
            }
        };
        if strict && !(value.is_object() || value.is_array()) {
            return (
                StatusCode::BAD_REQUEST,
                "JSON body must be an object or array.",
            )
                .into_response();
        }
        parts.extensions.insert(ParsedBody(Arc::new(value)));
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    next.run(request).await
}
