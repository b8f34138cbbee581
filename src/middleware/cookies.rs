//! Cookie parsing and session tracking.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use cookie::Cookie;
use serde_json::Value;
use uuid::Uuid;

use crate::bridge::BridgedContext;
use crate::config::SessionConfig;

/// Request cookies, parsed once per request.
#[derive(Clone, Default)]
pub struct Cookies(pub Arc<HashMap<String, String>>);

impl Cookies {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

pub async fn parse_cookies(mut request: Request<Body>, next: Next) -> Response {
    let mut jar = HashMap::new();
    if let Some(raw) = request
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
    {
        for cookie in Cookie::split_parse(raw.to_owned()).flatten() {
            jar.insert(cookie.name().to_string(), cookie.value().to_string());
        }
    }
    request.extensions_mut().insert(Cookies(Arc::new(jar)));
    next.run(request).await
}

/// Session identity for the current request.
#[derive(Clone)]
pub struct Session {
    pub id: String,
    /// The id was minted on this request.
    pub fresh: bool,
}

/// Assign or recover the session id. Expects cookies to have been parsed by
/// an outer layer. The cookie is re-issued when freshly minted, and on every
/// request when a max-age is configured so the expiry keeps sliding.
pub async fn session(
    config: Arc<SessionConfig>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let existing = request
        .extensions()
        .get::<Cookies>()
        .and_then(|cookies| cookies.get(&config.key).map(str::to_owned));

    let (id, fresh) = match existing {
        Some(id) => (id, false),
        None => (format!("{}{}", config.prefix, Uuid::new_v4()), true),
    };
    request.extensions_mut().insert(Session {
        id: id.clone(),
        fresh,
    });
    if let Some(context) = request.extensions().get::<BridgedContext>() {
        context
            .lock()
            .locals
            .insert("sessionId".to_string(), Value::String(id.clone()));
    }

    let mut response = next.run(request).await;

    if fresh || config.cookie.max_age.is_some() {
        let mut cookie = Cookie::new(config.key.clone(), id);
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_secure(config.cookie.secure);
        if let Some(max_age) = config.cookie.max_age {
            cookie.set_max_age(cookie::time::Duration::seconds(max_age as i64));
        }
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}
