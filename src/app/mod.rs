//! Application handle and router assembly.
//!
//! An [`App`] is the mutable surface listeners configure during the
//! bootstrap phases: routes, middleware installs, the fallback. At start
//! time the accumulated plan is frozen into one axum router with the full
//! layer stack in its fixed order. The handle is cheap to clone and shared
//! with every phase listener.

mod engine;

pub use engine::{Engine, EngineCell};

use std::future::Future;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Method, Request};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{on, MethodFilter};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::bridge::{bridge, AdapterSettings};
use crate::config::PlinthConfig;
use crate::error::{BoxError, EnvelopeKind, ErrorEnvelope};
use crate::middleware::wrap::into_infallible;
use crate::middleware::{
    apply_cache_policy, fallback_error, json_error, parse_cookies, parse_json_body, route_handler,
    session, BodyRules, CachePolicy, RouteHandler, TranslateSettings,
};
use crate::serve::static_routes;

/// Pipeline features a phase listener can switch off by skipping the
/// phase's default action.
pub mod features {
    pub const LOGGER: &str = "logger";
    pub const STATIC: &str = "static";
    pub const CACHE: &str = "cache";
    pub const BODY_PARSER: &str = "bodyParser";
    pub const COOKIE_PARSER: &str = "cookieParser";
    pub const SESSION: &str = "session";
    pub const ERROR_HANDLERS: &str = "errorHandlers";
    pub const UNHANDLED_ERROR_HANDLER: &str = "unhandledErrorHandler";
}

type MiddlewareInstall = Box<dyn FnOnce(Router) -> Router + Send>;

struct RouteEntry {
    method: Method,
    path: String,
    handler: RouteHandler,
}

struct AppInner {
    config: PlinthConfig,
    routes: Vec<RouteEntry>,
    middlewares: Vec<MiddlewareInstall>,
    fallback: Option<RouteHandler>,
    disabled: std::collections::HashSet<&'static str>,
}

/// Shared, phase-mutable application state.
#[derive(Clone)]
pub struct App {
    inner: Arc<Mutex<AppInner>>,
    engine: Arc<EngineCell>,
}

impl App {
    pub fn new(config: PlinthConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AppInner {
                config,
                routes: Vec::new(),
                middlewares: Vec::new(),
                fallback: None,
                disabled: std::collections::HashSet::new(),
            })),
            engine: Arc::new(EngineCell::new()),
        }
    }

    pub fn config(&self) -> PlinthConfig {
        self.lock().config.clone()
    }

    pub fn engine(&self) -> Arc<EngineCell> {
        Arc::clone(&self.engine)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AppInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a route for one method.
    pub fn route(&self, method: Method, path: impl Into<String>, handler: RouteHandler) {
        self.lock().routes.push(RouteEntry {
            method,
            path: path.into(),
            handler,
        });
    }

    pub fn get<F, Fut, R>(&self, path: impl Into<String>, f: F)
    where
        F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Method::GET, path, route_handler(f));
    }

    pub fn post<F, Fut, R>(&self, path: impl Into<String>, f: F)
    where
        F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Method::POST, path, route_handler(f));
    }

    pub fn delete<F, Fut, R>(&self, path: impl Into<String>, f: F)
    where
        F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Method::DELETE, path, route_handler(f));
    }

    /// Replace the not-found fallback.
    pub fn set_fallback(&self, handler: RouteHandler) {
        self.lock().fallback = Some(handler);
    }

    /// Switch off one of the built-in pipeline [`features`].
    pub fn disable(&self, feature: &'static str) {
        self.lock().disabled.insert(feature);
    }

    pub fn enabled(&self, feature: &str) -> bool {
        !self.lock().disabled.contains(feature)
    }

    /// Install a router transformation. Installs wrap the dynamic routes in
    /// registration order: the first install ends up outermost.
    pub fn install<F>(&self, install: F)
    where
        F: FnOnce(Router) -> Router + Send + 'static,
    {
        self.lock().middlewares.push(Box::new(install));
    }

    /// Freeze the accumulated plan into the serving router. Called once per
    /// sequence run, when the route table is final.
    pub fn build_router(&self, secure: bool) -> Router {
        let mut inner = self.lock();
        let config = inner.config.clone();
        let routes = std::mem::take(&mut inner.routes);
        let middlewares = std::mem::take(&mut inner.middlewares);
        let fallback = inner.fallback.take().unwrap_or_else(default_fallback);
        let disabled = inner.disabled.clone();
        drop(inner);
        let enabled = |feature: &str| !disabled.contains(feature);

        let mut router = Router::new();
        for entry in routes {
            match MethodFilter::try_from(entry.method.clone()) {
                Ok(filter) => {
                    router = router.route(&entry.path, on(filter, into_infallible(entry.handler)));
                }
                Err(_) => warn!(method = %entry.method, path = %entry.path, "unroutable method"),
            }
        }
        // static routes sit behind the dynamic table; when no root entry
        // claims the slot, the not-found handler is the end of the chain
        let (mut static_router, root_taken) = if enabled(features::STATIC) {
            static_routes::build(&config.static_routes, &config.cache)
        } else {
            (Router::new(), false)
        };
        if !root_taken {
            static_router = static_router.fallback(into_infallible(fallback));
        }
        router = router.fallback_service(static_router);

        let translate = Arc::new(TranslateSettings {
            log_level: config.json_error_level,
            dump_exceptions: config.dump_exceptions,
        });
        if enabled(features::ERROR_HANDLERS) {
            let settings = Arc::clone(&translate);
            router = router.layer(middleware::from_fn(move |request, next| {
                json_error(settings.clone(), request, next)
            }));
        }
        if enabled(features::UNHANDLED_ERROR_HANDLER) {
            let settings = Arc::clone(&translate);
            router = router.layer(middleware::from_fn(move |request, next| {
                fallback_error(settings.clone(), request, next)
            }));
        }

        if config.use_session && enabled(features::SESSION) {
            let session_config = Arc::new(config.session.clone());
            router = router.layer(middleware::from_fn(move |request, next| {
                session(session_config.clone(), request, next)
            }));
        }
        if enabled(features::COOKIE_PARSER) {
            router = router.layer(middleware::from_fn(parse_cookies));
        }

        if enabled(features::BODY_PARSER) {
            let rules = Arc::new(BodyRules::new(&config.body));
            router = router.layer(middleware::from_fn(move |request, next| {
                parse_json_body(rules.clone(), request, next)
            }));
        }

        if enabled(features::CACHE) {
            let policy = Arc::new(CachePolicy::from_config(&config.cache));
            router = router.layer(middleware::from_fn(move |request, next| {
                apply_cache_policy(policy.clone(), request, next)
            }));
        }

        for install in middlewares.into_iter().rev() {
            router = install(router);
        }

        if enabled(features::LOGGER) {
            router = router.layer(TraceLayer::new_for_http());
        }
        if config.allow_localhost_cors && is_localhost(&config.host) {
            router = router.layer(middleware::from_fn(allow_private_network));
        }

        let adapter = Arc::new(AdapterSettings {
            trust_proxy: config.trust_proxy,
            secure,
        });
        router.layer(middleware::from_fn(move |request, next| {
            bridge(adapter.clone(), request, next)
        }))
    }
}

fn default_fallback() -> RouteHandler {
    route_handler(|request: Request<Body>| async move {
        let message = format!(
            "Route {}:{} not found",
            request.method(),
            request.uri().path()
        );
        Err::<Response, BoxError>(
            ErrorEnvelope::new(EnvelopeKind::NotFound, message)
                .public(true)
                .into(),
        )
    })
}

fn is_localhost(host: &str) -> bool {
    let name = host.rsplit_once(':').map_or(host, |(h, _)| h);
    matches!(name, "localhost" | "127.0.0.1" | "[::1]" | "::1")
}

/// Chromium gates requests from public pages to a localhost server behind a
/// private-network preflight; OPTIONS responses advertise consent.
async fn allow_private_network(request: Request<Body>, next: Next) -> Response {
    let preflight = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if preflight {
        response.headers_mut().insert(
            HeaderName::from_static("access-control-allow-private-network"),
            HeaderValue::from_static("true"),
        );
    }
    response
}
