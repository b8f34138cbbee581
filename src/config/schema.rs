//! Configuration schema definitions.
//!
//! This module defines the configuration surface consumed by the bootstrap
//! sequencer. All types derive Serde traits for deserialization from config
//! files; defaults match a development deployment.

use serde::{Deserialize, Serialize};

/// Root configuration for the serving layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PlinthConfig {
    /// Attach to the plain HTTP transport instead of TLS.
    pub http_only: bool,

    /// Advertised host name, used for the localhost CORS compatibility check.
    pub host: String,

    /// Trust proxy-provided forwarding headers when deriving ip/protocol.
    pub trust_proxy: bool,

    /// Run the second-framework (engine) init/ready phases.
    pub dual_protocol: bool,

    /// Allow private-network CORS preflights when serving on localhost.
    pub allow_localhost_cors: bool,

    /// Render full diagnostic pages for unhandled errors (development only;
    /// must never be enabled where untrusted clients can see failures).
    pub dump_exceptions: bool,

    /// Verbosity of unhandled-error logging.
    pub json_error_level: ErrorLogLevel,

    /// Install the session middleware.
    pub use_session: bool,

    /// Optional TLS certificate configuration.
    pub tls: Option<TlsConfig>,

    /// Static resource routes, installed in reverse declaration order.
    #[serde(rename = "static")]
    pub static_routes: Vec<StaticEntry>,

    /// Cache header settings.
    pub cache: CacheConfig,

    /// Session parameters.
    pub session: SessionConfig,

    /// Request body parsing limits.
    pub body: BodyConfig,
}

/// Verbosity of unhandled-error logging, evaluated fresh per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLogLevel {
    /// Suppress logging entirely.
    None,
    /// Kind, message and status code only.
    Summary,
    /// Complete envelope including the cause chain.
    #[default]
    Full,
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// One static resource route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticEntry {
    /// Route prefix to serve under.
    pub route: String,

    /// Filesystem path (directory, or a single file when `file` is set).
    pub path: String,

    /// Serve a single file instead of a directory.
    #[serde(default)]
    pub file: bool,

    /// Optional CORS policy for this route.
    #[serde(default)]
    pub cors: Option<CorsPolicy>,
}

/// CORS policy for a static route: either "use defaults" or custom options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsPolicy {
    Enabled(bool),
    Custom(CorsOptions),
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsOptions {
    /// Response headers exposed to cross-origin callers.
    pub exposed_headers: Vec<String>,
}

/// Cache header settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Max-age for static resources, in seconds.
    pub max_age: u64,
}

/// Session parameters. Store persistence is an external concern; only the
/// cookie contract lives here.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie signing secret.
    pub secret: String,

    /// Session cookie name.
    pub key: String,

    /// Prefix for generated session ids.
    pub prefix: String,

    /// Cookie attributes.
    pub cookie: SessionCookieConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: "0123456789abcdef".to_string(),
            key: "plinth.sid".to_string(),
            prefix: "plinth.".to_string(),
            cookie: SessionCookieConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionCookieConfig {
    /// Only send the cookie over TLS.
    pub secure: bool,

    /// Max-age in seconds. `None` leaves expiry checks to the server, which
    /// refreshes on every request.
    pub max_age: Option<u64>,
}

impl Default for SessionCookieConfig {
    fn default() -> Self {
        Self {
            secure: true,
            max_age: None,
        }
    }
}

/// Request body parsing limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Global size cap in bytes for JSON bodies.
    pub default_limit: usize,

    /// Only accept objects and arrays at the top level.
    pub strict: bool,

    /// Per-route overrides, keyed by exact path or trailing-wildcard prefix
    /// (`/foo/*`). The longest match wins.
    pub routes: Vec<BodyRouteLimit>,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            default_limit: 100 * 1024,
            strict: true,
            routes: Vec::new(),
        }
    }
}

/// Body limit override for one route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BodyRouteLimit {
    /// Exact path, or a prefix ending in `/*`.
    pub path: String,

    /// Size cap in bytes.
    pub limit: usize,

    /// Strictness override; falls back to the global setting.
    #[serde(default)]
    pub strict: Option<bool>,
}
