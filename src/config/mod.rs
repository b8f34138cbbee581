//! Configuration surface: schema, loading, validation.
//!
//! The sequencer consumes this configuration but never mutates it; listeners
//! that need to adjust the plan do so through the server handle during their
//! phase.

mod loader;
mod schema;
mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BodyConfig, BodyRouteLimit, CacheConfig, CorsOptions, CorsPolicy, ErrorLogLevel, PlinthConfig,
    SessionConfig, SessionCookieConfig, StaticEntry, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
