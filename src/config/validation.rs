//! Configuration validation.
//!
//! Semantic validation on top of serde's syntactic checks. Returns all
//! violations, not just the first, so an operator can fix a config file in
//! one pass.

use std::fmt;
use std::path::Path;

use crate::config::schema::PlinthConfig;

/// One semantic violation in a configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration. Pure function; runs before the config is
/// accepted into the sequencer.
pub fn validate_config(config: &PlinthConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !config.http_only {
        match &config.tls {
            None => errors.push(ValidationError::new(
                "tls",
                "TLS transport selected but no certificate configured",
            )),
            Some(tls) => {
                if !Path::new(&tls.cert_path).exists() {
                    errors.push(ValidationError::new(
                        "tls.cert_path",
                        format!("certificate file not found: {}", tls.cert_path),
                    ));
                }
                if !Path::new(&tls.key_path).exists() {
                    errors.push(ValidationError::new(
                        "tls.key_path",
                        format!("private key file not found: {}", tls.key_path),
                    ));
                }
            }
        }
    }

    for (i, entry) in config.static_routes.iter().enumerate() {
        if !entry.route.starts_with('/') {
            errors.push(ValidationError::new(
                format!("static[{i}].route"),
                "route must start with '/'",
            ));
        }
        if entry.path.is_empty() {
            errors.push(ValidationError::new(
                format!("static[{i}].path"),
                "path must not be empty",
            ));
        }
    }

    if config.body.default_limit == 0 {
        errors.push(ValidationError::new(
            "body.default_limit",
            "limit must be greater than zero",
        ));
    }
    for (i, rule) in config.body.routes.iter().enumerate() {
        if rule.limit == 0 {
            errors.push(ValidationError::new(
                format!("body.routes[{i}].limit"),
                "limit must be greater than zero",
            ));
        }
        if !rule.path.starts_with('/') {
            errors.push(ValidationError::new(
                format!("body.routes[{i}].path"),
                "path must start with '/'",
            ));
        }
        // only a trailing wildcard is meaningful
        if rule.path.contains('*') && !rule.path.ends_with("/*") {
            errors.push(ValidationError::new(
                format!("body.routes[{i}].path"),
                "wildcard is only supported as a trailing `/*`",
            ));
        }
    }

    if config.use_session && config.session.secret.is_empty() {
        errors.push(ValidationError::new(
            "session.secret",
            "sessions require a non-empty secret",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
