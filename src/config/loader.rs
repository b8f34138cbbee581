//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::PlinthConfig;
use crate::config::validation::{validate_config, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Validation(Vec<ValidationError>),
}

/// Load a TOML configuration file and validate it.
pub fn load_config(path: &Path) -> Result<PlinthConfig, ConfigError> {
    let raw = fs::read_to_string(path)?;
    let config: PlinthConfig = toml::from_str(&raw)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plinth.toml");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_and_validates_a_config_file() {
        let (_dir, path) = write_config(
            r#"
http_only = true
host = "localhost"

[body]
default_limit = 2048
"#,
        );
        let config = load_config(&path).unwrap();
        assert!(config.http_only);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.body.default_limit, 2048);
    }

    #[test]
    fn missing_files_surface_as_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn malformed_toml_surfaces_as_a_parse_error() {
        let (_dir, path) = write_config("host = [unterminated");
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn semantic_violations_are_collected_into_one_error() {
        let (_dir, path) = write_config(
            r#"
http_only = true

[body]
default_limit = 0
"#,
        );
        match load_config(&path) {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.field == "body.default_limit"));
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }
}
