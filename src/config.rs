//! Configuration for modelgate.
//!
//! Everything comes from environment variables with sensible hosting
//! defaults; a `.env` file is loaded first via dotenvy and never overrides
//! real environment variables.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Well-known location for model artifacts inside hosting containers.
pub const DEFAULT_MODEL_DIR: &str = "/opt/ml/model";

/// Main configuration for the server.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Model artifact and warmup configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Externally provisioned directory handed to the `model_fn` hook.
    pub model_dir: PathBuf,
    /// Load the model at startup instead of on the first invocation.
    pub warmup: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Ok(Self {
            server: ServerConfig::resolve()?,
            model: ModelConfig::resolve()?,
        })
    }
}

impl ServerConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            host: optional_env("MODELGATE_HOST")?.unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_optional_env("MODELGATE_PORT", 8080)?,
        })
    }

    /// The listener address as `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ModelConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            model_dir: optional_env("MODEL_DIR")?
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR)),
            warmup: parse_bool_env("MODELGATE_WARMUP", true)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            model: ModelConfig {
                model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
                warmup: true,
            },
        }
    }
}

/// Crate-wide mutex for tests that mutate process environment variables.
///
/// The process environment is global state shared across all threads;
/// every `unsafe { set_var / remove_var }` call in tests must hold this
/// single lock.
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::ParseError(format!(
            "failed to read {key}: {e}"
        ))),
    }
}

fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| {
            s.parse().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{e}"),
            })
        })
        .transpose()
        .map(|opt| opt.unwrap_or(default))
}

/// Parse a boolean from an env var with a default.
///
/// Accepts "true"/"1" as true, "false"/"0" as false.
fn parse_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    match optional_env(key)? {
        Some(s) => match s.to_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("must be 'true' or 'false', got '{s}'"),
            }),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_is_unset() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe {
            std::env::remove_var("MODELGATE_HOST");
            std::env::remove_var("MODELGATE_PORT");
            std::env::remove_var("MODEL_DIR");
            std::env::remove_var("MODELGATE_WARMUP");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.server.addr(), "0.0.0.0:8080");
        assert_eq!(config.model.model_dir, PathBuf::from(DEFAULT_MODEL_DIR));
        assert!(config.model.warmup);
    }

    #[test]
    fn env_overrides_are_honored() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe {
            std::env::set_var("MODELGATE_HOST", "127.0.0.1");
            std::env::set_var("MODELGATE_PORT", "9090");
            std::env::set_var("MODEL_DIR", "/srv/models/current");
            std::env::set_var("MODELGATE_WARMUP", "false");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.server.addr(), "127.0.0.1:9090");
        assert_eq!(config.model.model_dir, PathBuf::from("/srv/models/current"));
        assert!(!config.model.warmup);

        unsafe {
            std::env::remove_var("MODELGATE_HOST");
            std::env::remove_var("MODELGATE_PORT");
            std::env::remove_var("MODEL_DIR");
            std::env::remove_var("MODELGATE_WARMUP");
        }
    }

    #[test]
    fn invalid_port_is_rejected() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe {
            std::env::set_var("MODELGATE_PORT", "not-a-port");
        }
        let err = ServerConfig::resolve().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        unsafe {
            std::env::remove_var("MODELGATE_PORT");
        }
    }
}
