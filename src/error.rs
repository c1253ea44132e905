//! Error types for modelgate.

/// Top-level error type for the server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Hook error: {0}")]
    Hook(#[from] crate::hooks::HookError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Plugin discovery and validation errors.
///
/// All of these are fatal at startup: a process with a broken plugin set
/// must not begin serving.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Plugin {plugin} failed to load: {reason}")]
    DiscoveryFailed { plugin: String, reason: String },

    #[error(
        "Hook {hook} registered by both {first} and {second}, but allows a single implementation"
    )]
    HookConflict {
        hook: &'static str,
        first: String,
        second: String,
    },

    #[error("Plugin {plugin} registered {hook} more than once")]
    DuplicateHook {
        plugin: String,
        hook: &'static str,
    },

    #[error("Invalid signature for {hook} from plugin {plugin}: {reason}")]
    InvalidSignature {
        plugin: String,
        hook: &'static str,
        reason: String,
    },
}

/// Model loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model load hook failed: {0}")]
    LoadFailed(#[source] crate::hooks::HookError),

    #[error("No model_fn hook is registered and the request requires a model")]
    NoLoader,
}

/// Result type alias for the server.
pub type Result<T> = std::result::Result<T, Error>;
