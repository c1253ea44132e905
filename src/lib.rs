//! Pluggable HTTP server for real-time ML model inference, speaking the
//! managed-hosting container contract.
//!
//! # Architecture
//!
//! ```text
//!            ┌───────────────────────────────────────────────┐
//!            │                HTTP dispatcher                │
//!            │   GET /ping   POST /invocations   GET /e-p    │
//!            └────────┬─────────────┬───────────────┬────────┘
//!                     │             │               │
//!              health hook   decode→predict→encode  batch params
//!                     │             │               │
//!            ┌────────┴─────────────┴───────────────┴────────┐
//!            │                 Hook registry                 │
//!            │  resolution policies, validated at startup    │
//!            └────────┬──────────────────────────────────────┘
//!                     │ model_fn
//!            ┌────────┴────────┐
//!            │   Model cache   │  exactly-once load, retry on failure
//!            └─────────────────┘
//! ```
//!
//! The server owns no model logic. Plugins contribute hook implementations
//! (see [`hooks`]); the dispatcher negotiates codecs per request, loads the
//! model once per process, and maps every hook failure to a well-defined
//! HTTP response.

pub mod config;
pub mod error;
pub mod hooks;
pub mod model;
pub mod negotiate;
pub mod passthrough;
pub mod server;
pub mod testing;
pub mod timing;

pub use config::Config;
pub use error::{Error, Result};

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::hooks::{
        HookError, HookImpl, HookRegistry, HookValue, Model, Plugin,
    };
    pub use crate::model::{ModelCache, ModelHandle};
    pub use crate::negotiate::AcceptPreferences;
    pub use crate::server::{BatchStrategy, ExecutionParameters, ServerContext, router};
}
