//! The pluggable extension points driving every request.
//!
//! The server supplies no model logic of its own; plugins contribute
//! implementations of 8 named hooks:
//!
//! - **model_fn**: Load the model from the artifact directory
//! - **input_fn**: Decode the request body into the model's input type
//! - **predict_fn**: Run inference (default: call the model unary)
//! - **output_fn**: Encode a prediction per the client's Accept preferences
//! - **ping_fn**: Health check (default: healthy once the model loaded)
//! - **batch_strategy** / **max_concurrent_transforms** / **max_payload_in_mb**:
//!   Batch Transform tuning parameters
//!
//! Each hook declares its own resolution policy: exactly-one (with or
//! without a built-in default) or first-non-null across all plugins in
//! discovery order. Discovery and validation run once at startup; the
//! resolved table is immutable while serving.

pub mod hook;
pub mod registry;

pub use hook::{
    BatchStrategyHook, HealthCheckHook, HookCallable, HookError, HookImpl, HookKind, HookValue,
    InputDecodeHook, MaxConcurrentTransformsHook, MaxPayloadSizeHook, Model, ModelLoadHook,
    OutputEncodeHook, PredictHook, ResolutionPolicy,
};
pub use registry::{HookRegistry, Plugin};
