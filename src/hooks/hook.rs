//! Core hook types and traits.
//!
//! Each extension point is a [`HookKind`] carrying its own resolution policy
//! and accepted parameter set as metadata, so new hooks declare behavior
//! instead of growing ad hoc conditionals in the registry.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::negotiate::AcceptPreferences;
use crate::server::BatchStrategy;

/// The named extension points a plugin can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Load the model from the artifact directory. Called once per process.
    ModelLoad,
    /// Convert the raw request body into the model's input type.
    InputDecode,
    /// Run inference on the decoded input.
    Predict,
    /// Serialize a prediction into response bytes plus a content type.
    OutputEncode,
    /// Report whether the service is able to serve predictions.
    HealthCheck,
    /// Default Batch Transform invocation strategy.
    BatchStrategy,
    /// Maximum number of concurrent Batch Transform invocations.
    MaxConcurrentTransforms,
    /// Maximum allowed payload size in megabytes.
    MaxPayloadSize,
}

/// How the registry resolves multiple implementations of one hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Exactly one effective implementation; a built-in default applies when
    /// no plugin registers one. Two registrations are a conflict.
    SingleWithDefault,
    /// At most one implementation; absence is only an error once a request
    /// actually needs the hook. Two registrations are a conflict.
    SingleOptional,
    /// All implementations are consulted in discovery order; the first one
    /// returning a value wins, and no value means the result is omitted.
    FirstNonNull,
}

impl HookKind {
    pub const ALL: [HookKind; 8] = [
        HookKind::ModelLoad,
        HookKind::InputDecode,
        HookKind::Predict,
        HookKind::OutputEncode,
        HookKind::HealthCheck,
        HookKind::BatchStrategy,
        HookKind::MaxConcurrentTransforms,
        HookKind::MaxPayloadSize,
    ];

    /// The hook's wire name, as plugin authors know it.
    pub fn name(&self) -> &'static str {
        match self {
            HookKind::ModelLoad => "model_fn",
            HookKind::InputDecode => "input_fn",
            HookKind::Predict => "predict_fn",
            HookKind::OutputEncode => "output_fn",
            HookKind::HealthCheck => "ping_fn",
            HookKind::BatchStrategy => "batch_strategy",
            HookKind::MaxConcurrentTransforms => "max_concurrent_transforms",
            HookKind::MaxPayloadSize => "max_payload_in_mb",
        }
    }

    /// How the registry resolves this hook.
    pub fn policy(&self) -> ResolutionPolicy {
        match self {
            HookKind::Predict | HookKind::HealthCheck => ResolutionPolicy::SingleWithDefault,
            HookKind::ModelLoad | HookKind::InputDecode | HookKind::OutputEncode => {
                ResolutionPolicy::SingleOptional
            }
            HookKind::BatchStrategy
            | HookKind::MaxConcurrentTransforms
            | HookKind::MaxPayloadSize => ResolutionPolicy::FirstNonNull,
        }
    }

    /// The parameter names the dispatcher supplies to this hook.
    ///
    /// Implementations may declare any subset; anything else fails
    /// signature validation at discovery time.
    pub fn accepted_params(&self) -> &'static [&'static str] {
        match self {
            HookKind::ModelLoad => &["model_dir"],
            HookKind::InputDecode => &["input_data", "content_type"],
            HookKind::Predict => &["data", "model"],
            HookKind::OutputEncode => &["prediction", "accept"],
            HookKind::HealthCheck => &["model"],
            HookKind::BatchStrategy
            | HookKind::MaxConcurrentTransforms
            | HookKind::MaxPayloadSize => &[],
        }
    }
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The value passed between decode, predict, and encode hooks.
///
/// Codec pairs agree on a variant between themselves; the dispatcher never
/// inspects the payload beyond the no-encoder pass-through case.
#[derive(Debug, Clone, PartialEq)]
pub enum HookValue {
    /// Raw bytes, e.g. an undecoded request body.
    Bytes(Bytes),
    Text(String),
    Json(serde_json::Value),
}

impl HookValue {
    /// Returns the bytes if this value is the `Bytes` variant.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            HookValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Short variant name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            HookValue::Bytes(_) => "bytes",
            HookValue::Text(_) => "text",
            HookValue::Json(_) => "json",
        }
    }
}

/// Hook execution errors.
///
/// The negotiation variants are raised by codec hooks that inspected the
/// request's media types and cannot serve them; the dispatcher maps them to
/// their dedicated HTTP status codes instead of a generic 500.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Hook {hook} failed: {reason}")]
    ExecutionFailed { hook: &'static str, reason: String },

    #[error("Unsupported media type: {content_type}")]
    UnsupportedMediaType { content_type: String },

    #[error("Cannot satisfy Accept preferences: {accept}")]
    NotAcceptable { accept: String },
}

impl HookError {
    /// Shorthand for `ExecutionFailed` with the given hook kind.
    pub fn failed(hook: HookKind, reason: impl Into<String>) -> Self {
        HookError::ExecutionFailed {
            hook: hook.name(),
            reason: reason.into(),
        }
    }

    /// Shorthand for `UnsupportedMediaType`.
    pub fn unsupported_media_type(content_type: impl Into<String>) -> Self {
        HookError::UnsupportedMediaType {
            content_type: content_type.into(),
        }
    }

    /// Shorthand for `NotAcceptable`.
    pub fn not_acceptable(accept: &AcceptPreferences) -> Self {
        HookError::NotAcceptable {
            accept: accept.to_string(),
        }
    }
}

/// The loaded model object, as produced by the model-load hook.
///
/// `invoke` is the unary-call contract the default predict hook relies on;
/// custom predict hooks receive the model and may ignore it entirely.
pub trait Model: Send + Sync {
    fn invoke(&self, input: HookValue) -> std::result::Result<HookValue, HookError>;
}

/// Loads a model from the externally provisioned artifact directory.
#[async_trait]
pub trait ModelLoadHook: Send + Sync {
    async fn load(&self, model_dir: &Path) -> std::result::Result<Arc<dyn Model>, HookError>;
}

/// Deserializes a request body into the model's input type.
///
/// Implementations that inspect `content_type` and reject it should return
/// [`HookError::UnsupportedMediaType`] so the client sees a 415.
#[async_trait]
pub trait InputDecodeHook: Send + Sync {
    async fn decode(
        &self,
        input_data: Bytes,
        content_type: &str,
    ) -> std::result::Result<HookValue, HookError>;
}

/// Runs inference on a decoded input.
#[async_trait]
pub trait PredictHook: Send + Sync {
    async fn predict(
        &self,
        data: HookValue,
        model: &dyn Model,
    ) -> std::result::Result<HookValue, HookError>;
}

/// Serializes a prediction into response bytes plus the chosen content type.
///
/// Implementations must compare `accept` against the formats they support
/// and return [`HookError::NotAcceptable`] rather than pick a type the
/// client did not ask for.
#[async_trait]
pub trait OutputEncodeHook: Send + Sync {
    async fn encode(
        &self,
        prediction: HookValue,
        accept: &AcceptPreferences,
    ) -> std::result::Result<(Bytes, String), HookError>;
}

/// Reports service health for the host's poll loop.
///
/// `model` is the currently cached model, or `None` before the first
/// successful load. Implementations must be fast; the host polls this
/// continuously.
#[async_trait]
pub trait HealthCheckHook: Send + Sync {
    async fn check(&self, model: Option<&dyn Model>) -> std::result::Result<bool, HookError>;
}

/// Supplies the default Batch Transform strategy, or `None` to omit it.
pub trait BatchStrategyHook: Send + Sync {
    fn batch_strategy(&self) -> std::result::Result<Option<BatchStrategy>, HookError>;
}

/// Supplies the maximum concurrent transform count, or `None` to omit it.
pub trait MaxConcurrentTransformsHook: Send + Sync {
    fn max_concurrent_transforms(
        &self,
    ) -> std::result::Result<Option<std::num::NonZeroU32>, HookError>;
}

/// Supplies the maximum payload size in MB, or `None` to omit it.
pub trait MaxPayloadSizeHook: Send + Sync {
    fn max_payload_in_mb(&self) -> std::result::Result<Option<u32>, HookError>;
}

/// A hook implementation, tagged by the extension point it serves.
///
/// The variant is the capability: the registry checks it against the
/// declared [`HookKind`] during validation, so a plugin cannot smuggle a
/// decode callable in under the predict name.
#[derive(Clone)]
pub enum HookCallable {
    ModelLoad(Arc<dyn ModelLoadHook>),
    InputDecode(Arc<dyn InputDecodeHook>),
    Predict(Arc<dyn PredictHook>),
    OutputEncode(Arc<dyn OutputEncodeHook>),
    HealthCheck(Arc<dyn HealthCheckHook>),
    BatchStrategy(Arc<dyn BatchStrategyHook>),
    MaxConcurrentTransforms(Arc<dyn MaxConcurrentTransformsHook>),
    MaxPayloadSize(Arc<dyn MaxPayloadSizeHook>),
}

impl HookCallable {
    /// The extension point this callable actually serves.
    pub fn kind(&self) -> HookKind {
        match self {
            HookCallable::ModelLoad(_) => HookKind::ModelLoad,
            HookCallable::InputDecode(_) => HookKind::InputDecode,
            HookCallable::Predict(_) => HookKind::Predict,
            HookCallable::OutputEncode(_) => HookKind::OutputEncode,
            HookCallable::HealthCheck(_) => HookKind::HealthCheck,
            HookCallable::BatchStrategy(_) => HookKind::BatchStrategy,
            HookCallable::MaxConcurrentTransforms(_) => HookKind::MaxConcurrentTransforms,
            HookCallable::MaxPayloadSize(_) => HookKind::MaxPayloadSize,
        }
    }
}

impl std::fmt::Debug for HookCallable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HookCallable::{}", self.kind().name())
    }
}

/// One hook contribution from one plugin.
///
/// Created at discovery time, immutable afterwards. A hook may declare a
/// subset of the parameters its extension point accepts; anything outside
/// that set is rejected before the process starts serving.
#[derive(Debug, Clone)]
pub struct HookImpl {
    /// Owning plugin identity; filled in by the registry at discovery.
    pub(crate) plugin: String,
    /// The extension point this implementation claims to serve.
    pub declared: HookKind,
    /// The callable itself.
    pub callable: HookCallable,
    /// Parameter names the implementation consumes.
    pub params: Vec<&'static str>,
}

impl HookImpl {
    fn new(declared: HookKind, callable: HookCallable) -> Self {
        Self {
            plugin: String::new(),
            declared,
            callable,
            params: declared.accepted_params().to_vec(),
        }
    }

    pub fn model_load(hook: Arc<dyn ModelLoadHook>) -> Self {
        Self::new(HookKind::ModelLoad, HookCallable::ModelLoad(hook))
    }

    pub fn input_decode(hook: Arc<dyn InputDecodeHook>) -> Self {
        Self::new(HookKind::InputDecode, HookCallable::InputDecode(hook))
    }

    pub fn predict(hook: Arc<dyn PredictHook>) -> Self {
        Self::new(HookKind::Predict, HookCallable::Predict(hook))
    }

    pub fn output_encode(hook: Arc<dyn OutputEncodeHook>) -> Self {
        Self::new(HookKind::OutputEncode, HookCallable::OutputEncode(hook))
    }

    pub fn health_check(hook: Arc<dyn HealthCheckHook>) -> Self {
        Self::new(HookKind::HealthCheck, HookCallable::HealthCheck(hook))
    }

    pub fn batch_strategy(hook: Arc<dyn BatchStrategyHook>) -> Self {
        Self::new(HookKind::BatchStrategy, HookCallable::BatchStrategy(hook))
    }

    pub fn max_concurrent_transforms(hook: Arc<dyn MaxConcurrentTransformsHook>) -> Self {
        Self::new(
            HookKind::MaxConcurrentTransforms,
            HookCallable::MaxConcurrentTransforms(hook),
        )
    }

    pub fn max_payload_size(hook: Arc<dyn MaxPayloadSizeHook>) -> Self {
        Self::new(HookKind::MaxPayloadSize, HookCallable::MaxPayloadSize(hook))
    }

    /// Override the declared parameter names (to declare a subset, or, in
    /// tests, an invalid set).
    pub fn with_params(mut self, params: &[&'static str]) -> Self {
        self.params = params.to_vec();
        self
    }

    /// Override the declared hook kind. Only useful for exercising
    /// signature validation; the constructors always set a matching kind.
    pub fn with_declared(mut self, declared: HookKind) -> Self {
        self.declared = declared;
        self
    }

    /// The plugin that contributed this implementation.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_unique() {
        let mut names: Vec<&str> = HookKind::ALL.iter().map(|k| k.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), HookKind::ALL.len());
    }

    #[test]
    fn parameterless_hooks_are_exactly_the_first_non_null_ones() {
        for kind in HookKind::ALL {
            assert_eq!(
                kind.accepted_params().is_empty(),
                kind.policy() == ResolutionPolicy::FirstNonNull,
                "{kind}"
            );
        }
    }
}
