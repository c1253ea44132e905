//! Hook registry: plugin discovery, validation, and resolution.
//!
//! Discovery runs once at process start. The resulting table is immutable,
//! so the request path reads it without locking.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PluginError;
use crate::hooks::hook::{
    HealthCheckHook, HookCallable, HookError, HookImpl, HookKind, HookValue, InputDecodeHook,
    Model, ModelLoadHook, OutputEncodeHook, PredictHook, ResolutionPolicy,
};
use crate::server::BatchStrategy;

/// A statically declared source of hook implementations.
///
/// Plugins are handed to [`HookRegistry::discover`] in a fixed order; that
/// order is the discovery order the first-non-null resolution policy uses.
pub trait Plugin: Send + Sync {
    /// Unique plugin identity.
    fn name(&self) -> &str;

    /// Produce this plugin's hook contributions.
    ///
    /// An error here is the plugin-cannot-be-loaded case and aborts startup.
    fn hooks(&self) -> std::result::Result<Vec<HookImpl>, PluginError>;
}

/// Registry of hook implementations, keyed by extension point.
///
/// Write-once: populated by [`discover`](Self::discover), then read-only
/// for the life of the process.
pub struct HookRegistry {
    /// Plugin identities in discovery order.
    plugins: Vec<String>,
    table: HashMap<HookKind, Vec<HookImpl>>,
    default_predict: Arc<dyn PredictHook>,
    default_health: Arc<dyn HealthCheckHook>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("plugins", &self.plugins)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl HookRegistry {
    /// Enumerate the plugin table, validate every contribution, and build
    /// the hook table.
    ///
    /// Fails fast on the startup-fatal conditions: a plugin that cannot
    /// produce its hooks, an invalid hook signature, a duplicate
    /// contribution within one plugin, or two plugins claiming a
    /// single-policy hook.
    pub fn discover(
        plugins: &[Arc<dyn Plugin>],
    ) -> std::result::Result<Self, PluginError> {
        let mut table: HashMap<HookKind, Vec<HookImpl>> = HashMap::new();
        let mut names = Vec::with_capacity(plugins.len());

        for plugin in plugins {
            let plugin_name = plugin.name().to_string();
            tracing::debug!(plugin = %plugin_name, "Loading plugin hooks");
            let contributed = plugin.hooks()?;

            let mut seen: Vec<HookKind> = Vec::new();
            for mut imp in contributed {
                imp.plugin = plugin_name.clone();
                Self::validate(&imp)?;

                if seen.contains(&imp.declared) {
                    return Err(PluginError::DuplicateHook {
                        plugin: plugin_name,
                        hook: imp.declared.name(),
                    });
                }
                seen.push(imp.declared);

                let slot = table.entry(imp.declared).or_default();
                if imp.declared.policy() != ResolutionPolicy::FirstNonNull
                    && let Some(existing) = slot.first()
                {
                    return Err(PluginError::HookConflict {
                        hook: imp.declared.name(),
                        first: existing.plugin.clone(),
                        second: plugin_name,
                    });
                }
                tracing::debug!(plugin = %plugin_name, hook = %imp.declared, "Registered hook");
                slot.push(imp);
            }
            names.push(plugin_name);
        }

        tracing::info!(
            plugins = names.len(),
            hooks = table.values().map(Vec::len).sum::<usize>(),
            "Hook discovery complete"
        );

        Ok(Self {
            plugins: names,
            table,
            default_predict: Arc::new(DefaultPredict),
            default_health: Arc::new(DefaultHealthCheck),
        })
    }

    /// Check one implementation against its extension point's contract.
    ///
    /// Runs at discovery time only; the request path never re-validates.
    pub fn validate(imp: &HookImpl) -> std::result::Result<(), PluginError> {
        let actual = imp.callable.kind();
        if actual != imp.declared {
            return Err(PluginError::InvalidSignature {
                plugin: imp.plugin.clone(),
                hook: imp.declared.name(),
                reason: format!("callable implements {} instead", actual),
            });
        }

        let accepted = imp.declared.accepted_params();
        for param in &imp.params {
            if !accepted.contains(param) {
                return Err(PluginError::InvalidSignature {
                    plugin: imp.plugin.clone(),
                    hook: imp.declared.name(),
                    reason: format!(
                        "parameter '{}' is not accepted (accepted: {:?})",
                        param, accepted
                    ),
                });
            }
        }
        Ok(())
    }

    /// Whether a plugin with the given identity was discovered.
    pub fn is_registered(&self, plugin_name: &str) -> bool {
        self.plugins.iter().any(|p| p == plugin_name)
    }

    /// Plugin identities in discovery order.
    pub fn plugin_names(&self) -> &[String] {
        &self.plugins
    }

    fn single(&self, kind: HookKind) -> Option<&HookImpl> {
        // Conflicts were rejected at discovery, so at most one entry exists.
        self.table.get(&kind).and_then(|v| v.first())
    }

    /// The registered model-load hook, if any.
    pub fn model_load(&self) -> Option<Arc<dyn ModelLoadHook>> {
        match self.single(HookKind::ModelLoad)?.callable {
            HookCallable::ModelLoad(ref h) => Some(Arc::clone(h)),
            _ => None,
        }
    }

    /// The registered input-decode hook, if any.
    pub fn input_decode(&self) -> Option<Arc<dyn InputDecodeHook>> {
        match self.single(HookKind::InputDecode)?.callable {
            HookCallable::InputDecode(ref h) => Some(Arc::clone(h)),
            _ => None,
        }
    }

    /// The registered output-encode hook, if any.
    pub fn output_encode(&self) -> Option<Arc<dyn OutputEncodeHook>> {
        match self.single(HookKind::OutputEncode)?.callable {
            HookCallable::OutputEncode(ref h) => Some(Arc::clone(h)),
            _ => None,
        }
    }

    /// The effective predict hook: the registered one or the built-in
    /// default that calls the model as a unary function.
    pub fn predict(&self) -> Arc<dyn PredictHook> {
        match self.single(HookKind::Predict).map(|i| &i.callable) {
            Some(HookCallable::Predict(h)) => Arc::clone(h),
            _ => Arc::clone(&self.default_predict),
        }
    }

    /// The effective health-check hook: the registered one or the built-in
    /// default that reports healthy once a model has loaded.
    pub fn health_check(&self) -> Arc<dyn HealthCheckHook> {
        match self.single(HookKind::HealthCheck).map(|i| &i.callable) {
            Some(HookCallable::HealthCheck(h)) => Arc::clone(h),
            _ => Arc::clone(&self.default_health),
        }
    }

    /// First-non-null resolution for the batch strategy parameter.
    pub fn batch_strategy(&self) -> Option<BatchStrategy> {
        self.first_non_null(HookKind::BatchStrategy, |c| match c {
            HookCallable::BatchStrategy(h) => h.batch_strategy(),
            _ => Ok(None),
        })
    }

    /// First-non-null resolution for the concurrent transform limit.
    pub fn max_concurrent_transforms(&self) -> Option<NonZeroU32> {
        self.first_non_null(HookKind::MaxConcurrentTransforms, |c| match c {
            HookCallable::MaxConcurrentTransforms(h) => h.max_concurrent_transforms(),
            _ => Ok(None),
        })
    }

    /// First-non-null resolution for the payload size limit.
    pub fn max_payload_in_mb(&self) -> Option<u32> {
        self.first_non_null(HookKind::MaxPayloadSize, |c| match c {
            HookCallable::MaxPayloadSize(h) => h.max_payload_in_mb(),
            _ => Ok(None),
        })
    }

    /// Consult implementations in discovery order; the first `Some` wins.
    ///
    /// A hook error resolves the parameter to omitted rather than failing
    /// the response: the host has sane defaults for missing parameters,
    /// and partial availability beats total failure.
    fn first_non_null<T>(
        &self,
        kind: HookKind,
        call: impl Fn(&HookCallable) -> std::result::Result<Option<T>, HookError>,
    ) -> Option<T> {
        for imp in self.table.get(&kind)? {
            match call(&imp.callable) {
                Ok(Some(value)) => return Some(value),
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(hook = %kind, plugin = %imp.plugin, "Hook failed: {}", e);
                    return None;
                }
            }
        }
        None
    }
}

/// Built-in predict: call the loaded model as a unary function.
struct DefaultPredict;

#[async_trait]
impl PredictHook for DefaultPredict {
    async fn predict(
        &self,
        data: HookValue,
        model: &dyn Model,
    ) -> std::result::Result<HookValue, HookError> {
        model.invoke(data)
    }
}

/// Built-in health check: healthy once the model has loaded.
struct DefaultHealthCheck;

#[async_trait]
impl HealthCheckHook for DefaultHealthCheck {
    async fn check(&self, model: Option<&dyn Model>) -> std::result::Result<bool, HookError> {
        Ok(model.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::hook::BatchStrategyHook;
    use crate::testing::{plugin, EchoModel, StaticLoader};

    struct ConstStrategy(BatchStrategy);

    impl BatchStrategyHook for ConstStrategy {
        fn batch_strategy(&self) -> std::result::Result<Option<BatchStrategy>, HookError> {
            Ok(Some(self.0))
        }
    }

    struct NullStrategy;

    impl BatchStrategyHook for NullStrategy {
        fn batch_strategy(&self) -> std::result::Result<Option<BatchStrategy>, HookError> {
            Ok(None)
        }
    }

    struct FailingStrategy;

    impl BatchStrategyHook for FailingStrategy {
        fn batch_strategy(&self) -> std::result::Result<Option<BatchStrategy>, HookError> {
            Err(HookError::failed(HookKind::BatchStrategy, "boom"))
        }
    }

    fn loader_impl() -> HookImpl {
        HookImpl::model_load(Arc::new(StaticLoader::new(EchoModel)))
    }

    #[test]
    fn empty_plugin_set_resolves_defaults() {
        let registry = HookRegistry::discover(&[]).unwrap();
        assert!(registry.model_load().is_none());
        assert!(registry.input_decode().is_none());
        assert!(registry.output_encode().is_none());
        assert!(registry.batch_strategy().is_none());
        assert!(registry.max_concurrent_transforms().is_none());
        assert!(registry.max_payload_in_mb().is_none());
    }

    #[tokio::test]
    async fn default_predict_calls_model() {
        let registry = HookRegistry::discover(&[]).unwrap();
        let out = registry
            .predict()
            .predict(HookValue::Text("hi".into()), &EchoModel)
            .await
            .unwrap();
        assert_eq!(out, HookValue::Text("hi".into()));
    }

    #[tokio::test]
    async fn default_health_tracks_model_presence() {
        let registry = HookRegistry::discover(&[]).unwrap();
        let health = registry.health_check();
        assert!(!health.check(None).await.unwrap());
        assert!(health.check(Some(&EchoModel)).await.unwrap());
    }

    #[test]
    fn single_policy_conflict_is_rejected() {
        let a = plugin("plugin-a", vec![loader_impl()]);
        let b = plugin("plugin-b", vec![loader_impl()]);
        let err = HookRegistry::discover(&[a, b]).unwrap_err();
        match err {
            PluginError::HookConflict { hook, first, second } => {
                assert_eq!(hook, "model_fn");
                assert_eq!(first, "plugin-a");
                assert_eq!(second, "plugin-b");
            }
            other => panic!("expected HookConflict, got: {other}"),
        }
    }

    #[test]
    fn duplicate_within_one_plugin_is_rejected() {
        let p = plugin("doubled", vec![loader_impl(), loader_impl()]);
        let err = HookRegistry::discover(&[p]).unwrap_err();
        assert!(matches!(err, PluginError::DuplicateHook { .. }));
    }

    #[test]
    fn unknown_param_fails_validation() {
        let imp = loader_impl().with_params(&["model_dir", "shoe_size"]);
        let p = plugin("bad-params", vec![imp]);
        let err = HookRegistry::discover(&[p]).unwrap_err();
        assert!(matches!(err, PluginError::InvalidSignature { .. }));
    }

    #[test]
    fn subset_of_params_is_valid() {
        let imp = HookImpl::input_decode(Arc::new(crate::testing::RawPassthroughDecoder))
            .with_params(&["input_data"]);
        let p = plugin("subset", vec![imp]);
        let registry = HookRegistry::discover(&[p]).unwrap();
        assert!(registry.input_decode().is_some());
    }

    #[test]
    fn kind_mismatch_fails_validation() {
        let imp = loader_impl().with_declared(HookKind::Predict);
        let p = plugin("mismatched", vec![imp]);
        let err = HookRegistry::discover(&[p]).unwrap_err();
        match err {
            PluginError::InvalidSignature { hook, .. } => assert_eq!(hook, "predict_fn"),
            other => panic!("expected InvalidSignature, got: {other}"),
        }
    }

    #[test]
    fn discovery_failure_propagates() {
        struct Broken;
        impl Plugin for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            fn hooks(&self) -> std::result::Result<Vec<HookImpl>, PluginError> {
                Err(PluginError::DiscoveryFailed {
                    plugin: "broken".into(),
                    reason: "missing shared object".into(),
                })
            }
        }
        let err = HookRegistry::discover(&[Arc::new(Broken)]).unwrap_err();
        assert!(matches!(err, PluginError::DiscoveryFailed { .. }));
    }

    #[test]
    fn first_non_null_takes_discovery_order() {
        let a = plugin(
            "first",
            vec![HookImpl::batch_strategy(Arc::new(ConstStrategy(
                BatchStrategy::SingleRecord,
            )))],
        );
        let b = plugin(
            "second",
            vec![HookImpl::batch_strategy(Arc::new(ConstStrategy(
                BatchStrategy::MultiRecord,
            )))],
        );
        let registry = HookRegistry::discover(&[a, b]).unwrap();
        assert_eq!(registry.batch_strategy(), Some(BatchStrategy::SingleRecord));
    }

    #[test]
    fn first_non_null_skips_null_values() {
        let a = plugin(
            "null",
            vec![HookImpl::batch_strategy(Arc::new(NullStrategy))],
        );
        let b = plugin(
            "value",
            vec![HookImpl::batch_strategy(Arc::new(ConstStrategy(
                BatchStrategy::MultiRecord,
            )))],
        );
        let registry = HookRegistry::discover(&[a, b]).unwrap();
        assert_eq!(registry.batch_strategy(), Some(BatchStrategy::MultiRecord));
    }

    #[test]
    fn first_non_null_error_omits_parameter() {
        let p = plugin(
            "failing",
            vec![HookImpl::batch_strategy(Arc::new(FailingStrategy))],
        );
        let registry = HookRegistry::discover(&[p]).unwrap();
        assert_eq!(registry.batch_strategy(), None);
    }

    #[test]
    fn plugin_registration_is_queryable() {
        let p = plugin("present", vec![loader_impl()]);
        let registry = HookRegistry::discover(&[p]).unwrap();
        assert!(registry.is_registered("present"));
        assert!(!registry.is_registered("absent"));
    }
}
