//! Pass-through plugin: the stock behavior of a bare server.
//!
//! Registered by the `modelgate` binary so a process with no real model
//! still serves the full contract: invocations echo their input bytes,
//! ping turns healthy after warmup, and `/execution-parameters` reports
//! the stock Batch Transform values. Library users compose their own
//! plugin list and leave this out.
//!
//! Decode and encode hooks are deliberately absent; the negotiator's
//! pass-through rules already move raw bytes in and out when no codec is
//! registered.

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PluginError;
use crate::hooks::{
    BatchStrategyHook, HookError, HookImpl, HookValue, MaxConcurrentTransformsHook,
    MaxPayloadSizeHook, Model, ModelLoadHook, Plugin,
};
use crate::server::BatchStrategy;

/// An identity model: prediction equals input.
pub struct PassthroughModel;

impl Model for PassthroughModel {
    fn invoke(&self, input: HookValue) -> Result<HookValue, HookError> {
        Ok(input)
    }
}

struct PassthroughLoader;

#[async_trait]
impl ModelLoadHook for PassthroughLoader {
    async fn load(&self, model_dir: &Path) -> Result<Arc<dyn Model>, HookError> {
        tracing::debug!(model_dir = %model_dir.display(), "Pass-through model ignores artifacts");
        Ok(Arc::new(PassthroughModel))
    }
}

struct StockBatchParams;

impl BatchStrategyHook for StockBatchParams {
    fn batch_strategy(&self) -> Result<Option<BatchStrategy>, HookError> {
        Ok(Some(BatchStrategy::MultiRecord))
    }
}

impl MaxConcurrentTransformsHook for StockBatchParams {
    fn max_concurrent_transforms(&self) -> Result<Option<NonZeroU32>, HookError> {
        Ok(NonZeroU32::new(1))
    }
}

impl MaxPayloadSizeHook for StockBatchParams {
    fn max_payload_in_mb(&self) -> Result<Option<u32>, HookError> {
        Ok(Some(6))
    }
}

/// The built-in pass-through plugin.
pub struct PassthroughPlugin;

impl Plugin for PassthroughPlugin {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn hooks(&self) -> Result<Vec<HookImpl>, PluginError> {
        let params = Arc::new(StockBatchParams);
        Ok(vec![
            HookImpl::model_load(Arc::new(PassthroughLoader)),
            HookImpl::batch_strategy(Arc::clone(&params) as Arc<dyn BatchStrategyHook>),
            HookImpl::max_concurrent_transforms(
                Arc::clone(&params) as Arc<dyn MaxConcurrentTransformsHook>
            ),
            HookImpl::max_payload_size(params as Arc<dyn MaxPayloadSizeHook>),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::hooks::HookRegistry;

    #[test]
    fn contributes_stock_batch_parameters() {
        let plugins: [Arc<dyn Plugin>; 1] = [Arc::new(PassthroughPlugin)];
        let registry = HookRegistry::discover(&plugins).unwrap();

        assert_eq!(registry.batch_strategy(), Some(BatchStrategy::MultiRecord));
        assert_eq!(
            registry.max_concurrent_transforms(),
            NonZeroU32::new(1)
        );
        assert_eq!(registry.max_payload_in_mb(), Some(6));
    }

    #[tokio::test]
    async fn model_echoes_input() {
        let loader = PassthroughLoader;
        let model = loader.load(Path::new("/opt/ml/model")).await.unwrap();
        let input = HookValue::Bytes(Bytes::from_static(b"shipping forecast"));
        assert_eq!(model.invoke(input.clone()).unwrap(), input);
    }
}
