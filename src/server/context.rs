//! Server context: the explicitly constructed state shared by handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::error::{ModelError, Result};
use crate::hooks::{HookRegistry, Plugin};
use crate::model::ModelCache;

/// Everything a request handler needs, built once at startup.
///
/// Replaces ambient global state: handlers receive the context through the
/// router. It is constructed before the listener binds and shared immutably
/// while serving; the model cache is the one interior-mutable member.
pub struct ServerContext {
    pub config: Config,
    pub registry: Arc<HookRegistry>,
    pub model: Arc<ModelCache>,
}

impl ServerContext {
    /// Run hook discovery over the plugin table and wire up the model
    /// cache. Any discovery or validation failure aborts startup here,
    /// before the listener binds.
    pub fn new(config: Config, plugins: &[Arc<dyn Plugin>]) -> Result<Arc<Self>> {
        let registry = Arc::new(HookRegistry::discover(plugins)?);
        let model = Arc::new(ModelCache::new(
            registry.model_load(),
            config.model.model_dir.clone(),
        ));
        Ok(Arc::new(Self {
            config,
            registry,
            model,
        }))
    }

    /// Proactively load the model so the first invocation does not pay
    /// load latency.
    pub async fn warmup(&self) -> std::result::Result<(), ModelError> {
        self.model.warmup().await
    }
}
