//! Model loading and the process-lifetime model cache.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use crate::error::ModelError;
use crate::hooks::{Model, ModelLoadHook};

/// The cached result of a successful model load.
///
/// Cheap to clone; every request holding a handle shares the same model
/// object. Created at most once per process and never refreshed.
#[derive(Clone)]
pub struct ModelHandle {
    pub model: Arc<dyn Model>,
    pub loaded_at: Instant,
    pub load_duration: Duration,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("loaded_at", &self.loaded_at)
            .field("load_duration", &self.load_duration)
            .finish_non_exhaustive()
    }
}

/// Lazily loads the model via the `model_fn` hook and caches the handle
/// for the life of the process.
///
/// Concurrency: the first load runs exactly once even under concurrent
/// first access; late arrivals wait on the load gate and observe the same
/// handle. A failed load is not cached; the next caller retries, and the
/// gate keeps concurrent retries down to one attempt at a time so a stuck
/// external dependency is not hammered by the whole worker pool.
pub struct ModelCache {
    loader: Option<Arc<dyn ModelLoadHook>>,
    model_dir: PathBuf,
    slot: RwLock<Option<ModelHandle>>,
    load_gate: Mutex<()>,
}

impl ModelCache {
    /// Create a cache wired to the resolved model-load hook.
    ///
    /// `loader` is `None` when no plugin registered `model_fn`; that is
    /// only an error once a request actually needs the model.
    pub fn new(loader: Option<Arc<dyn ModelLoadHook>>, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            loader,
            model_dir: model_dir.into(),
            slot: RwLock::new(None),
            load_gate: Mutex::new(()),
        }
    }

    /// Return the cached handle, loading the model on first call.
    pub async fn ensure_loaded(&self) -> std::result::Result<ModelHandle, ModelError> {
        if let Some(handle) = self.slot.read().await.clone() {
            return Ok(handle);
        }

        let _gate = self.load_gate.lock().await;
        // Re-check: another caller may have finished the load while we
        // waited on the gate.
        if let Some(handle) = self.slot.read().await.clone() {
            return Ok(handle);
        }

        let loader = self.loader.as_ref().ok_or(ModelError::NoLoader)?;

        tracing::info!(model_dir = %self.model_dir.display(), "Loading model via model_fn hook");
        let started = Instant::now();
        let model = loader
            .load(&self.model_dir)
            .await
            .map_err(ModelError::LoadFailed)?;
        let load_duration = started.elapsed();
        tracing::info!(elapsed_ms = load_duration.as_millis() as u64, "Model loaded");

        let handle = ModelHandle {
            model,
            loaded_at: started,
            load_duration,
        };
        *self.slot.write().await = Some(handle.clone());
        Ok(handle)
    }

    /// The current handle, without triggering a load.
    pub async fn peek(&self) -> Option<ModelHandle> {
        self.slot.read().await.clone()
    }

    /// Load the model outside the request path so the first real request
    /// does not pay the load latency. No-op if already loaded.
    pub async fn warmup(&self) -> std::result::Result<(), ModelError> {
        self.ensure_loaded().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::hooks::{HookError, HookKind, HookValue};
    use crate::testing::EchoModel;

    /// Loader that counts calls and can be toggled between failing and
    /// succeeding at runtime.
    struct CountingLoader {
        calls: AtomicU32,
        fail_first: AtomicU32,
    }

    impl CountingLoader {
        fn new(failures: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first: AtomicU32::new(failures),
            }
        }
    }

    #[async_trait]
    impl ModelLoadHook for CountingLoader {
        async fn load(
            &self,
            _model_dir: &Path,
        ) -> std::result::Result<Arc<dyn Model>, HookError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first.load(Ordering::SeqCst) {
                return Err(HookError::failed(HookKind::ModelLoad, "cold filesystem"));
            }
            Ok(Arc::new(EchoModel))
        }
    }

    /// Loader that blocks until released, for exercising concurrent first
    /// access.
    struct SlowLoader {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ModelLoadHook for SlowLoader {
        async fn load(
            &self,
            _model_dir: &Path,
        ) -> std::result::Result<Arc<dyn Model>, HookError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Arc::new(EchoModel))
        }
    }

    #[tokio::test]
    async fn loads_once_and_caches() {
        let loader = Arc::new(CountingLoader::new(0));
        let cache = ModelCache::new(Some(loader.clone()), "/tmp/model");

        let a = cache.ensure_loaded().await.unwrap();
        let b = cache.ensure_loaded().await.unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a.model, &b.model));
    }

    #[tokio::test]
    async fn concurrent_first_access_loads_exactly_once() {
        let loader = Arc::new(SlowLoader {
            calls: AtomicU32::new(0),
        });
        let cache = Arc::new(ModelCache::new(Some(loader.clone()), "/tmp/model"));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            tasks.spawn(async move { cache.ensure_loaded().await.unwrap() });
        }

        let mut handles = Vec::new();
        while let Some(res) = tasks.join_next().await {
            handles.push(res.unwrap());
        }

        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        for handle in &handles[1..] {
            assert!(Arc::ptr_eq(&handles[0].model, &handle.model));
        }
    }

    #[tokio::test]
    async fn failed_load_is_not_sticky() {
        let loader = Arc::new(CountingLoader::new(1));
        let cache = ModelCache::new(Some(loader.clone()), "/tmp/model");

        let err = cache.ensure_loaded().await.unwrap_err();
        assert!(matches!(err, ModelError::LoadFailed(_)));

        // The failure was not cached; this attempt runs the hook again.
        let handle = cache.ensure_loaded().await.unwrap();
        let out = handle.model.invoke(HookValue::Text("ok".into())).unwrap();
        assert_eq!(out, HookValue::Text("ok".into()));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_loader_errors_only_on_demand() {
        let cache = ModelCache::new(None, "/tmp/model");
        assert!(cache.peek().await.is_none());
        assert!(matches!(
            cache.ensure_loaded().await.unwrap_err(),
            ModelError::NoLoader
        ));
    }

    #[tokio::test]
    async fn peek_does_not_trigger_load() {
        let loader = Arc::new(CountingLoader::new(0));
        let cache = ModelCache::new(Some(loader.clone()), "/tmp/model");

        assert!(cache.peek().await.is_none());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);

        cache.warmup().await.unwrap();
        assert!(cache.peek().await.is_some());
        cache.warmup().await.unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }
}
