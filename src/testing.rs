//! Helpers for testing modelgate plugins.
//!
//! Provides:
//! - [`TestServer`]: an in-process server driving requests through the real
//!   router, no socket required
//! - [`post_invocations`](TestServer::post_invocations): full
//!   decode→predict→encode cycle with a success assertion
//! - [`plugin_is_registered`] / [`hook_impl_is_valid`]: registry assertions
//!   for plugin authors
//! - Stub building blocks: [`EchoModel`], [`StaticLoader`],
//!   [`RawPassthroughDecoder`], [`plugin`]
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use modelgate::hooks::HookImpl;
//! use modelgate::testing::{plugin, EchoModel, StaticLoader, TestServer};
//!
//! # async fn example() {
//! let my_plugin = plugin(
//!     "my-plugin",
//!     vec![HookImpl::model_load(Arc::new(StaticLoader::new(EchoModel)))],
//! );
//! let server = TestServer::new(vec![my_plugin]);
//! let response = server.post_invocations(b"input".as_ref(), None, None).await;
//! assert_eq!(&response.body[..], b"input");
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::config::Config;
use crate::error::PluginError;
use crate::hooks::{
    HookError, HookImpl, HookRegistry, HookValue, InputDecodeHook, Model, ModelLoadHook, Plugin,
};
use crate::server::{self, ServerContext};

/// An identity model: prediction equals input.
pub struct EchoModel;

impl Model for EchoModel {
    fn invoke(&self, input: HookValue) -> Result<HookValue, HookError> {
        Ok(input)
    }
}

/// A model-load hook returning a fixed, pre-built model.
pub struct StaticLoader {
    model: Arc<dyn Model>,
}

impl StaticLoader {
    pub fn new(model: impl Model + 'static) -> Self {
        Self {
            model: Arc::new(model),
        }
    }
}

#[async_trait]
impl ModelLoadHook for StaticLoader {
    async fn load(&self, _model_dir: &Path) -> Result<Arc<dyn Model>, HookError> {
        Ok(Arc::clone(&self.model))
    }
}

/// An input decoder that accepts any content type and yields the raw bytes.
pub struct RawPassthroughDecoder;

#[async_trait]
impl InputDecodeHook for RawPassthroughDecoder {
    async fn decode(
        &self,
        input_data: Bytes,
        _content_type: &str,
    ) -> Result<HookValue, HookError> {
        Ok(HookValue::Bytes(input_data))
    }
}

struct StaticPlugin {
    name: String,
    hooks: Vec<HookImpl>,
}

impl Plugin for StaticPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn hooks(&self) -> Result<Vec<HookImpl>, PluginError> {
        Ok(self.hooks.clone())
    }
}

/// Build a plugin from a name and a list of hook implementations.
pub fn plugin(name: impl Into<String>, hooks: Vec<HookImpl>) -> Arc<dyn Plugin> {
    Arc::new(StaticPlugin {
        name: name.into(),
        hooks,
    })
}

/// Whether a plugin with the given identity is registered in the context.
pub fn plugin_is_registered(ctx: &ServerContext, name: &str) -> bool {
    ctx.registry.is_registered(name)
}

/// Whether the given hook implementation passes signature validation.
pub fn hook_impl_is_valid(imp: &HookImpl) -> bool {
    HookRegistry::validate(imp).is_ok()
}

/// A response captured from the in-process router.
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Bytes,
    pub content_type: Option<String>,
}

impl TestResponse {
    /// Parse the body as JSON. Panics on non-JSON bodies, which in a test
    /// is the failure you want to see.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body is not valid JSON")
    }
}

/// An in-process server: a full [`ServerContext`] plus its router,
/// exercised through `tower::ServiceExt::oneshot`.
pub struct TestServer {
    pub ctx: Arc<ServerContext>,
    router: Router,
}

impl TestServer {
    /// Build a server from a plugin list with default configuration.
    ///
    /// Panics on discovery/validation failure; construct the
    /// [`ServerContext`] directly to assert on those errors.
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self::with_config(Config::default(), plugins)
    }

    /// Build a server with explicit configuration.
    pub fn with_config(config: Config, plugins: Vec<Arc<dyn Plugin>>) -> Self {
        let ctx = ServerContext::new(config, &plugins).expect("plugin discovery failed");
        let router = server::router(Arc::clone(&ctx));
        Self { ctx, router }
    }

    /// Send an arbitrary request through the router.
    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response
            .into_body()
            .collect()
            .await
            .expect("failed to read response body")
            .to_bytes();

        TestResponse {
            status,
            body,
            content_type,
        }
    }

    /// `GET` the given path.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .uri(path)
            .body(Body::empty())
            .expect("failed to build request");
        self.request(request).await
    }

    /// `POST /invocations` with optional Content-Type and Accept headers.
    /// Does not assert on the status; use this for error-path tests.
    pub async fn invoke(
        &self,
        body: impl Into<Bytes>,
        content_type: Option<&str>,
        accept: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method("POST").uri("/invocations");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        if let Some(accept) = accept {
            builder = builder.header(header::ACCEPT, accept);
        }
        let request = builder
            .body(Body::from(body.into()))
            .expect("failed to build request");
        self.request(request).await
    }

    /// `POST /invocations` and assert the full cycle succeeded.
    pub async fn post_invocations(
        &self,
        body: impl Into<Bytes>,
        content_type: Option<&str>,
        accept: Option<&str>,
    ) -> TestResponse {
        let response = self.invoke(body, content_type, accept).await;
        assert_eq!(
            response.status,
            StatusCode::OK,
            "invocation failed: {}",
            String::from_utf8_lossy(&response.body)
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_plugin_round_trips_bytes() {
        let server = TestServer::new(vec![plugin(
            "echo",
            vec![HookImpl::model_load(Arc::new(StaticLoader::new(EchoModel)))],
        )]);
        let response = server
            .post_invocations(b"hello".as_ref(), None, None)
            .await;
        assert_eq!(&response.body[..], b"hello");
    }

    #[test]
    fn registered_plugin_is_visible() {
        let server = TestServer::new(vec![plugin(
            "visible",
            vec![HookImpl::model_load(Arc::new(StaticLoader::new(EchoModel)))],
        )]);
        assert!(plugin_is_registered(&server.ctx, "visible"));
        assert!(!plugin_is_registered(&server.ctx, "other"));
    }

    #[test]
    fn valid_and_invalid_hook_impls() {
        let valid = HookImpl::model_load(Arc::new(StaticLoader::new(EchoModel)));
        assert!(hook_impl_is_valid(&valid));

        let invalid = HookImpl::model_load(Arc::new(StaticLoader::new(EchoModel)))
            .with_params(&["no_such_param"]);
        assert!(!hook_impl_is_valid(&invalid));
    }
}
