//! Request dispatch: the protocol state machine behind each endpoint.
//!
//! An invocation walks `Received → ModelReady → Decoded → Predicted →
//! Encoded → Responded`; any step can divert to an error response. Hook
//! failures never escape as panics; every path converts them to a status
//! code and a machine-readable `{kind, message}` body.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use crate::error::ModelError;
use crate::hooks::HookError;
use crate::negotiate::{self, AcceptPreferences, OCTET_STREAM};
use crate::server::{ExecutionParameters, ServerContext};
use crate::timing::{Stage, StageTimings};

/// Build the axum router for a server context.
///
/// Paths outside the contract fall through to axum's 404. The default body
/// limit is lifted: the host sizes payloads from `/execution-parameters`,
/// and the contract has no payload-too-large response.
pub fn router(ctx: Arc<ServerContext>) -> Router {
    Router::new()
        .route("/ping", get(handle_ping))
        .route("/invocations", post(handle_invocations))
        .route("/execution-parameters", get(handle_execution_parameters))
        .layer(axum::extract::DefaultBodyLimit::disable())
        .with_state(ctx)
}

/// A request error mapped to its response: status code plus a stable error
/// kind and a human-readable message. Stack traces and hook internals stay
/// in the logs.
struct ResponseError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl From<HookError> for ResponseError {
    fn from(err: HookError) -> Self {
        let (status, kind) = match &err {
            HookError::UnsupportedMediaType { .. } => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UnsupportedMediaType")
            }
            HookError::NotAcceptable { .. } => (StatusCode::NOT_ACCEPTABLE, "NotAcceptable"),
            HookError::ExecutionFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "HookExecutionError")
            }
        };
        Self {
            status,
            kind,
            message: err.to_string(),
        }
    }
}

impl From<ModelError> for ResponseError {
    fn from(err: ModelError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "ModelLoadError",
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ResponseError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "kind": self.kind,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

/// Per-request transient state, parsed once from the incoming request.
struct InvocationContext {
    body: Bytes,
    content_type: String,
    accept: AcceptPreferences,
}

impl InvocationContext {
    fn from_request(headers: &HeaderMap, body: Bytes) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(OCTET_STREAM)
            .to_string();
        let accept = AcceptPreferences::parse(
            headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()),
        );
        Self {
            body,
            content_type,
            accept,
        }
    }
}

/// `GET /ping`: the host polls this continuously; it must always answer.
///
/// The health hook observes the current model without triggering a load:
/// before the first successful load the default reports unhealthy, which is
/// exactly what the host should see.
async fn handle_ping(State(ctx): State<Arc<ServerContext>>) -> StatusCode {
    let handle = ctx.model.peek().await;
    let hook = ctx.registry.health_check();
    match hook.check(handle.as_ref().map(|h| h.model.as_ref())).await {
        Ok(true) => StatusCode::OK,
        Ok(false) => {
            tracing::warn!("Health check reported unhealthy");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        Err(e) => {
            tracing::warn!("Health check hook failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `POST /invocations`: one prediction.
async fn handle_invocations(
    State(ctx): State<Arc<ServerContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = InvocationContext::from_request(&headers, body);
    match run_invocation(&ctx, request).await {
        Ok((bytes, content_type)) => {
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(err) => {
            tracing::warn!(kind = err.kind, "Invocation failed: {}", err.message);
            err.into_response()
        }
    }
}

/// Drive one request through the decode → predict → encode pipeline.
async fn run_invocation(
    ctx: &ServerContext,
    request: InvocationContext,
) -> Result<(Bytes, String), ResponseError> {
    let mut timings = StageTimings::start();

    // Near-zero once the cache is warm; the first request pays the load.
    let handle = timings
        .time(Stage::ModelLoad, ctx.model.ensure_loaded())
        .await?;

    let decoded = timings
        .time(
            Stage::Decode,
            negotiate::decode_input(&ctx.registry, request.body, &request.content_type),
        )
        .await?;

    let predict = ctx.registry.predict();
    let prediction = timings
        .time(Stage::Predict, predict.predict(decoded, handle.model.as_ref()))
        .await?;

    let (encoded, content_type) = timings
        .time(
            Stage::Encode,
            negotiate::encode_output(&ctx.registry, prediction, &request.accept),
        )
        .await?;

    timings.log();
    Ok((encoded, content_type))
}

/// `GET /execution-parameters`: Batch Transform tuning discovery.
///
/// Each parameter resolves independently; a failing hook omits its field
/// rather than failing the response, since the host has defaults for
/// anything missing.
async fn handle_execution_parameters(State(ctx): State<Arc<ServerContext>>) -> Response {
    let params = ExecutionParameters {
        batch_strategy: ctx.registry.batch_strategy(),
        max_concurrent_transforms: ctx.registry.max_concurrent_transforms(),
        max_payload_in_mb: ctx.registry.max_payload_in_mb(),
    };
    Json(params).into_response()
}
