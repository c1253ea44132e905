//! The HTTP surface of the hosting container contract.
//!
//! Three endpoints, matching what managed hosting expects of an inference
//! container:
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `GET`  | `/ping` | Health check. 200 empty body when serving, 500 otherwise. |
//! | `POST` | `/invocations` | Single prediction. Body in, encoded prediction out. |
//! | `GET`  | `/execution-parameters` | Batch Transform tuning parameters. |

pub mod context;
pub mod dispatch;

pub use context::ServerContext;
pub use dispatch::router;

use serde::{Deserialize, Serialize};

/// Batch Transform invocation strategy: how many records the host packs
/// into one `/invocations` request during offline scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStrategy {
    /// One record per request.
    SingleRecord,
    /// Multiple records per request.
    MultiRecord,
}

/// Batch Transform configuration surfaced to the host.
///
/// Recomputed per request from the parameter hooks; a field is present in
/// the JSON response only when some hook supplied a value for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionParameters {
    #[serde(rename = "BatchStrategy", skip_serializing_if = "Option::is_none")]
    pub batch_strategy: Option<BatchStrategy>,
    #[serde(
        rename = "MaxConcurrentTransforms",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_concurrent_transforms: Option<std::num::NonZeroU32>,
    #[serde(rename = "MaxPayloadInMB", skip_serializing_if = "Option::is_none")]
    pub max_payload_in_mb: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_fields_are_absent_from_json() {
        let params = ExecutionParameters {
            max_payload_in_mb: Some(6),
            ..Default::default()
        };
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"MaxPayloadInMB":6}"#);
    }

    #[test]
    fn full_parameter_set_serializes_with_wire_names() {
        let params = ExecutionParameters {
            batch_strategy: Some(BatchStrategy::MultiRecord),
            max_concurrent_transforms: std::num::NonZeroU32::new(1),
            max_payload_in_mb: Some(6),
        };
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(
            json,
            r#"{"BatchStrategy":"MultiRecord","MaxConcurrentTransforms":1,"MaxPayloadInMB":6}"#
        );
    }
}
