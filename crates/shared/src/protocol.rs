use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

pub const STATUS_SUCCESS: &str = "Success";
pub const STATUS_ERROR: &str = "Error";

/// Standard reply envelope. `result` and `msg` appear on the wire only when
/// they were supplied at construction; a `null` value is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl Reply {
    /// Any status string is accepted; unconventional ones are logged but
    /// still produce a well-formed reply.
    pub fn new(status: impl Into<String>, result: Option<Value>, msg: Option<String>) -> Self {
        let status = status.into();
        if status != STATUS_SUCCESS && status != STATUS_ERROR {
            warn!(%status, "status is typically 'Success' or 'Error'");
        }
        Self {
            status,
            result,
            msg,
        }
    }

    pub fn success(result: impl Into<Value>) -> Self {
        Self::new(STATUS_SUCCESS, Some(result.into()), None)
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::new(STATUS_ERROR, None, Some(msg.into()))
    }
}
