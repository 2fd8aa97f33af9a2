//! Error types for the host bridge.
//!
//! Registry and fan-out operations never fail on expected conditions (a missing
//! handle, a dead subscriber); they return `None`/`false`. The errors here are
//! what a request handler reports back across the wire.

use crate::registry::HandleId;
use serde_json::{json, Value};
use thiserror::Error;

/// Main error type for the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    // Handle errors
    #[error("Invalid {category} reference: {id}")]
    InvalidHandle { category: &'static str, id: HandleId },

    // Request errors
    #[error("Invalid params: {message}")]
    InvalidParams { message: String },

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    // Host errors
    #[error("Host call failed: {message}")]
    HostCall { message: String },

    #[error("Main-thread task panicked: {message}")]
    TaskPanicked { message: String },

    // Dispatcher errors
    #[error("Main thread is not accepting tasks")]
    MainThreadUnavailable,

    #[error("Main-thread queue is full ({capacity} pending tasks)")]
    DispatcherBusy { capacity: usize },

    #[error("Cannot wait on the main thread from the main thread")]
    ReentrantDispatch,

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl BridgeError {
    /// Shorthand for a failed host API call.
    pub fn host(message: impl Into<String>) -> Self {
        BridgeError::HostCall {
            message: message.into(),
        }
    }

    /// Shorthand for a bad or missing request parameter.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        BridgeError::InvalidParams {
            message: message.into(),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Standard JSON-RPC error codes:
    /// - -32601: Method not found
    /// - -32602: Invalid params
    /// - -32603: Internal error (serialization)
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32001: Invalid or stale handle
    /// - -32002: Host call failed
    /// - -32003: Main thread unavailable
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            BridgeError::InvalidParams { .. } => -32602,
            BridgeError::MethodNotFound(_) => -32601,
            BridgeError::InvalidHandle { .. } => -32001,
            BridgeError::HostCall { .. } | BridgeError::TaskPanicked { .. } => -32002,
            BridgeError::MainThreadUnavailable
            | BridgeError::DispatcherBusy { .. }
            | BridgeError::ReentrantDispatch => -32003,

            BridgeError::Json { .. } => -32603,
        }
    }

    /// Structured detail for the `data` member of a JSON-RPC error.
    pub fn error_data(&self) -> Option<Value> {
        match self {
            BridgeError::InvalidHandle { category, id } => Some(json!({
                "kind": "stale_handle",
                "category": category,
                "id": id,
            })),
            BridgeError::DispatcherBusy { capacity } => Some(json!({
                "kind": "busy",
                "capacity": capacity,
            })),
            _ => None,
        }
    }

    /// Check if the client should re-resolve and retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::InvalidHandle { .. } | BridgeError::DispatcherBusy { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::InvalidHandle {
            category: "layer",
            id: 7,
        };
        assert_eq!(err.to_string(), "Invalid layer reference: 7");
    }

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(
            BridgeError::InvalidHandle {
                category: "art",
                id: 1
            }
            .to_rpc_error_code(),
            -32001
        );
        assert_eq!(BridgeError::invalid_params("x").to_rpc_error_code(), -32602);
        assert_eq!(
            BridgeError::MethodNotFound("nope".into()).to_rpc_error_code(),
            -32601
        );
        assert_eq!(BridgeError::MainThreadUnavailable.to_rpc_error_code(), -32003);
    }

    #[test]
    fn test_serialization_failure_is_internal_error() {
        let err: BridgeError = serde_json::from_str::<Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, BridgeError::Json { source: Some(_), .. }));
        assert!(err.to_string().starts_with("JSON error:"));
        assert_eq!(err.to_rpc_error_code(), -32603);
        assert!(err.error_data().is_none());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_stale_handle_data() {
        let data = BridgeError::InvalidHandle {
            category: "document",
            id: 3,
        }
        .error_data()
        .unwrap();
        assert_eq!(data["kind"], "stale_handle");
        assert_eq!(data["category"], "document");
        assert_eq!(data["id"], 3);
        assert!(BridgeError::host("boom").error_data().is_none());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(BridgeError::DispatcherBusy { capacity: 4 }.is_retryable());
        assert!(!BridgeError::host("boom").is_retryable());
    }
}
