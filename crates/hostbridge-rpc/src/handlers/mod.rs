//! JSON-RPC and event endpoints, split by host object category.

mod art;
mod diagnostics;
mod documents;
mod events;
mod layers;

pub use diagnostics::{handle_diagnostics, handle_invalidate};
pub use events::{handle_poll, handle_stream};

use crate::host::HostSession;
use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use hostbridge_core::{BridgeError, HandleId, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

// ============================================================================
// JSON-RPC types
// ============================================================================

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }

    pub fn from_bridge_error(id: Option<Value>, err: &BridgeError) -> Self {
        let mut response = Self::error(id, err.to_rpc_error_code(), err.to_string());
        if let Some(error) = response.error.as_mut() {
            error.data = err.error_data();
        }
        response
    }
}

// ============================================================================
// Parameter extraction helpers
// ============================================================================

fn lookup<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a Value> {
    params.get(snake).or_else(|| params.get(camel))
}

/// Extract an optional string parameter, supporting both snake_case and camelCase.
pub(crate) fn get_str_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a str> {
    lookup(params, snake, camel).and_then(|v| v.as_str())
}

/// Extract a required string parameter or return an error.
pub(crate) fn require_str_param(params: &Value, snake: &str, camel: &str) -> Result<String> {
    get_str_param(params, snake, camel)
        .map(String::from)
        .ok_or_else(|| BridgeError::invalid_params(format!("Missing required parameter: {}", snake)))
}

/// Extract an optional bool parameter, supporting both snake_case and camelCase.
pub(crate) fn get_bool_param(params: &Value, snake: &str, camel: &str) -> Option<bool> {
    lookup(params, snake, camel).and_then(|v| v.as_bool())
}

/// Extract a required bool parameter or return an error.
pub(crate) fn require_bool_param(params: &Value, snake: &str, camel: &str) -> Result<bool> {
    get_bool_param(params, snake, camel)
        .ok_or_else(|| BridgeError::invalid_params(format!("Missing required parameter: {}", snake)))
}

/// Extract an optional f64 parameter, supporting both snake_case and camelCase.
pub(crate) fn get_f64_param(params: &Value, snake: &str, camel: &str) -> Option<f64> {
    lookup(params, snake, camel).and_then(|v| v.as_f64())
}

/// Extract an optional handle parameter. Negative ids mean "absent".
pub(crate) fn get_handle_param(params: &Value, snake: &str, camel: &str) -> Option<HandleId> {
    lookup(params, snake, camel)
        .and_then(|v| v.as_i64())
        .filter(|id| *id >= 0)
}

/// Extract a required handle parameter or return an error.
pub(crate) fn require_handle_param(params: &Value, snake: &str, camel: &str) -> Result<HandleId> {
    get_handle_param(params, snake, camel)
        .ok_or_else(|| BridgeError::invalid_params(format!("Missing required parameter: {}", snake)))
}

// ============================================================================
// Operation table
// ============================================================================

/// A host operation. Always runs on the main thread.
pub type HostOperation = fn(&mut HostSession, &Value) -> Result<Value>;

/// `(category, operation) -> handler` lookup, built once at startup.
pub struct OperationTable {
    operations: HashMap<(&'static str, &'static str), HostOperation>,
}

impl OperationTable {
    /// Table with every built-in category registered.
    pub fn new() -> Self {
        let mut table = Self::empty();
        documents::register(&mut table);
        layers::register(&mut table);
        art::register(&mut table);
        table
    }

    pub fn empty() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }

    pub fn insert(&mut self, category: &'static str, operation: &'static str, handler: HostOperation) {
        self.operations.insert((category, operation), handler);
    }

    /// Resolve a `"<category>.<operation>"` method name.
    pub fn get(&self, method: &str) -> Option<HostOperation> {
        let (category, operation) = method.split_once('.')?;
        self.operations.get(&(category, operation)).copied()
    }

    /// Every registered method name, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self
            .operations
            .keys()
            .map(|(category, operation)| format!("{}.{}", category, operation))
            .collect();
        methods.sort();
        methods
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl Default for OperationTable {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// HTTP endpoints
// ============================================================================

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let method = request.method;
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id;

    debug!("RPC call: {}({:?})", method, params);

    // Handle built-in methods
    if method == "health_check" {
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::success(id, json!({"status": "ok"}))),
        );
    }

    let result = match state.operations.get(&method) {
        Some(operation) => {
            state
                .dispatcher
                .run(move |session: &mut HostSession| operation(session, &params))
                .await
        }
        None => Err(BridgeError::MethodNotFound(method.clone())),
    };

    match result {
        Ok(value) => (StatusCode::OK, Json(JsonRpcResponse::success(id, value))),
        Err(e) => {
            if e.is_retryable() {
                warn!("RPC {} needs a retry: {}", method, e);
            } else {
                error!("RPC error for {}: {}", method, e);
            }
            (
                StatusCode::OK,
                Json(JsonRpcResponse::from_bridge_error(id, &e)),
            )
        }
    }
}
