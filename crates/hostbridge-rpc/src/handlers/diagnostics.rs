//! Diagnostics and administrative endpoints.

use crate::host::HostSession;
use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use hostbridge_core::events::known_event_types;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Bridge state for operators and tests.
pub async fn handle_diagnostics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let context = &state.context;
    Json(json!({
        "connections": context.fanout().connection_count(),
        "registries": context.registries.sizes(),
        "invalidations": context.registries.invalidation_count(),
        "pending_events": context.events.len(),
        "dropped_events": context.events.dropped(),
        "pending_tasks": state.dispatcher.pending(),
        "operations": state.operations.len(),
        "event_types": known_event_types().collect::<Vec<_>>(),
        "port": state.port,
    }))
}

/// Invalidate every outstanding handle, as a lifecycle event would.
pub async fn handle_invalidate(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = state
        .dispatcher
        .run(|session: &mut HostSession| Ok(session.registries().invalidate_all()))
        .await;

    match result {
        Ok(count) => {
            info!("Admin invalidation #{}", count);
            (
                StatusCode::OK,
                Json(json!({ "success": true, "invalidations": count })),
            )
        }
        Err(e) => {
            warn!("Admin invalidation failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
        }
    }
}
