//! Host lifecycle notifications.
//!
//! Document switches, undo, redo and document open/create/close can free or
//! repoint any host object behind the bridge's back. The notifier treats every
//! one of them as "all handles are dead" and then publishes the event.

use crate::events::public_event_name;
use crate::BridgeContext;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Host events that invalidate every outstanding handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostLifecycleEvent {
    DocumentSwitched,
    Undo,
    Redo,
    DocumentOpened,
    DocumentCreated,
    DocumentClosed,
}

impl HostLifecycleEvent {
    /// Parse a public event type name.
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            "document_switched" => Some(Self::DocumentSwitched),
            "undo" => Some(Self::Undo),
            "redo" => Some(Self::Redo),
            "document_opened" => Some(Self::DocumentOpened),
            "document_created" => Some(Self::DocumentCreated),
            "document_closed" => Some(Self::DocumentClosed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentSwitched => "document_switched",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::DocumentOpened => "document_opened",
            Self::DocumentCreated => "document_created",
            Self::DocumentClosed => "document_closed",
        }
    }
}

impl std::fmt::Display for HostLifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Receives raw host notifications on the main thread.
#[derive(Clone)]
pub struct HostNotifier {
    context: Arc<BridgeContext>,
}

impl HostNotifier {
    pub fn new(context: Arc<BridgeContext>) -> Self {
        Self { context }
    }

    /// Handle one raw host notification.
    ///
    /// Lifecycle events invalidate every registry before the event is
    /// published, so a client reacting to the event never sees a live handle
    /// from before it.
    pub fn notify(&self, raw_name: &str, payload: Value) -> Option<HostLifecycleEvent> {
        let lifecycle = HostLifecycleEvent::from_event_type(public_event_name(raw_name));
        if let Some(event) = lifecycle {
            debug!("Host lifecycle event: {}", event);
            self.context.registries.invalidate_all();
        }
        self.context.events.push(raw_name, payload);
        lifecycle
    }
}
