//! Hostbridge Core - concurrency and safety layer for driving a single-threaded
//! host application from other processes.
//!
//! This crate has no HTTP dependency. It provides:
//!
//! - Generation-stamped handle registries that turn host pointers and
//!   bridge-owned values into small JSON-safe integers, and invalidate all of
//!   them when the host's document state changes
//! - Event delivery to polling clients and to any number of streaming clients
//! - A main-thread dispatcher that lets network threads run host API calls on
//!   the host's own thread and wait for the result
//!
//! # Example
//!
//! ```rust
//! use hostbridge_core::registry::ArtRef;
//! use hostbridge_core::BridgeContext;
//!
//! let context = BridgeContext::new();
//! let id = context.registries.art.register(ArtRef::from_addr(0x1000));
//! assert_eq!(context.registries.art.get(id), Some(ArtRef::from_addr(0x1000)));
//!
//! // Undo, redo, document switch...
//! context.registries.invalidate_all();
//! assert!(context.registries.art.get(id).is_none());
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod registry;

// Re-export commonly used types
pub use config::{DispatchConfig, PollConfig, ServerConfig, StreamConfig};
pub use dispatcher::MainThreadDispatcher;
pub use error::{BridgeError, Result};
pub use events::{Delivery, Event, EventFanout, EventQueue, Subscriber};
pub use lifecycle::{HostLifecycleEvent, HostNotifier};
pub use registry::{
    DocumentLayout, HandleId, HostHandle, HostRef, OwningRegistry, Registry, RegistryGroup,
    RegistrySize, NULL_HANDLE,
};

use std::sync::Arc;

/// Process-scoped bridge state.
///
/// Constructed once at startup and shared by `Arc` with the listener and the
/// host's main thread; there are no ambient globals.
pub struct BridgeContext {
    pub registries: RegistryGroup,
    pub events: EventQueue,
}

impl BridgeContext {
    pub fn new() -> Self {
        Self {
            registries: RegistryGroup::new(),
            events: EventQueue::new(Arc::new(EventFanout::new())),
        }
    }

    pub fn fanout(&self) -> &Arc<EventFanout> {
        self.events.fanout()
    }
}

impl Default for BridgeContext {
    fn default() -> Self {
        Self::new()
    }
}
