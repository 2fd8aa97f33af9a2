//! Hostbridge RPC - loopback HTTP/JSON-RPC listener for a single-threaded host.
//!
//! Requests arrive on the listener's worker threads, are routed through the
//! `(category, operation)` table and run on the host's main thread via the
//! [`MainThreadDispatcher`](hostbridge_core::MainThreadDispatcher). Host
//! events reach clients by long-poll (`/events/poll`) or by a persistent
//! stream (`/events/stream`).

pub mod handlers;
pub mod host;
pub mod server;

pub use handlers::{HostOperation, OperationTable};
pub use host::{run_host_loop, HostApi, HostSession, SimulatedHost};
pub use server::{ListenerState, ServerLifecycle, ServerOptions};
