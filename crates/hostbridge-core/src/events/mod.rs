//! Realtime event delivery.
//!
//! Host notifications are normalized to a small set of public event types and
//! delivered over two independent channels:
//!
//! - **Polling**: [`EventQueue`] buffers events until a client calls `pop_all`
//! - **Streaming**: [`EventFanout`] queues a copy on every open subscriber
//!
//! Neither channel ever blocks the host thread on a slow or vanished client.

pub mod fanout;
pub mod names;
pub mod queue;

pub use fanout::{Delivery, EventFanout, Subscriber};
pub use names::{known_event_types, public_event_name};
pub use queue::{Event, EventQueue};
