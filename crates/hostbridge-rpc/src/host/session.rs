//! Main-thread session state and the host idle loop.

use super::HostApi;
use hostbridge_core::{BridgeContext, HostNotifier, MainThreadDispatcher, RegistryGroup};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Everything a main-thread task can touch: the host itself plus the shared
/// bridge context.
pub struct HostSession {
    host: Box<dyn HostApi>,
    context: Arc<BridgeContext>,
    notifier: HostNotifier,
}

impl HostSession {
    pub fn new(host: Box<dyn HostApi>, context: Arc<BridgeContext>) -> Self {
        let notifier = HostNotifier::new(context.clone());
        Self {
            host,
            context,
            notifier,
        }
    }

    pub fn host(&self) -> &dyn HostApi {
        self.host.as_ref()
    }

    pub fn host_mut(&mut self) -> &mut dyn HostApi {
        self.host.as_mut()
    }

    pub fn registries(&self) -> &RegistryGroup {
        &self.context.registries
    }

    pub fn context(&self) -> &Arc<BridgeContext> {
        &self.context
    }

    /// Deliver pending host notifications to the lifecycle notifier.
    ///
    /// Operations that change document state call this before registering
    /// their results, so the handles they return survive the invalidation
    /// their own change triggers.
    pub fn pump_notifications(&mut self) -> usize {
        let notifications = self.host.take_notifications();
        let count = notifications.len();
        for notification in notifications {
            self.notifier.notify(notification.name, notification.payload);
        }
        count
    }
}

/// The host's idle callback: drain the dispatcher, then forward notifications.
///
/// Runs on the calling thread until `stop` is set, which makes the calling
/// thread the main thread.
pub fn run_host_loop(
    dispatcher: &MainThreadDispatcher<HostSession>,
    session: &mut HostSession,
    stop: &AtomicBool,
    interval: Duration,
) {
    info!("Host loop running (drain every {:?})", interval);
    while !stop.load(Ordering::SeqCst) {
        let ran = dispatcher.drain_queue(session);
        let notified = session.pump_notifications();
        if ran > 0 || notified > 0 {
            debug!("Host tick: {} task(s), {} notification(s)", ran, notified);
        }
        std::thread::sleep(interval);
    }
    dispatcher.drain_queue(session);
    session.pump_notifications();
    info!("Host loop stopped");
}
