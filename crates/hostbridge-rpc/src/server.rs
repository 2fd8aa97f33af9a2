//! HTTP listener and its start/stop lifecycle.
//!
//! The listener runs on its own OS thread, which owns a tokio runtime and an
//! axum server. [`ServerLifecycle`] starts it, waits (bounded) for it to bind,
//! and stops it with a graceful shutdown that always joins the thread, so the
//! port is free once `stop` returns.

use crate::handlers::{
    handle_diagnostics, handle_health, handle_invalidate, handle_poll, handle_rpc, handle_stream,
    OperationTable,
};
use crate::host::HostSession;
use axum::{
    routing::{get, post},
    Router,
};
use hostbridge_core::{BridgeContext, MainThreadDispatcher, ServerConfig, StreamConfig};
use std::future::IntoFuture;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Runtime options for the listener.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Interface to bind; loopback by default.
    pub host: String,
    pub heartbeat_interval: Duration,
    pub start_timeout: Duration,
    /// Upper bound on how long `stop()` blocks, split between letting
    /// connections drain and tearing down the runtime.
    pub shutdown_grace: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: ServerConfig::DEFAULT_HOST.to_string(),
            heartbeat_interval: StreamConfig::HEARTBEAT_INTERVAL,
            start_timeout: ServerConfig::START_TIMEOUT,
            shutdown_grace: ServerConfig::SHUTDOWN_GRACE,
        }
    }
}

impl ServerOptions {
    /// Share of `shutdown_grace` given to in-flight connections.
    pub fn drain_timeout(&self) -> Duration {
        self.shutdown_grace / 2
    }

    /// Whatever `drain_timeout` leaves over, for runtime teardown.
    pub fn teardown_timeout(&self) -> Duration {
        self.shutdown_grace.saturating_sub(self.drain_timeout())
    }
}

/// Application state shared across handlers.
pub struct AppState {
    /// Registries and events
    pub context: Arc<BridgeContext>,
    /// Route to the host's main thread
    pub dispatcher: Arc<MainThreadDispatcher<HostSession>>,
    /// `(category, operation)` lookup for `/rpc`
    pub operations: Arc<OperationTable>,
    pub options: ServerOptions,
    /// Port actually bound
    pub port: u16,
}

/// Build the router with every endpoint.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Configure CORS for local tooling
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/rpc", post(handle_rpc))
        .route("/events/poll", get(handle_poll))
        .route("/events/stream", get(handle_stream))
        .route("/diagnostics", get(handle_diagnostics))
        .route("/admin/invalidate", post(handle_invalidate))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Observable listener state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Stopped,
    Starting,
    Ready,
    Stopping,
}

#[derive(Default)]
struct ListenerFlags {
    running: AtomicBool,
    ready: AtomicBool,
    stopping: AtomicBool,
    port: AtomicU16,
}

struct Worker {
    thread: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// Start/stop state machine around the background listener thread.
pub struct ServerLifecycle {
    context: Arc<BridgeContext>,
    dispatcher: Arc<MainThreadDispatcher<HostSession>>,
    operations: Arc<OperationTable>,
    options: ServerOptions,
    flags: Arc<ListenerFlags>,
    worker: Mutex<Option<Worker>>,
}

impl ServerLifecycle {
    pub fn new(
        context: Arc<BridgeContext>,
        dispatcher: Arc<MainThreadDispatcher<HostSession>>,
        options: ServerOptions,
    ) -> Self {
        Self {
            context,
            dispatcher,
            operations: Arc::new(OperationTable::new()),
            options,
            flags: Arc::new(ListenerFlags::default()),
            worker: Mutex::new(None),
        }
    }

    /// Launch the listener on `port` (0 picks a free port) and wait for it to
    /// bind, up to the start timeout.
    ///
    /// A no-op while already running. Returns whether the listener is ready;
    /// a bind failure is reported only through that `false`.
    pub fn start(&self, port: u16) -> bool {
        let mut worker = self.worker.lock().expect("listener lock poisoned");
        if self.flags.running.load(Ordering::SeqCst) {
            return self.is_running();
        }
        // A previous attempt that failed to bind has already exited.
        if let Some(stale) = worker.take() {
            let _ = stale.thread.join();
        }

        self.flags.running.store(true, Ordering::SeqCst);
        self.flags.ready.store(false, Ordering::SeqCst);
        self.flags.port.store(port, Ordering::SeqCst);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let listener = Listener {
            flags: self.flags.clone(),
            context: self.context.clone(),
            dispatcher: self.dispatcher.clone(),
            operations: self.operations.clone(),
            options: self.options.clone(),
            port,
        };
        let spawned = thread::Builder::new()
            .name("hostbridge-listener".to_string())
            .spawn(move || listener.run(shutdown_rx));
        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                error!("Failed to spawn listener thread: {}", e);
                self.flags.running.store(false, Ordering::SeqCst);
                return false;
            }
        };
        *worker = Some(Worker { thread, shutdown });

        let deadline = Instant::now() + self.options.start_timeout;
        while !self.flags.ready.load(Ordering::SeqCst)
            && self.flags.running.load(Ordering::SeqCst)
            && Instant::now() < deadline
        {
            thread::sleep(ServerConfig::READY_POLL_INTERVAL);
        }

        let ready = self.is_running();
        if !ready {
            warn!("Listener on port {} did not become ready", port);
        }
        ready
    }

    /// Stop the listener and join its thread. A no-op when not started.
    ///
    /// Open event streams are closed first so graceful shutdown can finish.
    pub fn stop(&self) {
        let mut guard = self.worker.lock().expect("listener lock poisoned");
        let Some(worker) = guard.take() else {
            return;
        };
        if !self.flags.running.load(Ordering::SeqCst) {
            // Failed to bind; the thread has already exited.
            let _ = worker.thread.join();
            return;
        }

        self.flags.stopping.store(true, Ordering::SeqCst);
        self.flags.running.store(false, Ordering::SeqCst);
        self.context.fanout().close_all();
        let _ = worker.shutdown.send(true);
        if worker.thread.join().is_err() {
            error!("Listener thread panicked");
        }
        self.flags.ready.store(false, Ordering::SeqCst);
        self.flags.stopping.store(false, Ordering::SeqCst);
        info!("Listener stopped");
    }

    /// True only once the listener has bound and is serving.
    pub fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::SeqCst) && self.flags.ready.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ListenerState {
        let running = self.flags.running.load(Ordering::SeqCst);
        let ready = self.flags.ready.load(Ordering::SeqCst);
        if self.flags.stopping.load(Ordering::SeqCst) {
            ListenerState::Stopping
        } else if running && ready {
            ListenerState::Ready
        } else if running {
            ListenerState::Starting
        } else {
            ListenerState::Stopped
        }
    }

    /// The last configured port; the bound port once an ephemeral bind succeeds.
    pub fn port(&self) -> u16 {
        self.flags.port.load(Ordering::SeqCst)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.options.host, self.port())
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }
}

impl Drop for ServerLifecycle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the listener thread needs, moved onto it.
struct Listener {
    flags: Arc<ListenerFlags>,
    context: Arc<BridgeContext>,
    dispatcher: Arc<MainThreadDispatcher<HostSession>>,
    operations: Arc<OperationTable>,
    options: ServerOptions,
    port: u16,
}

impl Listener {
    fn run(self, shutdown: watch::Receiver<bool>) {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(ServerConfig::WORKER_THREADS)
            .thread_name("hostbridge-worker")
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Failed to build listener runtime: {}", e);
                self.flags.running.store(false, Ordering::SeqCst);
                return;
            }
        };

        let teardown = self.options.teardown_timeout();
        runtime.block_on(self.serve(shutdown));
        runtime.shutdown_timeout(teardown);
    }

    async fn serve(self, shutdown: watch::Receiver<bool>) {
        let addr = format!("{}:{}", self.options.host, self.port);
        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                warn!("Failed to bind {}: {}", addr, e);
                self.flags.running.store(false, Ordering::SeqCst);
                return;
            }
        };
        let bound = listener
            .local_addr()
            .map(|a| a.port())
            .unwrap_or(self.port);
        self.flags.port.store(bound, Ordering::SeqCst);

        let drain = self.options.drain_timeout();
        let host = self.options.host.clone();
        let state = Arc::new(AppState {
            context: self.context,
            dispatcher: self.dispatcher,
            operations: self.operations,
            options: self.options,
            port: bound,
        });
        let app = build_router(state);

        self.flags.ready.store(true, Ordering::SeqCst);
        info!("Server listening on {}:{}", host, bound);

        let mut graceful = shutdown.clone();
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = graceful.wait_for(|stop| *stop).await;
            })
            .into_future();

        let mut forced = shutdown;
        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                }
            }
            _ = async move {
                let _ = forced.wait_for(|stop| *stop).await;
                tokio::time::sleep(drain).await;
            } => {
                warn!("Listener did not drain within {:?}; forcing shutdown", drain);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifecycle() -> ServerLifecycle {
        ServerLifecycle::new(
            Arc::new(BridgeContext::new()),
            Arc::new(MainThreadDispatcher::new()),
            ServerOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_router_serves_health_and_rejects_unknown_methods() {
        use axum::body::{to_bytes, Body};
        use axum::http::{Request, StatusCode};
        use tower::ServiceExt;

        let app = build_router(Arc::new(AppState {
            context: Arc::new(BridgeContext::new()),
            dispatcher: Arc::new(MainThreadDispatcher::new()),
            operations: Arc::new(OperationTable::new()),
            options: ServerOptions::default(),
            port: 0,
        }));

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Unknown methods are rejected without a trip to the main thread.
        let request = Request::post("/rpc")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"jsonrpc":"2.0","method":"art.explode","id":1}"#,
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], -32601);
        assert_eq!(value["id"], 1);
    }

    #[test]
    fn test_shutdown_budget_splits_grace() {
        let options = ServerOptions {
            shutdown_grace: Duration::from_millis(501),
            ..ServerOptions::default()
        };
        assert_eq!(options.drain_timeout(), Duration::from_micros(250_500));
        assert_eq!(
            options.drain_timeout() + options.teardown_timeout(),
            options.shutdown_grace
        );
    }

    #[test]
    fn test_initially_stopped() {
        let server = lifecycle();
        assert_eq!(server.state(), ListenerState::Stopped);
        assert!(!server.is_running());
        // Stopping a listener that never started is a no-op.
        server.stop();
        assert_eq!(server.state(), ListenerState::Stopped);
    }

    #[test]
    fn test_start_is_idempotent_and_restartable() {
        let server = lifecycle();
        assert!(server.start(0));
        assert_eq!(server.state(), ListenerState::Ready);
        let port = server.port();
        assert!(port > 0);
        assert_eq!(server.base_url(), format!("http://127.0.0.1:{}", port));

        assert!(server.start(0));
        assert_eq!(server.port(), port);

        server.stop();
        assert_eq!(server.state(), ListenerState::Stopped);
        assert!(std::net::TcpStream::connect(("127.0.0.1", port)).is_err());

        assert!(server.start(port));
        assert_eq!(server.port(), port);
        server.stop();
    }

    #[test]
    fn test_bind_failure_is_reported_as_not_running() {
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = blocker.local_addr().unwrap().port();

        let server = lifecycle();
        let started = Instant::now();
        assert!(!server.start(port));
        assert!(started.elapsed() < ServerConfig::START_TIMEOUT);
        assert_eq!(server.state(), ListenerState::Stopped);

        drop(blocker);
        assert!(server.start(port));
    }
}
