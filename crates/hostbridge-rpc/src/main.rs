//! Hostbridge RPC Server - drives the simulated host over loopback HTTP.
//!
//! The main thread plays the host: it runs the idle loop that drains the
//! dispatcher, while the listener serves clients from its own thread.

use anyhow::Result;
use clap::Parser;
use hostbridge_core::{BridgeContext, DispatchConfig, MainThreadDispatcher, ServerConfig};
use hostbridge_rpc::{run_host_loop, HostSession, ServerLifecycle, ServerOptions, SimulatedHost};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "hostbridge-rpc")]
#[command(about = "Loopback JSON-RPC bridge for a single-threaded host application")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value_t = ServerConfig::DEFAULT_PORT)]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = ServerConfig::DEFAULT_HOST)]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Seconds between heartbeats on idle event streams
    #[arg(long)]
    heartbeat_secs: Option<u64>,

    /// Milliseconds between host idle callbacks
    #[arg(long, default_value_t = DispatchConfig::DRAIN_INTERVAL.as_millis() as u64)]
    drain_interval_ms: u64,

    /// Start with no open document
    #[arg(long)]
    empty: bool,
}

/// `--debug` wins over `RUST_LOG`, which wins over the `info` default.
fn log_directive(debug: bool, env: Option<String>) -> String {
    if debug {
        return "debug".to_string();
    }
    env.filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| "info".to_string())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let directive = log_directive(args.debug, std::env::var(EnvFilter::DEFAULT_ENV).ok());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Ignoring invalid log filter {:?}: {}", directive, e);
        EnvFilter::new("info")
    });
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting {} bridge", ServerConfig::APP_NAME);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })?;
    }

    let context = Arc::new(BridgeContext::new());
    let dispatcher = Arc::new(MainThreadDispatcher::<HostSession>::new());

    let mut options = ServerOptions {
        host: args.host,
        ..ServerOptions::default()
    };
    if let Some(secs) = args.heartbeat_secs {
        options.heartbeat_interval = Duration::from_secs(secs.max(1));
    }

    let server = ServerLifecycle::new(context.clone(), dispatcher.clone(), options);
    if !server.start(args.port) {
        anyhow::bail!("Listener failed to start on port {}", args.port);
    }

    // Print the URL for a parent process to read (intentional stdout for IPC)
    println!("BRIDGE_URL={}", server.base_url());
    info!(
        "Bridge ready at {} ({} operations)",
        server.base_url(),
        server.operations().len()
    );

    let host = if args.empty {
        SimulatedHost::new()
    } else {
        SimulatedHost::with_sample_document()
    };
    let mut session = HostSession::new(Box::new(host), context);
    run_host_loop(
        &dispatcher,
        &mut session,
        &stop,
        Duration::from_millis(args.drain_interval_ms.max(1)),
    );

    info!("Shutdown signal received, exiting");
    dispatcher.close();
    server.stop();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directive_precedence() {
        assert_eq!(log_directive(false, None), "info");
        assert_eq!(log_directive(false, Some("  ".into())), "info");
        assert_eq!(
            log_directive(false, Some("hostbridge_rpc=trace,tower_http=warn".into())),
            "hostbridge_rpc=trace,tower_http=warn"
        );
        assert_eq!(log_directive(true, Some("warn".into())), "debug");
    }

    #[test]
    fn test_log_directives_parse() {
        for directive in [log_directive(false, None), log_directive(true, None)] {
            assert!(EnvFilter::try_new(&directive).is_ok());
        }
    }
}
