//! Integration tests for the hostbridge-core public interface.
//!
//! These drive a `BridgeContext` the way a listener and a host main thread
//! would: network threads submit work, the main thread drains it, lifecycle
//! notifications invalidate handles and fan events out.

use hostbridge_core::registry::{ArtRef, LayerRef};
use hostbridge_core::{
    BridgeContext, BridgeError, Delivery, HostNotifier, MainThreadDispatcher, NULL_HANDLE,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Main-thread state for these tests: the shared context plus a notifier.
struct MainThread {
    context: Arc<BridgeContext>,
    notifier: HostNotifier,
}

/// Spawn a thread that plays the host's idle loop until `stop` is set.
fn spawn_main_thread(
    context: Arc<BridgeContext>,
    dispatcher: Arc<MainThreadDispatcher<MainThread>>,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let notifier = HostNotifier::new(context.clone());
        let mut main = MainThread { context, notifier };
        while !stop.load(Ordering::SeqCst) {
            dispatcher.drain_queue(&mut main);
            thread::sleep(Duration::from_millis(2));
        }
        dispatcher.drain_queue(&mut main);
    })
}

#[test]
fn test_register_bump_register_scenario() {
    let context = BridgeContext::new();
    let art = &context.registries.art;

    let a = art.register(ArtRef::from_addr(0xA0));
    assert_eq!(a, 1);
    art.bump_generation();
    assert!(art.get(a).is_none());

    let b = art.register(ArtRef::from_addr(0xB0));
    assert_eq!(b, 2);
    assert_eq!(art.get(b), Some(ArtRef::from_addr(0xB0)));
    assert_eq!(art.register(ArtRef::NULL), NULL_HANDLE);
}

#[test]
fn test_lifecycle_event_reaches_both_channels_after_invalidation() {
    let context = Arc::new(BridgeContext::new());
    let subscriber = context.fanout().subscribe();
    let layer = context.registries.layers.register(LayerRef::from_addr(0x40));

    let notifier = HostNotifier::new(context.clone());
    notifier.notify("Document Activated Notifier", json!({"name": "B"}));

    assert!(context.registries.layers.get(layer).is_none());
    let polled = context.events.pop_all();
    assert_eq!(polled.len(), 1);
    assert_eq!(polled[0].event_type, "document_switched");

    match subscriber.wait(Duration::from_millis(100)) {
        Delivery::Messages(messages) => {
            assert_eq!(messages.len(), 1);
            assert!(messages[0].contains("document_switched"));
        }
        other => panic!("expected a message, got {:?}", other),
    }
}

#[test]
fn test_network_threads_run_work_on_the_main_thread() {
    let context = Arc::new(BridgeContext::new());
    let dispatcher = Arc::new(MainThreadDispatcher::<MainThread>::new());
    let stop = Arc::new(AtomicBool::new(false));
    let main = spawn_main_thread(context.clone(), dispatcher.clone(), stop.clone());

    let workers: Vec<_> = (0..4)
        .map(|n| {
            let dispatcher = dispatcher.clone();
            thread::spawn(move || {
                dispatcher.run_blocking(move |main: &mut MainThread| {
                    Ok(main
                        .context
                        .registries
                        .art
                        .register(ArtRef::from_addr(0x1000 + n)))
                })
            })
        })
        .collect();

    let mut ids: Vec<_> = workers
        .into_iter()
        .map(|w| w.join().unwrap().unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    // Undo on the main thread kills every handle the workers were given.
    let undo = dispatcher.run_blocking(|main: &mut MainThread| {
        Ok(main.notifier.notify("Undo Notifier", json!({})))
    });
    assert!(undo.unwrap().is_some());
    for id in ids {
        let err = context.registries.art.resolve(id).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidHandle { .. }));
    }

    stop.store(true, Ordering::SeqCst);
    main.join().unwrap();
    dispatcher.close();
    assert!(matches!(
        dispatcher.run_blocking(|_: &mut MainThread| Ok(())),
        Err(BridgeError::MainThreadUnavailable)
    ));
}

#[tokio::test]
async fn test_async_callers_share_the_main_thread() {
    let context = Arc::new(BridgeContext::new());
    let dispatcher = Arc::new(MainThreadDispatcher::<MainThread>::new());
    let stop = Arc::new(AtomicBool::new(false));
    let main = spawn_main_thread(context.clone(), dispatcher.clone(), stop.clone());

    let failed = dispatcher
        .run(|_: &mut MainThread| -> hostbridge_core::Result<()> {
            Err(BridgeError::host("no such document"))
        })
        .await;
    assert!(matches!(failed, Err(BridgeError::HostCall { .. })));

    let count = dispatcher
        .run(|main: &mut MainThread| Ok(main.context.registries.invalidate_all()))
        .await
        .unwrap();
    assert_eq!(count, 1);

    stop.store(true, Ordering::SeqCst);
    main.join().unwrap();
}
