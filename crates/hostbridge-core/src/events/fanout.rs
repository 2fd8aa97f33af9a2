//! Broadcast to long-lived streaming clients.
//!
//! # Locking
//!
//! Two levels: one mutex over subscriber membership, and one mutex (plus
//! condvar) per subscriber over its queue. A subscriber's queue is only touched
//! under its own lock, and no code path holds two subscribers' locks at once.

use crate::config::StreamConfig;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::debug;

/// Outcome of one wait on a subscriber's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Everything that was queued, oldest first.
    Messages(Vec<String>),
    /// The wait timed out with nothing queued.
    Heartbeat,
    /// The subscriber was closed; the stream should end.
    Closed,
}

#[derive(Debug)]
struct SubscriberState {
    active: bool,
    queue: VecDeque<String>,
    dropped: u64,
}

/// Delivery state for one open streaming client.
#[derive(Debug)]
pub struct Subscriber {
    id: u64,
    capacity: usize,
    state: Mutex<SubscriberState>,
    signal: Condvar,
}

impl Subscriber {
    fn new(id: u64, capacity: usize) -> Self {
        Self {
            id,
            capacity,
            state: Mutex::new(SubscriberState {
                active: true,
                queue: VecDeque::new(),
                dropped: 0,
            }),
            signal: Condvar::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().expect("subscriber lock poisoned").active
    }

    /// Queue a message and wake the serving thread. Inactive subscribers
    /// ignore the message.
    fn deliver(&self, message: &str) -> bool {
        let mut state = self.state.lock().expect("subscriber lock poisoned");
        if !state.active {
            return false;
        }
        if state.queue.len() >= self.capacity {
            state.queue.pop_front();
            state.dropped += 1;
        }
        state.queue.push_back(message.to_owned());
        drop(state);
        self.signal.notify_one();
        true
    }

    /// Mark the subscriber closed and wake its serving thread.
    pub fn close(&self) {
        let mut state = self.state.lock().expect("subscriber lock poisoned");
        state.active = false;
        drop(state);
        self.signal.notify_all();
    }

    /// Block until a message arrives, the subscriber closes, or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> Delivery {
        let state = self.state.lock().expect("subscriber lock poisoned");
        let (mut state, _) = self
            .signal
            .wait_timeout_while(state, timeout, |s| s.active && s.queue.is_empty())
            .expect("subscriber lock poisoned");

        if !state.active {
            return Delivery::Closed;
        }
        if state.queue.is_empty() {
            return Delivery::Heartbeat;
        }
        Delivery::Messages(state.queue.drain(..).collect())
    }

    /// Take whatever is queued without waiting.
    pub fn drain(&self) -> Vec<String> {
        let mut state = self.state.lock().expect("subscriber lock poisoned");
        state.queue.drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().expect("subscriber lock poisoned").queue.len()
    }

    /// Messages discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.state.lock().expect("subscriber lock poisoned").dropped
    }
}

/// Fan-out of broadcast messages to every active subscriber.
pub struct EventFanout {
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl EventFanout {
    pub fn new() -> Self {
        Self::with_capacity(StreamConfig::SUBSCRIBER_QUEUE_CAPACITY)
    }

    /// Fan-out whose subscribers each queue at most `queue_capacity` messages.
    pub fn with_capacity(queue_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Open a new subscriber. It only sees broadcasts made after this call.
    pub fn subscribe(&self) -> Arc<Subscriber> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let subscriber = Arc::new(Subscriber::new(id, self.queue_capacity));
        self.subscribers
            .lock()
            .expect("subscriber list lock poisoned")
            .push(subscriber.clone());
        debug!("Stream subscriber {} opened", id);
        subscriber
    }

    /// Queue `message` on every active subscriber. Returns how many received it.
    ///
    /// Never blocks on a subscriber's consumer and never fails for a dead one.
    pub fn broadcast(&self, message: &str) -> usize {
        let targets: Vec<Arc<Subscriber>> = self
            .subscribers
            .lock()
            .expect("subscriber list lock poisoned")
            .clone();

        targets
            .iter()
            .filter(|subscriber| subscriber.deliver(message))
            .count()
    }

    /// Remove a subscriber and close it. Returns whether it was registered.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let removed = {
            let mut subscribers = self
                .subscribers
                .lock()
                .expect("subscriber list lock poisoned");
            subscribers
                .iter()
                .position(|s| s.id == id)
                .map(|index| subscribers.swap_remove(index))
        };

        match removed {
            Some(subscriber) => {
                subscriber.close();
                debug!("Stream subscriber {} closed", id);
                true
            }
            None => false,
        }
    }

    /// Close every subscriber and wake all serving threads.
    pub fn close_all(&self) {
        let subscribers = self
            .subscribers
            .lock()
            .expect("subscriber list lock poisoned")
            .clone();
        for subscriber in &subscribers {
            subscriber.close();
        }
        if !subscribers.is_empty() {
            debug!("Closed {} stream subscriber(s)", subscribers.len());
        }
    }

    pub fn connection_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber list lock poisoned")
            .len()
    }
}

impl Default for EventFanout {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_broadcast_reaches_every_subscriber_in_order() {
        let fanout = EventFanout::new();
        let subs: Vec<_> = (0..3).map(|_| fanout.subscribe()).collect();

        assert_eq!(fanout.broadcast("one"), 3);
        assert_eq!(fanout.broadcast("two"), 3);

        for sub in &subs {
            assert_eq!(sub.drain(), vec!["one".to_string(), "two".to_string()]);
        }
    }

    #[test]
    fn test_late_subscriber_misses_earlier_broadcast() {
        let fanout = EventFanout::new();
        let early = fanout.subscribe();
        fanout.broadcast("m");
        let late = fanout.subscribe();

        assert_eq!(early.pending(), 1);
        assert_eq!(late.pending(), 0);
    }

    #[test]
    fn test_two_subscribers_then_one_leaves() {
        let fanout = EventFanout::new();
        let first = fanout.subscribe();
        let second = fanout.subscribe();
        assert_eq!(first.id(), 1);
        assert_eq!(second.id(), 2);

        fanout.broadcast("x");
        assert_eq!(first.drain(), vec!["x".to_string()]);
        assert_eq!(second.drain(), vec!["x".to_string()]);

        assert!(fanout.unsubscribe(first.id()));
        assert!(!first.is_active());
        fanout.broadcast("y");

        assert!(first.drain().is_empty());
        assert_eq!(second.drain(), vec!["y".to_string()]);
        assert_eq!(fanout.connection_count(), 1);
    }

    #[test]
    fn test_unsubscribe_unknown_is_noop() {
        let fanout = EventFanout::new();
        assert!(!fanout.unsubscribe(42));
    }

    #[test]
    fn test_wait_times_out_with_heartbeat() {
        let fanout = EventFanout::new();
        let sub = fanout.subscribe();
        let started = Instant::now();
        assert_eq!(sub.wait(Duration::from_millis(30)), Delivery::Heartbeat);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_wakes_on_broadcast() {
        let fanout = Arc::new(EventFanout::new());
        let sub = fanout.subscribe();

        let producer = {
            let fanout = fanout.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                fanout.broadcast("hello");
            })
        };

        let delivery = sub.wait(Duration::from_secs(5));
        producer.join().unwrap();
        assert_eq!(delivery, Delivery::Messages(vec!["hello".to_string()]));
    }

    #[test]
    fn test_close_all_wakes_waiters() {
        let fanout = Arc::new(EventFanout::new());
        let sub = fanout.subscribe();

        let waiter = thread::spawn(move || sub.wait(Duration::from_secs(10)));
        thread::sleep(Duration::from_millis(20));
        fanout.close_all();

        assert_eq!(waiter.join().unwrap(), Delivery::Closed);
        assert_eq!(fanout.broadcast("ignored"), 0);
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let fanout = EventFanout::with_capacity(2);
        let sub = fanout.subscribe();
        for m in ["a", "b", "c"] {
            fanout.broadcast(m);
        }
        assert_eq!(sub.drain(), vec!["b".to_string(), "c".to_string()]);
        assert_eq!(sub.dropped(), 1);
    }
}
