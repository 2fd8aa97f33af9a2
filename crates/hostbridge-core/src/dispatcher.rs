//! Main-thread task dispatch.
//!
//! The host's object model may only be touched from its main thread. Network
//! threads submit closures here; the host's idle callback calls
//! [`MainThreadDispatcher::drain_queue`] with the main-thread context, and each
//! submitter is woken with its task's result through a oneshot channel.
//!
//! The context type `C` never leaves the main thread, so it does not need to be
//! `Send`. Only the submitted closures and their results cross threads.

use crate::config::DispatchConfig;
use crate::error::{BridgeError, Result};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, OnceLock};
use std::thread::{self, ThreadId};
use tokio::sync::oneshot;
use tracing::{debug, warn};

type Job<C> = Box<dyn FnOnce(&mut C) + Send + 'static>;

struct DispatchQueue<C> {
    jobs: VecDeque<Job<C>>,
    closed: bool,
}

/// Bounded FIFO of tasks that must run on the host's main thread.
pub struct MainThreadDispatcher<C> {
    queue: Mutex<DispatchQueue<C>>,
    capacity: usize,
    main_thread: OnceLock<ThreadId>,
}

impl<C: 'static> MainThreadDispatcher<C> {
    pub fn new() -> Self {
        Self::with_capacity(DispatchConfig::MAX_PENDING_TASKS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(DispatchQueue {
                jobs: VecDeque::new(),
                closed: false,
            }),
            capacity: capacity.max(1),
            main_thread: OnceLock::new(),
        }
    }

    /// Run `task` on the main thread and await its result.
    ///
    /// A task that panics is reported as [`BridgeError::TaskPanicked`]; the
    /// panic never crosses into the calling thread.
    pub async fn run<R, F>(&self, task: F) -> Result<R>
    where
        F: FnOnce(&mut C) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let receiver = self.submit(task)?;
        receiver
            .await
            .map_err(|_| BridgeError::MainThreadUnavailable)?
    }

    /// Blocking variant of [`run`](Self::run) for plain OS threads.
    ///
    /// Must not be called from inside an async runtime.
    pub fn run_blocking<R, F>(&self, task: F) -> Result<R>
    where
        F: FnOnce(&mut C) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let receiver = self.submit(task)?;
        receiver
            .blocking_recv()
            .map_err(|_| BridgeError::MainThreadUnavailable)?
    }

    fn submit<R, F>(&self, task: F) -> Result<oneshot::Receiver<Result<R>>>
    where
        F: FnOnce(&mut C) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        if self.is_main_thread() {
            return Err(BridgeError::ReentrantDispatch);
        }

        let (tx, rx) = oneshot::channel();
        let job: Job<C> = Box::new(move |context: &mut C| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(context)))
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    warn!("Main-thread task panicked: {}", message);
                    Err(BridgeError::TaskPanicked { message })
                });
            // The submitter may have gone away (client disconnected).
            let _ = tx.send(outcome);
        });

        let mut queue = self.queue.lock().expect("dispatch queue lock poisoned");
        if queue.closed {
            return Err(BridgeError::MainThreadUnavailable);
        }
        if queue.jobs.len() >= self.capacity {
            return Err(BridgeError::DispatcherBusy {
                capacity: self.capacity,
            });
        }
        queue.jobs.push_back(job);
        Ok(rx)
    }

    /// Run every queued task on the calling thread, in submission order.
    ///
    /// The first thread to call this is recorded as the main thread. Returns
    /// the number of tasks run.
    pub fn drain_queue(&self, context: &mut C) -> usize {
        let current = thread::current().id();
        let main = *self.main_thread.get_or_init(|| current);
        if main != current {
            warn!("drain_queue called off the main thread; skipping");
            return 0;
        }

        let jobs = {
            let mut queue = self.queue.lock().expect("dispatch queue lock poisoned");
            std::mem::take(&mut queue.jobs)
        };
        let count = jobs.len();
        for job in jobs {
            job(context);
        }
        count
    }

    /// Refuse new tasks and fail everything still queued.
    pub fn close(&self) {
        let abandoned = {
            let mut queue = self.queue.lock().expect("dispatch queue lock poisoned");
            queue.closed = true;
            std::mem::take(&mut queue.jobs)
        };
        if !abandoned.is_empty() {
            debug!("Dispatcher closed with {} pending task(s)", abandoned.len());
        }
        // Dropping a job drops its sender; the waiting caller sees MainThreadUnavailable.
        drop(abandoned);
    }

    pub fn is_closed(&self) -> bool {
        self.queue.lock().expect("dispatch queue lock poisoned").closed
    }

    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .expect("dispatch queue lock poisoned")
            .jobs
            .len()
    }

    /// Whether the calling thread is the one that drains this dispatcher.
    pub fn is_main_thread(&self) -> bool {
        self.main_thread.get() == Some(&thread::current().id())
    }
}

impl<C: 'static> Default for MainThreadDispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
