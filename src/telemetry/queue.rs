//! Bounded single-consumer queue that serializes work onto one context.
//!
//! The consumer builds its context lazily from a caller-supplied factory and
//! then applies queued actions one at a time, in enqueue order. Failures are
//! contained: an action that errors or panics is discarded without stopping
//! the queue, and a factory that fails disables the queue for good.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Default number of actions buffered before producers see backpressure.
pub const QUEUE_CAPACITY: usize = 10;

/// A unit of work applied to the queue-owned context.
pub type QueueAction<T> = Box<dyn FnOnce(&mut T) -> anyhow::Result<()> + Send + 'static>;

/// Serializes actions from any number of producers onto one context.
pub struct SerializedQueue<T: 'static> {
    sender: Mutex<Option<mpsc::Sender<QueueAction<T>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: 'static> SerializedQueue<T> {
    /// Create the queue and start its consumer.
    ///
    /// Must be called from within a tokio runtime. Does not wait for the
    /// factory; it runs on the consumer when the queue first activates.
    pub fn new<F>(factory: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        Self::with_capacity(QUEUE_CAPACITY, factory)
    }

    /// Create the queue with a custom buffer size.
    pub fn with_capacity<F>(capacity: usize, factory: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        // Actions are synchronous and may block on I/O, so the consumer
        // lives on the blocking pool rather than a runtime worker.
        let worker = tokio::task::spawn_blocking(move || consume(factory, rx));

        Self {
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Enqueue an action without waiting.
    ///
    /// Returns `false` if the action was not accepted: the buffer is full,
    /// the queue was disposed, or its context failed to initialize.
    pub fn add<F>(&self, action: F) -> bool
    where
        F: FnOnce(&mut T) -> anyhow::Result<()> + Send + 'static,
    {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return false;
        };

        match sender.try_send(Box::new(action)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("telemetry queue full, dropping action");
                false
            }
            Err(TrySendError::Closed(_)) => {
                trace!("telemetry queue closed, dropping action");
                false
            }
        }
    }

    /// Enqueue an action, waiting for buffer space if necessary.
    ///
    /// Returns `false` if the queue was disposed or its context failed to
    /// initialize.
    pub async fn send<F>(&self, action: F) -> bool
    where
        F: FnOnce(&mut T) -> anyhow::Result<()> + Send + 'static,
    {
        let sender = {
            let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
            match guard.as_ref() {
                Some(sender) => sender.clone(),
                None => return false,
            }
        };

        sender.send(Box::new(action)).await.is_ok()
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Stop accepting work, then wait for the consumer to drain and exit.
    ///
    /// Calling this more than once is harmless.
    pub async fn dispose(&self) {
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                debug!(error = %e, "telemetry queue consumer ended abnormally");
            }
        }
    }
}

fn consume<T, F>(factory: F, mut rx: mpsc::Receiver<QueueAction<T>>)
where
    F: FnOnce() -> anyhow::Result<T>,
{
    let mut context = match catch_unwind(AssertUnwindSafe(factory)) {
        Ok(Ok(context)) => context,
        Ok(Err(e)) => {
            debug!(error = %e, "telemetry context failed to initialize, queue disabled");
            return;
        }
        Err(_) => {
            debug!("telemetry context factory panicked, queue disabled");
            return;
        }
    };

    while let Some(action) = rx.blocking_recv() {
        apply(action, &mut context);
        while let Ok(action) = rx.try_recv() {
            apply(action, &mut context);
        }
    }

    trace!("telemetry queue drained");
}

fn apply<T>(action: QueueAction<T>, context: &mut T) {
    match catch_unwind(AssertUnwindSafe(|| action(context))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "telemetry action failed"),
        Err(_) => debug!("telemetry action panicked"),
    }
}
