//! The event bus.
//!
//! Publishers append to a FIFO queue; a dedicated dispatch thread drains it
//! and fans each event out to the registered listeners on a bounded worker
//! pool.

use crate::dispatch::{self, Shared};
use crate::listener::SharedListener;
use crate::metrics;
use crate::pool::WorkerPool;
use crate::queue::{self, EnqueueError, QueuePolicy, QueueSender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// Bus errors.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus has been disposed.
    #[error("Event bus has been disposed")]
    Disposed,

    /// The bounded queue is at capacity; the event was dropped.
    #[error("Event queue is full (capacity {0})")]
    QueueFull(usize),

    /// Invalid configuration.
    #[error("Invalid bus configuration: {0}")]
    InvalidConfig(&'static str),

    /// The dispatch thread or worker pool could not be started.
    #[error("Failed to start bus threads: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Bus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Name used for thread names and log records.
    #[serde(default = "default_name")]
    pub name: String,

    /// Number of threads running listener notifications.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Pending-event queue policy.
    #[serde(default)]
    pub queue: QueuePolicy,
}

fn default_name() -> String {
    "fanout".to_string()
}

fn default_worker_threads() -> usize {
    4
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            worker_threads: default_worker_threads(),
            queue: QueuePolicy::default(),
        }
    }
}

impl BusConfig {
    /// Check the configuration before any thread is started.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<(), BusError> {
        if self.name.is_empty() {
            return Err(BusError::InvalidConfig("name cannot be empty"));
        }
        if self.worker_threads == 0 {
            return Err(BusError::InvalidConfig("worker_threads must be at least 1"));
        }
        if let QueuePolicy::Bounded { capacity } = self.queue {
            if capacity == 0 {
                return Err(BusError::InvalidConfig("bounded queue capacity must be at least 1"));
            }
            if capacity > Semaphore::MAX_PERMITS {
                return Err(BusError::InvalidConfig("bounded queue capacity is too large"));
            }
        }
        Ok(())
    }
}

/// Bus statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Registered listener entries.
    pub listeners: usize,
    /// Events published but not yet dequeued.
    pub pending: usize,
    /// Events accepted by `publish`.
    pub published: u64,
    /// Events dequeued and fanned out.
    pub dispatched: u64,
    /// Notifications that completed successfully.
    pub notified: u64,
    /// Notifications that returned an error or panicked.
    pub failed: u64,
}

/// An in-memory event bus for values of type `T`.
///
/// Every published event is delivered to each listener registered at the
/// moment the event is dequeued. Each delivery runs as its own job on the
/// bus's worker pool, so a listener can see events out of publish order and
/// may be called concurrently with itself.
///
/// Dropping the bus disposes it.
pub struct EventBus<T> {
    shared: Arc<Shared<T>>,
    sender: QueueSender<T>,
    cancel: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    pool: WorkerPool,
    disposed: AtomicBool,
    config: BusConfig,
}

impl<T> EventBus<T>
where
    T: Send + Sync + 'static,
{
    /// Create a bus with the default configuration and start its threads.
    ///
    /// # Errors
    ///
    /// Returns an error if the threads cannot be started.
    pub fn new() -> Result<Self, BusError> {
        Self::with_config(BusConfig::default())
    }

    /// Create a bus with a custom configuration and start its threads.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the threads cannot
    /// be started.
    pub fn with_config(config: BusConfig) -> Result<Self, BusError> {
        config.validate()?;

        let pool = WorkerPool::new(config.worker_threads, &config.name)?;
        let (sender, receiver) = queue::queue(config.queue);
        let shared = Arc::new(Shared::new());
        let cancel = CancellationToken::new();

        let dispatcher = {
            let shared = Arc::clone(&shared);
            let pool = pool.handle();
            let cancel = cancel.clone();
            thread::Builder::new()
                .name(format!("{}-dispatch", config.name))
                .spawn(move || {
                    let driver = pool.clone();
                    driver.block_on(dispatch::run(receiver, shared, pool, cancel));
                })?
        };

        info!(
            bus = %config.name,
            workers = pool.size(),
            queue = ?config.queue,
            "Event bus started"
        );

        Ok(Self {
            shared,
            sender,
            cancel,
            dispatcher: Mutex::new(Some(dispatcher)),
            pool,
            disposed: AtomicBool::new(false),
            config,
        })
    }

    /// Publish an event.
    ///
    /// Returns as soon as the event is queued; delivery happens later on the
    /// worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Disposed`] after [`dispose`](Self::dispose) and
    /// [`BusError::QueueFull`] when a bounded queue is at capacity. In both
    /// cases the event is dropped.
    pub fn publish(&self, event: T) -> Result<(), BusError> {
        if self.is_disposed() {
            metrics::record_dropped("disposed");
            trace!(bus = %self.config.name, "Publish after dispose ignored");
            return Err(BusError::Disposed);
        }

        let counters = &self.shared.counters;
        // Counted before the send so the dispatch loop never decrements first.
        counters.pending.fetch_add(1, Ordering::AcqRel);

        match self.sender.try_send(event) {
            Ok(()) => {
                counters.published.fetch_add(1, Ordering::Relaxed);
                metrics::record_published();
                Ok(())
            }
            Err(err) => {
                counters.pending.fetch_sub(1, Ordering::AcqRel);
                match err {
                    EnqueueError::Full(_) => {
                        metrics::record_dropped("queue_full");
                        let capacity = match self.config.queue {
                            QueuePolicy::Bounded { capacity } => capacity,
                            QueuePolicy::Unbounded => 0,
                        };
                        Err(BusError::QueueFull(capacity))
                    }
                    EnqueueError::Closed(_) => {
                        metrics::record_dropped("disposed");
                        Err(BusError::Disposed)
                    }
                }
            }
        }
    }

    /// Register a listener.
    ///
    /// Takes effect for every event dequeued after this call returns.
    /// Registering the same handle twice delivers each event to it twice.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Disposed`] after [`dispose`](Self::dispose).
    pub fn register_listener(&self, listener: SharedListener<T>) -> Result<(), BusError> {
        self.shared.listeners.lock().register(listener)?;
        metrics::listeners_added(1);
        Ok(())
    }

    /// Unregister a listener, matched by `Arc` identity.
    ///
    /// Removes one entry per call. Returns `false` if the listener was not
    /// registered.
    pub fn unregister_listener(&self, listener: &SharedListener<T>) -> bool {
        let removed = self.shared.listeners.lock().unregister(listener);
        if removed {
            metrics::listeners_removed(1);
        }
        removed
    }
}

impl<T> EventBus<T> {
    /// Stop the bus.
    ///
    /// Clears all listeners, stops the dispatch loop and shuts the worker
    /// pool down without waiting. Events still queued are never dispatched;
    /// notifications not yet started are discarded. Calling it again is a
    /// no-op; a call racing an ongoing dispose returns once that one is done.
    ///
    /// May be called from inside a listener.
    pub fn dispose(&self) {
        // Held for the whole teardown: a concurrent caller returns only once
        // the bus is fully stopped.
        let mut dispatcher = self.dispatcher.lock();
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let dropped = self.shared.listeners.lock().close();
        metrics::listeners_removed(dropped);

        self.cancel.cancel();
        if let Some(dispatcher) = dispatcher.take() {
            if dispatcher.join().is_err() {
                error!(bus = %self.config.name, "Dispatch thread panicked");
            }
        }
        self.pool.shutdown_now();

        debug!(
            bus = %self.config.name,
            listeners = dropped,
            abandoned = self.shared.counters.pending.load(Ordering::Acquire),
            "Event bus disposed"
        );
    }

    /// Check if the bus has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Get the number of registered listener entries.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.shared.listeners.lock().len()
    }

    /// Get the bus configuration.
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Get bus statistics.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        let counters = &self.shared.counters;
        BusStats {
            listeners: self.listener_count(),
            pending: counters.pending.load(Ordering::Acquire),
            published: counters.published.load(Ordering::Relaxed),
            dispatched: counters.dispatched.load(Ordering::Acquire),
            notified: counters.notified.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
        }
    }
}

impl<T> Drop for EventBus<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T> fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("name", &self.config.name)
            .field("disposed", &self.is_disposed())
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::Listener;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Counter {
        calls: AtomicUsize,
    }

    impl Listener<u32> for Counter {
        fn notify(&self, _event: &u32) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    #[test]
    fn test_default_config() {
        let config = BusConfig::default();
        assert_eq!(config.name, "fanout");
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.queue, QueuePolicy::Unbounded);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let zero_workers = BusConfig {
            worker_threads: 0,
            ..BusConfig::default()
        };
        assert!(matches!(
            zero_workers.validate(),
            Err(BusError::InvalidConfig(_))
        ));

        let zero_capacity = BusConfig {
            queue: QueuePolicy::Bounded { capacity: 0 },
            ..BusConfig::default()
        };
        assert!(matches!(
            EventBus::<u32>::with_config(zero_capacity),
            Err(BusError::InvalidConfig(_))
        ));

        let unnamed = BusConfig {
            name: String::new(),
            ..BusConfig::default()
        };
        assert!(unnamed.validate().is_err());

        let oversized = BusConfig {
            queue: QueuePolicy::Bounded {
                capacity: usize::MAX,
            },
            ..BusConfig::default()
        };
        assert!(matches!(
            EventBus::<u32>::with_config(oversized),
            Err(BusError::InvalidConfig(_))
        ));

        let largest = BusConfig {
            queue: QueuePolicy::Bounded {
                capacity: Semaphore::MAX_PERMITS,
            },
            ..BusConfig::default()
        };
        assert!(largest.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let config: BusConfig = toml::from_str(
            r#"
            worker_threads = 8

            [queue]
            policy = "bounded"
            capacity = 256
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "fanout");
        assert_eq!(config.worker_threads, 8);
        assert_eq!(config.queue, QueuePolicy::Bounded { capacity: 256 });
    }

    #[test]
    fn test_publish_delivers_and_counts() {
        let bus = EventBus::<u32>::new().unwrap();
        let counter = Arc::new(Counter::default());
        bus.register_listener(counter.clone()).unwrap();

        for i in 0..5 {
            bus.publish(i).unwrap();
        }

        assert!(wait_until(Duration::from_secs(5), || {
            counter.calls.load(Ordering::SeqCst) == 5
        }));
        assert!(wait_until(Duration::from_secs(5), || bus.stats().notified == 5));

        let stats = bus.stats();
        assert_eq!(stats.listeners, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.published, 5);
        assert_eq!(stats.dispatched, 5);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let bus = EventBus::<u32>::new().unwrap();
        bus.register_listener(Arc::new(Counter::default())).unwrap();

        bus.dispose();
        bus.dispose();

        assert!(bus.is_disposed());
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_calls_after_dispose_are_guarded() {
        let bus = EventBus::<u32>::new().unwrap();
        let counter: SharedListener<u32> = Arc::new(Counter::default());
        bus.register_listener(Arc::clone(&counter)).unwrap();
        bus.dispose();

        assert!(matches!(bus.publish(1), Err(BusError::Disposed)));
        assert!(matches!(
            bus.register_listener(Arc::clone(&counter)),
            Err(BusError::Disposed)
        ));
        assert!(!bus.unregister_listener(&counter));
        assert_eq!(bus.stats().published, 0);
    }

    #[test]
    fn test_unregister_unknown_listener_is_noop() {
        let bus = EventBus::<u32>::new().unwrap();
        let stranger: SharedListener<u32> = Arc::new(Counter::default());

        assert!(!bus.unregister_listener(&stranger));
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_bounded_queue_accounting() {
        let bus = EventBus::<u32>::with_config(BusConfig {
            queue: QueuePolicy::Bounded { capacity: 1 },
            ..BusConfig::default()
        })
        .unwrap();

        let mut accepted = 0_u64;
        for i in 0..10_000_u32 {
            match bus.publish(i) {
                Ok(()) => accepted += 1,
                Err(BusError::QueueFull(capacity)) => assert_eq!(capacity, 1),
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(bus.stats().published, accepted);
        assert!(wait_until(Duration::from_secs(5), || {
            bus.stats().dispatched == accepted
        }));
    }

    #[test]
    fn test_debug_output() {
        let bus = EventBus::<u32>::new().unwrap();
        let rendered = format!("{bus:?}");
        assert!(rendered.contains("EventBus"));
        assert!(rendered.contains("fanout"));
    }
}
