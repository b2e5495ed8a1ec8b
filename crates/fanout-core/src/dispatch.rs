//! The dispatch loop.
//!
//! One loop per bus, on its own thread. Each iteration takes one event off
//! the queue, snapshots the listener list and hands one notification job per
//! listener to the worker pool without waiting for any of them.
//!
//! ```text
//!  Idle ──(event)──▶ Draining ──(jobs submitted)──▶ Idle
//!   │
//!   └──(cancelled / queue closed)──▶ Stopped
//! ```

use crate::listener::{Listener, ListenerSet};
use crate::metrics;
use crate::pool::PoolHandle;
use crate::queue::QueueReceiver;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// State shared between the bus handle, the dispatch loop and the workers.
pub(crate) struct Shared<T> {
    pub(crate) listeners: Mutex<ListenerSet<T>>,
    pub(crate) counters: Counters,
}

impl<T> Shared<T> {
    pub(crate) fn new() -> Self {
        Self {
            listeners: Mutex::new(ListenerSet::new()),
            counters: Counters::default(),
        }
    }
}

/// Running totals behind [`BusStats`](crate::BusStats).
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) pending: AtomicUsize,
    pub(crate) published: AtomicU64,
    pub(crate) dispatched: AtomicU64,
    pub(crate) notified: AtomicU64,
    pub(crate) failed: AtomicU64,
}

/// Run until `cancel` fires or every queue sender is gone.
///
/// Cancellation is checked before each dequeue, so nothing is dequeued once
/// the bus is disposed.
pub(crate) async fn run<T>(
    mut queue: QueueReceiver<T>,
    shared: Arc<Shared<T>>,
    pool: PoolHandle,
    cancel: CancellationToken,
) where
    T: Send + Sync + 'static,
{
    debug!("Dispatch loop started");

    loop {
        let next = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("Dispatch loop cancelled");
                break;
            }

            next = queue.recv() => next,
        };

        let Some(event) = next else {
            debug!("Event queue closed");
            break;
        };
        shared.counters.pending.fetch_sub(1, Ordering::AcqRel);

        fan_out(event, &shared, &pool);
    }

    debug!("Dispatch loop stopped");
}

/// Submit one notification job per listener registered right now.
fn fan_out<T>(event: T, shared: &Arc<Shared<T>>, pool: &PoolHandle)
where
    T: Send + Sync + 'static,
{
    // The lock is released before any job is submitted.
    let listeners = shared.listeners.lock().snapshot();
    let sequence = shared.counters.dispatched.fetch_add(1, Ordering::AcqRel);
    metrics::record_dispatched();

    trace!(sequence, listeners = listeners.len(), "Dispatching event");

    if listeners.is_empty() {
        return;
    }

    let event = Arc::new(event);
    for listener in listeners {
        let event = Arc::clone(&event);
        let shared = Arc::clone(shared);
        pool.submit(move || deliver(&*listener, &*event, &shared.counters));
    }
}

/// Run one notification, containing any error or panic it produces.
pub(crate) fn deliver<T>(listener: &dyn Listener<T>, event: &T, counters: &Counters) {
    match panic::catch_unwind(AssertUnwindSafe(|| listener.notify(event))) {
        Ok(Ok(())) => {
            counters.notified.fetch_add(1, Ordering::Relaxed);
            metrics::record_notification();
        }
        Ok(Err(err)) => {
            warn!(listener = %listener.name(), error = %format!("{err:#}"), "Listener failed");
            counters.failed.fetch_add(1, Ordering::Relaxed);
            metrics::record_listener_failure("error");
        }
        Err(payload) => {
            error!(
                listener = %listener.name(),
                panic = %panic_message(payload.as_ref()),
                "Listener panicked"
            );
            counters.failed.fetch_add(1, Ordering::Relaxed);
            metrics::record_listener_failure("panic");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl Listener<u32> for Failing {
        fn notify(&self, event: &u32) -> anyhow::Result<()> {
            anyhow::bail!("cannot handle {event}")
        }
    }

    struct Panicking;

    impl Listener<u32> for Panicking {
        fn notify(&self, event: &u32) -> anyhow::Result<()> {
            panic!("boom on {event}")
        }
    }

    #[test]
    fn test_deliver_counts_success() {
        let counters = Counters::default();
        let ok = |_: &u32| -> anyhow::Result<()> { Ok(()) };

        deliver::<u32>(&ok, &1_u32, &counters);
        deliver::<u32>(&ok, &2_u32, &counters);

        assert_eq!(counters.notified.load(Ordering::Relaxed), 2);
        assert_eq!(counters.failed.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_deliver_contains_error_and_panic() {
        let counters = Counters::default();

        deliver::<u32>(&Failing, &1_u32, &counters);
        deliver::<u32>(&Panicking, &2_u32, &counters);

        assert_eq!(counters.notified.load(Ordering::Relaxed), 0);
        assert_eq!(counters.failed.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_panic_message() {
        let payload = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload = panic::catch_unwind(|| panic!("formatted {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 7");

        let payload = panic::catch_unwind(|| std::panic::panic_any(5_u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
