//! Listener abstraction for fanout.
//!
//! A listener is any value that can react to one event at a time. The bus
//! keeps registered listeners in a [`ListenerSet`], an insertion-ordered list
//! compared by `Arc` identity.

use crate::bus::BusError;
use std::sync::Arc;
use tracing::debug;

/// Receives events delivered by an [`EventBus`](crate::EventBus).
///
/// `notify` runs on one of the bus worker threads. It may be invoked
/// concurrently with itself for different events and should not block
/// indefinitely: a blocked listener occupies a pool slot.
///
/// Returning an error (or panicking) only affects this notification; the bus
/// logs the failure and keeps delivering.
pub trait Listener<T>: Send + Sync {
    /// React to one event.
    ///
    /// # Errors
    ///
    /// Any error is logged by the bus and then discarded.
    fn notify(&self, event: &T) -> anyhow::Result<()>;

    /// Name used in log records and failure reports.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<T, F> Listener<T> for F
where
    F: Fn(&T) -> anyhow::Result<()> + Send + Sync,
{
    fn notify(&self, event: &T) -> anyhow::Result<()> {
        self(event)
    }
}

/// A shared listener handle. Identity is the `Arc` allocation.
pub type SharedListener<T> = Arc<dyn Listener<T>>;

/// Insertion-ordered listener list guarded by the bus's listener lock.
pub(crate) struct ListenerSet<T> {
    entries: Vec<SharedListener<T>>,
    closed: bool,
}

impl<T> ListenerSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            closed: false,
        }
    }

    /// Number of registered entries, duplicates included.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Append a listener. The same handle may appear more than once.
    pub(crate) fn register(&mut self, listener: SharedListener<T>) -> Result<(), BusError> {
        if self.is_closed() {
            return Err(BusError::Disposed);
        }
        debug!(
            listener = %listener.name(),
            listeners = self.entries.len() + 1,
            "Listener registered"
        );
        self.entries.push(listener);
        Ok(())
    }

    /// Remove the first entry sharing `listener`'s allocation.
    ///
    /// Returns `true` if an entry was removed.
    pub(crate) fn unregister(&mut self, listener: &SharedListener<T>) -> bool {
        let Some(index) = self
            .entries
            .iter()
            .position(|entry| Arc::ptr_eq(entry, listener))
        else {
            return false;
        };
        let removed = self.entries.remove(index);
        debug!(
            listener = %removed.name(),
            listeners = self.entries.len(),
            "Listener unregistered"
        );
        true
    }

    /// Point-in-time copy of the listener list, in registration order.
    pub(crate) fn snapshot(&self) -> Vec<SharedListener<T>> {
        self.entries.clone()
    }

    /// Drop every entry and refuse further registrations.
    ///
    /// Returns the number of entries dropped.
    pub(crate) fn close(&mut self) -> usize {
        self.closed = true;
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }
}
