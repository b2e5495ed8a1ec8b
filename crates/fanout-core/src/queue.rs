//! Pending-event queue.
//!
//! One message per publish doubles as the availability signal: the dispatch
//! loop sleeps in `recv` while the queue is empty and wakes once per event.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// How many published events may wait for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum QueuePolicy {
    /// No limit. A publisher that outpaces the dispatch loop grows the queue
    /// without bound.
    #[default]
    Unbounded,
    /// At most `capacity` pending events; further publishes are dropped and
    /// reported as [`BusError::QueueFull`](crate::BusError::QueueFull).
    Bounded {
        /// Maximum number of pending events.
        capacity: usize,
    },
}

/// Why an event could not be enqueued. The event is handed back.
#[derive(Debug)]
pub(crate) enum EnqueueError<T> {
    Full(T),
    Closed(T),
}

pub(crate) enum QueueSender<T> {
    Unbounded(mpsc::UnboundedSender<T>),
    Bounded(mpsc::Sender<T>),
}

pub(crate) enum QueueReceiver<T> {
    Unbounded(mpsc::UnboundedReceiver<T>),
    Bounded(mpsc::Receiver<T>),
}

/// Create a queue for the given policy.
///
/// Bounded capacities of zero or above the tokio semaphore limit are rejected
/// earlier by `BusConfig::validate`.
pub(crate) fn queue<T>(policy: QueuePolicy) -> (QueueSender<T>, QueueReceiver<T>) {
    match policy {
        QueuePolicy::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            (QueueSender::Unbounded(tx), QueueReceiver::Unbounded(rx))
        }
        QueuePolicy::Bounded { capacity } => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (QueueSender::Bounded(tx), QueueReceiver::Bounded(rx))
        }
    }
}

impl<T> QueueSender<T> {
    /// Append without waiting.
    pub(crate) fn try_send(&self, value: T) -> Result<(), EnqueueError<T>> {
        match self {
            Self::Unbounded(tx) => tx.send(value).map_err(|e| EnqueueError::Closed(e.0)),
            Self::Bounded(tx) => tx.try_send(value).map_err(|e| match e {
                mpsc::error::TrySendError::Full(v) => EnqueueError::Full(v),
                mpsc::error::TrySendError::Closed(v) => EnqueueError::Closed(v),
            }),
        }
    }
}

impl<T> QueueReceiver<T> {
    /// Wait for the next event. `None` once every sender is gone.
    ///
    /// Cancel safe.
    pub(crate) async fn recv(&mut self) -> Option<T> {
        match self {
            Self::Unbounded(rx) => rx.recv().await,
            Self::Bounded(rx) => rx.recv().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unbounded_fifo() {
        let (tx, mut rx) = queue(QueuePolicy::Unbounded);
        for i in 0..5 {
            tx.try_send(i).unwrap();
        }
        for i in 0..5 {
            assert_eq!(rx.recv().await, Some(i));
        }
    }

    #[tokio::test]
    async fn test_bounded_rejects_when_full() {
        let (tx, mut rx) = queue(QueuePolicy::Bounded { capacity: 2 });
        tx.try_send(1).unwrap();
        tx.try_send(2).unwrap();
        assert!(matches!(tx.try_send(3), Err(EnqueueError::Full(3))));

        assert_eq!(rx.recv().await, Some(1));
        tx.try_send(4).unwrap();
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(4));
    }

    #[tokio::test]
    async fn test_closed_after_receiver_dropped() {
        let (tx, rx) = queue::<u8>(QueuePolicy::Unbounded);
        drop(rx);
        assert!(matches!(tx.try_send(7), Err(EnqueueError::Closed(7))));
    }

    #[tokio::test]
    async fn test_recv_none_after_sender_dropped() {
        let (tx, mut rx) = queue::<u8>(QueuePolicy::Bounded { capacity: 4 });
        tx.try_send(1).unwrap();
        drop(tx);
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_policy_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            queue: QueuePolicy,
        }

        let bounded: Wrapper = toml::from_str(
            r#"
            [queue]
            policy = "bounded"
            capacity = 64
            "#,
        )
        .unwrap();
        assert_eq!(bounded.queue, QueuePolicy::Bounded { capacity: 64 });

        let unbounded: Wrapper = toml::from_str(
            r#"
            [queue]
            policy = "unbounded"
            "#,
        )
        .unwrap();
        assert_eq!(unbounded.queue, QueuePolicy::Unbounded);
    }
}
