//! Metrics emitted by the bus.
//!
//! Uses the `metrics` facade; nothing is recorded until the application
//! installs a recorder (for example the Prometheus exporter).

use metrics::{counter, gauge};

/// Metric names.
pub mod names {
    pub const EVENTS_PUBLISHED: &str = "fanout_events_published_total";
    pub const EVENTS_DROPPED: &str = "fanout_events_dropped_total";
    pub const EVENTS_DISPATCHED: &str = "fanout_events_dispatched_total";
    pub const NOTIFICATIONS_TOTAL: &str = "fanout_notifications_total";
    pub const LISTENER_FAILURES: &str = "fanout_listener_failures_total";
    pub const LISTENERS_ACTIVE: &str = "fanout_listeners_active";
}

/// Register descriptions for every bus metric.
pub fn describe() {
    metrics::describe_counter!(names::EVENTS_PUBLISHED, "Events accepted by publish");
    metrics::describe_counter!(
        names::EVENTS_DROPPED,
        "Events rejected by publish (queue full or bus disposed)"
    );
    metrics::describe_counter!(
        names::EVENTS_DISPATCHED,
        "Events dequeued and fanned out to listeners"
    );
    metrics::describe_counter!(
        names::NOTIFICATIONS_TOTAL,
        "Listener notifications that completed successfully"
    );
    metrics::describe_counter!(
        names::LISTENER_FAILURES,
        "Listener notifications that returned an error or panicked"
    );
    metrics::describe_gauge!(names::LISTENERS_ACTIVE, "Currently registered listeners");
}

pub(crate) fn record_published() {
    counter!(names::EVENTS_PUBLISHED).increment(1);
}

pub(crate) fn record_dropped(reason: &'static str) {
    counter!(names::EVENTS_DROPPED, "reason" => reason).increment(1);
}

pub(crate) fn record_dispatched() {
    counter!(names::EVENTS_DISPATCHED).increment(1);
}

pub(crate) fn record_notification() {
    counter!(names::NOTIFICATIONS_TOTAL).increment(1);
}

pub(crate) fn record_listener_failure(kind: &'static str) {
    counter!(names::LISTENER_FAILURES, "kind" => kind).increment(1);
}

pub(crate) fn listeners_added(count: usize) {
    gauge!(names::LISTENERS_ACTIVE).increment(count as f64);
}

pub(crate) fn listeners_removed(count: usize) {
    gauge!(names::LISTENERS_ACTIVE).decrement(count as f64);
}
