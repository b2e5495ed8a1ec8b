//! Shared fixtures for the fanout benchmarks.

use fanout_core::{BusConfig, EventBus, Listener, SharedListener};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Listener that only counts notifications.
#[derive(Debug, Default)]
pub struct Counter {
    seen: AtomicU64,
}

impl Counter {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn get(&self) -> u64 {
        self.seen.load(Ordering::Acquire)
    }

    /// Spin until at least `target` notifications arrived or `timeout`
    /// elapsed. Returns whether the target was reached.
    pub fn wait_for(&self, target: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.get() < target {
            if Instant::now() >= deadline {
                return false;
            }
            std::hint::spin_loop();
        }
        true
    }
}

impl Listener<u64> for Counter {
    fn notify(&self, _event: &u64) -> anyhow::Result<()> {
        self.seen.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn name(&self) -> &str {
        "counter"
    }
}

/// Bus with `listeners` registrations of one shared counter.
///
/// # Errors
///
/// Returns an error if the bus cannot start.
pub fn bus_with_counter(listeners: usize) -> anyhow::Result<(EventBus<u64>, Arc<Counter>)> {
    let bus = EventBus::with_config(BusConfig {
        name: "bench".to_string(),
        ..BusConfig::default()
    })?;
    let counter = Counter::new();
    let shared: SharedListener<u64> = counter.clone();
    for _ in 0..listeners {
        bus.register_listener(Arc::clone(&shared))?;
    }
    Ok((bus, counter))
}
