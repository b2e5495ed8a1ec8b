//! # fanout-core
//!
//! A concurrent, in-memory event bus.
//!
//! - **EventBus** - Accepts events from any number of threads and fans each
//!   one out to every registered listener
//! - **Listener** - The capability a subscriber exposes: react to one event
//! - **QueuePolicy** - Unbounded or bounded pending-event buffer
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  publish  ┌─────────────┐  recv  ┌───────────────┐
//! │ Publisher │──────────▶│ Event queue │───────▶│ Dispatch loop │
//! └───────────┘           └─────────────┘        └───────┬───────┘
//!                                                        │ one job per listener
//!                                                        ▼
//!                                                ┌───────────────┐
//!                                                │  Worker pool  │──▶ Listener::notify
//!                                                └───────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use fanout_core::{EventBus, SharedListener};
//! use std::sync::Arc;
//!
//! let bus = EventBus::<String>::new().unwrap();
//!
//! let printer: SharedListener<String> = Arc::new(|event: &String| -> anyhow::Result<()> {
//!     println!("got {event}");
//!     Ok(())
//! });
//! bus.register_listener(Arc::clone(&printer)).unwrap();
//!
//! bus.publish("hello".to_string()).unwrap();
//!
//! bus.unregister_listener(&printer);
//! bus.dispose();
//! ```

pub mod bus;
mod dispatch;
pub mod listener;
pub mod metrics;
mod pool;
pub mod queue;

pub use bus::{BusConfig, BusError, BusStats, EventBus};
pub use listener::{Listener, SharedListener};
pub use queue::QueuePolicy;
