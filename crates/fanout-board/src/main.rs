//! # fanout-board
//!
//! Deals a hand of cards onto a console board through the fanout event bus.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! fanout-board
//!
//! # Run with environment overrides
//! FANOUT_WORKERS=2 FANOUT_POSITIONS=6 RUST_LOG=fanout_core=trace fanout-board
//! ```

mod board;
mod card;
mod config;
mod metrics;

use anyhow::{Context, Result};
use board::{BoardEvent, ConsoleBoard};
use fanout_core::{EventBus, SharedListener};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fanout_core=debug,fanout_board=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    info!(
        bus = %config.bus.name,
        workers = config.bus.worker_threads,
        positions = config.board.positions,
        "Starting board"
    );

    metrics::init_metrics(&config.metrics);

    let bus = EventBus::<BoardEvent>::with_config(config.bus.clone())
        .context("Failed to start event bus")?;

    let board = Arc::new(ConsoleBoard::new(config.board.positions));
    bus.register_listener(board.clone())?;

    let moves: SharedListener<BoardEvent> = Arc::new(|event: &BoardEvent| -> Result<()> {
        debug!(?event, "Move");
        Ok(())
    });
    bus.register_listener(moves)?;

    let hand = card::deal(config.board.deal_offset, config.board.positions);
    for (index, card) in hand.iter().enumerate() {
        bus.publish(BoardEvent::CardPlaced {
            card: *card,
            position: index + 1,
        })?;
    }
    bus.publish(BoardEvent::GameOver {
        message: format!("All {} positions filled", hand.len()),
    })?;

    let settled = board.wait_until(config.board.settle_timeout(), |state| {
        state.placed >= hand.len() && state.game_over.is_some()
    });
    if !settled {
        warn!(
            timeout_ms = config.board.settle_timeout_ms,
            "Board did not settle in time"
        );
    }

    let state = board.snapshot();
    info!(
        placed = state.placed,
        message = state.game_over.as_deref().unwrap_or("-"),
        table = %board.render(),
        "Final table"
    );
    info!(stats = ?bus.stats(), "Bus statistics");

    bus.dispose();
    Ok(())
}
