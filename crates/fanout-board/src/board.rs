//! Console board: a bus listener that lays cards out on a table.

use crate::card::{self, Card, Colour, Number};
use anyhow::{anyhow, Context, Result};
use fanout_core::Listener;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

/// Events the board reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// Put `card` at `position` (1-based).
    CardPlaced { card: Card, position: usize },
    /// The game has ended.
    GameOver { message: String },
}

/// Table contents.
#[derive(Debug, Clone, Default)]
pub struct BoardState {
    /// One slot per position.
    pub slots: Vec<Option<Card>>,
    /// Number of successful placements.
    pub placed: usize,
    /// Final message, once the game is over.
    pub game_over: Option<String>,
}

/// Board that renders to the log instead of a window.
pub struct ConsoleBoard {
    /// Card image path by asset key.
    assets: HashMap<String, PathBuf>,
    state: Mutex<BoardState>,
    changed: Condvar,
}

impl ConsoleBoard {
    /// Create a board with `positions` empty slots and every card image
    /// resolved up front.
    #[must_use]
    pub fn new(positions: usize) -> Self {
        let assets = Colour::ALL
            .iter()
            .flat_map(|&colour| Number::ALL.iter().map(move |&number| (colour, number)))
            .map(|(colour, number)| {
                let key = card::asset_key(colour, number);
                let path = PathBuf::from(format!("images/cards/{key}.png"));
                (key, path)
            })
            .collect();

        Self {
            assets,
            state: Mutex::new(BoardState {
                slots: vec![None; positions],
                ..BoardState::default()
            }),
            changed: Condvar::new(),
        }
    }

    /// Place a card at a 1-based position, replacing whatever was there.
    ///
    /// # Errors
    ///
    /// Returns an error if the position is off the board or the card has no
    /// image.
    pub fn put_card_at_position(&self, card: Card, position: usize) -> Result<()> {
        let key = card.asset_key();
        let asset = self
            .assets
            .get(&key)
            .with_context(|| format!("No image for card {key}"))?;

        let mut state = self.state.lock();
        let positions = state.slots.len();
        let index = match position.checked_sub(1) {
            Some(index) if index < positions => index,
            _ => return Err(anyhow!("Position {position} is off the board (1..={positions})")),
        };
        state.slots[index] = Some(card);
        state.placed += 1;
        drop(state);

        info!(position, card = %card, asset = %asset.display(), "Card placed");
        self.changed.notify_all();
        Ok(())
    }

    /// Record and show the end-of-game message.
    pub fn show_message(&self, message: &str) {
        self.state.lock().game_over = Some(message.to_string());
        info!(message, "Game over");
        self.changed.notify_all();
    }

    /// Copy of the current table.
    #[must_use]
    pub fn snapshot(&self) -> BoardState {
        self.state.lock().clone()
    }

    /// Block until `done` holds for the table or `timeout` elapses.
    ///
    /// Returns whether `done` held.
    pub fn wait_until(&self, timeout: Duration, done: impl Fn(&BoardState) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !done(&state) {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return done(&state);
            }
        }
        true
    }

    /// One-line rendering of the table, `--` for empty slots.
    #[must_use]
    pub fn render(&self) -> String {
        self.state
            .lock()
            .slots
            .iter()
            .map(|slot| match slot {
                Some(card) => format!("[{}]", card.asset_key()),
                None => "[--]".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Listener<BoardEvent> for ConsoleBoard {
    fn notify(&self, event: &BoardEvent) -> Result<()> {
        match event {
            BoardEvent::CardPlaced { card, position } => {
                self.put_card_at_position(*card, *position)
            }
            BoardEvent::GameOver { message } => {
                self.show_message(message);
                Ok(())
            }
        }
    }

    fn name(&self) -> &str {
        "console-board"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_core::{EventBus, SharedListener};
    use std::sync::Arc;

    fn red(number: Number) -> Card {
        Card::new(Colour::Red, number)
    }

    #[test]
    fn test_put_card_at_position() {
        let board = ConsoleBoard::new(3);

        board.put_card_at_position(red(Number::One), 1).unwrap();
        board.put_card_at_position(red(Number::Two), 3).unwrap();

        let state = board.snapshot();
        assert_eq!(state.slots, vec![Some(red(Number::One)), None, Some(red(Number::Two))]);
        assert_eq!(state.placed, 2);
        assert_eq!(board.render(), "[RED_ONE] [--] [RED_TWO]");
    }

    #[test]
    fn test_off_board_positions_are_rejected() {
        let board = ConsoleBoard::new(2);

        assert!(board.put_card_at_position(red(Number::One), 0).is_err());
        assert!(board.put_card_at_position(red(Number::One), 3).is_err());
        assert_eq!(board.snapshot().placed, 0);
    }

    #[test]
    fn test_game_over_message() {
        let board = ConsoleBoard::new(1);
        board
            .notify(&BoardEvent::GameOver {
                message: "Game Over".to_string(),
            })
            .unwrap();

        assert_eq!(board.snapshot().game_over.as_deref(), Some("Game Over"));
    }

    #[test]
    fn test_wait_until_times_out() {
        let board = ConsoleBoard::new(1);
        assert!(!board.wait_until(Duration::from_millis(20), |s| s.placed > 0));
    }

    #[test]
    fn test_board_driven_by_bus() {
        let bus = EventBus::<BoardEvent>::new().unwrap();
        let board = Arc::new(ConsoleBoard::new(4));
        let listener: SharedListener<BoardEvent> = board.clone();
        bus.register_listener(listener).unwrap();

        let dealt = card::deal(5, 4);
        for (index, card) in dealt.iter().enumerate() {
            bus.publish(BoardEvent::CardPlaced {
                card: *card,
                position: index + 1,
            })
            .unwrap();
        }
        // Off the board: fails in the listener, not in the bus.
        bus.publish(BoardEvent::CardPlaced {
            card: dealt[0],
            position: 9,
        })
        .unwrap();
        bus.publish(BoardEvent::GameOver {
            message: "done".to_string(),
        })
        .unwrap();

        assert!(board.wait_until(Duration::from_secs(5), |s| {
            s.placed == 4 && s.game_over.is_some()
        }));
        let state = board.snapshot();
        let laid: Vec<Card> = state.slots.into_iter().flatten().collect();
        assert_eq!(laid, dealt);

        let deadline = Instant::now() + Duration::from_secs(5);
        while bus.stats().failed == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(bus.stats().failed, 1);
    }
}
