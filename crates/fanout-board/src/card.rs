//! Card model for the board demo.

use std::fmt;

/// Card colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Colour {
    Red,
    Yellow,
    Green,
    Blue,
}

impl Colour {
    /// Every colour, in deck order.
    pub const ALL: [Colour; 4] = [Colour::Red, Colour::Yellow, Colour::Green, Colour::Blue];

    /// Upper-case name used in asset keys.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Colour::Red => "RED",
            Colour::Yellow => "YELLOW",
            Colour::Green => "GREEN",
            Colour::Blue => "BLUE",
        }
    }
}

/// Card number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Number {
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
}

impl Number {
    /// Every number, in deck order.
    pub const ALL: [Number; 10] = [
        Number::One,
        Number::Two,
        Number::Three,
        Number::Four,
        Number::Five,
        Number::Six,
        Number::Seven,
        Number::Eight,
        Number::Nine,
        Number::Ten,
    ];

    /// Upper-case name used in asset keys.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Number::One => "ONE",
            Number::Two => "TWO",
            Number::Three => "THREE",
            Number::Four => "FOUR",
            Number::Five => "FIVE",
            Number::Six => "SIX",
            Number::Seven => "SEVEN",
            Number::Eight => "EIGHT",
            Number::Nine => "NINE",
            Number::Ten => "TEN",
        }
    }
}

/// A playing card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Card {
    pub colour: Colour,
    pub number: Number,
}

impl Card {
    #[must_use]
    pub fn new(colour: Colour, number: Number) -> Self {
        Self { colour, number }
    }

    /// Key of the card's image, e.g. `RED_ONE`.
    #[must_use]
    pub fn asset_key(&self) -> String {
        asset_key(self.colour, self.number)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.colour.name(), self.number.name())
    }
}

pub(crate) fn asset_key(colour: Colour, number: Number) -> String {
    format!("{}_{}", colour.name(), number.name())
}

/// The full deck, colour-major.
#[must_use]
pub fn deck() -> Vec<Card> {
    Colour::ALL
        .iter()
        .flat_map(|&colour| Number::ALL.iter().map(move |&number| Card::new(colour, number)))
        .collect()
}

/// Deal `count` cards from the deck, starting `offset` cards in and wrapping
/// around.
#[must_use]
pub fn deal(offset: usize, count: usize) -> Vec<Card> {
    deck().into_iter().cycle().skip(offset).take(count).collect()
}
