//! Cards and the 40-card Casino deck.
//!
//! This module contains:
//! - Suit and Rank, serialized as the symbols and rank strings clients display
//! - Card with its derived numeric value
//! - Deck construction, Fisher–Yates shuffling and dealing

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Player index (0 or 1)
pub type PlayerId = u8;

/// Number of seats at a Casino table
pub const PLAYER_COUNT: usize = 2;

/// Cards dealt to each player per round
pub const HAND_SIZE: usize = 10;

/// Cards in a full deck (4 suits x A-10)
pub const DECK_SIZE: usize = 40;

/// Card suit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Suit {
    #[serde(rename = "♠")]
    Spades,
    #[serde(rename = "♥")]
    Hearts,
    #[serde(rename = "♦")]
    Diamonds,
    #[serde(rename = "♣")]
    Clubs,
}

impl Suit {
    /// All suits in deck-building order
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

    pub fn symbol(&self) -> &'static str {
        match self {
            Suit::Spades => "♠",
            Suit::Hearts => "♥",
            Suit::Diamonds => "♦",
            Suit::Clubs => "♣",
        }
    }
}

/// Card rank. Casino is played without face cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "A")]
    Ace,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
}

impl Rank {
    /// All ranks, ace low
    pub const ALL: [Rank; 10] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
    ];

    /// The rank as clients write it ("A", "2".."10")
    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Ace => "A",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
        }
    }

    /// Numeric value used for captures and builds
    pub fn value(&self) -> u8 {
        rank_value(self.as_str())
    }
}

/// Value of a rank string: "A" is 1, numeric ranks are their number,
/// anything else is 0.
pub fn rank_value(rank: &str) -> u8 {
    if rank == "A" {
        return 1;
    }
    rank.parse().unwrap_or(0)
}

/// A playing card. `value` is always derived from `rank`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
    pub value: u8,
}

impl Card {
    pub fn new(suit: Suit, rank: Rank) -> Self {
        Self {
            suit,
            rank,
            value: rank.value(),
        }
    }

    /// Same physical card. Ignores `value`, which a client may have mangled.
    pub fn same_card(&self, other: &Card) -> bool {
        self.suit == other.suit && self.rank == other.rank
    }

    pub fn is_spade(&self) -> bool {
        self.suit == Suit::Spades
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank.as_str(), self.suit.symbol())
    }
}

/// Build the full 40-card deck, suit by suit.
pub fn build_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    for suit in Suit::ALL {
        for rank in Rank::ALL {
            deck.push(Card::new(suit, rank));
        }
    }
    deck
}

/// Fisher–Yates shuffle: walk from the last index down to 1, swapping each
/// slot with a uniformly chosen index at or below it.
pub fn shuffle<R: Rng>(deck: &mut [Card], rng: &mut R) {
    for i in (1..deck.len()).rev() {
        let j = rng.gen_range(0..=i);
        deck.swap(i, j);
    }
}

/// Deal `HAND_SIZE` cards to each player, alternating and popping from the
/// end of the deck. Stops early if the deck runs dry.
pub fn deal(deck: &mut Vec<Card>) -> [Vec<Card>; PLAYER_COUNT] {
    let mut hands: [Vec<Card>; PLAYER_COUNT] = [
        Vec::with_capacity(HAND_SIZE),
        Vec::with_capacity(HAND_SIZE),
    ];
    for _ in 0..HAND_SIZE {
        for hand in hands.iter_mut() {
            if let Some(card) = deck.pop() {
                hand.push(card);
            }
        }
    }
    hands
}

/// Sum of rank values
pub fn card_sum<'a>(cards: impl IntoIterator<Item = &'a Card>) -> u32 {
    cards.into_iter().map(|c| u32::from(c.rank.value())).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_rank_value() {
        assert_eq!(rank_value("A"), 1);
        assert_eq!(rank_value("7"), 7);
        assert_eq!(rank_value("10"), 10);
        assert_eq!(rank_value("K"), 0);
        assert_eq!(rank_value(""), 0);
    }

    #[test]
    fn test_build_deck_is_unique() {
        let deck = build_deck();
        assert_eq!(deck.len(), DECK_SIZE);

        let unique: HashSet<(Suit, Rank)> = deck.iter().map(|c| (c.suit, c.rank)).collect();
        assert_eq!(unique.len(), DECK_SIZE);
        assert!(deck.iter().all(|c| c.value == c.rank.value()));
    }

    #[test]
    fn test_shuffle_keeps_cards() {
        let mut deck = build_deck();
        let mut rng = StdRng::seed_from_u64(7);
        shuffle(&mut deck, &mut rng);

        let mut sorted = deck.clone();
        sorted.sort_by_key(|c| (c.suit, c.rank));
        assert_eq!(sorted, build_deck());
    }

    #[test]
    fn test_deal_alternates() {
        let mut deck = build_deck();
        let expected_first = deck[DECK_SIZE - 1];
        let expected_second = deck[DECK_SIZE - 2];

        let hands = deal(&mut deck);

        assert_eq!(hands[0].len(), HAND_SIZE);
        assert_eq!(hands[1].len(), HAND_SIZE);
        assert_eq!(deck.len(), DECK_SIZE - 2 * HAND_SIZE);
        assert_eq!(hands[0][0], expected_first);
        assert_eq!(hands[1][0], expected_second);
    }

    #[test]
    fn test_card_serializes_as_symbols() {
        let card = Card::new(Suit::Diamonds, Rank::Ten);
        let json = serde_json::to_value(card).unwrap();
        assert_eq!(json, serde_json::json!({"suit": "♦", "rank": "10", "value": 10}));
        assert_eq!(card.to_string(), "10♦");
    }
}
