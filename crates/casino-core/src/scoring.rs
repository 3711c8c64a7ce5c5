//! End-of-game scoring.
//!
//! Standard Casino awards, on a 40-card deck (11 points available):
//! - Most cards: 3 (nobody on a tie)
//! - Most spades: 1 (nobody on a tie)
//! - Big casino (10♦): 2
//! - Little casino (2♠): 1
//! - Each ace: 1

use crate::card::{Card, PlayerId, Rank, Suit};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const MOST_CARDS_POINTS: u32 = 3;
const MOST_SPADES_POINTS: u32 = 1;
const BIG_CASINO_POINTS: u32 = 2;
const LITTLE_CASINO_POINTS: u32 = 1;
const ACE_POINTS: u32 = 1;

/// One player's scoring breakdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    /// Cards captured
    pub card_count: u32,
    /// Spades captured
    pub spade_count: u32,
    pub most_cards: u32,
    pub most_spades: u32,
    pub big_casino: u32,
    pub little_casino: u32,
    pub aces: u32,
    pub total: u32,
}

/// Score both players' capture piles.
pub fn score_captures(captures: &[Vec<Vec<Card>>; 2]) -> [ScoreBreakdown; 2] {
    let mut sheets = [ScoreBreakdown::default(), ScoreBreakdown::default()];

    for (sheet, groups) in sheets.iter_mut().zip(captures.iter()) {
        for card in groups.iter().flatten() {
            sheet.card_count += 1;
            if card.is_spade() {
                sheet.spade_count += 1;
            }
            match (card.rank, card.suit) {
                (Rank::Ten, Suit::Diamonds) => sheet.big_casino = BIG_CASINO_POINTS,
                (Rank::Two, Suit::Spades) => sheet.little_casino = LITTLE_CASINO_POINTS,
                _ => {}
            }
            if card.rank == Rank::Ace {
                sheet.aces += ACE_POINTS;
            }
        }
    }

    if let Some(leader) = leader(sheets[0].card_count, sheets[1].card_count) {
        sheets[leader].most_cards = MOST_CARDS_POINTS;
    }
    if let Some(leader) = leader(sheets[0].spade_count, sheets[1].spade_count) {
        sheets[leader].most_spades = MOST_SPADES_POINTS;
    }

    for sheet in &mut sheets {
        sheet.total = sheet.most_cards
            + sheet.most_spades
            + sheet.big_casino
            + sheet.little_casino
            + sheet.aces;
    }

    sheets
}

/// Player with the strictly higher score, if any
pub fn winner(scores: &[u32; 2]) -> Option<PlayerId> {
    leader(scores[0], scores[1]).map(|idx| idx as PlayerId)
}

fn leader(a: u32, b: u32) -> Option<usize> {
    match a.cmp(&b) {
        Ordering::Greater => Some(0),
        Ordering::Less => Some(1),
        Ordering::Equal => None,
    }
}
