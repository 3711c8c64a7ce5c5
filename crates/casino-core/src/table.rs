//! The shared table: loose cards, staging stacks and committed builds.
//!
//! This module contains:
//! - `TableItem`, the three-way sum type every table slot holds
//! - Staging stacks with source-tagged members
//! - Builds and the value rules that govern them
//! - `Table`, the ordered collection with lookup and placement helpers

use crate::card::{card_sum, Card, PlayerId};
use serde::{Deserialize, Serialize};

/// Highest value a build may reach
pub const MAX_BUILD_VALUE: u32 = 10;

/// Where a staging stack member came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardSource {
    Hand,
    Table,
}

/// A card inside a staging stack, tagged with its origin so that a
/// cancellation can send it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackCard {
    #[serde(flatten)]
    pub card: Card,
    pub source: CardSource,
}

impl StackCard {
    pub fn from_hand(card: Card) -> Self {
        Self {
            card,
            source: CardSource::Hand,
        }
    }

    pub fn from_table(card: Card) -> Self {
        Self {
            card,
            source: CardSource::Table,
        }
    }
}

/// An uncommitted build proposal owned by one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporaryStack {
    pub stack_id: String,
    pub cards: Vec<StackCard>,
    pub owner: PlayerId,
    /// Sum of member rank values
    pub value: u32,
}

impl TemporaryStack {
    pub fn new(stack_id: String, owner: PlayerId, cards: Vec<StackCard>) -> Self {
        let value = card_sum(cards.iter().map(|c| &c.card));
        Self {
            stack_id,
            cards,
            owner,
            value,
        }
    }

    pub fn push(&mut self, card: StackCard) {
        self.value += u32::from(card.card.rank.value());
        self.cards.push(card);
    }

    pub fn hand_cards(&self) -> impl Iterator<Item = Card> + '_ {
        self.cards
            .iter()
            .filter(|c| c.source == CardSource::Hand)
            .map(|c| c.card)
    }

    pub fn table_cards(&self) -> impl Iterator<Item = Card> + '_ {
        self.cards
            .iter()
            .filter(|c| c.source == CardSource::Table)
            .map(|c| c.card)
    }

    /// A stack can become a build once it holds at least one card from
    /// each side.
    pub fn can_finalize(&self) -> bool {
        self.hand_cards().next().is_some() && self.table_cards().next().is_some()
    }

    /// Members with their source tags dropped
    pub fn plain_cards(&self) -> Vec<Card> {
        self.cards.iter().map(|c| c.card).collect()
    }
}

/// A committed build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub build_id: String,
    pub cards: Vec<Card>,
    pub value: u32,
    pub owner: PlayerId,
    pub is_extendable: bool,
}

/// Anything that can occupy a table slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableItem {
    Loose(Card),
    TemporaryStack(TemporaryStack),
    Build(Build),
}

impl TableItem {
    /// Value a hand card must match to capture this item
    pub fn capture_value(&self) -> u32 {
        match self {
            TableItem::Loose(card) => u32::from(card.rank.value()),
            TableItem::Build(build) => build.value,
            TableItem::TemporaryStack(stack) => card_sum(stack.cards.iter().map(|c| &c.card)),
        }
    }

    /// All physical cards in this item, staging tags dropped
    pub fn cards(&self) -> Vec<Card> {
        match self {
            TableItem::Loose(card) => vec![*card],
            TableItem::TemporaryStack(stack) => stack.plain_cards(),
            TableItem::Build(build) => build.cards.clone(),
        }
    }

    /// Same table object: loose cards compare by suit and rank, stacks and
    /// builds by id.
    pub fn same_item(&self, other: &TableItem) -> bool {
        match (self, other) {
            (TableItem::Loose(a), TableItem::Loose(b)) => a.same_card(b),
            (TableItem::TemporaryStack(a), TableItem::TemporaryStack(b)) => {
                a.stack_id == b.stack_id
            }
            (TableItem::Build(a), TableItem::Build(b)) => a.build_id == b.build_id,
            _ => false,
        }
    }

    pub fn as_loose(&self) -> Option<&Card> {
        match self {
            TableItem::Loose(card) => Some(card),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TableItem::Loose(card) => card.to_string(),
            TableItem::TemporaryStack(stack) => format!("temp({})", stack.value),
            TableItem::Build(build) => format!("Build({})", build.value),
        }
    }
}

/// The ordered table. Order is only for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    items: Vec<TableItem>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<TableItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[TableItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableItem> {
        self.items.iter()
    }

    /// Total physical cards on the table
    pub fn card_count(&self) -> usize {
        self.items.iter().map(|item| item.cards().len()).sum()
    }

    pub fn position_of(&self, item: &TableItem) -> Option<usize> {
        self.items.iter().position(|i| i.same_item(item))
    }

    pub fn loose_position(&self, card: &Card) -> Option<usize> {
        self.items
            .iter()
            .position(|i| matches!(i, TableItem::Loose(c) if c.same_card(card)))
    }

    pub fn find_loose(&self, card: &Card) -> Option<&Card> {
        self.loose_position(card)
            .and_then(|idx| self.items[idx].as_loose())
    }

    pub fn has_loose_of_value(&self, value: u8) -> bool {
        self.items
            .iter()
            .any(|i| matches!(i, TableItem::Loose(c) if c.rank.value() == value))
    }

    pub fn stack_position(&self, stack_id: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|i| matches!(i, TableItem::TemporaryStack(s) if s.stack_id == stack_id))
    }

    pub fn find_stack(&self, stack_id: &str) -> Option<&TemporaryStack> {
        self.items.iter().find_map(|i| match i {
            TableItem::TemporaryStack(s) if s.stack_id == stack_id => Some(s),
            _ => None,
        })
    }

    pub fn find_stack_mut(&mut self, stack_id: &str) -> Option<&mut TemporaryStack> {
        self.items.iter_mut().find_map(|i| match i {
            TableItem::TemporaryStack(s) if s.stack_id == stack_id => Some(s),
            _ => None,
        })
    }

    pub fn build_position(&self, build_id: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|i| matches!(i, TableItem::Build(b) if b.build_id == build_id))
    }

    pub fn find_build(&self, build_id: &str) -> Option<&Build> {
        self.items.iter().find_map(|i| match i {
            TableItem::Build(b) if b.build_id == build_id => Some(b),
            _ => None,
        })
    }

    pub fn find_build_mut(&mut self, build_id: &str) -> Option<&mut Build> {
        self.items.iter_mut().find_map(|i| match i {
            TableItem::Build(b) if b.build_id == build_id => Some(b),
            _ => None,
        })
    }

    /// Whether `player` owns a committed build
    pub fn has_build_owned_by(&self, player: PlayerId) -> bool {
        self.items
            .iter()
            .any(|i| matches!(i, TableItem::Build(b) if b.owner == player))
    }

    /// The staging stack owned by `player`, if any
    pub fn stack_owned_by(&self, player: PlayerId) -> Option<&TemporaryStack> {
        self.items.iter().find_map(|i| match i {
            TableItem::TemporaryStack(s) if s.owner == player => Some(s),
            _ => None,
        })
    }

    pub fn stacks(&self) -> impl Iterator<Item = &TemporaryStack> {
        self.items.iter().filter_map(|i| match i {
            TableItem::TemporaryStack(s) => Some(s),
            _ => None,
        })
    }

    pub fn builds(&self) -> impl Iterator<Item = &Build> {
        self.items.iter().filter_map(|i| match i {
            TableItem::Build(b) => Some(b),
            _ => None,
        })
    }

    /// Append an item at the end of the table
    pub fn place(&mut self, item: TableItem) {
        self.items.push(item);
    }

    pub fn remove(&mut self, idx: usize) -> TableItem {
        self.items.remove(idx)
    }

    /// Empty the table, returning everything that was on it
    pub fn clear(&mut self) -> Vec<TableItem> {
        std::mem::take(&mut self.items)
    }
}

/// Every value 1..=10 these cards can be committed to as one build: the
/// plain total, or any value the cards split evenly into.
pub fn build_value_options(cards: &[Card]) -> Vec<u32> {
    let values: Vec<u32> = cards.iter().map(|c| u32::from(c.rank.value())).collect();
    if values.is_empty() {
        return Vec::new();
    }
    (1..=MAX_BUILD_VALUE)
        .filter(|&target| can_partition(&values, target))
        .collect()
}

/// Whether `values` splits into groups that each sum to exactly `target`.
fn can_partition(values: &[u32], target: u32) -> bool {
    let total: u32 = values.iter().sum();
    if target == 0 || total % target != 0 || values.iter().any(|&v| v > target || v == 0) {
        return false;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let mut groups = vec![0u32; (total / target) as usize];
    fill_groups(&sorted, 0, &mut groups, target)
}

fn fill_groups(values: &[u32], idx: usize, groups: &mut [u32], target: u32) -> bool {
    let Some(&value) = values.get(idx) else {
        return true;
    };

    for i in 0..groups.len() {
        if groups[i] + value <= target {
            groups[i] += value;
            if fill_groups(values, idx + 1, groups, target) {
                return true;
            }
            groups[i] -= value;
        }
        // Empty groups are interchangeable
        if groups[i] == 0 {
            break;
        }
    }
    false
}
