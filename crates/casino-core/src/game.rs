//! Core game state and move handlers.
//!
//! This module contains the `GameState` aggregate and one handler per move
//! kind. Handlers borrow the current state, validate against it, and hand
//! back a successor in a `Transition`; a rejected move leaves the input
//! exactly as it was.

use crate::actions::{BuildProposal, DraggedItem, GameEvent, GameMove};
use crate::card::{build_deck, deal, shuffle, Card, PlayerId, DECK_SIZE, PLAYER_COUNT};
use crate::rules::{
    build_pair, card_value, holds_capture_card, opponent_extension_value, trail_locked_by_build,
};
use crate::scoring::{self, ScoreBreakdown};
use crate::table::{
    build_value_options, Build, StackCard, Table, TableItem, TemporaryStack, MAX_BUILD_VALUE,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur when applying moves
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Not your turn")]
    NotYourTurn,

    #[error("Game is over")]
    GameOver,

    #[error("Card not found in hand")]
    CardNotInHand,

    #[error("Table card not found")]
    TableCardNotFound,

    #[error("Staging stack not found")]
    StackNotFound,

    #[error("Build not found")]
    BuildNotFound,

    #[error("Build value {value} would exceed 10")]
    BuildValueExceeded { value: u32 },

    #[error("You can only have one staging stack at a time")]
    StagingStackExists,

    #[error("You already have a build on the table")]
    BuildAlreadyOwned,

    #[error("You need a card in hand worth {value} to build it")]
    MissingCaptureCard { value: u32 },

    #[error("That staging stack belongs to the other player")]
    NotStackOwner,

    #[error("That build belongs to the other player")]
    NotBuildOwner,

    #[error("That is your own build")]
    CannotExtendOwnBuildAsOpponent,

    #[error("That build can no longer be extended")]
    BuildNotExtendable,

    #[error("A staging stack needs a hand card and a table card")]
    IncompleteStack,

    #[error("Cannot build {value} from these cards")]
    InvalidBuildValue { value: u32 },

    #[error("Choose a build value: {options:?}")]
    BuildValueRequired { options: Vec<u32> },

    #[error("Card value does not match the selected table cards")]
    ValueMismatch,

    #[error("Invalid table selection")]
    InvalidSelection,

    #[error("Cannot trail while your build is on the table in the first round")]
    TrailLockedByBuild,

    #[error("A loose card of that rank is already on the table")]
    DuplicateLooseRank,
}

/// Result of a structural check of a game state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// A successful move: the successor state and what happened on the way
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: GameState,
    pub events: Vec<GameEvent>,
}

/// The complete game state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Undealt cards; dealing pops from the end
    pub deck: Vec<Card>,
    pub player_hands: [Vec<Card>; PLAYER_COUNT],
    pub table_cards: Table,
    /// Capture groups per player, one group per capturing move
    pub player_captures: [Vec<Vec<Card>>; PLAYER_COUNT],
    pub current_player: PlayerId,
    /// Deal number, starting at 1
    pub round: u32,
    pub scores: [u32; PLAYER_COUNT],
    pub game_over: bool,
    pub winner: Option<PlayerId>,
    pub last_capturer: Option<PlayerId>,
    pub score_details: Option<[ScoreBreakdown; PLAYER_COUNT]>,
    /// Source of stack and build ids
    #[serde(default)]
    next_item_id: u32,
}

/// Build, shuffle and deal a fresh game using OS randomness
pub fn initialize_game() -> GameState {
    GameState::new()
}

impl GameState {
    /// Create a new game shuffled with the thread RNG
    pub fn new() -> Self {
        Self::with_rng(&mut rand::thread_rng())
    }

    /// Create a new game with a reproducible shuffle
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(&mut StdRng::seed_from_u64(seed))
    }

    pub fn with_rng<R: Rng>(rng: &mut R) -> Self {
        let mut deck = build_deck();
        shuffle(&mut deck, rng);
        let player_hands = deal(&mut deck);

        Self {
            deck,
            player_hands,
            table_cards: Table::new(),
            player_captures: [Vec::new(), Vec::new()],
            current_player: 0,
            round: 1,
            scores: [0, 0],
            game_over: false,
            winner: None,
            last_capturer: None,
            score_details: None,
            next_item_id: 0,
        }
    }

    /// A round-1 position with chosen hands and table. Every card not
    /// placed goes into the deck, so the 40-card partition holds.
    pub fn from_layout(player_hands: [Vec<Card>; PLAYER_COUNT], table: Vec<TableItem>) -> Self {
        let placed: HashSet<Card> = player_hands
            .iter()
            .flatten()
            .copied()
            .chain(table.iter().flat_map(TableItem::cards))
            .collect();
        let deck = build_deck()
            .into_iter()
            .filter(|c| !placed.contains(c))
            .collect();

        Self {
            deck,
            player_hands,
            table_cards: Table::from_items(table),
            player_captures: [Vec::new(), Vec::new()],
            current_player: 0,
            round: 1,
            scores: [0, 0],
            game_over: false,
            winner: None,
            last_capturer: None,
            score_details: None,
            next_item_id: 0,
        }
    }

    pub fn hand(&self, player: PlayerId) -> &[Card] {
        self.player_hands
            .get(player as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All cards a player has captured
    pub fn captured_cards(&self, player: PlayerId) -> impl Iterator<Item = &Card> {
        self.player_captures
            .get(player as usize)
            .into_iter()
            .flatten()
            .flatten()
    }

    pub fn is_finished(&self) -> bool {
        self.game_over
    }

    pub fn get_winner(&self) -> Option<PlayerId> {
        self.winner
    }

    /// Every card in the game, wherever it is
    pub fn all_cards(&self) -> Vec<Card> {
        let mut cards = self.deck.clone();
        cards.extend(self.player_hands.iter().flatten().copied());
        cards.extend(self.table_cards.iter().flat_map(TableItem::cards));
        cards.extend(self.player_captures.iter().flatten().flatten().copied());
        cards
    }

    /// Structural check for states that arrive from outside the engine
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();

        if self.current_player as usize >= PLAYER_COUNT {
            errors.push(format!("currentPlayer must be 0 or 1, got {}", self.current_player));
        }
        if self.round == 0 {
            errors.push("round must start at 1".to_string());
        }

        let mut check_cards = |cards: &[Card], location: &str| {
            for (idx, card) in cards.iter().enumerate() {
                if card.value != card.rank.value() {
                    errors.push(format!(
                        "{}[{}] has value {} but rank {} is worth {}",
                        location,
                        idx,
                        card.value,
                        card.rank.as_str(),
                        card.rank.value()
                    ));
                }
            }
        };
        check_cards(self.deck.as_slice(), "deck");
        check_cards(self.player_hands[0].as_slice(), "playerHands[0]");
        check_cards(self.player_hands[1].as_slice(), "playerHands[1]");
        for (idx, item) in self.table_cards.iter().enumerate() {
            check_cards(item.cards().as_slice(), &format!("tableCards[{}]", idx));
        }

        let all = self.all_cards();
        if all.len() != DECK_SIZE {
            errors.push(format!("expected {} cards in play, found {}", DECK_SIZE, all.len()));
        }
        let mut seen = HashSet::new();
        for card in &all {
            if !seen.insert((card.suit, card.rank)) {
                errors.push(format!("duplicate card {}", card));
            }
        }

        let mut stack_owners = HashSet::new();
        for item in self.table_cards.iter() {
            match item {
                TableItem::Build(build) => {
                    if build.value == 0 || build.value > MAX_BUILD_VALUE {
                        errors.push(format!("build {} has value {}", build.build_id, build.value));
                    }
                    if build.owner as usize >= PLAYER_COUNT {
                        errors.push(format!("build {} has no valid owner", build.build_id));
                    }
                }
                TableItem::TemporaryStack(stack) => {
                    if stack.owner as usize >= PLAYER_COUNT {
                        errors.push(format!("stack {} has no valid owner", stack.stack_id));
                    }
                    if !stack_owners.insert(stack.owner) {
                        errors.push(format!("player {} owns more than one staging stack", stack.owner));
                    }
                }
                TableItem::Loose(_) => {}
            }
        }

        if self.winner.is_some() && !self.game_over {
            errors.push("winner set before the game is over".to_string());
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    // ==================== Dispatch ====================

    /// Apply a submitted move for `player`
    pub fn apply_move(&self, player: PlayerId, mv: &GameMove) -> Result<Transition, GameError> {
        let result = match mv {
            GameMove::Trail { card } => self.trail(player, card),
            GameMove::Capture {
                dragged_item,
                selected_table_cards,
                ..
            } => self.capture(player, dragged_item, selected_table_cards),
            GameMove::Build(proposal) => self.build(player, proposal),
            GameMove::AddToOwnBuild {
                dragged_item,
                build_id,
            } => self.add_to_own_build(player, dragged_item, build_id),
            GameMove::AddToOpponentBuild {
                dragged_item,
                build_id,
            } => self.add_to_opponent_build(player, dragged_item, build_id),
            GameMove::FinalizeStagingStack { stack_id } => {
                self.finalize_staging_stack(player, stack_id)
            }
            GameMove::CreateBuildWithValue {
                stack_id,
                build_value,
            } => self.create_build_with_value(player, stack_id, *build_value),
            GameMove::CreateStagingStack {
                hand_card,
                table_card,
            } => self.create_staging_stack(player, hand_card, table_card),
            GameMove::AddToStagingStack {
                hand_card,
                stack_id,
            } => self.add_to_staging_stack(player, hand_card, stack_id),
            GameMove::AddToTemporaryCaptureStack {
                table_card,
                stack_id,
            } => self.add_to_temporary_capture_stack(player, table_card, stack_id),
            GameMove::TableCardDrop {
                dragged_card,
                target_card,
            } => self.table_card_drop(player, dragged_card, target_card),
            GameMove::CancelStagingStack { stack_id } => {
                self.cancel_staging_stack(player, stack_id)
            }
        };

        match &result {
            Ok(transition) => debug!(
                player,
                action = mv.action_type(),
                table = %describe_table(&transition.state.table_cards),
                "move applied"
            ),
            Err(e) => warn!(player, action = mv.action_type(), error = %e, "move rejected"),
        }

        result
    }

    /// Apply a move, or get an unchanged copy of this state if it is rejected
    pub fn apply_or_unchanged(&self, player: PlayerId, mv: &GameMove) -> GameState {
        match self.apply_move(player, mv) {
            Ok(transition) => transition.state,
            Err(_) => self.clone(),
        }
    }

    // ==================== Turn-ending Moves ====================

    /// Put a hand card on the table as a loose card
    pub fn trail(&self, player: PlayerId, card: &Card) -> Result<Transition, GameError> {
        self.ensure_can_act(player)?;
        let hand_idx = self.hand_position(player, card)?;

        if trail_locked_by_build(self, player) {
            return Err(GameError::TrailLockedByBuild);
        }
        if self.table_cards.has_loose_of_value(card.rank.value()) {
            return Err(GameError::DuplicateLooseRank);
        }

        let mut next = self.clone();
        let card = next.player_hands[player as usize].remove(hand_idx);
        next.table_cards.place(TableItem::Loose(card));

        let mut events = vec![GameEvent::CardTrailed { player, card }];
        next.finish_turn(player, &mut events);
        Ok(Transition {
            state: next,
            events,
        })
    }

    /// Take the selected table items with a matching hand card
    pub fn capture(
        &self,
        player: PlayerId,
        dragged: &DraggedItem,
        selected: &[TableItem],
    ) -> Result<Transition, GameError> {
        self.ensure_can_act(player)?;
        let hand_idx = self.hand_position(player, &dragged.card)?;
        if selected.is_empty() {
            return Err(GameError::InvalidSelection);
        }

        let capture_value = card_value(&dragged.card);
        let mut positions = Vec::with_capacity(selected.len());
        for item in selected {
            let pos = self
                .table_cards
                .position_of(item)
                .ok_or(GameError::TableCardNotFound)?;
            if positions.contains(&pos) {
                return Err(GameError::InvalidSelection);
            }
            if self.table_cards.items()[pos].capture_value() != capture_value {
                return Err(GameError::ValueMismatch);
            }
            positions.push(pos);
        }
        positions.sort_unstable();

        let mut next = self.clone();
        let hand_card = next.player_hands[player as usize].remove(hand_idx);
        let mut group = vec![hand_card];
        let mut taken = Vec::with_capacity(positions.len());
        for &pos in positions.iter().rev() {
            taken.push(next.table_cards.remove(pos));
        }
        group.extend(taken.iter().rev().flat_map(TableItem::cards));

        next.player_captures[player as usize].push(group.clone());
        next.last_capturer = Some(player);

        let mut events = vec![GameEvent::Captured {
            player,
            cards: group,
        }];
        next.finish_turn(player, &mut events);
        Ok(Transition {
            state: next,
            events,
        })
    }

    /// Combine a hand card and a loose table card into a new build
    pub fn build(&self, player: PlayerId, proposal: &BuildProposal) -> Result<Transition, GameError> {
        self.ensure_can_act(player)?;
        let hand_card = proposal.dragged_item.card;
        let hand_idx = self.hand_position(player, &hand_card)?;

        let [table_ref] = proposal.table_cards_in_build.as_slice() else {
            return Err(GameError::InvalidSelection);
        };
        let table_idx = self
            .table_cards
            .loose_position(table_ref)
            .ok_or(GameError::TableCardNotFound)?;

        let build_value = card_value(&hand_card) + card_value(table_ref);
        if build_value > MAX_BUILD_VALUE {
            return Err(GameError::BuildValueExceeded { value: build_value });
        }
        if proposal.build_value != build_value {
            return Err(GameError::InvalidBuildValue {
                value: proposal.build_value,
            });
        }
        if self.table_cards.has_build_owned_by(player) {
            return Err(GameError::BuildAlreadyOwned);
        }
        if !holds_capture_card(self.hand(player), &hand_card, build_value) {
            return Err(GameError::MissingCaptureCard { value: build_value });
        }

        let mut next = self.clone();
        let hand_card = next.player_hands[player as usize].remove(hand_idx);
        let table_card = match next.table_cards.remove(table_idx) {
            TableItem::Loose(card) => card,
            _ => return Err(GameError::TableCardNotFound),
        };
        let (bigger, smaller) = build_pair(hand_card, table_card);

        let build_id = next.next_id("build");
        next.table_cards.place(TableItem::Build(Build {
            build_id: build_id.clone(),
            cards: vec![bigger, smaller],
            value: build_value,
            owner: player,
            is_extendable: true,
        }));

        let mut events = vec![GameEvent::BuildCreated {
            player,
            build_id,
            value: build_value,
        }];
        next.finish_turn(player, &mut events);
        Ok(Transition {
            state: next,
            events,
        })
    }

    /// Add a hand card to your own build
    pub fn add_to_own_build(
        &self,
        player: PlayerId,
        dragged: &DraggedItem,
        build_id: &str,
    ) -> Result<Transition, GameError> {
        self.ensure_can_act(player)?;
        let hand_idx = self.hand_position(player, &dragged.card)?;
        let build = self
            .table_cards
            .find_build(build_id)
            .ok_or(GameError::BuildNotFound)?;
        if build.owner != player {
            return Err(GameError::NotBuildOwner);
        }

        let new_value = build.value + card_value(&dragged.card);
        if new_value > MAX_BUILD_VALUE {
            return Err(GameError::BuildValueExceeded { value: new_value });
        }

        self.extend_build(player, hand_idx, build_id, new_value)
    }

    /// Add a hand card to the opponent's build
    pub fn add_to_opponent_build(
        &self,
        player: PlayerId,
        dragged: &DraggedItem,
        build_id: &str,
    ) -> Result<Transition, GameError> {
        self.ensure_can_act(player)?;
        let hand_idx = self.hand_position(player, &dragged.card)?;
        let build = self
            .table_cards
            .find_build(build_id)
            .ok_or(GameError::BuildNotFound)?;
        if build.owner == player {
            return Err(GameError::CannotExtendOwnBuildAsOpponent);
        }
        if !build.is_extendable {
            return Err(GameError::BuildNotExtendable);
        }

        let added = card_value(&dragged.card);
        let new_value = opponent_extension_value(build, added).ok_or(
            GameError::BuildValueExceeded {
                value: build.value + added,
            },
        )?;

        self.extend_build(player, hand_idx, build_id, new_value)
    }

    /// Commit your staging stack. Only works when the stack's cards allow
    /// exactly one build value; otherwise the player must pick one.
    pub fn finalize_staging_stack(
        &self,
        player: PlayerId,
        stack_id: &str,
    ) -> Result<Transition, GameError> {
        self.ensure_can_act(player)?;
        let stack = self.owned_stack(player, stack_id)?;
        if !stack.can_finalize() {
            return Err(GameError::IncompleteStack);
        }

        let options = build_value_options(&stack.plain_cards());
        match options.len() {
            0 => Err(GameError::InvalidBuildValue { value: stack.value }),
            1 => self.commit_stack(player, stack_id, options[0]),
            _ => Err(GameError::BuildValueRequired { options }),
        }
    }

    /// Commit your staging stack at a chosen value
    pub fn create_build_with_value(
        &self,
        player: PlayerId,
        stack_id: &str,
        build_value: u32,
    ) -> Result<Transition, GameError> {
        self.ensure_can_act(player)?;
        let stack = self.owned_stack(player, stack_id)?;
        if !stack.can_finalize() {
            return Err(GameError::IncompleteStack);
        }
        if !build_value_options(&stack.plain_cards()).contains(&build_value) {
            return Err(GameError::InvalidBuildValue { value: build_value });
        }

        self.commit_stack(player, stack_id, build_value)
    }

    // ==================== Staging Moves ====================

    /// Pair a hand card with a loose table card in a new staging stack
    pub fn create_staging_stack(
        &self,
        player: PlayerId,
        hand_card: &Card,
        table_card: &Card,
    ) -> Result<Transition, GameError> {
        self.ensure_can_act(player)?;
        let hand_idx = self.hand_position(player, hand_card)?;
        let table_idx = self
            .table_cards
            .loose_position(table_card)
            .ok_or(GameError::TableCardNotFound)?;
        if self.table_cards.stack_owned_by(player).is_some() {
            return Err(GameError::StagingStackExists);
        }

        let mut next = self.clone();
        let hand_card = next.player_hands[player as usize].remove(hand_idx);
        let table_card = next.table_cards.remove(table_idx).cards();
        let mut cards = vec![StackCard::from_hand(hand_card)];
        cards.extend(table_card.into_iter().map(StackCard::from_table));

        let mut events = Vec::new();
        next.open_stack(player, cards, &mut events);
        next.settle(player, &mut events);
        Ok(Transition {
            state: next,
            events,
        })
    }

    /// Pair two loose table cards in a new staging stack
    pub fn table_card_drop(
        &self,
        player: PlayerId,
        dragged_card: &Card,
        target_card: &Card,
    ) -> Result<Transition, GameError> {
        self.ensure_can_act(player)?;
        if dragged_card.same_card(target_card) {
            return Err(GameError::InvalidSelection);
        }
        let dragged_idx = self
            .table_cards
            .loose_position(dragged_card)
            .ok_or(GameError::TableCardNotFound)?;
        let target_idx = self
            .table_cards
            .loose_position(target_card)
            .ok_or(GameError::TableCardNotFound)?;
        if self.table_cards.stack_owned_by(player).is_some() {
            return Err(GameError::StagingStackExists);
        }

        // Take the higher slot first so the lower index stays valid
        let mut next = self.clone();
        let (dragged, target) = if dragged_idx > target_idx {
            let dragged = next.table_cards.remove(dragged_idx).cards();
            (dragged, next.table_cards.remove(target_idx).cards())
        } else {
            let target = next.table_cards.remove(target_idx).cards();
            (next.table_cards.remove(dragged_idx).cards(), target)
        };

        let cards = dragged
            .into_iter()
            .chain(target)
            .map(StackCard::from_table)
            .collect();
        let mut events = Vec::new();
        next.open_stack(player, cards, &mut events);
        next.settle(player, &mut events);
        Ok(Transition {
            state: next,
            events,
        })
    }

    /// Move another hand card into your staging stack
    pub fn add_to_staging_stack(
        &self,
        player: PlayerId,
        hand_card: &Card,
        stack_id: &str,
    ) -> Result<Transition, GameError> {
        self.ensure_can_act(player)?;
        self.owned_stack(player, stack_id)?;
        let hand_idx = self.hand_position(player, hand_card)?;

        let mut next = self.clone();
        let card = next.player_hands[player as usize].remove(hand_idx);
        next.grow_stack(player, stack_id, StackCard::from_hand(card))
    }

    /// Move another loose table card into your staging stack
    pub fn add_to_temporary_capture_stack(
        &self,
        player: PlayerId,
        table_card: &Card,
        stack_id: &str,
    ) -> Result<Transition, GameError> {
        self.ensure_can_act(player)?;
        self.owned_stack(player, stack_id)?;
        let table_idx = self
            .table_cards
            .loose_position(table_card)
            .ok_or(GameError::TableCardNotFound)?;

        let mut next = self.clone();
        let cards = next.table_cards.remove(table_idx).cards();
        let Some(&card) = cards.first() else {
            return Err(GameError::TableCardNotFound);
        };
        next.grow_stack(player, stack_id, StackCard::from_table(card))
    }

    /// Take your staging stack apart: hand cards go back to your hand and
    /// table cards go back on the table as loose cards.
    pub fn cancel_staging_stack(
        &self,
        player: PlayerId,
        stack_id: &str,
    ) -> Result<Transition, GameError> {
        self.ensure_can_act(player)?;
        self.owned_stack(player, stack_id)?;
        let pos = self
            .table_cards
            .stack_position(stack_id)
            .ok_or(GameError::StackNotFound)?;

        let mut next = self.clone();
        let TableItem::TemporaryStack(stack) = next.table_cards.remove(pos) else {
            return Err(GameError::StackNotFound);
        };
        next.player_hands[stack.owner as usize].extend(stack.hand_cards());
        for card in stack.table_cards() {
            next.table_cards.place(TableItem::Loose(card));
        }

        let mut events = vec![GameEvent::StagingStackCancelled {
            player,
            stack_id: stack.stack_id,
        }];
        next.settle(player, &mut events);
        Ok(Transition {
            state: next,
            events,
        })
    }

    // ==================== Helper Methods ====================

    fn ensure_can_act(&self, player: PlayerId) -> Result<(), GameError> {
        if self.game_over {
            return Err(GameError::GameOver);
        }
        if player != self.current_player {
            return Err(GameError::NotYourTurn);
        }
        Ok(())
    }

    fn hand_position(&self, player: PlayerId, card: &Card) -> Result<usize, GameError> {
        self.hand(player)
            .iter()
            .position(|c| c.same_card(card))
            .ok_or(GameError::CardNotInHand)
    }

    fn owned_stack(&self, player: PlayerId, stack_id: &str) -> Result<&TemporaryStack, GameError> {
        let stack = self
            .table_cards
            .find_stack(stack_id)
            .ok_or(GameError::StackNotFound)?;
        if stack.owner != player {
            return Err(GameError::NotStackOwner);
        }
        Ok(stack)
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_item_id += 1;
        format!("{}-{}", prefix, self.next_item_id)
    }

    fn open_stack(&mut self, player: PlayerId, cards: Vec<StackCard>, events: &mut Vec<GameEvent>) {
        let stack_id = self.next_id("temp");
        let stack = TemporaryStack::new(stack_id.clone(), player, cards);
        events.push(GameEvent::StagingStackCreated {
            player,
            stack_id,
            value: stack.value,
        });
        self.table_cards.place(TableItem::TemporaryStack(stack));
    }

    /// Push a card into a stack on an already-cloned successor state
    fn grow_stack(
        mut self,
        player: PlayerId,
        stack_id: &str,
        card: StackCard,
    ) -> Result<Transition, GameError> {
        let stack = self
            .table_cards
            .find_stack_mut(stack_id)
            .ok_or(GameError::StackNotFound)?;
        stack.push(card);
        let value = stack.value;

        let mut events = vec![GameEvent::StagingStackUpdated {
            player,
            stack_id: stack_id.to_string(),
            value,
        }];
        self.settle(player, &mut events);
        Ok(Transition {
            state: self,
            events,
        })
    }

    fn extend_build(
        &self,
        player: PlayerId,
        hand_idx: usize,
        build_id: &str,
        new_value: u32,
    ) -> Result<Transition, GameError> {
        let mut next = self.clone();
        let card = next.player_hands[player as usize].remove(hand_idx);
        let build = next
            .table_cards
            .find_build_mut(build_id)
            .ok_or(GameError::BuildNotFound)?;
        build.cards.push(card);
        build.value = new_value;

        let mut events = vec![GameEvent::BuildExtended {
            player,
            build_id: build_id.to_string(),
            value: new_value,
        }];
        next.finish_turn(player, &mut events);
        Ok(Transition {
            state: next,
            events,
        })
    }

    fn commit_stack(
        &self,
        player: PlayerId,
        stack_id: &str,
        value: u32,
    ) -> Result<Transition, GameError> {
        if self.table_cards.has_build_owned_by(player) {
            return Err(GameError::BuildAlreadyOwned);
        }
        let pos = self
            .table_cards
            .stack_position(stack_id)
            .ok_or(GameError::StackNotFound)?;

        let mut next = self.clone();
        let TableItem::TemporaryStack(stack) = next.table_cards.remove(pos) else {
            return Err(GameError::StackNotFound);
        };

        // Staged hand cards must not linger in the hand
        let staged: Vec<Card> = stack.hand_cards().collect();
        next.player_hands[stack.owner as usize]
            .retain(|held| !staged.iter().any(|s| s.same_card(held)));

        let mut cards = staged;
        cards.extend(stack.table_cards());
        let build_id = next.next_id("build");
        next.table_cards.place(TableItem::Build(Build {
            build_id: build_id.clone(),
            cards,
            value,
            owner: stack.owner,
            is_extendable: true,
        }));

        let mut events = vec![GameEvent::BuildCreated {
            player,
            build_id,
            value,
        }];
        next.finish_turn(player, &mut events);
        Ok(Transition {
            state: next,
            events,
        })
    }

    /// Pass the turn to the other player, then settle dealing and game end
    fn finish_turn(&mut self, player: PlayerId, events: &mut Vec<GameEvent>) {
        let next_player = other(player);
        self.current_player = next_player;
        events.push(GameEvent::TurnEnded {
            player,
            next_player,
        });
        self.settle(player, events);
    }

    /// Deal a new round or finish the game once neither player can move, and
    /// skip a player who has nothing left to play.
    fn settle(&mut self, last_mover: PlayerId, events: &mut Vec<GameEvent>) {
        if !self.can_move(0) && !self.can_move(1) {
            if self.deck.is_empty() {
                self.finish_game(last_mover, events);
                return;
            }
            self.player_hands = deal(&mut self.deck);
            self.round += 1;
            events.push(GameEvent::CardsDealt { round: self.round });
        }

        let current = self.current_player;
        if !self.can_move(current) && self.can_move(other(current)) {
            self.current_player = other(current);
            events.push(GameEvent::TurnEnded {
                player: current,
                next_player: self.current_player,
            });
        }
    }

    fn can_move(&self, player: PlayerId) -> bool {
        !self.hand(player).is_empty() || self.table_cards.stack_owned_by(player).is_some()
    }

    fn finish_game(&mut self, last_mover: PlayerId, events: &mut Vec<GameEvent>) {
        let sweeper = self.last_capturer.unwrap_or(last_mover);
        let leftovers: Vec<Card> = self
            .table_cards
            .clear()
            .iter()
            .flat_map(TableItem::cards)
            .collect();
        if !leftovers.is_empty() {
            self.player_captures[sweeper as usize].push(leftovers.clone());
            events.push(GameEvent::TableSwept {
                player: sweeper,
                cards: leftovers,
            });
        }

        let sheets = scoring::score_captures(&self.player_captures);
        for (score, sheet) in self.scores.iter_mut().zip(sheets.iter()) {
            *score += sheet.total;
        }
        self.score_details = Some(sheets);
        self.winner = scoring::winner(&self.scores);
        self.game_over = true;

        events.push(GameEvent::GameFinished {
            winner: self.winner,
            scores: self.scores,
        });
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

fn other(player: PlayerId) -> PlayerId {
    (player + 1) % PLAYER_COUNT as PlayerId
}

fn describe_table(table: &Table) -> String {
    table
        .iter()
        .map(TableItem::describe)
        .collect::<Vec<_>>()
        .join(", ")
}
