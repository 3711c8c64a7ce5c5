//! Moves players submit, candidate actions offered for a drop, and the
//! events that result from applying a move.
//!
//! This module defines the wire vocabulary between the rules engine and
//! whatever carries moves to it.

use crate::card::{Card, PlayerId};
use crate::table::{CardSource, TableItem};
use serde::{Deserialize, Serialize};

/// The card a player is dragging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraggedItem {
    pub card: Card,
    pub source: CardSource,
    pub player: PlayerId,
}

impl DraggedItem {
    pub fn from_hand(card: Card, player: PlayerId) -> Self {
        Self {
            card,
            source: CardSource::Hand,
            player,
        }
    }
}

/// Where a dragged card was dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DropTarget {
    /// Onto a loose table card
    Loose { card: Card },
    /// Onto a committed build
    Build {
        #[serde(rename = "buildId")]
        build_id: String,
    },
    /// Onto a staging stack
    TemporaryStack {
        #[serde(rename = "stackId")]
        stack_id: String,
    },
    /// Onto empty table space
    Table,
}

/// Payload of a two-card build made from a hand card and a loose card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildProposal {
    pub dragged_item: DraggedItem,
    pub table_cards_in_build: Vec<Card>,
    pub build_value: u32,
    pub bigger_card: Card,
    pub smaller_card: Card,
}

/// Every move a player can submit, tagged by `actionType` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "actionType",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum GameMove {
    // ==================== Turn-ending Moves ====================
    /// Put a hand card on the table as a loose card
    Trail { card: Card },
    /// Take table items whose value matches a hand card
    Capture {
        dragged_item: DraggedItem,
        selected_table_cards: Vec<TableItem>,
        /// The item the capture was offered for
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_card: Option<TableItem>,
    },
    /// Combine a hand card with a loose card into a build
    Build(BuildProposal),
    /// Raise the value of your own build
    AddToOwnBuild {
        dragged_item: DraggedItem,
        build_id: String,
    },
    /// Raise the value of an opponent's build
    AddToOpponentBuild {
        dragged_item: DraggedItem,
        build_id: String,
    },
    /// Commit your staging stack at its only possible value
    FinalizeStagingStack { stack_id: String },
    /// Commit your staging stack at a chosen value
    CreateBuildWithValue { stack_id: String, build_value: u32 },

    // ==================== Staging Moves ====================
    /// Pair a hand card with a loose card in a new staging stack
    CreateStagingStack { hand_card: Card, table_card: Card },
    /// Add another hand card to your staging stack
    AddToStagingStack { hand_card: Card, stack_id: String },
    /// Add another loose table card to your staging stack
    AddToTemporaryCaptureStack { table_card: Card, stack_id: String },
    /// Pair two loose table cards in a new staging stack
    TableCardDrop {
        dragged_card: Card,
        target_card: Card,
    },
    /// Put your staging stack's cards back where they came from
    CancelStagingStack { stack_id: String },
}

impl GameMove {
    /// The `actionType` string this move travels under
    pub fn action_type(&self) -> &'static str {
        match self {
            GameMove::Trail { .. } => "trail",
            GameMove::Capture { .. } => "capture",
            GameMove::Build(_) => "build",
            GameMove::AddToOwnBuild { .. } => "addToOwnBuild",
            GameMove::AddToOpponentBuild { .. } => "addToOpponentBuild",
            GameMove::FinalizeStagingStack { .. } => "finalizeStagingStack",
            GameMove::CreateBuildWithValue { .. } => "createBuildWithValue",
            GameMove::CreateStagingStack { .. } => "createStagingStack",
            GameMove::AddToStagingStack { .. } => "addToStagingStack",
            GameMove::AddToTemporaryCaptureStack { .. } => "addToTemporaryCaptureStack",
            GameMove::TableCardDrop { .. } => "tableCardDrop",
            GameMove::CancelStagingStack { .. } => "cancelStagingStack",
        }
    }

    /// Whether a successful application of this move passes the turn
    pub fn ends_turn(&self) -> bool {
        !matches!(
            self,
            GameMove::CreateStagingStack { .. }
                | GameMove::AddToStagingStack { .. }
                | GameMove::AddToTemporaryCaptureStack { .. }
                | GameMove::TableCardDrop { .. }
                | GameMove::CancelStagingStack { .. }
        )
    }
}

/// Kind of a candidate action offered for a drop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Trail,
    Capture,
    Build,
    AddToOwnBuild,
    AddToOpponentBuild,
}

/// One legal way to resolve a drop. `payload` is the exact move to submit
/// if the player picks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOption {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub label: String,
    pub payload: GameMove,
}

/// Result of asking which actions a drop allows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Determination {
    pub actions: Vec<ActionOption>,
    /// The player must pick one of `actions` (or cancel) before anything runs
    pub requires_modal: bool,
    pub error_message: Option<String>,
}

impl Determination {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            actions: Vec::new(),
            requires_modal: false,
            error_message: Some(message.into()),
        }
    }

    /// The single action that may run without asking the player
    pub fn auto_action(&self) -> Option<&ActionOption> {
        if self.requires_modal || self.error_message.is_some() {
            return None;
        }
        self.actions.first()
    }
}

/// Events that occur as a result of moves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A card was trailed onto the table
    CardTrailed { player: PlayerId, card: Card },

    /// Table items were captured
    Captured { player: PlayerId, cards: Vec<Card> },

    /// A build was committed
    BuildCreated {
        player: PlayerId,
        build_id: String,
        value: u32,
    },

    /// A card was added to an existing build
    BuildExtended {
        player: PlayerId,
        build_id: String,
        value: u32,
    },

    /// A staging stack was opened
    StagingStackCreated {
        player: PlayerId,
        stack_id: String,
        value: u32,
    },

    /// A card joined a staging stack
    StagingStackUpdated {
        player: PlayerId,
        stack_id: String,
        value: u32,
    },

    /// A staging stack was taken apart
    StagingStackCancelled { player: PlayerId, stack_id: String },

    /// Fresh hands were dealt from the deck
    CardsDealt { round: u32 },

    /// Leftover table cards went to a player at game end
    TableSwept { player: PlayerId, cards: Vec<Card> },

    /// Turn passed
    TurnEnded {
        player: PlayerId,
        next_player: PlayerId,
    },

    /// The game was scored
    GameFinished {
        winner: Option<PlayerId>,
        scores: [u32; 2],
    },
}
