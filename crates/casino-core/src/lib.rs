//! Casino - rules engine for the two-player fishing card game
//!
//! This crate provides the authoritative game logic, including:
//! - The 40-card deck, shuffling and dealing
//! - Table items: loose cards, staging stacks and builds
//! - Action determination for a dragged card and its drop target
//! - Pure move handlers that produce a successor state
//! - End-of-game scoring
//!
//! # Architecture
//!
//! The engine is platform-agnostic. It can be compiled to:
//! - Native Rust for the multiplayer server
//! - WebAssembly for client-side previews of what a drop will do
//!
//! # Modules
//!
//! - [`card`]: Cards, ranks, suits and the deck
//! - [`table`]: Table items and build values
//! - [`actions`]: Moves, candidate actions and events
//! - [`rules`]: Action determination
//! - [`game`]: Game state and move handlers
//! - [`scoring`]: Final scoring

pub mod actions;
pub mod card;
pub mod game;
pub mod rules;
pub mod scoring;
pub mod table;
#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use actions::{
    ActionKind, ActionOption, BuildProposal, Determination, DraggedItem, DropTarget, GameEvent,
    GameMove,
};
pub use card::{build_deck, deal, shuffle, Card, PlayerId, Rank, Suit};
pub use game::{initialize_game, GameError, GameState, Transition, ValidationReport};
pub use rules::determine_actions;
pub use scoring::ScoreBreakdown;
pub use table::{
    build_value_options, Build, CardSource, StackCard, Table, TableItem, TemporaryStack,
};
