//! Legality of a drop: which actions a dragged hand card allows.
//!
//! `determine_actions` is the single authority on what a drop may do. The
//! client runs it to decide whether to ask the player anything, and the
//! move handlers in `game` enforce the same predicates defined here, so a
//! move the engine offers is a move the engine accepts.

use crate::actions::{ActionKind, ActionOption, BuildProposal, Determination, DraggedItem, DropTarget, GameMove};
use crate::card::{Card, PlayerId};
use crate::game::GameState;
use crate::table::{Build, CardSource, TableItem, MAX_BUILD_VALUE};
use tracing::debug;

pub const ONLY_HAND_CARDS: &str = "Only hand cards supported";
pub const NO_VALID_ACTIONS: &str = "No valid actions available";

/// Work out every legal action for dropping `dragged` onto `target`.
///
/// Candidates are gathered in a fixed order: captures across the whole
/// table, then a build on the target loose card, then an extension of the
/// target build. A trail is only considered when nothing else qualified and
/// the card was dropped on open table.
///
/// A lone trail or capture can run straight away. Anything else, including
/// a lone build, needs the player to choose.
pub fn determine_actions(
    dragged: &DraggedItem,
    target: &DropTarget,
    state: &GameState,
) -> Determination {
    if dragged.source != CardSource::Hand {
        return Determination::rejected(ONLY_HAND_CARDS);
    }

    let player = state.current_player;
    let card = dragged.card;
    let dragged_value = card_value(&card);
    let mut actions = Vec::new();

    // Captures: every table item whose value matches
    for item in state.table_cards.iter() {
        if item.capture_value() == dragged_value {
            actions.push(ActionOption {
                kind: ActionKind::Capture,
                label: capture_label(item),
                payload: GameMove::Capture {
                    dragged_item: *dragged,
                    selected_table_cards: vec![item.clone()],
                    target_card: Some(item.clone()),
                },
            });
        }
    }

    // New build on a loose card
    if let DropTarget::Loose { card: target_card } = target {
        if let Some(table_card) = state.table_cards.find_loose(target_card) {
            let target_value = card_value(table_card);
            let build_value = target_value + dragged_value;

            if build_value <= MAX_BUILD_VALUE
                && holds_capture_card(state.hand(player), &card, build_value)
                && !state.table_cards.has_build_owned_by(player)
            {
                debug!(
                    "build detected: {}+{}={}",
                    dragged_value, target_value, build_value
                );
                let (bigger_card, smaller_card) = build_pair(card, *table_card);
                actions.push(ActionOption {
                    kind: ActionKind::Build,
                    label: format!("Build {} ({}+{})", build_value, dragged_value, target_value),
                    payload: GameMove::Build(BuildProposal {
                        dragged_item: *dragged,
                        table_cards_in_build: vec![*table_card],
                        build_value,
                        bigger_card,
                        smaller_card,
                    }),
                });
            }
        }
    }

    // Extending a build
    if let DropTarget::Build { build_id } = target {
        if let Some(build) = state.table_cards.find_build(build_id) {
            if build.owner == player {
                actions.push(ActionOption {
                    kind: ActionKind::AddToOwnBuild,
                    label: format!("Add to Build ({})", build.value),
                    payload: GameMove::AddToOwnBuild {
                        dragged_item: *dragged,
                        build_id: build.build_id.clone(),
                    },
                });
            } else if let Some(new_value) = opponent_extension_value(build, dragged_value) {
                debug!("opponent build extension: {}->{}", build.value, new_value);
                actions.push(ActionOption {
                    kind: ActionKind::AddToOpponentBuild,
                    label: format!("Extend to {}", new_value),
                    payload: GameMove::AddToOpponentBuild {
                        dragged_item: *dragged,
                        build_id: build.build_id.clone(),
                    },
                });
            }
        }
    }

    // Trail as a last resort
    if actions.is_empty() && matches!(target, DropTarget::Table) {
        if trail_locked_by_build(state, player) {
            debug!("trail blocked: round 1 with active build");
        } else if state.table_cards.has_loose_of_value(card.rank.value()) {
            debug!("trail blocked: would duplicate a loose {}", card.rank.as_str());
        } else {
            actions.push(ActionOption {
                kind: ActionKind::Trail,
                label: "Trail Card".to_string(),
                payload: GameMove::Trail { card },
            });
        }
    }

    if actions.is_empty() {
        debug!("no valid actions for {} onto {:?}", card, target);
        return Determination::rejected(NO_VALID_ACTIONS);
    }

    let auto = actions.len() == 1
        && matches!(actions[0].kind, ActionKind::Trail | ActionKind::Capture);
    if !auto {
        debug!("modal required: {} actions available", actions.len());
    }

    Determination {
        actions,
        requires_modal: !auto,
        error_message: None,
    }
}

pub(crate) fn card_value(card: &Card) -> u32 {
    u32::from(card.rank.value())
}

/// Whether `hand`, not counting `played`, holds a card worth `value`
pub(crate) fn holds_capture_card(hand: &[Card], played: &Card, value: u32) -> bool {
    hand.iter()
        .any(|c| card_value(c) == value && !c.same_card(played))
}

/// In the opening round a player with a build on the table may not trail.
pub(crate) fn trail_locked_by_build(state: &GameState, player: PlayerId) -> bool {
    state.round == 1 && state.table_cards.has_build_owned_by(player)
}

/// New value of an opponent build after adding a card, if allowed
pub(crate) fn opponent_extension_value(build: &Build, added: u32) -> Option<u32> {
    let new_value = build.value + added;
    (build.is_extendable && new_value <= MAX_BUILD_VALUE).then_some(new_value)
}

/// Order a two-card build as (bigger, smaller). On equal values the dragged
/// card is the smaller one.
pub(crate) fn build_pair(dragged: Card, target: Card) -> (Card, Card) {
    if card_value(&dragged) > card_value(&target) {
        (dragged, target)
    } else {
        (target, dragged)
    }
}

fn capture_label(item: &TableItem) -> String {
    match item {
        TableItem::Loose(card) => format!("Capture {}", card.rank.as_str()),
        TableItem::Build(build) => format!("Capture Build ({})", build.value),
        TableItem::TemporaryStack(_) => format!("Capture Stack ({})", item.capture_value()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Rank, Suit};
    use crate::table::{StackCard, TemporaryStack};

    fn c(rank: Rank, suit: Suit) -> Card {
        Card::new(suit, rank)
    }

    fn build(id: &str, value: u32, owner: PlayerId, cards: Vec<Card>) -> TableItem {
        TableItem::Build(Build {
            build_id: id.into(),
            cards,
            value,
            owner,
            is_extendable: true,
        })
    }

    fn kinds(d: &Determination) -> Vec<ActionKind> {
        d.actions.iter().map(|a| a.kind).collect()
    }

    #[test]
    fn test_table_source_rejected() {
        let state = GameState::from_layout(
            [vec![c(Rank::Five, Suit::Clubs)], vec![]],
            vec![TableItem::Loose(c(Rank::Five, Suit::Hearts))],
        );
        let dragged = DraggedItem {
            card: c(Rank::Five, Suit::Hearts),
            source: CardSource::Table,
            player: 0,
        };
        let result = determine_actions(&dragged, &DropTarget::Table, &state);
        assert!(result.actions.is_empty());
        assert!(!result.requires_modal);
        assert_eq!(result.error_message.as_deref(), Some(ONLY_HAND_CARDS));
    }

    #[test]
    fn test_single_capture_auto_executes() {
        let five = c(Rank::Five, Suit::Clubs);
        let state = GameState::from_layout(
            [vec![five, c(Rank::Nine, Suit::Clubs)], vec![]],
            vec![TableItem::Loose(c(Rank::Five, Suit::Hearts))],
        );
        let result = determine_actions(
            &DraggedItem::from_hand(five, 0),
            &DropTarget::Loose {
                card: c(Rank::Five, Suit::Hearts),
            },
            &state,
        );
        assert_eq!(kinds(&result), vec![ActionKind::Capture]);
        assert!(!result.requires_modal);
        assert!(result.error_message.is_none());
        assert!(result.auto_action().is_some());
        match &result.actions[0].payload {
            GameMove::Capture { target_card, .. } => {
                assert_eq!(
                    target_card.as_ref(),
                    Some(&TableItem::Loose(c(Rank::Five, Suit::Hearts)))
                )
            }
            other => panic!("expected capture payload, got {:?}", other),
        }
    }

    #[test]
    fn test_captures_builds_and_stacks_by_value() {
        let eight = c(Rank::Eight, Suit::Clubs);
        let stack = TemporaryStack::new(
            "temp-9".into(),
            1,
            vec![
                StackCard::from_hand(c(Rank::Five, Suit::Diamonds)),
                StackCard::from_table(c(Rank::Three, Suit::Spades)),
            ],
        );
        let state = GameState::from_layout(
            [vec![eight], vec![]],
            vec![
                TableItem::Loose(c(Rank::Eight, Suit::Hearts)),
                build(
                    "build-1",
                    8,
                    1,
                    vec![c(Rank::Six, Suit::Hearts), c(Rank::Two, Suit::Hearts)],
                ),
                TableItem::TemporaryStack(stack),
                TableItem::Loose(c(Rank::Four, Suit::Hearts)),
            ],
        );
        let result = determine_actions(&DraggedItem::from_hand(eight, 0), &DropTarget::Table, &state);

        assert_eq!(
            kinds(&result),
            vec![ActionKind::Capture, ActionKind::Capture, ActionKind::Capture]
        );
        assert!(result.requires_modal);
        let labels: Vec<&str> = result.actions.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["Capture 8", "Capture Build (8)", "Capture Stack (8)"]);
    }

    #[test]
    fn test_build_needs_capture_card() {
        let four = c(Rank::Four, Suit::Clubs);
        let ace = c(Rank::Ace, Suit::Hearts);
        let target = DropTarget::Loose { card: ace };

        let without = GameState::from_layout(
            [vec![four, c(Rank::Six, Suit::Spades)], vec![]],
            vec![TableItem::Loose(ace)],
        );
        let result = determine_actions(&DraggedItem::from_hand(four, 0), &target, &without);
        assert!(result.actions.is_empty());
        assert_eq!(result.error_message.as_deref(), Some(NO_VALID_ACTIONS));

        let with = GameState::from_layout(
            [vec![four, c(Rank::Five, Suit::Spades)], vec![]],
            vec![TableItem::Loose(ace)],
        );
        let result = determine_actions(&DraggedItem::from_hand(four, 0), &target, &with);
        assert_eq!(kinds(&result), vec![ActionKind::Build]);
        assert!(result.requires_modal);
        match &result.actions[0].payload {
            GameMove::Build(proposal) => {
                assert_eq!(proposal.build_value, 5);
                assert_eq!(proposal.bigger_card, four);
                assert_eq!(proposal.smaller_card, ace);
            }
            other => panic!("expected build payload, got {:?}", other),
        }
    }

    #[test]
    fn test_build_tie_puts_dragged_card_smaller() {
        let dragged = c(Rank::Three, Suit::Clubs);
        let target = c(Rank::Three, Suit::Hearts);
        let (bigger, smaller) = build_pair(dragged, target);
        assert_eq!(bigger, target);
        assert_eq!(smaller, dragged);
    }

    #[test]
    fn test_build_blocked_when_player_owns_build() {
        let four = c(Rank::Four, Suit::Clubs);
        let ace = c(Rank::Ace, Suit::Hearts);
        let state = GameState::from_layout(
            [
                vec![four, c(Rank::Five, Suit::Spades), c(Rank::Nine, Suit::Spades)],
                vec![],
            ],
            vec![
                TableItem::Loose(ace),
                build(
                    "build-1",
                    9,
                    0,
                    vec![c(Rank::Seven, Suit::Hearts), c(Rank::Two, Suit::Hearts)],
                ),
            ],
        );
        let result = determine_actions(
            &DraggedItem::from_hand(four, 0),
            &DropTarget::Loose { card: ace },
            &state,
        );
        assert!(result.actions.is_empty());
    }

    #[test]
    fn test_build_capped_at_ten() {
        let seven = c(Rank::Seven, Suit::Clubs);
        let six = c(Rank::Six, Suit::Hearts);
        let state = GameState::from_layout(
            [vec![seven, c(Rank::Three, Suit::Spades)], vec![]],
            vec![TableItem::Loose(six)],
        );
        let result = determine_actions(
            &DraggedItem::from_hand(seven, 0),
            &DropTarget::Loose { card: six },
            &state,
        );
        assert!(result.actions.is_empty());
    }

    #[test]
    fn test_own_build_extension_always_offered() {
        let nine = c(Rank::Nine, Suit::Clubs);
        let state = GameState::from_layout(
            [vec![nine], vec![]],
            vec![build(
                "build-1",
                5,
                0,
                vec![c(Rank::Four, Suit::Hearts), c(Rank::Ace, Suit::Hearts)],
            )],
        );
        let result = determine_actions(
            &DraggedItem::from_hand(nine, 0),
            &DropTarget::Build {
                build_id: "build-1".into(),
            },
            &state,
        );
        // The cap is left to the handler
        assert_eq!(kinds(&result), vec![ActionKind::AddToOwnBuild]);
        assert!(result.requires_modal);
    }

    #[test]
    fn test_opponent_build_extension_limits() {
        let three = c(Rank::Three, Suit::Clubs);
        let target = DropTarget::Build {
            build_id: "build-1".into(),
        };
        let five_build = build(
            "build-1",
            5,
            1,
            vec![c(Rank::Four, Suit::Hearts), c(Rank::Ace, Suit::Hearts)],
        );

        let state = GameState::from_layout([vec![three], vec![]], vec![five_build.clone()]);
        let result = determine_actions(&DraggedItem::from_hand(three, 0), &target, &state);
        assert_eq!(kinds(&result), vec![ActionKind::AddToOpponentBuild]);
        assert_eq!(result.actions[0].label, "Extend to 8");

        let nine_build = build(
            "build-1",
            9,
            1,
            vec![c(Rank::Seven, Suit::Hearts), c(Rank::Two, Suit::Hearts)],
        );
        let state = GameState::from_layout([vec![three], vec![]], vec![nine_build]);
        assert!(determine_actions(&DraggedItem::from_hand(three, 0), &target, &state)
            .actions
            .is_empty());

        let mut locked = five_build;
        if let TableItem::Build(b) = &mut locked {
            b.is_extendable = false;
        }
        let state = GameState::from_layout([vec![three], vec![]], vec![locked]);
        assert!(determine_actions(&DraggedItem::from_hand(three, 0), &target, &state)
            .actions
            .is_empty());
    }

    #[test]
    fn test_no_duplicate_trail() {
        let seven = c(Rank::Seven, Suit::Clubs);
        let state = GameState::from_layout(
            [vec![seven], vec![]],
            vec![
                TableItem::Loose(c(Rank::Seven, Suit::Hearts)),
                TableItem::Loose(c(Rank::Two, Suit::Hearts)),
            ],
        );
        // A matching loose card is a capture, never a trail
        let result = determine_actions(&DraggedItem::from_hand(seven, 0), &DropTarget::Table, &state);
        assert_eq!(kinds(&result), vec![ActionKind::Capture]);
        assert!(!result.actions.iter().any(|a| a.kind == ActionKind::Trail));
    }

    #[test]
    fn test_round_one_build_lock() {
        let two = c(Rank::Two, Suit::Clubs);
        let owned = build(
            "build-1",
            9,
            0,
            vec![c(Rank::Seven, Suit::Hearts), c(Rank::Two, Suit::Hearts)],
        );

        let mut state = GameState::from_layout([vec![two], vec![]], vec![owned]);
        let result = determine_actions(&DraggedItem::from_hand(two, 0), &DropTarget::Table, &state);
        assert!(result.actions.is_empty());

        state.round = 2;
        let result = determine_actions(&DraggedItem::from_hand(two, 0), &DropTarget::Table, &state);
        assert_eq!(kinds(&result), vec![ActionKind::Trail]);
        assert!(!result.requires_modal);
    }

    #[test]
    fn test_trail_only_on_open_table() {
        let two = c(Rank::Two, Suit::Clubs);
        let state = GameState::from_layout(
            [vec![two], vec![]],
            vec![TableItem::Loose(c(Rank::Nine, Suit::Hearts))],
        );
        let on_card = determine_actions(
            &DraggedItem::from_hand(two, 0),
            &DropTarget::Loose {
                card: c(Rank::Nine, Suit::Hearts),
            },
            &state,
        );
        assert!(on_card.actions.is_empty());

        let on_table = determine_actions(&DraggedItem::from_hand(two, 0), &DropTarget::Table, &state);
        assert_eq!(kinds(&on_table), vec![ActionKind::Trail]);
    }

    #[test]
    fn test_determination_is_repeatable() {
        let state = GameState::with_seed(11);
        let card = state.player_hands[0][0];
        let dragged = DraggedItem::from_hand(card, 0);
        let first = determine_actions(&dragged, &DropTarget::Table, &state);
        let second = determine_actions(&dragged, &DropTarget::Table, &state);
        assert_eq!(first, second);
    }
}
