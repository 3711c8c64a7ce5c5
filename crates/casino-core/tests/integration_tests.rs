//! Integration tests for the Casino rules engine.
//!
//! These tests drive complete games through determination and the move
//! handlers, from the opening deal to final scoring.

use casino_core::card::DECK_SIZE;
use casino_core::*;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn c(rank: Rank, suit: Suit) -> Card {
    Card::new(suit, rank)
}

/// Every candidate the current player could be offered this turn
fn offered_actions(game: &GameState) -> Vec<ActionOption> {
    let player = game.current_player;
    let mut targets = vec![DropTarget::Table];
    targets.extend(
        game.table_cards
            .iter()
            .filter_map(TableItem::as_loose)
            .map(|card| DropTarget::Loose { card: *card }),
    );

    let mut offered = Vec::new();
    for card in game.hand(player) {
        let dragged = DraggedItem::from_hand(*card, player);
        for target in &targets {
            offered.extend(determine_actions(&dragged, target, game).actions);
        }
    }
    offered
}

/// Pick a move the way a cautious player would: take your own build back
/// first, then any capture, then trail, and only then start a build.
fn choose_move(game: &GameState) -> Option<GameMove> {
    let player = game.current_player;
    let offered = offered_actions(game);

    let takes_own_build = |option: &&ActionOption| match &option.payload {
        GameMove::Capture {
            selected_table_cards,
            ..
        } => selected_table_cards
            .iter()
            .any(|item| matches!(item, TableItem::Build(b) if b.owner == player)),
        _ => false,
    };

    offered
        .iter()
        .find(takes_own_build)
        .or_else(|| offered.iter().find(|o| o.kind == ActionKind::Capture))
        .or_else(|| offered.iter().find(|o| o.kind == ActionKind::Trail))
        .or_else(|| offered.iter().find(|o| o.kind == ActionKind::Build))
        .map(|o| o.payload.clone())
}

/// Play a seeded game to the end, checking the state after every move
fn play_out(seed: u64) -> GameState {
    let mut game = GameState::with_seed(seed);
    let max_moves = 200;

    for _ in 0..max_moves {
        if game.is_finished() {
            break;
        }
        let player = game.current_player;
        let mv = choose_move(&game)
            .unwrap_or_else(|| panic!("seed {}: player {} has no move", seed, player));
        game = game
            .apply_move(player, &mv)
            .unwrap_or_else(|e| panic!("seed {}: offered move rejected: {}", seed, e))
            .state;

        let report = game.validate();
        assert!(report.valid, "seed {}: {:?}", seed, report.errors);
    }

    game
}

#[test]
fn test_end_to_end_build_scenario() {
    let four = c(Rank::Four, Suit::Clubs);
    let ace = c(Rank::Ace, Suit::Hearts);
    let game = GameState::from_layout(
        [
            vec![four, c(Rank::Six, Suit::Spades), c(Rank::Five, Suit::Diamonds)],
            vec![c(Rank::Two, Suit::Diamonds), c(Rank::Eight, Suit::Hearts)],
        ],
        vec![TableItem::Loose(ace)],
    );

    let determination = determine_actions(
        &DraggedItem::from_hand(four, 0),
        &DropTarget::Loose { card: ace },
        &game,
    );
    assert_eq!(determination.actions.len(), 1);
    assert!(determination.requires_modal);
    assert!(determination.auto_action().is_none());

    let option = &determination.actions[0];
    assert_eq!(option.kind, ActionKind::Build);
    match &option.payload {
        GameMove::Build(proposal) => assert_eq!(proposal.build_value, 5),
        other => panic!("expected build payload, got {:?}", other),
    }

    let transition = game.apply_move(0, &option.payload).unwrap();
    let next = transition.state;

    assert_eq!(
        next.table_cards.items(),
        &[TableItem::Build(Build {
            build_id: "build-1".into(),
            cards: vec![four, ace],
            value: 5,
            owner: 0,
            is_extendable: true,
        })]
    );
    assert_eq!(
        next.player_hands[0],
        vec![c(Rank::Six, Suit::Spades), c(Rank::Five, Suit::Diamonds)]
    );
    assert_eq!(next.current_player, 1);
    assert!(transition
        .events
        .iter()
        .any(|e| matches!(e, GameEvent::BuildCreated { value: 5, .. })));

    // The input state is untouched
    assert_eq!(game.player_hands[0].len(), 3);
    assert_eq!(game.current_player, 0);
}

#[test]
fn test_staging_flow_with_value_choice() {
    let five_c = c(Rank::Five, Suit::Clubs);
    let five_h = c(Rank::Five, Suit::Hearts);
    let game = GameState::from_layout(
        [
            vec![five_c, c(Rank::Ten, Suit::Spades), c(Rank::Three, Suit::Diamonds)],
            vec![c(Rank::Two, Suit::Diamonds), c(Rank::Eight, Suit::Hearts)],
        ],
        vec![
            TableItem::Loose(five_h),
            TableItem::Loose(c(Rank::Nine, Suit::Clubs)),
        ],
    );

    // Moves arrive as JSON from clients
    let create: GameMove = serde_json::from_value(serde_json::json!({
        "actionType": "createStagingStack",
        "payload": {
            "handCard": {"suit": "♣", "rank": "5", "value": 5},
            "tableCard": {"suit": "♥", "rank": "5", "value": 5}
        }
    }))
    .unwrap();
    let staged = game.apply_move(0, &create).unwrap().state;
    assert_eq!(staged.current_player, 0);
    assert_eq!(staged.table_cards.len(), 2);

    let stack_id = staged.table_cards.stack_owned_by(0).unwrap().stack_id.clone();
    assert_eq!(stack_id, "temp-1");

    let finalize = GameMove::FinalizeStagingStack {
        stack_id: stack_id.clone(),
    };
    assert_eq!(
        staged.apply_move(0, &finalize).unwrap_err(),
        GameError::BuildValueRequired {
            options: vec![5, 10]
        }
    );

    let choose = GameMove::CreateBuildWithValue {
        stack_id,
        build_value: 10,
    };
    let built = staged.apply_move(0, &choose).unwrap().state;
    let build = built.table_cards.builds().next().unwrap();
    assert_eq!(build.value, 10);
    assert_eq!(build.owner, 0);
    assert_eq!(build.cards, vec![five_c, five_h]);
    assert!(built.table_cards.stacks().next().is_none());
    assert_eq!(built.current_player, 1);
    assert!(built.validate().valid);
}

#[test]
fn test_turn_advance_by_move_kind() {
    let four = c(Rank::Four, Suit::Clubs);
    let ace = c(Rank::Ace, Suit::Hearts);
    let game = GameState::from_layout(
        [
            vec![four, c(Rank::Seven, Suit::Spades)],
            vec![c(Rank::Two, Suit::Diamonds), c(Rank::Eight, Suit::Hearts)],
        ],
        vec![TableItem::Loose(ace)],
    );

    let trailed = game.trail(0, &c(Rank::Seven, Suit::Spades)).unwrap().state;
    assert_eq!(trailed.current_player, 1);

    let staged = game.create_staging_stack(0, &four, &ace).unwrap().state;
    assert_eq!(staged.current_player, 0);

    let stack_id = staged.table_cards.stack_owned_by(0).unwrap().stack_id.clone();
    let cancelled = staged.cancel_staging_stack(0, &stack_id).unwrap().state;
    assert_eq!(cancelled.current_player, 0);
}

#[test]
fn test_second_round_is_dealt() {
    let mut game = GameState::with_seed(7);
    assert_eq!(game.deck.len(), 20);

    while game.round == 1 && !game.is_finished() {
        let player = game.current_player;
        let mv = choose_move(&game).expect("a move is always available");
        game = game.apply_move(player, &mv).unwrap().state;
    }

    assert_eq!(game.round, 2);
    assert!(game.deck.is_empty());
    assert_eq!(game.player_hands[0].len() + game.player_hands[1].len(), 20);
    assert_eq!(game.all_cards().len(), 40);
}

#[test]
fn test_deck_integrity_through_random_games() {
    for seed in 0..20 {
        let game = play_out(seed);

        assert!(game.is_finished(), "seed {} did not finish", seed);
        assert!(game.deck.is_empty());
        assert!(game.player_hands.iter().all(Vec::is_empty));
        assert!(game.table_cards.is_empty());

        let captured: usize = (0..2).map(|p| game.captured_cards(p).count()).sum();
        assert_eq!(captured, 40);

        let details = game.score_details.expect("scored game has details");
        assert_eq!(details[0].card_count + details[1].card_count, 40);
        assert_eq!(details[0].spade_count + details[1].spade_count, 10);
        assert_eq!(game.scores, [details[0].total, details[1].total]);

        // Casinos and aces always go somewhere; card and spade majorities may tie
        let total = game.scores[0] + game.scores[1];
        assert!((7..=11).contains(&total), "seed {}: total {}", seed, total);

        match game.winner {
            Some(w) => assert!(game.scores[w as usize] > game.scores[1 - w as usize]),
            None => assert_eq!(game.scores[0], game.scores[1]),
        }
    }
}

#[test]
fn test_finished_game_rejects_moves() {
    let game = play_out(3);
    assert!(game.is_finished());

    let mv = GameMove::Trail {
        card: c(Rank::Ace, Suit::Spades),
    };
    assert_eq!(game.apply_move(game.current_player, &mv).unwrap_err(), GameError::GameOver);
    assert_eq!(game.apply_or_unchanged(game.current_player, &mv), game);
}

#[test]
fn test_shuffle_uniformity() {
    let mut rng = StdRng::seed_from_u64(42);
    let shuffles = 8000;
    let expected = shuffles / DECK_SIZE;
    // counts[card][position]
    let mut counts = vec![vec![0usize; DECK_SIZE]; DECK_SIZE];
    let fresh = build_deck();

    for _ in 0..shuffles {
        let mut deck = fresh.clone();
        shuffle(&mut deck, &mut rng);
        for (pos, card) in deck.iter().enumerate() {
            let idx = fresh.iter().position(|f| f == card).unwrap();
            counts[idx][pos] += 1;
        }
    }

    for (idx, row) in counts.iter().enumerate() {
        for (pos, &count) in row.iter().enumerate() {
            assert!(
                count.abs_diff(expected) < 80,
                "card {} landed at {} {} times, expected about {}",
                fresh[idx],
                pos,
                count,
                expected
            );
        }
    }
}

#[test]
fn test_determination_has_no_hidden_state() {
    let game = GameState::with_seed(99);
    let player = game.current_player;

    for card in game.hand(player) {
        let dragged = DraggedItem::from_hand(*card, player);
        let first = determine_actions(&dragged, &DropTarget::Table, &game);
        let again = determine_actions(&dragged, &DropTarget::Table, &game.clone());
        assert_eq!(first, again);
    }
}

#[test]
fn test_seeded_games_are_reproducible() {
    assert_eq!(GameState::with_seed(5), GameState::with_seed(5));
    assert_eq!(play_out(5), play_out(5));
}

#[test]
fn test_state_json_round_trip() {
    let game = play_out(11);
    let json = serde_json::to_string(&game).unwrap();
    let back: GameState = serde_json::from_str(&json).unwrap();
    assert_eq!(back, game);

    let value = serde_json::to_value(&game).unwrap();
    assert!(value.get("playerHands").is_some());
    assert!(value.get("tableCards").is_some());
    assert!(value.get("gameOver").is_some());
}
