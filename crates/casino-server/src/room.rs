//! Game room management.

use casino_core::{
    determine_actions, Determination, DraggedItem, DropTarget, GameError, GameEvent, GameMove,
    GameState, PlayerId,
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::protocol::{ErrorKind, PlayerInfo, RoomInfo, RoomStatus};

/// Casino is strictly a two-player game
pub const ROOM_CAPACITY: usize = 2;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,

    #[error("Player not in room")]
    PlayerNotInRoom,

    #[error("Not the host")]
    NotHost,

    #[error("Game already started")]
    GameAlreadyStarted,

    #[error("Need exactly two players to start")]
    NotEnoughPlayers,

    #[error("Game not started")]
    GameNotStarted,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Choose a build value for {stack_id}: {options:?}")]
    BuildChoice { stack_id: String, options: Vec<u32> },

    #[error("{0}")]
    Rule(#[from] GameError),

    #[error("Game state is corrupt: {0}")]
    CorruptState(String),
}

impl RoomError {
    /// How the client should treat this rejection
    pub fn kind(&self) -> ErrorKind {
        match self {
            RoomError::NotYourTurn | RoomError::Rule(GameError::NotYourTurn) => {
                ErrorKind::NotYourTurn
            }
            RoomError::UnknownAction(_) => ErrorKind::UnknownAction,
            RoomError::CorruptState(_) => ErrorKind::Fatal,
            _ => ErrorKind::RuleViolation,
        }
    }
}

/// A player in a game room.
#[derive(Debug, Clone)]
pub struct RoomPlayer {
    pub id: Uuid,
    pub name: String,
    /// Seat in the game (0 or 1), assigned when game starts
    pub seat: Option<PlayerId>,
}

impl RoomPlayer {
    pub fn new(id: Uuid, name: String) -> Self {
        Self {
            id,
            name,
            seat: None,
        }
    }

    pub fn to_info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id,
            name: self.name.clone(),
            seat: self.seat,
        }
    }
}

/// What a finished game reports to the room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOutcome {
    pub winner: Option<PlayerId>,
    pub winner_name: Option<String>,
    pub scores: [u32; 2],
}

/// A two-seat game room. The room owns the authoritative game state and
/// is the only place moves are applied.
pub struct GameRoom {
    pub id: Uuid,
    pub name: String,
    pub host_id: Uuid,
    pub status: RoomStatus,
    pub players: HashMap<Uuid, RoomPlayer>,
    /// Join order; the first player takes seat 0
    pub player_order: Vec<Uuid>,
    /// The game state (once started)
    pub game: Option<GameState>,
}

impl GameRoom {
    pub fn new(id: Uuid, host_id: Uuid, host_name: String) -> Self {
        let mut players = HashMap::new();
        players.insert(host_id, RoomPlayer::new(host_id, host_name.clone()));

        Self {
            id,
            name: format!("{}'s Table", host_name),
            host_id,
            status: RoomStatus::Waiting,
            players,
            player_order: vec![host_id],
            game: None,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= ROOM_CAPACITY
    }

    pub fn add_player(&mut self, player_id: Uuid, name: String) -> Result<(), RoomError> {
        if self.status == RoomStatus::InGame {
            return Err(RoomError::GameAlreadyStarted);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }

        self.players.insert(player_id, RoomPlayer::new(player_id, name));
        self.player_order.push(player_id);
        Ok(())
    }

    pub fn remove_player(&mut self, player_id: Uuid) -> Result<bool, RoomError> {
        if !self.players.contains_key(&player_id) {
            return Err(RoomError::PlayerNotInRoom);
        }

        self.players.remove(&player_id);
        self.player_order.retain(|&id| id != player_id);

        // If host left, assign new host
        if player_id == self.host_id && !self.player_order.is_empty() {
            self.host_id = self.player_order[0];
        }

        // Return true if room is now empty
        Ok(self.players.is_empty())
    }

    pub fn start_game(&mut self, requester_id: Uuid) -> Result<(), RoomError> {
        if requester_id != self.host_id {
            return Err(RoomError::NotHost);
        }
        if self.status == RoomStatus::InGame {
            return Err(RoomError::GameAlreadyStarted);
        }
        if self.players.len() != ROOM_CAPACITY {
            return Err(RoomError::NotEnoughPlayers);
        }

        for (idx, &player_id) in self.player_order.iter().enumerate() {
            if let Some(player) = self.players.get_mut(&player_id) {
                player.seat = Some(idx as PlayerId);
            }
        }

        self.game = Some(GameState::new());
        self.status = RoomStatus::InGame;
        info!(room = %self.id, "game started");

        Ok(())
    }

    /// Throw away the running game, keeping whoever is still seated
    pub fn abandon_game(&mut self) {
        self.game = None;
        self.status = RoomStatus::Waiting;
        for player in self.players.values_mut() {
            player.seat = None;
        }
    }

    pub fn seat_of(&self, player_id: Uuid) -> Result<PlayerId, RoomError> {
        self.players
            .get(&player_id)
            .ok_or(RoomError::PlayerNotInRoom)?
            .seat
            .ok_or(RoomError::PlayerNotInRoom)
    }

    /// Seat of the player whose turn it is, after checking the game runs
    fn acting_seat(&self, player_id: Uuid) -> Result<(&GameState, PlayerId), RoomError> {
        let game = self.game.as_ref().ok_or(RoomError::GameNotStarted)?;
        let seat = self.seat_of(player_id)?;
        if game.current_player != seat {
            return Err(RoomError::NotYourTurn);
        }
        Ok((game, seat))
    }

    pub fn determine_actions(
        &self,
        player_id: Uuid,
        dragged: &DraggedItem,
        target: &DropTarget,
    ) -> Result<Determination, RoomError> {
        let (game, seat) = self.acting_seat(player_id)?;
        let dragged = DraggedItem {
            player: seat,
            ..*dragged
        };
        Ok(determine_actions(&dragged, target, game))
    }

    /// Validate, apply and store one move. The successor state replaces
    /// the current one only if it passes the structural check.
    pub fn apply_action(
        &mut self,
        player_id: Uuid,
        action: serde_json::Value,
    ) -> Result<Vec<GameEvent>, RoomError> {
        let (game, seat) = self.acting_seat(player_id)?;

        let mv: GameMove = serde_json::from_value(action)
            .map_err(|e| RoomError::UnknownAction(e.to_string()))?;

        let transition = match game.apply_move(seat, &mv) {
            Ok(transition) => transition,
            Err(GameError::BuildValueRequired { options }) => {
                let stack_id = match &mv {
                    GameMove::FinalizeStagingStack { stack_id } => stack_id.clone(),
                    _ => return Err(GameError::BuildValueRequired { options }.into()),
                };
                return Err(RoomError::BuildChoice { stack_id, options });
            }
            Err(e) => return Err(e.into()),
        };

        let report = transition.state.validate();
        if !report.valid {
            error!(room = %self.id, errors = ?report.errors, "move produced an invalid state");
            self.abandon_game();
            return Err(RoomError::CorruptState(report.errors.join("; ")));
        }

        if transition.state.is_finished() {
            self.status = RoomStatus::Finished;
        }
        self.game = Some(transition.state);

        Ok(transition.events)
    }

    pub fn get_game_state(&self) -> Option<&GameState> {
        self.game.as_ref()
    }

    pub fn get_current_player(&self) -> Option<PlayerId> {
        self.game.as_ref().map(|g| g.current_player)
    }

    /// Result of the game, once it is over
    pub fn outcome(&self) -> Option<GameOutcome> {
        let game = self.game.as_ref().filter(|g| g.is_finished())?;
        let winner = game.get_winner();
        let winner_name = winner.and_then(|seat| {
            let id = self.player_order.get(seat as usize)?;
            Some(self.players.get(id)?.name.clone())
        });
        Some(GameOutcome {
            winner,
            winner_name,
            scores: game.scores,
        })
    }

    pub fn to_info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id,
            name: self.name.clone(),
            players: self
                .player_order
                .iter()
                .filter_map(|id| self.players.get(id).map(|p| p.to_info()))
                .collect(),
            max_players: ROOM_CAPACITY as u8,
            host_id: self.host_id,
            status: self.status,
        }
    }
}
