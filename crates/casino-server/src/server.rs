//! WebSocket server and connection handling.

use crate::protocol::{ClientMessage, ErrorKind, RoomStatus, ServerMessage};
use crate::room::{GameRoom, RoomError};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Server state shared across all connections.
pub struct ServerState {
    /// All active rooms
    pub rooms: DashMap<Uuid, GameRoom>,
    /// Mapping from player ID to their room ID
    pub player_rooms: DashMap<Uuid, Uuid>,
    /// Mapping from player ID to their message sender
    pub player_senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            player_rooms: DashMap::new(),
            player_senders: DashMap::new(),
        }
    }

    /// Send a message to a specific player.
    pub fn send_to_player(&self, player_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.player_senders.get(&player_id) {
            let _ = sender.send(msg);
        }
    }

    /// Broadcast a message to all players in a room.
    pub fn broadcast_to_room(&self, room_id: Uuid, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(&room_id) {
            for player_id in room.players.keys() {
                self.send_to_player(*player_id, msg.clone());
            }
        }
    }

    /// Broadcast a message to all players in a room except one.
    pub fn broadcast_to_room_except(&self, room_id: Uuid, except: Uuid, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(&room_id) {
            for player_id in room.players.keys() {
                if *player_id != except {
                    self.send_to_player(*player_id, msg.clone());
                }
            }
        }
    }

    /// Get list of waiting rooms.
    pub fn get_waiting_rooms(&self) -> Vec<crate::protocol::RoomInfo> {
        self.rooms
            .iter()
            .filter(|r| r.status == RoomStatus::Waiting)
            .map(|r| r.to_info())
            .collect()
    }

    fn room_of(&self, player_id: Uuid) -> Option<Uuid> {
        self.player_rooms.get(&player_id).map(|r| *r)
    }

    fn send_error(&self, player_id: Uuid, message: impl Into<String>) {
        self.send_to_player(
            player_id,
            ServerMessage::Error {
                message: message.into(),
            },
        );
    }

    fn send_rejection(&self, player_id: Uuid, error: String, kind: ErrorKind) {
        self.send_to_player(
            player_id,
            ServerMessage::ActionResult {
                success: false,
                events: vec![],
                error: Some(error),
                error_kind: Some(kind),
            },
        );
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Casino server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let player_id = Uuid::new_v4();

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.player_senders.insert(player_id, tx);

    let welcome = ServerMessage::Welcome { player_id };
    let msg_text = serde_json::to_string(&welcome)?;
    ws_sender.send(Message::Text(msg_text)).await?;

    // Forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(player_id, client_msg, &state),
                Err(e) => {
                    warn!("Invalid message from {}: {}", player_id, e);
                    state.send_error(player_id, format!("Invalid message: {}", e));
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", player_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.send_to_player(player_id, ServerMessage::Pong);
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", player_id, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up on disconnect
    leave_room(player_id, &state);
    state.player_senders.remove(&player_id);
    send_task.abort();

    info!("Connection closed for {}", player_id);
    Ok(())
}

/// Handle a client message.
fn handle_message(player_id: Uuid, msg: ClientMessage, state: &Arc<ServerState>) {
    match msg {
        ClientMessage::CreateRoom { player_name } => {
            leave_room(player_id, state);

            let room_id = Uuid::new_v4();
            let room = GameRoom::new(room_id, player_id, player_name);
            let room_info = room.to_info();

            state.rooms.insert(room_id, room);
            state.player_rooms.insert(player_id, room_id);
            info!("Player {} created room {}", player_id, room_id);

            state.send_to_player(player_id, ServerMessage::RoomCreated { room_id });
            state.send_to_player(player_id, ServerMessage::JoinedRoom { room: room_info });
        }

        ClientMessage::JoinRoom {
            room_id,
            player_name,
        } => {
            if state.room_of(player_id) == Some(room_id) {
                state.send_error(player_id, "Already in this room");
                return;
            }
            leave_room(player_id, state);

            let Some(mut room) = state.rooms.get_mut(&room_id) else {
                state.send_error(player_id, "Room not found");
                return;
            };
            match room.add_player(player_id, player_name) {
                Ok(()) => {
                    let room_info = room.to_info();
                    state.player_rooms.insert(player_id, room_id);

                    state.send_to_player(
                        player_id,
                        ServerMessage::JoinedRoom {
                            room: room_info.clone(),
                        },
                    );

                    // Release lock before broadcasting
                    drop(room);
                    state.broadcast_to_room_except(
                        room_id,
                        player_id,
                        ServerMessage::RoomUpdated { room: room_info },
                    );
                }
                Err(e) => state.send_error(player_id, e.to_string()),
            }
        }

        ClientMessage::LeaveRoom => {
            if leave_room(player_id, state) {
                state.send_to_player(player_id, ServerMessage::LeftRoom);
            }
        }

        ClientMessage::StartGame => {
            let Some(room_id) = state.room_of(player_id) else {
                state.send_error(player_id, "Not in a room");
                return;
            };
            let Some(mut room) = state.rooms.get_mut(&room_id) else {
                return;
            };
            if let Err(e) = room.start_game(player_id) {
                state.send_error(player_id, e.to_string());
                return;
            }

            let Some(game_state) = room.get_game_state().cloned() else {
                return;
            };
            let seats: Vec<_> = room
                .players
                .values()
                .filter_map(|p| p.seat.map(|seat| (p.id, seat)))
                .collect();
            let room_info = room.to_info();
            drop(room);

            for (id, seat) in seats {
                state.send_to_player(
                    id,
                    ServerMessage::GameStarted {
                        state: game_state.clone(),
                        player_number: seat,
                    },
                );
            }
            state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
            state.broadcast_to_room(
                room_id,
                ServerMessage::TurnChanged {
                    player_number: game_state.current_player,
                },
            );
        }

        ClientMessage::DetermineActions {
            dragged_item,
            target_info,
        } => {
            let Some(room_id) = state.room_of(player_id) else {
                state.send_error(player_id, "Not in a room");
                return;
            };
            let result = match state.rooms.get(&room_id) {
                Some(room) => room.determine_actions(player_id, &dragged_item, &target_info),
                None => return,
            };

            match result {
                Ok(determination) if determination.actions.is_empty() => {
                    let message = determination
                        .error_message
                        .unwrap_or_else(|| casino_core::rules::NO_VALID_ACTIONS.to_string());
                    state.send_rejection(player_id, message, ErrorKind::NoValidActions);
                }
                Ok(determination) => {
                    state.send_to_player(
                        player_id,
                        ServerMessage::ActionsDetermined { determination },
                    );
                }
                Err(e) => state.send_rejection(player_id, e.to_string(), e.kind()),
            }
        }

        ClientMessage::GameAction { action } => {
            let Some(room_id) = state.room_of(player_id) else {
                state.send_error(player_id, "Not in a room");
                return;
            };
            let Some(mut room) = state.rooms.get_mut(&room_id) else {
                return;
            };

            // The shard guard is held across validate, apply and store
            match room.apply_action(player_id, action) {
                Ok(events) => {
                    let game_state = room.get_game_state().cloned();
                    let outcome = room.outcome();
                    drop(room);

                    state.send_to_player(
                        player_id,
                        ServerMessage::ActionResult {
                            success: true,
                            events,
                            error: None,
                            error_kind: None,
                        },
                    );

                    let Some(game_state) = game_state else {
                        return;
                    };
                    let current_player = game_state.current_player;
                    state.broadcast_to_room(room_id, ServerMessage::GameState { state: game_state });
                    state.broadcast_to_room(
                        room_id,
                        ServerMessage::TurnChanged {
                            player_number: current_player,
                        },
                    );

                    if let Some(outcome) = outcome {
                        info!("Game in room {} finished: {:?}", room_id, outcome.scores);
                        state.broadcast_to_room(
                            room_id,
                            ServerMessage::GameOver {
                                winner: outcome.winner,
                                winner_name: outcome.winner_name,
                                scores: outcome.scores,
                            },
                        );
                    }
                }
                Err(RoomError::BuildChoice { stack_id, options }) => {
                    drop(room);
                    state.send_to_player(player_id, ServerMessage::BuildOptions { stack_id, options });
                }
                Err(e @ RoomError::CorruptState(_)) => {
                    let room_info = room.to_info();
                    drop(room);
                    error!("Room {} lost its game: {}", room_id, e);

                    state.send_rejection(player_id, e.to_string(), e.kind());
                    state.broadcast_to_room(
                        room_id,
                        ServerMessage::GameAbandoned {
                            reason: "The game hit an internal error".to_string(),
                        },
                    );
                    state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
                }
                Err(e) => {
                    drop(room);
                    state.send_rejection(player_id, e.to_string(), e.kind());
                }
            }
        }

        ClientMessage::Chat { message } => {
            if let Some(room_id) = state.room_of(player_id) {
                let player_name = state
                    .rooms
                    .get(&room_id)
                    .and_then(|r| r.players.get(&player_id).map(|p| p.name.clone()))
                    .unwrap_or_else(|| "Unknown".to_string());

                state.broadcast_to_room(
                    room_id,
                    ServerMessage::ChatMessage {
                        player_name,
                        message,
                    },
                );
            }
        }

        ClientMessage::ListRooms => {
            let rooms = state.get_waiting_rooms();
            state.send_to_player(player_id, ServerMessage::RoomList { rooms });
        }

        ClientMessage::Ping => {
            state.send_to_player(player_id, ServerMessage::Pong);
        }
    }
}

/// Take a player out of their room. A game in progress cannot continue
/// with one player, so it is discarded and the other player is told.
/// Returns whether the player was in a room.
fn leave_room(player_id: Uuid, state: &ServerState) -> bool {
    let Some((_, room_id)) = state.player_rooms.remove(&player_id) else {
        return false;
    };
    let Some(mut room) = state.rooms.get_mut(&room_id) else {
        return true;
    };

    let abandoned = room.status == RoomStatus::InGame;
    if abandoned {
        room.abandon_game();
    }

    let is_empty = room.remove_player(player_id).unwrap_or(false);
    if is_empty {
        drop(room);
        state.rooms.remove(&room_id);
        info!("Room {} closed", room_id);
        return true;
    }

    let room_info = room.to_info();
    drop(room);

    if abandoned {
        warn!("Player {} left room {} mid-game; game abandoned", player_id, room_id);
        state.broadcast_to_room(
            room_id,
            ServerMessage::GameAbandoned {
                reason: "Your opponent left the game".to_string(),
            },
        );
    }
    state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
    true
}
