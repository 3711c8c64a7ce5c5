//! WebSocket protocol messages for Casino multiplayer.

use casino_core::{Determination, DraggedItem, DropTarget, GameEvent, GameState, PlayerId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Create a new game room
    CreateRoom { player_name: String },

    /// Join an existing room
    JoinRoom { room_id: Uuid, player_name: String },

    /// Leave current room
    LeaveRoom,

    /// Start the game (host only)
    StartGame,

    /// Ask what dropping a card on a target would do
    DetermineActions {
        dragged_item: DraggedItem,
        target_info: DropTarget,
    },

    /// Submit a move as `{actionType, payload}`. Kept as raw JSON so an
    /// unknown action type is reported instead of dropped.
    GameAction { action: serde_json::Value },

    /// Send chat message
    Chat { message: String },

    /// Request room list
    ListRooms,

    /// Ping for keepalive
    Ping,
}

/// Why a move or a determination was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    NotYourTurn,
    RuleViolation,
    UnknownAction,
    NoValidActions,
    /// The game session could not continue
    Fatal,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Welcome message with assigned player ID
    Welcome { player_id: Uuid },

    /// Room created successfully
    RoomCreated { room_id: Uuid },

    /// Joined room successfully
    JoinedRoom { room: RoomInfo },

    /// Left room successfully
    LeftRoom,

    /// Room state updated (player joined/left)
    RoomUpdated { room: RoomInfo },

    /// Game started; `player_number` is the receiver's seat
    GameStarted {
        state: GameState,
        player_number: PlayerId,
    },

    /// Full state after an accepted move
    GameState { state: GameState },

    /// Outcome of a submitted move, sent to the mover only
    ActionResult {
        success: bool,
        events: Vec<GameEvent>,
        error: Option<String>,
        error_kind: Option<ErrorKind>,
    },

    /// Candidate actions for a drop
    ActionsDetermined { determination: Determination },

    /// The staging stack can be committed at several values; answer with
    /// `createBuildWithValue`
    BuildOptions { stack_id: String, options: Vec<u32> },

    /// Current player changed
    TurnChanged { player_number: PlayerId },

    /// Game finished; `winner` is absent on a tie
    GameOver {
        winner: Option<PlayerId>,
        winner_name: Option<String>,
        scores: [u32; 2],
    },

    /// The game was discarded
    GameAbandoned { reason: String },

    /// Chat message received
    ChatMessage { player_name: String, message: String },

    /// List of available rooms
    RoomList { rooms: Vec<RoomInfo> },

    /// Error occurred
    Error { message: String },

    /// Pong response
    Pong,
}

/// Room information for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub id: Uuid,
    pub name: String,
    pub players: Vec<PlayerInfo>,
    pub max_players: u8,
    pub host_id: Uuid,
    pub status: RoomStatus,
}

/// Player information in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub id: Uuid,
    pub name: String,
    pub seat: Option<PlayerId>,
}

/// Room status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Waiting,
    InGame,
    Finished,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_format() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"CreateRoom","payload":{"playerName":"Ana"}}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::CreateRoom { player_name } if player_name == "Ana"));

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"DetermineActions","payload":{
                "draggedItem":{"card":{"suit":"♣","rank":"4","value":4},"source":"hand","player":0},
                "targetInfo":{"type":"table"}
            }}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::DetermineActions {
                target_info: DropTarget::Table,
                ..
            }
        ));
    }

    #[test]
    fn test_action_result_wire_format() {
        let msg = ServerMessage::ActionResult {
            success: false,
            events: vec![],
            error: Some("Not your turn".into()),
            error_kind: Some(ErrorKind::NotYourTurn),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "ActionResult");
        assert_eq!(json["payload"]["errorKind"], "notYourTurn");
    }
}
