//! WebAssembly bindings for the Casino rules engine.
//!
//! This module exposes the engine to JavaScript through wasm-bindgen, so a
//! browser client can preview drops locally with the same rules the server
//! enforces.

#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

#[cfg(feature = "wasm")]
use crate::actions::{DraggedItem, DropTarget, GameMove};
#[cfg(feature = "wasm")]
use crate::game::GameState;
#[cfg(feature = "wasm")]
use crate::rules::determine_actions;

/// Initialize panic hook for better error messages in browser console
#[cfg(feature = "wasm")]
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// WASM-exposed game wrapper
#[cfg(feature = "wasm")]
#[wasm_bindgen]
pub struct WasmGame {
    state: GameState,
}

#[cfg(feature = "wasm")]
#[wasm_bindgen]
impl WasmGame {
    /// Start a freshly shuffled and dealt game
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmGame {
        WasmGame {
            state: GameState::new(),
        }
    }

    /// Load a game from a state JSON snapshot
    #[wasm_bindgen(js_name = fromState)]
    pub fn from_state(state_json: &str) -> Result<WasmGame, JsValue> {
        let state: GameState = serde_json::from_str(state_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid state JSON: {}", e)))?;
        Ok(WasmGame { state })
    }

    /// Get the current game state as JSON
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> String {
        serde_json::to_string(&self.state).unwrap_or_else(|_| "{}".to_string())
    }

    #[wasm_bindgen(js_name = getCurrentPlayer)]
    pub fn get_current_player(&self) -> u8 {
        self.state.current_player
    }

    /// Work out what a drop allows, as a determination JSON object
    #[wasm_bindgen(js_name = determineActions)]
    pub fn determine_actions(&self, dragged_json: &str, target_json: &str) -> Result<String, JsValue> {
        let dragged: DraggedItem = serde_json::from_str(dragged_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid dragged item JSON: {}", e)))?;
        let target: DropTarget = serde_json::from_str(target_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid drop target JSON: {}", e)))?;

        let determination = determine_actions(&dragged, &target, &self.state);
        serde_json::to_string(&determination).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Apply a move from JSON, returns events JSON or error
    #[wasm_bindgen(js_name = applyMove)]
    pub fn apply_move(&mut self, player: u8, move_json: &str) -> Result<String, JsValue> {
        let mv: GameMove = serde_json::from_str(move_json)
            .map_err(|e| JsValue::from_str(&format!("Unknown action: {}", e)))?;

        match self.state.apply_move(player, &mv) {
            Ok(transition) => {
                self.state = transition.state;
                Ok(serde_json::to_string(&transition.events).unwrap_or_else(|_| "[]".to_string()))
            }
            Err(e) => Err(JsValue::from_str(&format!("Action failed: {}", e))),
        }
    }

    /// Structural check of the current state as a report JSON object
    #[wasm_bindgen]
    pub fn validate(&self) -> String {
        serde_json::to_string(&self.state.validate())
            .unwrap_or_else(|_| "{\"valid\":false,\"errors\":[]}".to_string())
    }

    /// Check if the game is finished
    #[wasm_bindgen(js_name = isFinished)]
    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Get the winner (if game is finished and not drawn)
    #[wasm_bindgen(js_name = getWinner)]
    pub fn get_winner(&self) -> Option<u8> {
        self.state.get_winner()
    }
}

#[cfg(feature = "wasm")]
impl Default for WasmGame {
    fn default() -> Self {
        Self::new()
    }
}
