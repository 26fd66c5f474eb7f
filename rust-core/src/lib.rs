pub mod game;
pub mod utils;

use gloo_timers::future::TimeoutFuture;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use game::{
    Cell, GameEvent, GameState, Grid, IntegrityError, MoveResolution, Outcome, Player, Position,
    RuleEngine, RuleError, TurnState, DEFAULT_GRID_SIZE, WIN_LENGTH,
};

/// 宣布胜利前的等待时间（毫秒），给前端留出高亮连线的时间。
pub const VICTORY_ANNOUNCE_DELAY_MS: u32 = 500;

#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn ensure_integrity(state: &GameState) -> Result<(), JsValue> {
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))
}

fn parse_state_json(json: &str) -> Result<GameState, JsValue> {
    let state: GameState = serde_json::from_str(json).map_err(serde_to_js_error)?;
    ensure_integrity(&state)?;
    Ok(state)
}

fn state_from_js(state: JsValue) -> Result<GameState, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    ensure_integrity(&state)?;
    Ok(state)
}

fn make_resolution_json(resolution: &MoveResolution) -> Result<String, JsValue> {
    serde_json::to_string(resolution).map_err(serde_to_js_error)
}

fn log_resolution(resolution: &MoveResolution) {
    match resolution.outcome {
        Outcome::Win { line } => {
            crate::console_log!("{} ({line:?})", resolution.state.status_message());
        }
        Outcome::Draw => crate::console_log!("{}", resolution.state.status_message()),
        Outcome::Continue => {}
    }
}

/// 持有一局棋的状态，供前端逐步调用。
#[wasm_bindgen]
pub struct GameEngine {
    state: GameState,
}

#[wasm_bindgen]
impl GameEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(initial_state_json: Option<String>) -> Result<GameEngine, JsValue> {
        let state = match initial_state_json {
            Some(json) => parse_state_json(&json)?,
            None => GameState::new(),
        };
        Ok(GameEngine { state })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.state).map_err(serde_to_js_error)
    }

    pub fn set_state_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.state = parse_state_json(json)?;
        Ok(())
    }

    /// Starts a new game, discarding the current one.
    pub fn reset(&mut self) {
        self.state = GameState::new();
        crate::console_log!("new game, {}", self.state.status_message());
    }

    pub fn attempt_move(&mut self, row: usize, col: usize) -> Result<String, JsValue> {
        match RuleEngine::attempt_move(&mut self.state, Position::new(row, col)) {
            Ok(resolution) => {
                log_resolution(&resolution);
                make_resolution_json(&resolution)
            }
            Err(error) => {
                crate::console_log!("move ({row}, {col}) ignored: {error:?}");
                Err(to_js_error(error))
            }
        }
    }

    pub fn is_valid_move(&self, row: usize, col: usize) -> bool {
        !self.state.is_finished()
            && RuleEngine::validate_move(
                &self.state.grid,
                self.state.last_move(),
                Position::new(row, col),
            )
    }

    pub fn highlighted_cells(&self) -> Result<JsValue, JsValue> {
        to_value(&RuleEngine::legal_moves(&self.state)).map_err(JsValue::from)
    }

    pub fn status_message(&self) -> String {
        self.state.status_message()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    pub fn current_player(&self) -> String {
        self.state.current_player().name().to_string()
    }

    /// Resolves to the status message once `delay_ms` has elapsed. Without an
    /// explicit delay a won game waits [`VICTORY_ANNOUNCE_DELAY_MS`]; anything
    /// else resolves immediately.
    pub fn announce_outcome(&self, delay_ms: Option<u32>) -> Promise {
        let message = self.state.status_message();
        let delay = delay_ms.unwrap_or(if self.state.winner().is_some() {
            VICTORY_ANNOUNCE_DELAY_MS
        } else {
            0
        });

        future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            Ok(JsValue::from_str(&message))
        })
    }
}

/// 返回一局新棋的初始状态。
#[wasm_bindgen(js_name = "createGameState")]
pub fn create_game_state() -> Result<JsValue, JsValue> {
    to_value(&GameState::new()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateMove")]
pub fn validate_move(state: JsValue, row: usize, col: usize) -> Result<bool, JsValue> {
    let state = state_from_js(state)?;
    Ok(!state.is_finished()
        && RuleEngine::validate_move(&state.grid, state.last_move(), Position::new(row, col)))
}

/// 为当前玩家落子，返回更新后的状态、事件与结果。
#[wasm_bindgen(js_name = "applyMove")]
pub fn apply_move(state: JsValue, row: usize, col: usize) -> Result<JsValue, JsValue> {
    let mut state = state_from_js(state)?;
    match RuleEngine::attempt_move(&mut state, Position::new(row, col)) {
        Ok(resolution) => to_value(&resolution).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

/// 检查经过该格的连线，空格或越界返回 `undefined`。
#[wasm_bindgen(js_name = "checkWin")]
pub fn check_win(state: JsValue, row: usize, col: usize) -> Result<JsValue, JsValue> {
    let state = state_from_js(state)?;
    let position = Position::new(row, col);
    let line = state
        .grid
        .get(position)
        .and_then(Cell::owner)
        .and_then(|player| RuleEngine::check_win(&state.grid, position, player));
    to_value(&line).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "highlightedCells")]
pub fn highlighted_cells(state: JsValue) -> Result<JsValue, JsValue> {
    let state = state_from_js(state)?;
    to_value(&RuleEngine::legal_moves(&state)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    ensure_integrity(&state)
}
