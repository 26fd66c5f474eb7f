//! 游戏核心逻辑模块（棋盘状态、规则引擎）。

pub mod rules;
pub mod state;

pub use rules::{MoveResolution, RuleEngine, RuleError};
pub use state::{
    Cell,
    GameEvent,
    GameState,
    Grid,
    IntegrityError,
    Outcome,
    Player,
    Position,
    TurnState,
    DEFAULT_GRID_SIZE,
    WIN_LENGTH,
};
