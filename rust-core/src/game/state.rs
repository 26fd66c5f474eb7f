use serde::{Deserialize, Serialize};

/// 棋盘边长。
pub const DEFAULT_GRID_SIZE: usize = 7;
/// 连成一线所需的棋子数。
pub const WIN_LENGTH: usize = 4;

/// One step along each axis, used to scan the whole grid for lines.
const LINE_STEPS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// 对局双方，蓝方先手。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Player {
    Blue,
    Red,
}

impl Player {
    pub fn other(self) -> Self {
        match self {
            Player::Blue => Player::Red,
            Player::Red => Player::Blue,
        }
    }

    pub fn to_cell(self) -> Cell {
        match self {
            Player::Blue => Cell::Blue,
            Player::Red => Cell::Red,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Player::Blue => "Blue",
            Player::Red => "Red",
        }
    }
}

impl Default for Player {
    fn default() -> Self {
        Player::Blue
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Cell {
    Empty,
    Blue,
    Red,
}

impl Cell {
    pub fn owner(self) -> Option<Player> {
        match self {
            Cell::Empty => None,
            Cell::Blue => Some(Player::Blue),
            Cell::Red => Some(Player::Red),
        }
    }

    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Empty
    }
}

/// 棋盘坐标（行, 列），从 0 开始。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// max(|Δrow|, |Δcol|)
    pub fn chebyshev_distance(self, other: Position) -> usize {
        self.row
            .abs_diff(other.row)
            .max(self.col.abs_diff(other.col))
    }

    /// Same cell or one of its eight neighbours.
    pub fn is_adjacent(self, other: Position) -> bool {
        self.chebyshev_distance(other) <= 1
    }

    /// Steps by `(d_row, d_col)`; `None` when either coordinate would go negative.
    pub fn offset(self, d_row: isize, d_col: isize) -> Option<Position> {
        Some(Position::new(
            self.row.checked_add_signed(d_row)?,
            self.col.checked_add_signed(d_col)?,
        ))
    }
}

/// 方形棋盘，按行优先存储。创建后尺寸不再变化。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Grid {
    size: usize,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![Cell::Empty; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn in_bounds(&self, position: Position) -> bool {
        position.row < self.size && position.col < self.size
    }

    fn index(&self, position: Position) -> Option<usize> {
        self.in_bounds(position)
            .then(|| position.row * self.size + position.col)
    }

    /// `None` for positions outside the grid.
    pub fn get(&self, position: Position) -> Option<Cell> {
        self.index(position)
            .and_then(|index| self.cells.get(index))
            .copied()
    }

    /// Writes `cell` at `position`. Out-of-bounds writes are ignored.
    pub fn set(&mut self, position: Position, cell: Cell) {
        if let Some(slot) = self
            .index(position)
            .and_then(|index| self.cells.get_mut(index))
        {
            *slot = cell;
        }
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|cell| !cell.is_empty())
    }

    pub fn count(&self, cell: Cell) -> usize {
        self.cells.iter().filter(|&&current| current == cell).count()
    }

    /// Whether `player` has [`WIN_LENGTH`] stones in a row anywhere on the grid.
    pub fn has_line(&self, player: Player) -> bool {
        let cell = player.to_cell();
        self.positions().any(|start| {
            LINE_STEPS.iter().any(|&(d_row, d_col)| {
                let mut cursor = Some(start);
                (0..WIN_LENGTH).all(|_| {
                    let Some(position) = cursor else {
                        return false;
                    };
                    cursor = position.offset(d_row, d_col);
                    self.get(position) == Some(cell)
                })
            })
        })
    }

    /// Every position on the grid in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.size).flat_map(move |row| (0..self.size).map(move |col| Position::new(row, col)))
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_SIZE)
    }
}

/// 回合状态：当前玩家、上一步落子位置、是否终局。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TurnState {
    pub current_player: Player,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_move: Option<Position>,
    #[serde(default)]
    pub game_over: bool,
}

impl TurnState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 一步棋的结果。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Outcome {
    Continue,
    Win { line: [Position; WIN_LENGTH] },
    Draw,
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Continue)
    }
}

/// 游戏事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    StonePlaced {
        player: Player,
        position: Position,
    },
    TurnPassed {
        next: Player,
    },
    GameWon {
        winner: Player,
        line: [Position; WIN_LENGTH],
    },
    GameDrawn,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    UnsupportedGridSize { expected: usize, actual: usize },
    GridSizeMismatch { expected: usize, actual: usize },
    LastMoveOutOfBounds { position: Position },
    LastMoveOnEmptyCell { position: Position },
    LastMoveByWrongPlayer { position: Position, expected: Player },
    MissingLastMove,
    StoneCountMismatch { blue: usize, red: usize },
    TurnOrderMismatch { expected: Player, actual: Player },
    OutcomeMismatch,
    UnexpectedLine { player: Player },
}

/// 游戏整体状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
    #[serde(default)]
    pub grid: Grid,
    #[serde(default)]
    pub turn: TurnState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            grid: Grid::new(DEFAULT_GRID_SIZE),
            turn: TurnState::new(),
            outcome: None,
            event_log: Vec::new(),
        }
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
    }

    pub fn current_player(&self) -> Player {
        self.turn.current_player
    }

    pub fn last_move(&self) -> Option<Position> {
        self.turn.last_move
    }

    pub fn is_finished(&self) -> bool {
        self.turn.game_over
    }

    /// The winner keeps the turn, so a won game reports its current player.
    pub fn winner(&self) -> Option<Player> {
        match self.outcome {
            Some(Outcome::Win { .. }) => Some(self.turn.current_player),
            _ => None,
        }
    }

    pub fn status_message(&self) -> String {
        match self.outcome {
            Some(Outcome::Win { .. }) => {
                format!("Player {} wins!", self.turn.current_player.name())
            }
            Some(Outcome::Draw) => "Draw!".to_string(),
            _ => format!("Player {}'s turn", self.turn.current_player.name()),
        }
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let size = self.grid.size();
        if size != DEFAULT_GRID_SIZE {
            return Err(IntegrityError::UnsupportedGridSize {
                expected: DEFAULT_GRID_SIZE,
                actual: size,
            });
        }

        let actual = self.grid.cells().len();
        if actual != size * size {
            return Err(IntegrityError::GridSizeMismatch {
                expected: size * size,
                actual,
            });
        }

        let blue = self.grid.count(Cell::Blue);
        let red = self.grid.count(Cell::Red);
        if blue != red && blue != red + 1 {
            return Err(IntegrityError::StoneCountMismatch { blue, red });
        }

        match self.turn.last_move {
            Some(position) => match self.grid.get(position) {
                None => return Err(IntegrityError::LastMoveOutOfBounds { position }),
                Some(Cell::Empty) => return Err(IntegrityError::LastMoveOnEmptyCell { position }),
                Some(_) => {}
            },
            None if blue + red > 0 => return Err(IntegrityError::MissingLastMove),
            None => {}
        }

        let terminal = matches!(self.outcome, Some(outcome) if outcome.is_terminal());
        if terminal != self.turn.game_over || self.outcome == Some(Outcome::Continue) {
            return Err(IntegrityError::OutcomeMismatch);
        }

        // The player who moved last keeps the turn once the game is over.
        let blue_moved_last = blue > red;
        let expected = match (self.turn.game_over, blue_moved_last) {
            (true, true) | (false, false) => Player::Blue,
            (true, false) | (false, true) => Player::Red,
        };
        if self.turn.current_player != expected {
            return Err(IntegrityError::TurnOrderMismatch {
                expected,
                actual: self.turn.current_player,
            });
        }

        if let Some(position) = self.turn.last_move {
            let last_mover = if self.turn.game_over {
                self.turn.current_player
            } else {
                self.turn.current_player.other()
            };
            if self.grid.get(position) != Some(last_mover.to_cell()) {
                return Err(IntegrityError::LastMoveByWrongPlayer {
                    position,
                    expected: last_mover,
                });
            }
        }

        // Only a won game may show a line on the board.
        if !matches!(self.outcome, Some(Outcome::Win { .. })) {
            for player in [Player::Blue, Player::Red] {
                if self.grid.has_line(player) {
                    return Err(IntegrityError::UnexpectedLine { player });
                }
            }
        }

        Ok(())
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
