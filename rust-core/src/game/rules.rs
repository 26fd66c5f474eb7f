use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::state::{
    Cell, GameEvent, GameState, Grid, IntegrityError, Outcome, Player, Position, TurnState,
    WIN_LENGTH,
};

/// Axis directions in scan order: horizontal, vertical, main diagonal, anti diagonal.
const AXES: [[(isize, isize); 2]; 4] = [
    [(0, 1), (0, -1)],
    [(1, 0), (-1, 0)],
    [(1, 1), (-1, -1)],
    [(1, -1), (-1, 1)],
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RuleError {
    GameFinished,
    OutOfBounds {
        position: Position,
    },
    CellOccupied {
        position: Position,
    },
    NotAdjacent {
        position: Position,
        last_move: Position,
    },
    IntegrityViolation {
        error: IntegrityError,
    },
}

/// 一次落子后返回给前端的完整结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveResolution {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    pub outcome: Outcome,
}

impl MoveResolution {
    pub fn new(state: GameState, events: Vec<GameEvent>, outcome: Outcome) -> Self {
        Self {
            state,
            events,
            outcome,
        }
    }
}

/// 规则引擎：所有操作都是作用于棋盘与回合状态的纯函数。
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleEngine;

impl RuleEngine {
    fn ensure_integrity(state: &GameState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    /// Explains why `position` is not a legal move, if it isn't.
    pub fn check_move(
        grid: &Grid,
        last_move: Option<Position>,
        position: Position,
    ) -> Result<(), RuleError> {
        match grid.get(position) {
            None => return Err(RuleError::OutOfBounds { position }),
            Some(Cell::Empty) => {}
            Some(_) => return Err(RuleError::CellOccupied { position }),
        }

        match last_move {
            Some(last_move) if !position.is_adjacent(last_move) => Err(RuleError::NotAdjacent {
                position,
                last_move,
            }),
            _ => Ok(()),
        }
    }

    pub fn validate_move(grid: &Grid, last_move: Option<Position>, position: Position) -> bool {
        Self::check_move(grid, last_move, position).is_ok()
    }

    /// Places `player` at `position` and advances the turn.
    ///
    /// The move must already have passed [`RuleEngine::validate_move`] on a
    /// game that is not over. Only the target cell of `grid` is written.
    pub fn apply_move(
        grid: &mut Grid,
        turn: &mut TurnState,
        position: Position,
        player: Player,
    ) -> Outcome {
        grid.set(position, player.to_cell());
        turn.last_move = Some(position);
        turn.current_player = player;

        if let Some(line) = Self::check_win(grid, position, player) {
            turn.game_over = true;
            return Outcome::Win { line };
        }

        if grid.is_full() {
            turn.game_over = true;
            return Outcome::Draw;
        }

        turn.game_over = false;
        turn.current_player = player.other();
        Outcome::Continue
    }

    /// Returns the first four cells of the first axis through `position`
    /// holding a run of at least [`WIN_LENGTH`] stones of `player`.
    ///
    /// The line starts at `position`, then follows the run in the axis's
    /// first direction, then the run in its second direction.
    pub fn check_win(
        grid: &Grid,
        position: Position,
        player: Player,
    ) -> Option<[Position; WIN_LENGTH]> {
        let cell = player.to_cell();
        AXES.iter().find_map(|&[forward, backward]| {
            let mut line = vec![position];
            line.extend(Self::run(grid, position, forward, cell));
            line.extend(Self::run(grid, position, backward, cell));
            line.get(..WIN_LENGTH)
                .and_then(|winning| winning.try_into().ok())
        })
    }

    fn run(
        grid: &Grid,
        origin: Position,
        (d_row, d_col): (isize, isize),
        cell: Cell,
    ) -> Vec<Position> {
        let mut run = Vec::new();
        let mut cursor = origin;
        while let Some(next) = cursor.offset(d_row, d_col) {
            if grid.get(next) != Some(cell) {
                break;
            }
            run.push(next);
            cursor = next;
        }
        run
    }

    /// Every empty cell the next player may choose.
    pub fn compute_highlighted_cells(
        grid: &Grid,
        last_move: Option<Position>,
    ) -> BTreeSet<Position> {
        grid.positions()
            .filter(|&position| Self::validate_move(grid, last_move, position))
            .collect()
    }

    /// Cells the current player may choose; empty once the game is over.
    pub fn legal_moves(state: &GameState) -> BTreeSet<Position> {
        if state.is_finished() {
            return BTreeSet::new();
        }
        Self::compute_highlighted_cells(&state.grid, state.last_move())
    }

    /// Checks and plays `position` for the current player.
    ///
    /// A rejected move leaves `state` untouched.
    pub fn attempt_move(
        state: &mut GameState,
        position: Position,
    ) -> Result<MoveResolution, RuleError> {
        if state.is_finished() {
            return Err(RuleError::GameFinished);
        }

        Self::ensure_integrity(state)?;
        Self::check_move(&state.grid, state.turn.last_move, position)?;

        let player = state.turn.current_player;
        let outcome = Self::apply_move(&mut state.grid, &mut state.turn, position, player);

        let mut events = vec![GameEvent::StonePlaced { player, position }];
        match outcome {
            Outcome::Continue => events.push(GameEvent::TurnPassed {
                next: state.turn.current_player,
            }),
            Outcome::Win { line } => {
                state.outcome = Some(outcome);
                events.push(GameEvent::GameWon {
                    winner: player,
                    line,
                });
            }
            Outcome::Draw => {
                state.outcome = Some(outcome);
                events.push(GameEvent::GameDrawn);
            }
        }

        for event in &events {
            state.record_event(event.clone());
        }

        Ok(MoveResolution::new(state.clone(), events, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::DEFAULT_GRID_SIZE;

    fn pos(row: usize, col: usize) -> Position {
        Position::new(row, col)
    }

    fn play_all(state: &mut GameState, moves: &[(usize, usize)]) -> Vec<MoveResolution> {
        moves
            .iter()
            .map(|&(row, col)| {
                RuleEngine::attempt_move(state, pos(row, col))
                    .unwrap_or_else(|error| panic!("move ({row}, {col}) rejected: {error:?}"))
            })
            .collect()
    }

    /// A 49-move game in which every move is adjacent to the previous one and
    /// no one ever lines up four stones.
    #[rustfmt::skip]
    const DRAWN_GAME: [(usize, usize); 49] = [
        (0, 1), (0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0),
        (6, 0), (6, 1), (6, 2), (5, 1), (4, 1), (5, 2), (6, 3),
        (6, 4), (5, 3), (4, 2), (3, 1), (2, 1), (1, 1), (0, 2),
        (1, 2), (0, 3), (0, 4), (0, 5), (0, 6), (1, 6), (2, 6),
        (1, 5), (1, 4), (1, 3), (2, 2), (3, 2), (2, 3), (3, 3),
        (4, 3), (3, 4), (2, 4), (2, 5), (3, 6), (4, 6), (3, 5),
        (4, 4), (5, 4), (4, 5), (5, 6), (6, 5), (6, 6), (5, 5),
    ];

    #[test]
    fn first_move_is_legal_on_any_empty_cell() {
        let grid = Grid::new(DEFAULT_GRID_SIZE);
        for position in grid.positions() {
            assert!(RuleEngine::validate_move(&grid, None, position));
        }
        assert!(!RuleEngine::validate_move(&grid, None, pos(7, 0)));
        assert!(!RuleEngine::validate_move(&grid, None, pos(0, 7)));
    }

    #[test]
    fn first_move_rejects_occupied_cell() {
        let mut grid = Grid::new(DEFAULT_GRID_SIZE);
        grid.set(pos(2, 2), Cell::Red);
        assert_eq!(
            RuleEngine::check_move(&grid, None, pos(2, 2)),
            Err(RuleError::CellOccupied { position: pos(2, 2) })
        );
    }

    #[test]
    fn second_move_is_confined_to_neighbours() {
        let mut state = GameState::new();
        RuleEngine::attempt_move(&mut state, pos(3, 3)).expect("opening move should succeed");

        let last = state.last_move();
        assert!(RuleEngine::validate_move(&state.grid, last, pos(2, 2)));
        assert!(!RuleEngine::validate_move(&state.grid, last, pos(5, 5)));
        assert_eq!(
            RuleEngine::check_move(&state.grid, last, pos(5, 5)),
            Err(RuleError::NotAdjacent {
                position: pos(5, 5),
                last_move: pos(3, 3),
            })
        );
        assert_eq!(
            RuleEngine::check_move(&state.grid, last, pos(3, 3)),
            Err(RuleError::CellOccupied { position: pos(3, 3) })
        );
    }

    #[test]
    fn moves_beyond_chebyshev_one_are_never_legal() {
        let grid = Grid::new(DEFAULT_GRID_SIZE);
        for last in grid.positions() {
            for position in grid.positions() {
                if position.chebyshev_distance(last) > 1 {
                    assert!(
                        !RuleEngine::validate_move(&grid, Some(last), position),
                        "{position:?} should be illegal after {last:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn highlighted_cells_surround_last_move() {
        let mut state = GameState::new();
        RuleEngine::attempt_move(&mut state, pos(3, 3)).expect("opening move should succeed");

        let highlighted = RuleEngine::compute_highlighted_cells(&state.grid, state.last_move());
        #[rustfmt::skip]
        let expected: BTreeSet<Position> = [
            (2, 2), (2, 3), (2, 4),
            (3, 2), (3, 4),
            (4, 2), (4, 3), (4, 4),
        ]
        .iter()
        .map(|&(row, col)| pos(row, col))
        .collect();
        assert_eq!(highlighted, expected);
    }

    #[test]
    fn highlighted_cells_are_clipped_at_corner() {
        let mut state = GameState::new();
        play_all(&mut state, &[(0, 1), (0, 0)]);

        let highlighted = RuleEngine::compute_highlighted_cells(&state.grid, state.last_move());
        let expected: BTreeSet<Position> = [pos(1, 0), pos(1, 1)].into_iter().collect();
        assert_eq!(highlighted, expected);
    }

    #[test]
    fn highlighted_cells_cover_whole_grid_before_first_move() {
        let grid = Grid::new(DEFAULT_GRID_SIZE);
        assert_eq!(RuleEngine::compute_highlighted_cells(&grid, None).len(), 49);
    }

    #[test]
    fn legal_moves_are_empty_after_a_win() {
        let mut state = GameState::new();
        play_all(
            &mut state,
            &[(0, 0), (1, 0), (1, 1), (2, 1), (2, 2), (3, 2), (3, 3)],
        );

        assert!(state.is_finished());
        assert!(
            !RuleEngine::compute_highlighted_cells(&state.grid, state.last_move()).is_empty(),
            "the last move still has empty neighbours"
        );
        assert!(RuleEngine::legal_moves(&state).is_empty());
    }

    #[test]
    fn legal_moves_match_highlighted_cells_mid_game() {
        let mut state = GameState::new();
        play_all(&mut state, &[(3, 3), (2, 2)]);

        assert_eq!(
            RuleEngine::legal_moves(&state),
            RuleEngine::compute_highlighted_cells(&state.grid, state.last_move())
        );
        assert_eq!(RuleEngine::legal_moves(&state).len(), 7);
    }

    #[test]
    fn apply_move_writes_exactly_one_cell() {
        let mut state = GameState::new();
        play_all(&mut state, &[(3, 3), (2, 2), (2, 3)]);

        let before = state.grid.clone();
        let mut grid = state.grid.clone();
        let mut turn = state.turn;
        let outcome = RuleEngine::apply_move(&mut grid, &mut turn, pos(1, 2), Player::Red);

        let changed: Vec<Position> = grid
            .positions()
            .filter(|&p| grid.get(p) != before.get(p))
            .collect();
        assert_eq!(changed, vec![pos(1, 2)]);
        assert_eq!(outcome, Outcome::Continue);
        assert_eq!(turn.current_player, Player::Blue);
        assert_eq!(turn.last_move, Some(pos(1, 2)));
        assert!(!turn.game_over);
    }

    #[test]
    fn diagonal_four_wins_with_exact_line() {
        let mut state = GameState::new();
        let resolutions = play_all(
            &mut state,
            &[(0, 0), (1, 0), (1, 1), (2, 1), (2, 2), (3, 2), (3, 3)],
        );

        let last = resolutions.last().expect("moves were played");
        let expected = [pos(3, 3), pos(2, 2), pos(1, 1), pos(0, 0)];
        assert_eq!(last.outcome, Outcome::Win { line: expected });
        assert_eq!(state.winner(), Some(Player::Blue));
        assert_eq!(state.current_player(), Player::Blue, "winner keeps the turn");
        assert!(state.is_finished());
        assert_eq!(
            last.events.last(),
            Some(&GameEvent::GameWon {
                winner: Player::Blue,
                line: expected,
            })
        );
    }

    #[test]
    fn horizontal_run_starts_at_placed_cell() {
        let mut grid = Grid::new(DEFAULT_GRID_SIZE);
        for col in [1, 2, 4, 5] {
            grid.set(pos(6, col), Cell::Red);
        }
        grid.set(pos(6, 3), Cell::Red);

        let line = RuleEngine::check_win(&grid, pos(6, 3), Player::Red);
        assert_eq!(line, Some([pos(6, 3), pos(6, 4), pos(6, 5), pos(6, 2)]));
    }

    #[test]
    fn horizontal_axis_is_checked_before_vertical() {
        let mut grid = Grid::new(DEFAULT_GRID_SIZE);
        for i in 0..4 {
            grid.set(pos(3, i), Cell::Blue);
            grid.set(pos(i, 0), Cell::Blue);
        }

        let line = RuleEngine::check_win(&grid, pos(3, 0), Player::Blue);
        assert_eq!(line, Some([pos(3, 0), pos(3, 1), pos(3, 2), pos(3, 3)]));
    }

    #[test]
    fn anti_diagonal_win_is_detected() {
        let mut grid = Grid::new(DEFAULT_GRID_SIZE);
        for (row, col) in [(0, 6), (1, 5), (2, 4), (3, 3)] {
            grid.set(pos(row, col), Cell::Red);
        }

        let line = RuleEngine::check_win(&grid, pos(1, 5), Player::Red);
        assert_eq!(line, Some([pos(1, 5), pos(2, 4), pos(3, 3), pos(0, 6)]));
    }

    #[test]
    fn three_in_a_row_or_broken_runs_do_not_win() {
        let mut grid = Grid::new(DEFAULT_GRID_SIZE);
        for col in [0, 1, 2, 4] {
            grid.set(pos(0, col), Cell::Blue);
        }
        grid.set(pos(0, 3), Cell::Red);

        assert_eq!(RuleEngine::check_win(&grid, pos(0, 2), Player::Blue), None);
        assert_eq!(RuleEngine::check_win(&grid, pos(0, 3), Player::Red), None);
    }

    #[test]
    fn winning_lines_are_collinear_and_owned() {
        let mut state = GameState::new();
        play_all(
            &mut state,
            &[(6, 6), (5, 6), (6, 5), (5, 5), (6, 4), (5, 4), (6, 3)],
        );

        let Some(Outcome::Win { line }) = state.outcome else {
            panic!("expected a win, got {:?}", state.outcome);
        };
        let mut sorted = line;
        sorted.sort();
        let step = (
            sorted[1].row as isize - sorted[0].row as isize,
            sorted[1].col as isize - sorted[0].col as isize,
        );
        for pair in sorted.windows(2) {
            let delta = (
                pair[1].row as isize - pair[0].row as isize,
                pair[1].col as isize - pair[0].col as isize,
            );
            assert_eq!(delta, step, "run cells should share one step");
        }
        for position in line {
            assert!(state.grid.in_bounds(position));
            assert_eq!(state.grid.get(position), Some(Cell::Blue));
        }
    }

    #[test]
    fn full_grid_without_four_is_a_draw() {
        let mut state = GameState::new();
        let resolutions = play_all(&mut state, &DRAWN_GAME);

        let (last, earlier) = resolutions.split_last().expect("moves were played");
        assert!(earlier.iter().all(|r| r.outcome == Outcome::Continue));
        assert_eq!(last.outcome, Outcome::Draw);
        assert_eq!(last.events.last(), Some(&GameEvent::GameDrawn));
        assert!(state.grid.is_full());
        assert!(state.is_finished());
        assert_eq!(state.winner(), None);
        assert_eq!(state.status_message(), "Draw!");
        assert!(state.integrity_check().is_ok());
    }

    #[test]
    fn finished_game_rejects_further_moves() {
        let mut state = GameState::new();
        play_all(
            &mut state,
            &[(0, 0), (1, 0), (1, 1), (2, 1), (2, 2), (3, 2), (3, 3)],
        );

        let snapshot = state.clone();
        assert_eq!(
            RuleEngine::attempt_move(&mut state, pos(4, 4)).map(|r| r.outcome),
            Err(RuleError::GameFinished)
        );
        assert_eq!(state, snapshot);
    }

    #[test]
    fn rejected_move_leaves_state_untouched() {
        let mut state = GameState::new();
        play_all(&mut state, &[(3, 3)]);

        let snapshot = state.clone();
        let error = RuleEngine::attempt_move(&mut state, pos(6, 6))
            .map(|r| r.outcome)
            .expect_err("distant move should be rejected");
        assert!(matches!(error, RuleError::NotAdjacent { .. }));
        assert_eq!(state, snapshot);
    }

    #[test]
    fn corrupted_state_is_refused() {
        let mut state = GameState::new();
        state.grid.set(pos(0, 0), Cell::Red);
        state.turn.last_move = Some(pos(0, 0));

        let error = RuleEngine::attempt_move(&mut state, pos(0, 1))
            .map(|r| r.outcome)
            .expect_err("corrupted state should be refused");
        assert!(matches!(error, RuleError::IntegrityViolation { .. }));
    }

    #[test]
    fn turns_alternate_and_events_are_logged() {
        let mut state = GameState::new();
        let resolutions = play_all(&mut state, &[(3, 3), (3, 4)]);

        assert_eq!(
            resolutions[0].events,
            vec![
                GameEvent::StonePlaced {
                    player: Player::Blue,
                    position: pos(3, 3),
                },
                GameEvent::TurnPassed { next: Player::Red },
            ]
        );
        assert_eq!(state.grid.get(pos(3, 4)), Some(Cell::Red));
        assert_eq!(state.current_player(), Player::Blue);
        assert_eq!(state.event_log.len(), 4);
    }
}
