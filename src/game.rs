//! Snake game state machine.
//!
//! The game owns the board, the snake body, the heading and the score, and
//! advances exactly one step per [`SnakeGame::advance`] call. The board has
//! no walls: coordinates wrap modulo the grid size. All mutation is expected
//! to happen from a single privileged context (the periodic timer task);
//! the type itself contains no locking.

use heapless::Deque;
use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoroshiro128StarStar;

use crate::bitfield::mod_pow2;

pub const GRID_ROWS: u8 = 8;
pub const GRID_COLS: u8 = 8;
pub const CELL_COUNT: usize = (GRID_ROWS as usize) * (GRID_COLS as usize);

const START_LEN: usize = 3;
const RNG_SEED: u64 = 0xB5AD_4ECE_DA1C_E2A9;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Cell {
    Empty,
    Snake,
    Food,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit step as `(drow, dcol)`.
    pub const fn delta(self) -> (i8, i8) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Position {
    pub row: u8,
    pub col: u8,
}

impl Position {
    /// One step in `dir` with toroidal wraparound on both axes.
    pub fn step(self, dir: Direction) -> Position {
        let (drow, dcol) = dir.delta();
        Position {
            row: mod_pow2(self.row.wrapping_add(drow as u8), GRID_ROWS),
            col: mod_pow2(self.col.wrapping_add(dcol as u8), GRID_COLS),
        }
    }
}

struct Board {
    cells: [[Cell; GRID_COLS as usize]; GRID_ROWS as usize],
}

impl Board {
    const fn new() -> Self {
        Self {
            cells: [[Cell::Empty; GRID_COLS as usize]; GRID_ROWS as usize],
        }
    }

    fn cell(&self, pos: Position) -> Cell {
        self.cells[pos.row as usize][pos.col as usize]
    }

    fn set(&mut self, pos: Position, cell: Cell) {
        self.cells[pos.row as usize][pos.col as usize] = cell;
    }

    fn clear(&mut self) {
        self.cells = [[Cell::Empty; GRID_COLS as usize]; GRID_ROWS as usize];
    }
}

/// Outcome of a single [`SnakeGame::advance`] step.
///
/// Collisions are reported rather than handled internally; the control loop
/// decides what a game-over means (the scan driver restarts the game).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Step {
    Moved,
    Ate,
    Collided,
}

pub struct SnakeGame {
    board: Board,
    /// Body positions, head at the front.
    body: Deque<Position, CELL_COUNT>,
    direction: Direction,
    pending: Direction,
    score: u16,
    paused: bool,
    rng: Xoroshiro128StarStar,
}

impl SnakeGame {
    pub fn new() -> Self {
        let mut game = Self {
            board: Board::new(),
            body: Deque::new(),
            direction: Direction::Right,
            pending: Direction::Right,
            score: 0,
            paused: false,
            rng: Xoroshiro128StarStar::seed_from_u64(RNG_SEED),
        };
        game.reset();
        game
    }

    /// Reinitializes to the canonical start: a three-segment snake in the
    /// middle row heading right, score zero, unpaused, one food cell at a
    /// randomly chosen unoccupied position. The RNG stream is not reseeded,
    /// so successive games see different food placements.
    pub fn reset(&mut self) {
        self.board.clear();
        self.body = Deque::new();
        let row = GRID_ROWS / 2;
        let head_col = GRID_COLS / 2;
        for i in 0..START_LEN {
            let pos = Position {
                row,
                col: head_col - i as u8,
            };
            self.body.push_back(pos).ok();
            self.board.set(pos, Cell::Snake);
        }
        self.direction = Direction::Right;
        self.pending = Direction::Right;
        self.score = 0;
        self.paused = false;
        self.place_food();
    }

    /// Records the heading to adopt on the next step. Overwrites any earlier
    /// pending value. Reversing the current heading is not rejected here;
    /// the snake will run into its own neck on the next step.
    pub fn set_pending_direction(&mut self, dir: Direction) {
        self.pending = dir;
    }

    pub fn score(&self) -> u16 {
        self.score
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn toggle_paused(&mut self) {
        self.paused = !self.paused;
    }

    pub fn cell(&self, pos: Position) -> Cell {
        self.board.cell(pos)
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn head(&self) -> Position {
        match self.body.front() {
            Some(pos) => *pos,
            // Unreachable: the body is seeded in reset() and never drained.
            None => Position { row: 0, col: 0 },
        }
    }

    /// Advances the game by one step: adopt the pending heading, move the
    /// head with wraparound, grow on food, otherwise shift, then check the
    /// new head against the rest of the body. Never fails; a full board
    /// simply skips food placement.
    pub fn advance(&mut self) -> Step {
        self.direction = self.pending;
        let new_head = self.head().step(self.direction);
        let ate = self.board.cell(new_head) == Cell::Food;

        if !ate {
            if let Some(tail) = self.body.pop_back() {
                self.board.set(tail, Cell::Empty);
            }
        }

        // Post-shift check: the vacated tail cell is legal to enter.
        let collided = self.body.iter().any(|&pos| pos == new_head);

        self.body.push_front(new_head).ok();
        self.board.set(new_head, Cell::Snake);

        if collided {
            return Step::Collided;
        }
        if ate {
            self.score += 1;
            self.place_food();
            return Step::Ate;
        }
        Step::Moved
    }

    /// Puts a food cell on a uniformly chosen unoccupied cell. When the
    /// snake covers the whole board there is nothing to place and the call
    /// is a no-op.
    fn place_food(&mut self) {
        let free = CELL_COUNT - self.body.len();
        if free == 0 {
            return;
        }
        let mut skip = (self.rng.next_u32() as usize) % free;
        for row in 0..GRID_ROWS {
            for col in 0..GRID_COLS {
                let pos = Position { row, col };
                if self.board.cell(pos) == Cell::Empty {
                    if skip == 0 {
                        self.board.set(pos, Cell::Food);
                        return;
                    }
                    skip -= 1;
                }
            }
        }
    }
}
