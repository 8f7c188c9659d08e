//! Display scan driver.
//!
//! One [`ScanDriver::tick`] per timer period lights exactly one matrix cell.
//! The cursor walks the board row-major; when it wraps back to the origin a
//! frame is complete, and frame boundaries are where game time advances —
//! never mid-frame, so a move can not tear a partially drawn picture.

use crate::bitfield::{mod_pow2, set_bits};
use crate::game::{Cell, Position, SnakeGame, Step, GRID_COLS, GRID_ROWS};

/// Frames between game advances. At a 320 us tick and 64 cells per frame
/// this works out to roughly four moves per second.
pub const MOVE_QUANTUM: u32 = 12;

// Select-word layout, matching the decoder wiring: row on bits [4:2],
// column on bits [7:5].
pub const ROW_LO: u8 = 2;
pub const ROW_HI: u8 = 4;
pub const COL_LO: u8 = 5;
pub const COL_HI: u8 = 7;

/// Packs a `(row, column)` selection into one control word.
pub fn select_word(row: u8, col: u8) -> u8 {
    let word = set_bits(0, row, ROW_LO, ROW_HI);
    set_bits(word, col, COL_LO, COL_HI)
}

/// Whether the selected cell's intensity output should be driven this tick.
/// `On` also means the dimming phase counter must be reset so the PWM period
/// stays regular across cell switches.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PixelDrive {
    Off,
    On,
}

/// What the hardware has to do for one tick.
pub struct Tick {
    pub select: u8,
    pub pixel: PixelDrive,
    pub frame_boundary: bool,
    /// True when a pending restart request was honored this tick; the caller
    /// clears its request flag on seeing this.
    pub restart_consumed: bool,
}

struct ScanCursor {
    row: u8,
    col: u8,
}

impl ScanCursor {
    const fn new() -> Self {
        Self { row: 0, col: 0 }
    }

    fn position(&self) -> Position {
        Position {
            row: self.row,
            col: self.col,
        }
    }

    /// Advances one cell row-major; true when wrapping back to (0, 0).
    fn advance(&mut self) -> bool {
        self.col = mod_pow2(self.col + 1, GRID_COLS);
        if self.col == 0 {
            self.row = mod_pow2(self.row + 1, GRID_ROWS);
            return self.row == 0;
        }
        false
    }
}

pub struct ScanDriver {
    cursor: ScanCursor,
    frame_ticks: u32,
}

impl ScanDriver {
    pub const fn new() -> Self {
        Self {
            cursor: ScanCursor::new(),
            frame_ticks: 0,
        }
    }

    /// One scan tick: emit the current cell, advance the cursor, and on a
    /// frame boundary run the game bookkeeping (restart request, move
    /// quantum, pause pinning).
    pub fn tick(&mut self, game: &mut SnakeGame, restart_requested: bool) -> Tick {
        let pos = self.cursor.position();
        let select = select_word(pos.row, pos.col);
        let pixel = match game.cell(pos) {
            Cell::Empty => PixelDrive::Off,
            Cell::Snake | Cell::Food => PixelDrive::On,
        };

        let frame_boundary = self.cursor.advance();
        let mut restart_consumed = false;
        if frame_boundary {
            if game.paused() {
                // Pin the counter one short of the quantum so that
                // unpausing moves on the very next frame.
                self.frame_ticks = MOVE_QUANTUM - 1;
            } else {
                self.frame_ticks += 1;
            }

            if restart_requested {
                game.reset();
                self.frame_ticks = 0;
                restart_consumed = true;
            } else if !game.paused() && self.frame_ticks >= MOVE_QUANTUM {
                self.frame_ticks = 0;
                if game.advance() == Step::Collided {
                    game.reset();
                }
            }
        }

        Tick {
            select,
            pixel,
            frame_boundary,
            restart_consumed,
        }
    }
}
