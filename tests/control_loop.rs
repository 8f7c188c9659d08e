//! End-to-end checks of the periodic control loop, driven the way the
//! hardware timer and main loop would drive it.

use matrix_snake::game::{SnakeGame, CELL_COUNT, GRID_COLS};
use matrix_snake::input;
use matrix_snake::liveness::{LivenessRegister, Task};
use matrix_snake::scan::{ScanDriver, MOVE_QUANTUM};

/// One full display frame: 64 scan ticks.
fn run_frame(driver: &mut ScanDriver, game: &mut SnakeGame, restart: bool) -> bool {
    let mut consumed = false;
    for _ in 0..CELL_COUNT {
        consumed |= driver.tick(game, restart).restart_consumed;
    }
    consumed
}

/// Frames until the next game advance.
fn run_quantum(driver: &mut ScanDriver, game: &mut SnakeGame) {
    for _ in 0..MOVE_QUANTUM {
        run_frame(driver, game, false);
    }
}

#[test]
fn d_command_marches_the_head_right_forever() {
    let mut driver = ScanDriver::new();
    let mut game = SnakeGame::new();

    let dir = input::decode(b'd').expect("'d' is a command byte");
    game.set_pending_direction(dir);

    let start_col = game.head().col;
    for step in 1..=20u8 {
        run_quantum(&mut driver, &mut game);
        let expected = (start_col + step) % GRID_COLS;
        assert_eq!(game.head().col, expected, "after quantum {step}");
    }
}

#[test]
fn ignored_bytes_leave_the_heading_alone() {
    let mut driver = ScanDriver::new();
    let mut game = SnakeGame::new();

    for byte in [b'x', b' ', 0x00, 0xFF] {
        assert_eq!(input::decode(byte), None);
    }
    // No command received: the snake keeps its canonical rightward heading.
    let start = game.head();
    run_quantum(&mut driver, &mut game);
    assert_eq!(game.head().row, start.row);
    assert_eq!(game.head().col, (start.col + 1) % GRID_COLS);
}

#[test]
fn restart_button_resets_at_the_next_frame_boundary() {
    let mut driver = ScanDriver::new();
    let mut game = SnakeGame::new();

    // Let the game run a while first.
    for _ in 0..3 {
        run_quantum(&mut driver, &mut game);
    }
    let consumed = run_frame(&mut driver, &mut game, true);
    assert!(consumed);
    assert_eq!(game.score(), 0);
    assert_eq!(game.len(), 3);
    assert!(!game.paused());
}

#[test]
fn pause_freezes_movement_and_unpause_resumes_promptly() {
    let mut driver = ScanDriver::new();
    let mut game = SnakeGame::new();

    game.toggle_paused();
    let frozen = game.head();
    for _ in 0..(3 * MOVE_QUANTUM) {
        run_frame(&mut driver, &mut game, false);
    }
    assert_eq!(game.head(), frozen);

    // One frame after unpausing the pinned counter reaches the quantum.
    game.toggle_paused();
    run_frame(&mut driver, &mut game, false);
    assert_ne!(game.head(), frozen);
}

#[test]
fn watchdog_rendezvous_only_fires_when_every_task_runs() {
    let liveness = LivenessRegister::new();
    let mut kicks = 0;

    // Healthy system: scan tick, sample tick, then a main-loop iteration.
    for _ in 0..5 {
        liveness.mark_alive(Task::PeriodicTask);
        liveness.mark_alive(Task::SampleTask);
        liveness.mark_alive(Task::MainLoop);
        if liveness.try_drain() {
            kicks += 1;
        }
    }
    assert_eq!(kicks, 5);

    // The sampling task dies: the rendezvous must never complete again,
    // no matter how often the other two report.
    for _ in 0..100 {
        liveness.mark_alive(Task::PeriodicTask);
        liveness.mark_alive(Task::MainLoop);
        assert!(!liveness.try_drain());
    }
    assert_eq!(liveness.snapshot(), Task::PeriodicTask.bit() | Task::MainLoop.bit());
}

#[test]
fn collision_restart_keeps_the_loop_running() {
    let mut driver = ScanDriver::new();
    let mut game = SnakeGame::new();

    // Reverse into the neck: the driver should fold the collision into a
    // silent restart and keep the game alive.
    game.set_pending_direction(input::decode(b'a').unwrap());
    run_quantum(&mut driver, &mut game);
    assert_eq!(game.len(), 3);
    assert_eq!(game.score(), 0);

    // And the restarted game still advances.
    let head = game.head();
    run_quantum(&mut driver, &mut game);
    assert_ne!(game.head(), head);
}
