//! Cooperative liveness tracking for the watchdog protocol.
//!
//! Three independent tasks each own one bit of a shared register and set it
//! whenever they run. The main loop marks its own bit, then attempts to
//! drain: only when every bit is set does the drain succeed, and only then
//! is the hardware watchdog fed. A stuck task therefore starves the kick
//! and lets the watchdog reset the chip.

use portable_atomic::{AtomicU8, Ordering};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Task {
    MainLoop,
    PeriodicTask,
    SampleTask,
}

impl Task {
    pub const fn bit(self) -> u8 {
        match self {
            Task::MainLoop => 0b001,
            Task::PeriodicTask => 0b010,
            Task::SampleTask => 0b100,
        }
    }
}

/// Register value once every task has reported.
pub const ALL_ALIVE: u8 = 0b111;

pub struct LivenessRegister(AtomicU8);

impl LivenessRegister {
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Marks `task` as having run since the last drain. Callable from any
    /// context; a plain atomic OR, so it can not lose a concurrent mark.
    pub fn mark_alive(&self, task: Task) {
        self.0.fetch_or(task.bit(), Ordering::AcqRel);
    }

    /// Clears the register and returns true iff all tasks have reported
    /// since the last drain. The compare-exchange keeps a mark that lands
    /// between the check and the clear from being dropped.
    pub fn try_drain(&self) -> bool {
        self.0
            .compare_exchange(ALL_ALIVE, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn snapshot(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_drain_until_every_task_reports() {
        let reg = LivenessRegister::new();
        assert!(!reg.try_drain());
        reg.mark_alive(Task::MainLoop);
        assert!(!reg.try_drain());
        reg.mark_alive(Task::PeriodicTask);
        assert!(!reg.try_drain());
        reg.mark_alive(Task::SampleTask);
        assert!(reg.try_drain());
    }

    #[test]
    fn drain_zeroes_the_register() {
        let reg = LivenessRegister::new();
        reg.mark_alive(Task::MainLoop);
        reg.mark_alive(Task::PeriodicTask);
        reg.mark_alive(Task::SampleTask);
        assert!(reg.try_drain());
        assert_eq!(reg.snapshot(), 0);
        // A second drain needs a full new round of reports.
        assert!(!reg.try_drain());
    }

    #[test]
    fn marks_are_idempotent() {
        let reg = LivenessRegister::new();
        reg.mark_alive(Task::SampleTask);
        reg.mark_alive(Task::SampleTask);
        assert_eq!(reg.snapshot(), Task::SampleTask.bit());
    }

    #[test]
    fn repeated_rounds_keep_working() {
        let reg = LivenessRegister::new();
        for _ in 0..3 {
            reg.mark_alive(Task::PeriodicTask);
            reg.mark_alive(Task::SampleTask);
            reg.mark_alive(Task::MainLoop);
            assert!(reg.try_drain());
            assert_eq!(reg.snapshot(), 0);
        }
    }

    #[test]
    fn task_bits_are_distinct() {
        assert_eq!(
            Task::MainLoop.bit() | Task::PeriodicTask.bit() | Task::SampleTask.bit(),
            ALL_ALIVE
        );
        assert_eq!(Task::MainLoop.bit() & Task::PeriodicTask.bit(), 0);
        assert_eq!(Task::MainLoop.bit() & Task::SampleTask.bit(), 0);
        assert_eq!(Task::PeriodicTask.bit() & Task::SampleTask.bit(), 0);
    }
}
