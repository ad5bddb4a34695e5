//! Shared run-state machine
//!
//! The main grading path and the watchdog race on one record: whichever side
//! reaches its transition first wins, the other side finds the marker already
//! terminal and performs no further mutation. Every transition happens under
//! the mutex, which also covers the sandbox termination performed by the
//! winning side, so at most one termination is ever issued per run.

use std::sync::Arc;
use tokio::sync::Mutex;

/// Lifecycle marker of one grading run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Command still running (or not yet started)
    Waiting,
    /// Main path observed a normal return from the run call
    Completed,
    /// Watchdog terminated the sandbox on deadline expiry
    Killed,
}

/// Mutable record shared between the main path and the watchdog
#[derive(Debug)]
pub struct RunStatus {
    state: RunState,
}

impl RunStatus {
    pub fn new() -> Self {
        RunStatus {
            state: RunState::Waiting,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_waiting(&self) -> bool {
        self.state == RunState::Waiting
    }

    /// Transition `Waiting` → `Completed`.
    ///
    /// Returns false without mutating if the state is already terminal.
    pub fn try_complete(&mut self) -> bool {
        if self.state == RunState::Waiting {
            self.state = RunState::Completed;
            true
        } else {
            false
        }
    }

    /// Transition `Waiting` → `Killed`.
    ///
    /// Returns false without mutating if the state is already terminal.
    pub fn try_kill(&mut self) -> bool {
        if self.state == RunState::Waiting {
            self.state = RunState::Killed;
            true
        } else {
            false
        }
    }
}

impl Default for RunStatus {
    fn default() -> Self {
        RunStatus::new()
    }
}

/// Handle to the shared status record
pub type SharedStatus = Arc<Mutex<RunStatus>>;

/// Fresh shared status in the `Waiting` state
pub fn shared() -> SharedStatus {
    Arc::new(Mutex::new(RunStatus::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_wins_once() {
        let mut status = RunStatus::new();
        assert!(status.try_complete());
        assert_eq!(status.state(), RunState::Completed);
        assert!(!status.try_complete());
        assert!(!status.try_kill());
        assert_eq!(status.state(), RunState::Completed);
    }

    #[test]
    fn test_kill_wins_once() {
        let mut status = RunStatus::new();
        assert!(status.try_kill());
        assert_eq!(status.state(), RunState::Killed);
        assert!(!status.try_complete());
        assert_eq!(status.state(), RunState::Killed);
    }
}
