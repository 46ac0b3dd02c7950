//! Per-task guard that refuses a run while the previous one is still going

use super::TaskKind;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct SingleFlight {
    kind: TaskKind,
    running: AtomicBool,
}

impl SingleFlight {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            running: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Claim the task. Returns `None` if another run holds it.
    pub fn try_acquire(&self) -> Option<SingleFlightPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SingleFlightPermit { guard: self })
    }
}

/// Releases the task when dropped, whatever way the run ended
#[derive(Debug)]
pub struct SingleFlightPermit<'a> {
    guard: &'a SingleFlight,
}

impl Drop for SingleFlightPermit<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}
