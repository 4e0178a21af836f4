//! Interrupt-safe task status
//!
//! The scheduler is single threaded, but a hardware timer interrupt may wake
//! a parked task. The status word is therefore the one piece of state shared
//! across contexts, and every access goes through a critical section.

use alloc::sync::Arc;
use core::cell::Cell;
use critical_section::Mutex;

use crate::TaskStatus;

#[derive(Debug, Clone, Copy)]
struct Slot {
    status: TaskStatus,
    generation: u32,
}

/// Status word of one pool slot
pub struct StatusCell {
    inner: Mutex<Cell<Slot>>,
}

impl StatusCell {
    /// Create an idle cell at generation zero
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(Slot {
                status: TaskStatus::Idle,
                generation: 0,
            })),
        }
    }

    /// Read the status
    pub fn get(&self) -> TaskStatus {
        critical_section::with(|cs| self.inner.borrow(cs).get().status)
    }

    /// Overwrite the status
    pub fn set(&self, status: TaskStatus) {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            let mut slot = cell.get();
            slot.status = status;
            cell.set(slot);
        });
    }

    /// Current slot generation
    pub fn generation(&self) -> u32 {
        critical_section::with(|cs| self.inner.borrow(cs).get().generation)
    }

    /// Mark the slot `Running` under a freshly leased generation
    pub fn activate(&self, generation: u32) {
        critical_section::with(|cs| {
            self.inner.borrow(cs).set(Slot {
                status: TaskStatus::Running,
                generation,
            });
        });
    }

    /// Return the slot to `Idle` and advance its generation
    pub fn retire(&self) -> u32 {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            let slot = cell.get();
            let next = Slot {
                status: TaskStatus::Idle,
                generation: slot.generation.wrapping_add(1),
            };
            cell.set(next);
            next.generation
        })
    }

    /// Switch `Waiting` to `Running` if the slot is still at `generation`
    pub fn wake(&self, generation: u32) -> bool {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            let mut slot = cell.get();
            if slot.generation != generation || slot.status != TaskStatus::Waiting {
                return false;
            }
            slot.status = TaskStatus::Running;
            cell.set(slot);
            true
        })
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle that wakes one parked task from any context
///
/// Safe to move into an interrupt handler: `wake` performs a single flag
/// update inside a critical section and touches no other runtime state. A
/// waker outliving its task is harmless, since the slot's generation will
/// have moved on.
#[derive(Clone)]
pub struct TaskWaker {
    cell: Arc<StatusCell>,
    generation: u32,
}

impl TaskWaker {
    /// Bind a waker to the slot's current generation
    pub fn new(cell: Arc<StatusCell>) -> Self {
        let generation = cell.generation();
        Self { cell, generation }
    }

    /// Wake the task if it is still parked
    ///
    /// Returns `true` if the status was switched to `Running`.
    pub fn wake(&self) -> bool {
        self.cell.wake(self.generation)
    }

    /// Check if the task this waker was bound to is gone
    pub fn is_stale(&self) -> bool {
        self.cell.generation() != self.generation
    }
}

impl core::fmt::Debug for TaskWaker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TaskWaker")
            .field("generation", &self.generation)
            .finish()
    }
}
