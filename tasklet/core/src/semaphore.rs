//! Single-waiter rendezvous counter
//!
//! A semaphore binds one waiter task to a counter. Tasks spawned with the
//! semaphore attached each bump the counter; each one that finishes drops
//! it, and the last one out wakes the waiter. Attaching and waking go
//! through the kernel, which owns the task pool; this type only holds the
//! shared counter.

use alloc::rc::Rc;
use core::cell::Cell;
use core::fmt;

use crate::{Relocation, TaskId};

struct Inner {
    value: Cell<i32>,
    waiter: Cell<Option<TaskId>>,
}

/// Shared handle to a rendezvous counter
#[derive(Clone)]
pub struct Semaphore {
    inner: Rc<Inner>,
}

impl Semaphore {
    /// Create an unbound semaphore
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                value: Cell::new(0),
                waiter: Cell::new(None),
            }),
        }
    }

    /// Current counter value
    pub fn value(&self) -> i32 {
        self.inner.value.get()
    }

    /// The task woken when the counter drains
    pub fn waiter(&self) -> Option<TaskId> {
        self.inner.waiter.get()
    }

    /// Check if attached work is still outstanding
    pub fn is_pending(&self) -> bool {
        self.value() > 0
    }

    /// Bind `waiter` and reset the counter
    pub fn bind(&self, waiter: TaskId) {
        self.inner.value.set(0);
        self.inner.waiter.set(Some(waiter));
    }

    /// Record one more attached task
    pub fn enter(&self) {
        self.inner.value.set(self.value() + 1);
    }

    /// Record one attached task leaving
    ///
    /// Returns the waiter when this was the last one.
    pub fn leave(&self) -> Option<TaskId> {
        let value = self.value() - 1;
        self.inner.value.set(value);
        if value == 0 {
            self.waiter()
        } else {
            None
        }
    }

    /// Check if two handles share one counter
    pub fn ptr_eq(&self, other: &Semaphore) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Follow the waiter through a pool compaction
    pub fn relocate(&self, moves: &[Relocation]) {
        if let Some(waiter) = self.waiter() {
            self.inner.waiter.set(Some(Relocation::apply(moves, waiter)));
        }
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("value", &self.value())
            .field("waiter", &self.waiter())
            .finish()
    }
}
