//! Task identities and resume points

use core::fmt;

/// Identity of a leased task
///
/// `index` is the pool slot, used for O(1) lookup and release. `generation`
/// changes every time the slot is released, so an id held past its task's
/// lifetime never addresses the slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    index: u32,
    generation: u32,
}

impl TaskId {
    /// Create a task id from a slot index and generation
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Get the pool slot index
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Get the slot generation
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Same task, moved to another slot
    pub const fn relocated(self, index: usize) -> Self {
        Self {
            index: index as u32,
            generation: self.generation,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}.{}", self.index, self.generation)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TaskId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "task#{}.{}", self.index, self.generation);
    }
}

/// A task that changed slot during pool compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    /// Id before the move
    pub from: TaskId,
    /// Id after the move
    pub to: TaskId,
}

impl Relocation {
    /// Map an id through a list of relocations
    pub fn apply(moves: &[Relocation], id: TaskId) -> TaskId {
        moves
            .iter()
            .find(|m| m.from == id)
            .map(|m| m.to)
            .unwrap_or(id)
    }
}

/// Where a suspended resumable function continues
///
/// `START` (0) runs the body from the top. `FINALLY` (-1) is reserved: it
/// selects the cleanup section regardless of where the body was suspended.
/// Every other value is a suspension point chosen by the body itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResumePoint(i32);

impl ResumePoint {
    /// Start from the top
    pub const START: Self = Self(0);

    /// Unwind to the finally section
    pub const FINALLY: Self = Self(-1);

    /// Create a suspension point
    ///
    /// Points are numbered by the body that records them; `at(0)` is
    /// `START`.
    pub const fn at(point: u16) -> Self {
        Self(point as i32)
    }

    /// Get the raw tag
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Check if this is the start of the body
    pub const fn is_start(self) -> bool {
        self.0 == 0
    }

    /// Check if this selects the finally section
    pub const fn is_finally(self) -> bool {
        self.0 == -1
    }
}

impl Default for ResumePoint {
    fn default() -> Self {
        Self::START
    }
}

impl fmt::Display for ResumePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => write!(f, "start"),
            -1 => write!(f, "finally"),
            n => write!(f, "@{}", n),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ResumePoint {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "ResumePoint({})", self.0);
    }
}
