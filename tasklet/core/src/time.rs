//! Monotonic timestamps, deadlines and per-task wait bookkeeping

use core::fmt;

/// Timestamp on a monotonic microsecond clock
///
/// The clock's origin belongs to whoever reads it (a readiness source, a
/// hardware timer); only differences between two readings are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Micros(u64);

impl Micros {
    /// Clock origin
    pub const ZERO: Self = Self(0);

    /// Create a timestamp
    pub const fn new(us: u64) -> Self {
        Self(us)
    }

    /// Get the raw microsecond value
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Microseconds elapsed since a previous reading (handles wraparound)
    pub const fn elapsed_since(self, previous: Micros) -> u64 {
        self.0.wrapping_sub(previous.0)
    }
}

impl fmt::Display for Micros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Micros {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}us", self.0);
    }
}

/// A wait budget stamped at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    stamped: Micros,
    budget_us: u64,
}

impl Deadline {
    /// Start a budget of `budget_us` microseconds at `now`
    pub const fn new(now: Micros, budget_us: u64) -> Self {
        Self {
            stamped: now,
            budget_us,
        }
    }

    /// When the budget was stamped
    pub const fn stamped(&self) -> Micros {
        self.stamped
    }

    /// The requested budget
    pub const fn budget_us(&self) -> u64 {
        self.budget_us
    }

    /// Budget left at `now`; zero or negative once elapsed
    pub fn remaining_us(&self, now: Micros) -> i64 {
        let elapsed = now.elapsed_since(self.stamped);
        clamp_i64(self.budget_us) - clamp_i64(elapsed)
    }

    /// Check if `now - stamped >= budget`
    pub fn is_elapsed(&self, now: Micros) -> bool {
        now.elapsed_since(self.stamped) >= self.budget_us
    }

    /// Budget left at `now`, saturating at zero
    pub fn until(&self, now: Micros) -> u64 {
        self.budget_us
            .saturating_sub(now.elapsed_since(self.stamped))
    }
}

fn clamp_i64(value: u64) -> i64 {
    value.min(i64::MAX as u64) as i64
}

/// Readiness-wait bookkeeping attached to every task
///
/// Written by a readiness source when the task registers a wait, and again
/// when the wait ends by timeout, which leaves `remaining_us` negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaitSlot {
    deadline: Option<Deadline>,
    remaining_us: i64,
}

impl WaitSlot {
    /// Empty slot: no deadline, not timed out
    pub const fn new() -> Self {
        Self {
            deadline: None,
            remaining_us: 0,
        }
    }

    /// Record a new wait; a zero timeout waits indefinitely
    pub fn stamp(&mut self, now: Micros, timeout_us: u64) {
        if timeout_us > 0 {
            self.deadline = Some(Deadline::new(now, timeout_us));
            self.remaining_us = clamp_i64(timeout_us);
        } else {
            self.clear();
        }
    }

    /// Mark the wait as ended by timeout
    ///
    /// The stored remaining time is forced negative even when the deadline
    /// elapsed exactly on the tick.
    pub fn expire(&mut self, remaining_us: i64) {
        self.remaining_us = if remaining_us < 0 { remaining_us } else { -1 };
    }

    /// Forget any deadline
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// The deadline of the current wait, if any
    pub const fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    /// Remaining budget recorded at the last update
    pub const fn remaining_us(&self) -> i64 {
        self.remaining_us
    }

    /// Check if the last wait ended by timeout
    pub const fn timed_out(&self) -> bool {
        self.remaining_us < 0
    }
}
