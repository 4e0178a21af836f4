//! Task status and status masks

use core::fmt;
use core::ops::BitOr;

/// Lifecycle status of a task
///
/// The discriminants are distinct bits so that sets of statuses can be
/// expressed as a [`StatusMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TaskStatus {
    /// Slot is free; never observed outside the pool
    Idle = 1,
    /// Eligible for invocation on the next sweep
    Running = 2,
    /// Parked until something sets it back to `Running`
    Waiting = 4,
    /// Cancellation in progress; the next invocation runs the finally section
    Terminating = 8,
    /// The finally section completed; the current frame is ready to pop
    Terminated = 16,
}

impl TaskStatus {
    /// Get the raw status bit
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Check if the status belongs to the given mask
    pub const fn matches(self, mask: StatusMask) -> bool {
        mask.0 & self.bits() != 0
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Idle => write!(f, "Idle"),
            TaskStatus::Running => write!(f, "Running"),
            TaskStatus::Waiting => write!(f, "Waiting"),
            TaskStatus::Terminating => write!(f, "Terminating"),
            TaskStatus::Terminated => write!(f, "Terminated"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TaskStatus {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            TaskStatus::Idle => defmt::write!(fmt, "Idle"),
            TaskStatus::Running => defmt::write!(fmt, "Running"),
            TaskStatus::Waiting => defmt::write!(fmt, "Waiting"),
            TaskStatus::Terminating => defmt::write!(fmt, "Terminating"),
            TaskStatus::Terminated => defmt::write!(fmt, "Terminated"),
        }
    }
}

/// Set of task statuses used to filter pool iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMask(u8);

impl StatusMask {
    /// Matches nothing
    pub const NONE: Self = Self(0);

    /// Tasks the scheduler sweeps: `Running | Terminating`
    pub const RUNNABLE: Self = Self(TaskStatus::Running.bits() | TaskStatus::Terminating.bits());

    /// Tasks cancelled on instance abort: `Running | Waiting`
    pub const ACTIVE: Self = Self(TaskStatus::Running.bits() | TaskStatus::Waiting.bits());

    /// Every leased task
    pub const LIVE: Self = Self(
        TaskStatus::Running.bits()
            | TaskStatus::Waiting.bits()
            | TaskStatus::Terminating.bits()
            | TaskStatus::Terminated.bits(),
    );

    /// Create a mask holding a single status
    pub const fn of(status: TaskStatus) -> Self {
        Self(status.bits())
    }

    /// Add a status to the mask
    pub const fn with(self, status: TaskStatus) -> Self {
        Self(self.0 | status.bits())
    }

    /// Check if the mask contains a status
    pub const fn contains(self, status: TaskStatus) -> bool {
        status.matches(self)
    }

    /// Get the raw mask bits
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl From<TaskStatus> for StatusMask {
    fn from(status: TaskStatus) -> Self {
        Self::of(status)
    }
}

impl BitOr for StatusMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOr for TaskStatus {
    type Output = StatusMask;

    fn bitor(self, rhs: Self) -> StatusMask {
        StatusMask::of(self).with(rhs)
    }
}

impl BitOr<TaskStatus> for StatusMask {
    type Output = Self;

    fn bitor(self, rhs: TaskStatus) -> Self {
        self.with(rhs)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for StatusMask {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "StatusMask({=u8:b})", self.0);
    }
}
