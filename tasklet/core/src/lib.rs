#![no_std]

//! # Tasklet Core
//!
//! Core types shared by every layer of the tasklet runtime: task statuses,
//! identities, resume points, readiness event masks, deadlines and the
//! interrupt-safe status cell through which timer interrupts wake tasks.

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

use core::fmt;

pub mod events;
pub mod ids;
pub mod semaphore;
pub mod status;
pub mod sync;
pub mod time;

pub use events::*;
pub use ids::*;
pub use semaphore::*;
pub use status::*;
pub use sync::*;
pub use time::*;

/// Result type used throughout the tasklet runtime
pub type TkResult<T> = Result<T, TkError>;

/// Error types for runtime operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TkError {
    /// Every task slot is leased
    PoolFull,
    /// A call frame could not be allocated
    AllocationFailure,
    /// A pool or table was sized with zero capacity
    InvalidCapacity,
    /// The task id does not name a live task
    InvalidTask,
    /// The descriptor is negative or above the tracked maximum
    InvalidDescriptor,
    /// The readiness wait table is full
    MonitorFull,
    /// The descriptor already has a live wait entry
    AlreadyWatched,
    /// The descriptor has no wait entry
    NotWatched,
    /// The task already holds a semaphore attachment
    AlreadyAttached,
    /// The task holds no semaphore attachment
    NotAttached,
    /// The module registry is full
    ModuleTableFull,
    /// The module is not installed
    ModuleNotInstalled,
    /// The platform reported an errno
    Os(i32),
    /// The instance was aborted and its tasks cancelled
    Aborted,
}

impl TkError {
    /// Integer error code stored in a task when this error faults it.
    ///
    /// Platform errors keep their errno; everything else maps onto the
    /// closest POSIX code so task bodies can compare against one namespace.
    pub const fn code(self) -> i32 {
        match self {
            TkError::Os(errno) => errno,
            TkError::PoolFull | TkError::MonitorFull | TkError::ModuleTableFull => 11, // EAGAIN
            TkError::AllocationFailure => 12,                                         // ENOMEM
            TkError::AlreadyWatched | TkError::AlreadyAttached => 16,                 // EBUSY
            TkError::InvalidDescriptor => 9,                                          // EBADF
            TkError::NotWatched | TkError::NotAttached | TkError::ModuleNotInstalled => 2, // ENOENT
            TkError::InvalidCapacity | TkError::InvalidTask => 22,                    // EINVAL
            TkError::Aborted => 125,                                                  // ECANCELED
        }
    }
}

impl fmt::Display for TkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TkError::PoolFull => write!(f, "Task pool is full"),
            TkError::AllocationFailure => write!(f, "Call frame allocation failed"),
            TkError::InvalidCapacity => write!(f, "Invalid capacity"),
            TkError::InvalidTask => write!(f, "Invalid task id"),
            TkError::InvalidDescriptor => write!(f, "Invalid file descriptor"),
            TkError::MonitorFull => write!(f, "Readiness wait table is full"),
            TkError::AlreadyWatched => write!(f, "Descriptor is already watched"),
            TkError::NotWatched => write!(f, "Descriptor is not watched"),
            TkError::AlreadyAttached => write!(f, "Task already holds a semaphore"),
            TkError::NotAttached => write!(f, "Task holds no semaphore"),
            TkError::ModuleTableFull => write!(f, "Module registry is full"),
            TkError::ModuleNotInstalled => write!(f, "Module is not installed"),
            TkError::Os(errno) => write!(f, "OS error {}", errno),
            TkError::Aborted => write!(f, "Instance aborted"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TkError {}

#[cfg(feature = "defmt")]
impl defmt::Format for TkError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            TkError::PoolFull => defmt::write!(fmt, "PoolFull"),
            TkError::AllocationFailure => defmt::write!(fmt, "AllocationFailure"),
            TkError::InvalidCapacity => defmt::write!(fmt, "InvalidCapacity"),
            TkError::InvalidTask => defmt::write!(fmt, "InvalidTask"),
            TkError::InvalidDescriptor => defmt::write!(fmt, "InvalidDescriptor"),
            TkError::MonitorFull => defmt::write!(fmt, "MonitorFull"),
            TkError::AlreadyWatched => defmt::write!(fmt, "AlreadyWatched"),
            TkError::NotWatched => defmt::write!(fmt, "NotWatched"),
            TkError::AlreadyAttached => defmt::write!(fmt, "AlreadyAttached"),
            TkError::NotAttached => defmt::write!(fmt, "NotAttached"),
            TkError::ModuleTableFull => defmt::write!(fmt, "ModuleTableFull"),
            TkError::ModuleNotInstalled => defmt::write!(fmt, "ModuleNotInstalled"),
            TkError::Os(errno) => defmt::write!(fmt, "Os({})", errno),
            TkError::Aborted => defmt::write!(fmt, "Aborted"),
        }
    }
}
