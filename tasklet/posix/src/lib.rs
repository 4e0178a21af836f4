//! # Tasklet POSIX Port
//!
//! Runs the tasklet runtime in a POSIX process. Provides the `select(2)`
//! readiness monitor, a timer-descriptor sleep built on it, and helpers for
//! non-blocking I/O inside task bodies.
//!
//! The port links `critical-section`'s `std` implementation, so task wakers
//! may be used from other threads.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use tasklet_core::{TkError, TkResult};
use tasklet_kernel::{Resumable, Runtime};

pub mod select;
pub mod sleep;
pub mod timerfd;

pub use select::*;
pub use sleep::*;
pub use timerfd::*;

/// Check if a failed non-blocking call only needs the descriptor to become
/// ready
pub fn must_wait(errno: i32) -> bool {
    errno == libc::EAGAIN || errno == libc::EWOULDBLOCK || errno == libc::EINPROGRESS
}

/// Errno carried by an I/O error
pub fn errno(err: &io::Error) -> i32 {
    err.raw_os_error().unwrap_or(libc::EIO)
}

/// Convert an I/O error into a runtime error
pub fn os_error(err: io::Error) -> TkError {
    TkError::Os(errno(&err))
}

/// Run one root task with a `select` monitor installed until it finishes
///
/// `root` receives the monitor so the task can wait on descriptors.
pub fn forever<F, R>(root: F, max_tasks: usize) -> TkResult<()>
where
    F: FnOnce(Rc<RefCell<SelectMonitor>>) -> R,
    R: Resumable + 'static,
{
    let mut runtime = Runtime::new(max_tasks)?;
    let monitor = Rc::new(RefCell::new(SelectMonitor::new()));
    runtime.install(monitor.clone())?;

    runtime.spawn(root(monitor))?;
    let result = runtime.run();
    runtime.destroy();
    result
}
