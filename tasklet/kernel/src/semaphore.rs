//! Semaphore attach and release
//!
//! The counter itself lives in [`tasklet_core::Semaphore`]; these functions
//! tie it to tasks in the pool.

use log::trace;
use tasklet_core::{Semaphore, TaskId, TaskStatus, TkError, TkResult};
use tasklet_mem::TaskPool;

/// Make `id` the waiter of `semaphore` and reset its counter
pub fn acquire(pool: &mut TaskPool, id: TaskId, semaphore: &Semaphore) -> TkResult<()> {
    let task = pool.get_mut(id).ok_or(TkError::InvalidTask)?;
    task.attach_semaphore(semaphore.clone())?;
    semaphore.bind(id);
    trace!("{} waits on semaphore", id);
    Ok(())
}

/// Drop the attachment held by `id`
///
/// For a task counted against the semaphore this decrements the counter,
/// and the last one out switches a parked waiter back to `Running`. The
/// waiter's own attachment is simply cleared.
pub fn release(pool: &mut TaskPool, id: TaskId) -> TkResult<()> {
    let task = pool.get_mut(id).ok_or(TkError::InvalidTask)?;
    let semaphore = task.detach_semaphore().ok_or(TkError::NotAttached)?;

    if semaphore.waiter() == Some(id) {
        return Ok(());
    }

    if let Some(waiter) = semaphore.leave() {
        if let Some(task) = pool.get_mut(waiter) {
            if task.status() == TaskStatus::Waiting {
                task.set_status(TaskStatus::Running);
                trace!("{} released {}", id, waiter);
            }
        }
    }
    Ok(())
}
