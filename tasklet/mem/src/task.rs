//! Task records

use alloc::sync::Arc;

use tasklet_core::{Semaphore, StatusCell, TaskId, TaskStatus, TaskWaker, TkError, TkResult, WaitSlot};

use crate::FrameId;

/// One cooperative unit of concurrency
///
/// A task owns a call chain (through `current_frame`), a sticky error code,
/// and the platform attachments readiness sources and synchronization
/// primitives hang off it.
pub struct Task {
    id: TaskId,
    status: Arc<StatusCell>,
    error_code: i32,
    cancelled: bool,
    current_frame: Option<FrameId>,
    wait: WaitSlot,
    semaphore: Option<Semaphore>,
}

impl Task {
    pub(crate) fn vacant(index: usize) -> Self {
        let status = Arc::new(StatusCell::new());
        Self {
            id: TaskId::new(index as u32, status.generation()),
            status,
            error_code: 0,
            cancelled: false,
            current_frame: None,
            wait: WaitSlot::new(),
            semaphore: None,
        }
    }

    /// Task identity
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: TaskId) {
        self.id = id;
    }

    /// Current status
    pub fn status(&self) -> TaskStatus {
        self.status.get()
    }

    /// Overwrite the status
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status.set(status);
    }

    /// Last fault, 0 when none
    pub fn error(&self) -> i32 {
        self.error_code
    }

    /// Record a fault
    pub fn set_error(&mut self, code: i32) {
        self.error_code = code;
    }

    /// Clear the sticky fault
    pub fn clear_error(&mut self) {
        self.error_code = 0;
    }

    /// Check if a fault is recorded
    pub fn has_error(&self) -> bool {
        self.error_code != 0
    }

    /// Check if the recorded fault is `code`
    pub fn is_error(&self, code: i32) -> bool {
        self.has_error() && self.error_code == code
    }

    /// Request cooperative cancellation
    ///
    /// A cancelled task unwinds its whole call chain through the finally
    /// sections. Tasks already terminated are left alone.
    pub fn cancel(&mut self) {
        match self.status() {
            TaskStatus::Running | TaskStatus::Waiting | TaskStatus::Terminating => {
                self.cancelled = true;
                self.set_status(TaskStatus::Terminating);
            }
            TaskStatus::Idle | TaskStatus::Terminated => {}
        }
    }

    /// Check if cancellation was requested from outside the task
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Top of the call chain
    pub fn current_frame(&self) -> Option<FrameId> {
        self.current_frame
    }

    /// Replace the top of the call chain
    pub fn set_current_frame(&mut self, frame: Option<FrameId>) {
        self.current_frame = frame;
    }

    /// Readiness-wait bookkeeping
    pub fn wait(&self) -> &WaitSlot {
        &self.wait
    }

    /// Mutable readiness-wait bookkeeping
    pub fn wait_mut(&mut self) -> &mut WaitSlot {
        &mut self.wait
    }

    /// Semaphore attachment, if any
    pub fn semaphore(&self) -> Option<&Semaphore> {
        self.semaphore.as_ref()
    }

    /// Attach a semaphore; a task holds at most one
    pub fn attach_semaphore(&mut self, semaphore: Semaphore) -> TkResult<()> {
        if self.semaphore.is_some() {
            return Err(TkError::AlreadyAttached);
        }
        self.semaphore = Some(semaphore);
        Ok(())
    }

    /// Drop the semaphore attachment
    pub fn detach_semaphore(&mut self) -> Option<Semaphore> {
        self.semaphore.take()
    }

    /// Waker bound to this task's lifetime
    pub fn waker(&self) -> TaskWaker {
        TaskWaker::new(Arc::clone(&self.status))
    }

    pub(crate) fn activate(&mut self, generation: u32) {
        self.status.activate(generation);
        self.id = TaskId::new(self.id.index() as u32, generation);
    }

    pub(crate) fn reset(&mut self) {
        let generation = self.status.retire();
        self.id = TaskId::new(self.id.index() as u32, generation);
        self.error_code = 0;
        self.cancelled = false;
        self.current_frame = None;
        self.wait.clear();
        self.semaphore = None;
    }
}

impl core::fmt::Debug for Task {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("error_code", &self.error_code)
            .field("cancelled", &self.cancelled)
            .field("current_frame", &self.current_frame)
            .finish()
    }
}
