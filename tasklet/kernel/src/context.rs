//! Task context handed to every body invocation

use alloc::boxed::Box;
use core::cell::RefCell;

use log::trace;
use tasklet_core::{
    Events, Fd, ResumePoint, Semaphore, TaskId, TaskStatus, TaskWaker, TkError, TkResult,
};
use tasklet_mem::{FrameArena, FrameId, Task, TaskPool};

use crate::{semaphore, FdMonitor, Resumable};

/// Storage shared by the scheduler and running bodies
pub(crate) struct Core {
    pub(crate) pool: TaskPool,
    pub(crate) frames: FrameArena<Box<dyn Resumable>>,
}

impl Core {
    /// Lease a task and give it `body` as its root frame
    ///
    /// A failed spawn leaves no task behind.
    pub(crate) fn spawn(
        &mut self,
        body: Box<dyn Resumable>,
        semaphore: Option<&Semaphore>,
    ) -> TkResult<TaskId> {
        let id = self.pool.lease().ok_or(TkError::PoolFull)?;

        let frame = match self.frames.push(None, body) {
            Ok(frame) => frame,
            Err(err) => {
                self.pool.release(id)?;
                return Err(err);
            }
        };

        let task = &mut self.pool[id];
        task.set_current_frame(Some(frame));
        if let Some(semaphore) = semaphore {
            task.attach_semaphore(semaphore.clone())?;
            semaphore.enter();
        }

        trace!("spawn {} at {}", id, frame);
        Ok(id)
    }
}

/// Handle a body uses to inspect and steer its own task
///
/// Every control verb records where the body continues and sets the task
/// status; the body must return right after calling one.
pub struct TaskCx<'a> {
    id: TaskId,
    frame: FrameId,
    core: &'a mut Core,
}

impl<'a> TaskCx<'a> {
    pub(crate) fn new(id: TaskId, frame: FrameId, core: &'a mut Core) -> Self {
        Self { id, frame, core }
    }

    /// The running task
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Where this invocation resumes
    pub fn resume_point(&self) -> ResumePoint {
        self.core
            .frames
            .resume_point(self.frame)
            .unwrap_or(ResumePoint::FINALLY)
    }

    /// The task record
    pub fn task(&self) -> &Task {
        &self.core.pool[self.id]
    }

    /// The task record, mutably
    pub fn task_mut(&mut self) -> &mut Task {
        &mut self.core.pool[self.id]
    }

    /// Current status
    pub fn status(&self) -> TaskStatus {
        self.task().status()
    }

    /// Sticky error code, 0 when none
    pub fn error(&self) -> i32 {
        self.task().error()
    }

    /// Record an error code without changing control flow
    pub fn set_error(&mut self, code: i32) {
        self.task_mut().set_error(code);
    }

    /// Check if an error is recorded
    pub fn has_error(&self) -> bool {
        self.task().has_error()
    }

    /// Check if the recorded error is `code`
    pub fn is_error(&self, code: i32) -> bool {
        self.task().is_error(code)
    }

    /// Clear the sticky error
    pub fn clear_error(&mut self) {
        self.task_mut().clear_error();
    }

    /// Check if the task is being cancelled from outside
    pub fn is_cancelled(&self) -> bool {
        self.task().is_cancelled()
    }

    /// Check if the last readiness wait ended by timeout
    pub fn timed_out(&self) -> bool {
        self.task().wait().timed_out()
    }

    /// Number of frames in the task's call chain
    pub fn depth(&self) -> usize {
        self.core.frames.depth(self.task().current_frame())
    }

    /// Waker that flips this task from `Waiting` to `Running`
    pub fn waker(&self) -> TaskWaker {
        self.task().waker()
    }

    /// Call a child body and continue at `resume_at` once it completes
    ///
    /// If the frame cannot be allocated the task faults with the allocation
    /// error code instead.
    pub fn await_call<R>(&mut self, resume_at: ResumePoint, body: R)
    where
        R: Resumable + 'static,
    {
        self.core.frames.set_resume_point(self.frame, resume_at);

        match self.core.frames.push(Some(self.frame), Box::new(body)) {
            Ok(child) => {
                let task = self.task_mut();
                task.set_current_frame(Some(child));
                task.set_status(TaskStatus::Running);
            }
            Err(err) => self.fault(err),
        }
    }

    /// Park until something sets the task back to `Running`
    pub fn wait(&mut self, resume_at: ResumePoint) {
        self.core.frames.set_resume_point(self.frame, resume_at);
        self.task_mut().set_status(TaskStatus::Waiting);
    }

    /// Stay runnable and continue at `resume_at` on the next sweep
    pub fn yield_now(&mut self, resume_at: ResumePoint) {
        self.core.frames.set_resume_point(self.frame, resume_at);
        self.task_mut().set_status(TaskStatus::Running);
    }

    /// Leave the body through its finally section
    pub fn ret(&mut self) {
        self.task_mut().set_status(TaskStatus::Terminating);
    }

    /// Record `code` and leave through the finally section
    pub fn reject(&mut self, code: i32) {
        self.set_error(code);
        self.ret();
    }

    /// End of the finally section; the frame is popped
    pub fn finish(&mut self) {
        self.task_mut().set_status(TaskStatus::Terminated);
    }

    /// Spawn an independent task
    pub fn spawn<R>(&mut self, body: R) -> TkResult<TaskId>
    where
        R: Resumable + 'static,
    {
        self.core.spawn(Box::new(body), None)
    }

    /// Spawn a task that counts against `semaphore` until it finishes
    pub fn spawn_with_semaphore<R>(&mut self, semaphore: &Semaphore, body: R) -> TkResult<TaskId>
    where
        R: Resumable + 'static,
    {
        self.core.spawn(Box::new(body), Some(semaphore))
    }

    /// Become the waiter of `semaphore`
    ///
    /// Fails if the task already holds a semaphore.
    pub fn semaphore_acquire(&mut self, semaphore: &Semaphore) -> TkResult<()> {
        semaphore::acquire(&mut self.core.pool, self.id, semaphore)
    }

    /// Drop this task's semaphore attachment
    pub fn semaphore_release(&mut self) -> TkResult<()> {
        semaphore::release(&mut self.core.pool, self.id)
    }

    /// Register with `monitor` and park until `fd` is ready or times out
    ///
    /// A rejected registration faults the task with the error's code.
    pub fn watch_fd<M>(
        &mut self,
        monitor: &RefCell<M>,
        fd: Fd,
        events: Events,
        timeout_us: u64,
        resume_at: ResumePoint,
    ) where
        M: FdMonitor + ?Sized,
    {
        self.core.frames.set_resume_point(self.frame, resume_at);

        let result = monitor
            .borrow_mut()
            .watch(&mut self.core.pool[self.id], fd, events, timeout_us);
        match result {
            Ok(()) => self.task_mut().set_status(TaskStatus::Waiting),
            Err(err) => self.fault(err),
        }
    }

    fn fault(&mut self, err: TkError) {
        let task = self.task_mut();
        task.set_error(err.code());
        task.set_status(TaskStatus::Terminating);
    }
}
