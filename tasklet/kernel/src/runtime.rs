//! Scheduler loop
//!
//! One tick polls every installed module, then sweeps the pool once in slot
//! order, stepping each `Running` or `Terminating` task. `run` repeats ticks
//! until the pool is empty.

use alloc::boxed::Box;
use alloc::vec::Vec;

use log::{debug, error, trace, warn};
use tasklet_core::{
    Relocation, ResumePoint, Semaphore, StatusMask, TaskId, TaskStatus, TkError, TkResult,
};
use tasklet_mem::{FrameArena, PoolStats, TaskPool};

use crate::context::Core;
use crate::{semaphore, ModuleRef, ModuleRegistry, Resumable, RuntimeConfig, TaskCx};

/// A cooperative runtime instance
pub struct Runtime {
    config: RuntimeConfig,
    core: Core,
    modules: ModuleRegistry,
    idle: bool,
    aborted: Option<TkError>,
}

impl Runtime {
    /// Create an instance with room for `max_tasks` concurrent tasks
    pub fn new(max_tasks: usize) -> TkResult<Self> {
        Self::with_config(RuntimeConfig::builder().max_tasks(max_tasks).build())
    }

    /// Create an instance from a configuration
    pub fn with_config(config: RuntimeConfig) -> TkResult<Self> {
        if config.max_frames == 0 {
            return Err(TkError::InvalidCapacity);
        }

        let pool = TaskPool::new(config.max_tasks)?;
        let frames = FrameArena::new(config.max_frames);
        debug!(
            "create {} ({} tasks, {} frames)",
            config.name, config.max_tasks, config.max_frames
        );

        Ok(Self {
            config,
            core: Core { pool, frames },
            modules: ModuleRegistry::new(),
            idle: false,
            aborted: None,
        })
    }

    /// Returns the runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Tear the instance down, dropping every remaining task
    pub fn destroy(self) {
        debug!("destroy {} ({} tasks left)", self.config.name, self.count());
    }

    /// Spawn a task running `body`
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

    /// Install a readiness module
    pub fn install(&mut self, module: ModuleRef) -> TkResult<()> {
        self.modules.install(module)
    }

    /// Remove a readiness module
    pub fn uninstall(&mut self, module: &ModuleRef) -> TkResult<()> {
        self.modules.uninstall(module)
    }

    /// Number of live tasks
    pub fn count(&self) -> usize {
        self.core.pool.count()
    }

    /// Pool usage statistics
    pub fn stats(&self) -> PoolStats {
        self.core.pool.stats()
    }

    /// The task pool
    pub fn pool(&self) -> &TaskPool {
        &self.core.pool
    }

    /// Status of a live task
    pub fn status(&self, id: TaskId) -> Option<TaskStatus> {
        self.core.pool.status(id)
    }

    /// Error code of a live task
    pub fn error(&self, id: TaskId) -> Option<i32> {
        self.core.pool.get(id).map(|task| task.error())
    }

    /// Number of live call frames
    pub fn frames(&self) -> usize {
        self.core.frames.len()
    }

    /// Cancel one task
    ///
    /// The task unwinds its whole call chain through the finally sections
    /// on its next step.
    pub fn cancel(&mut self, id: TaskId) -> TkResult<()> {
        let task = self.core.pool.get_mut(id).ok_or(TkError::InvalidTask)?;
        task.cancel();
        trace!("cancel {}", id);
        Ok(())
    }

    /// Cancel every task that has not started terminating
    pub fn kill_all(&mut self) {
        let ids = self.core.pool.ids(StatusMask::ACTIVE);
        for &id in &ids {
            self.core.pool[id].cancel();
        }
        if !ids.is_empty() {
            debug!("kill {} tasks", ids.len());
        }
    }

    /// Compact the task pool
    ///
    /// Installed modules and attached semaphores are told about every move
    /// so their stored task ids stay valid. Must not run inside a tick.
    pub fn vacuum(&mut self) -> Vec<Relocation> {
        let moves = self.core.pool.vacuum();
        if moves.is_empty() {
            return moves;
        }

        for module in self.modules.iter() {
            module.borrow_mut().relocate(&moves);
        }
        for id in self.core.pool.ids(StatusMask::LIVE) {
            if let Some(semaphore) = self.core.pool[id].semaphore() {
                semaphore.relocate(&moves);
            }
        }
        moves
    }

    /// Invoke a task's current frame once
    ///
    /// A task found `Terminating` is unwound to its finally section first,
    /// and the unwind continues through every frame that leaves it
    /// `Terminating` within this same call. Returns `true` once the call
    /// chain is empty.
    pub fn step(&mut self, id: TaskId) -> bool {
        loop {
            let Some(task) = self.core.pool.get(id) else {
                return true;
            };
            let Some(frame) = task.current_frame() else {
                return true;
            };

            let finally = task.status() == TaskStatus::Terminating;
            if finally {
                self.core.frames.set_resume_point(frame, ResumePoint::FINALLY);
            }

            match self.core.frames.take_body(frame) {
                Some(mut body) => {
                    let mut cx = TaskCx::new(id, frame, &mut self.core);
                    body.resume(&mut cx);
                    self.core.frames.restore_body(frame, body);
                }
                None => {
                    warn!("{} has no body at {}", id, frame);
                    self.core.pool[id].set_status(TaskStatus::Terminated);
                }
            }

            let task = &mut self.core.pool[id];
            let mut status = task.status();
            if finally && status == TaskStatus::Terminating {
                warn!("{}: finally section did not complete", id);
                status = TaskStatus::Terminated;
            }

            match status {
                TaskStatus::Terminating => continue,
                TaskStatus::Terminated => {
                    let parent = self.core.frames.pop(frame).and_then(|f| f.parent());
                    let task = &mut self.core.pool[id];
                    task.set_current_frame(parent);
                    trace!("{} popped {}", id, frame);

                    if parent.is_none() {
                        return true;
                    }
                    if task.is_cancelled() {
                        task.set_status(TaskStatus::Terminating);
                        continue;
                    }
                    task.set_status(TaskStatus::Running);
                    return false;
                }
                _ => return false,
            }
        }
    }

    /// Run one loop iteration: module ticks, then one sweep
    ///
    /// Returns the error that aborted the instance, if any. Once aborted,
    /// modules are no longer ticked and every task is cancelled.
    pub fn tick(&mut self) -> TkResult<()> {
        if self.aborted.is_none() {
            if let Err(err) = self.tick_modules() {
                error!("{}: module failed: {}", self.config.name, err);
                self.aborted = Some(err);
            }
        }
        if self.aborted.is_some() {
            self.kill_all();
        }

        self.sweep();

        match self.aborted {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Drive the instance until every task has finished
    ///
    /// Returns the error that aborted the instance, after the pool drained.
    pub fn run(&mut self) -> TkResult<()> {
        for module in self.modules.iter() {
            module.borrow_mut().loop_start(&mut self.core.pool);
        }

        while self.core.pool.count() > 0 {
            // An abort is reported once the pool drains.
            let _ = self.tick();
        }

        for module in self.modules.iter() {
            module.borrow_mut().loop_end(&mut self.core.pool);
        }

        match self.aborted.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn tick_modules(&mut self) -> TkResult<()> {
        let budget = if self.idle {
            self.config.idle_timeout_us
        } else {
            self.config.busy_timeout_us
        };

        for module in self.modules.iter() {
            let mut module = module.borrow_mut();
            let timeout = module
                .nearest_deadline_us()
                .map_or(budget, |nearest| nearest.min(budget));
            module.tick(&mut self.core.pool, timeout)?;
        }
        Ok(())
    }

    fn sweep(&mut self) {
        let mut cursor = 0;
        let mut ran = false;

        while let Some(id) = self.core.pool.next(cursor, StatusMask::RUNNABLE) {
            cursor = id.index() + 1;
            ran = true;
            if self.step(id) {
                self.retire(id);
            }
        }

        self.idle = !ran;
        if !ran {
            if let Some(callback) = self.config.idle_callback {
                callback();
            }
        }
    }

    fn retire(&mut self, id: TaskId) {
        if self.core.pool.get(id).is_some_and(|t| t.semaphore().is_some()) {
            let _ = semaphore::release(&mut self.core.pool, id);
        }

        let mut cursor = self.core.pool.get(id).and_then(|t| t.current_frame());
        while let Some(frame) = cursor {
            cursor = self.core.frames.pop(frame).and_then(|f| f.parent());
        }

        if self.core.pool.release(id).is_ok() {
            trace!("{} finished", id);
        }
    }
}

/// Run `body` as the only root task of a fresh instance until it finishes
pub fn forever<R>(body: R, max_tasks: usize) -> TkResult<()>
where
    R: Resumable + 'static,
{
    let mut runtime = Runtime::new(max_tasks)?;
    runtime.spawn(body)?;
    let result = runtime.run();
    runtime.destroy();
    result
}
