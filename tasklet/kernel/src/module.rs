//! Readiness modules
//!
//! A module is a pluggable backend that wakes parked tasks when an external
//! condition is met. The scheduler calls `tick` once per loop iteration,
//! before sweeping the tasks, so a task woken there runs in the same tick.

use alloc::rc::Rc;
use core::cell::RefCell;

use heapless::Vec;
use log::debug;
use tasklet_core::{Events, Fd, Relocation, TkError, TkResult};
use tasklet_mem::{Task, TaskPool};

use crate::MAX_MODULES;

/// Hooks a readiness source exposes to the scheduler
///
/// Every hook is optional.
pub trait Module {
    /// Name used in log records
    fn name(&self) -> &'static str {
        "module"
    }

    /// Called once when `run` starts
    fn loop_start(&mut self, _pool: &mut TaskPool) {}

    /// Wake the tasks whose condition is met
    ///
    /// May block for at most `timeout_us`. An error aborts the instance.
    fn tick(&mut self, _pool: &mut TaskPool, _timeout_us: u64) -> TkResult<()> {
        Ok(())
    }

    /// Called once when `run` returns
    fn loop_end(&mut self, _pool: &mut TaskPool) {}

    /// Microseconds until the earliest deadline among this module's waiters
    fn nearest_deadline_us(&self) -> Option<u64> {
        None
    }

    /// Follow tasks moved by a pool compaction
    fn relocate(&mut self, _moves: &[Relocation]) {}
}

/// Shared handle to an installed module
pub type ModuleRef = Rc<RefCell<dyn Module>>;

/// A readiness source keyed by file descriptor
pub trait FdMonitor: Module {
    /// Register `task` to be woken when `fd` reports any of `events`
    ///
    /// A non-zero `timeout_us` also wakes the task once that many
    /// microseconds pass, leaving its wait marked as timed out. Zero waits
    /// indefinitely.
    fn watch(&mut self, task: &mut Task, fd: Fd, events: Events, timeout_us: u64)
        -> TkResult<()>;

    /// Drop the registration of `fd`
    fn forget(&mut self, fd: Fd) -> TkResult<()>;
}

/// Fixed-capacity, ordered list of installed modules
pub struct ModuleRegistry {
    modules: Vec<ModuleRef, MAX_MODULES>,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self { modules: Vec::new() }
    }

    /// Append a module
    pub fn install(&mut self, module: ModuleRef) -> TkResult<()> {
        let name = module.borrow().name();
        self.modules
            .push(module)
            .map_err(|_| TkError::ModuleTableFull)?;
        debug!("install module {} ({}/{})", name, self.modules.len(), MAX_MODULES);
        Ok(())
    }

    /// Remove a module, keeping the order of the others
    pub fn uninstall(&mut self, module: &ModuleRef) -> TkResult<()> {
        let index = self
            .modules
            .iter()
            .position(|m| Rc::ptr_eq(m, module))
            .ok_or(TkError::ModuleNotInstalled)?;
        self.modules.remove(index);
        Ok(())
    }

    /// Number of installed modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if no module is installed
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Installed modules in installation order
    pub fn iter(&self) -> impl Iterator<Item = &ModuleRef> {
        self.modules.iter()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
