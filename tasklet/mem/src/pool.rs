//! Fixed-capacity task pool
//!
//! Slots are allocated once. `lease` hands out the first idle slot,
//! `release` resets one back to idle, and `next` walks the slots in order
//! filtered by status. Releasing a slot while a `next` walk is in progress
//! is fine: an idle slot never matches a mask, so the walk skips it.

use alloc::vec::Vec;
use core::ops::{Index, IndexMut};

use log::trace;
use tasklet_core::{Relocation, StatusMask, TaskId, TaskStatus, TkError, TkResult};

use crate::Task;

/// Snapshot of pool usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PoolStats {
    /// Number of slots
    pub total: usize,
    /// Leased slots
    pub used: usize,
    /// Most slots ever leased at once
    pub high_water: usize,
}

impl PoolStats {
    /// Idle slots
    pub const fn free(&self) -> usize {
        self.total - self.used
    }
}

/// Arena of task records
pub struct TaskPool {
    tasks: Vec<Task>,
    count: usize,
    high_water: usize,
    generation: u32,
}

impl TaskPool {
    /// Create a pool with `size` idle slots
    pub fn new(size: usize) -> TkResult<Self> {
        if size == 0 {
            return Err(TkError::InvalidCapacity);
        }

        let mut tasks = Vec::new();
        tasks
            .try_reserve_exact(size)
            .map_err(|_| TkError::AllocationFailure)?;
        tasks.extend((0..size).map(Task::vacant));

        Ok(Self {
            tasks,
            count: 0,
            high_water: 0,
            generation: 0,
        })
    }

    /// Number of slots, fixed at creation
    pub fn size(&self) -> usize {
        self.tasks.len()
    }

    /// Number of leased slots
    pub fn count(&self) -> usize {
        self.count
    }

    /// Check if every slot is leased
    pub fn is_full(&self) -> bool {
        self.count == self.tasks.len()
    }

    /// Check if no slot is leased
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Usage statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total: self.tasks.len(),
            used: self.count,
            high_water: self.high_water,
        }
    }

    /// Lease the first idle slot and mark it `Running`
    ///
    /// Returns `None` without touching the pool when it is full.
    pub fn lease(&mut self) -> Option<TaskId> {
        if self.is_full() {
            return None;
        }

        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.status() == TaskStatus::Idle)?;
        self.generation = self.generation.wrapping_add(1);
        task.activate(self.generation);
        let id = task.id();

        self.count += 1;
        self.high_water = self.high_water.max(self.count);
        trace!("lease {} ({}/{})", id, self.count, self.tasks.len());
        Some(id)
    }

    /// Reset a task back to idle
    ///
    /// The caller must have freed the task's call chain already.
    pub fn release(&mut self, id: TaskId) -> TkResult<()> {
        let task = self.get_mut(id).ok_or(TkError::InvalidTask)?;
        task.reset();

        self.count -= 1;
        trace!("release {} ({}/{})", id, self.count, self.tasks.len());
        Ok(())
    }

    /// Look up a live task
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks
            .get(id.index())
            .filter(|task| task.id() == id && task.status() != TaskStatus::Idle)
    }

    /// Look up a live task mutably
    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks
            .get_mut(id.index())
            .filter(|task| task.id() == id && task.status() != TaskStatus::Idle)
    }

    /// Status of a live task
    pub fn status(&self, id: TaskId) -> Option<TaskStatus> {
        self.get(id).map(Task::status)
    }

    /// First task at or after slot `cursor` whose status is in `mask`
    pub fn next(&self, cursor: usize, mask: StatusMask) -> Option<TaskId> {
        self.tasks
            .iter()
            .skip(cursor)
            .find(|task| task.status().matches(mask))
            .map(Task::id)
    }

    /// Ids of every task whose status is in `mask`, in slot order
    pub fn ids(&self, mask: StatusMask) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|task| task.status().matches(mask))
            .map(Task::id)
            .collect()
    }

    /// Shift live tasks left to close the gaps left by `release`
    ///
    /// Each moved task keeps its generation and gets its new slot index.
    /// The returned relocations let every holder of a back-index follow the
    /// move; compaction must not run while a `next` walk is in progress.
    pub fn vacuum(&mut self) -> Vec<Relocation> {
        let mut moves = Vec::new();
        let mut shift = 0;

        for i in 0..self.tasks.len() {
            if self.tasks[i].status() == TaskStatus::Idle {
                shift += 1;
                continue;
            }

            if shift == 0 {
                continue;
            }

            let to = i - shift;
            self.tasks.swap(to, i);

            let from = self.tasks[to].id();
            let moved = from.relocated(to);
            self.tasks[to].set_id(moved);

            let vacated = self.tasks[i].id().relocated(i);
            self.tasks[i].set_id(vacated);

            moves.push(Relocation { from, to: moved });
        }

        if !moves.is_empty() {
            trace!("vacuum moved {} tasks", moves.len());
        }
        moves
    }
}

/// Direct slot access for a task known to be live
///
/// Panics if the slot index is out of range. The generation is only checked
/// in debug builds.
impl Index<TaskId> for TaskPool {
    type Output = Task;

    fn index(&self, id: TaskId) -> &Task {
        let task = &self.tasks[id.index()];
        debug_assert_eq!(task.id(), id);
        task
    }
}

impl IndexMut<TaskId> for TaskPool {
    fn index_mut(&mut self, id: TaskId) -> &mut Task {
        let task = &mut self.tasks[id.index()];
        debug_assert_eq!(task.id(), id);
        task
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(TaskPool::new(0).err(), Some(TkError::InvalidCapacity));
    }

    #[test]
    fn test_lease_marks_running() {
        let mut pool = TaskPool::new(2).unwrap();
        let id = pool.lease().unwrap();
        assert_eq!(pool.status(id), Some(TaskStatus::Running));
        assert_eq!(pool.count(), 1);
    }

    #[test]
    fn test_full_pool_lease_fails_without_mutation() {
        let mut pool = TaskPool::new(2).unwrap();
        pool.lease().unwrap();
        pool.lease().unwrap();

        let before = pool.stats();
        assert!(pool.lease().is_none());
        assert_eq!(pool.count(), 2);
        assert_eq!(pool.stats(), before);
    }

    #[test]
    fn test_release_bumps_generation() {
        let mut pool = TaskPool::new(1).unwrap();
        let first = pool.lease().unwrap();
        pool.release(first).unwrap();

        let second = pool.lease().unwrap();
        assert_eq!(first.index(), second.index());
        assert_ne!(first, second);
        assert!(pool.get(first).is_none());
        assert_eq!(pool.release(first), Err(TkError::InvalidTask));
    }

    #[test]
    fn test_next_skips_released_slots() {
        let mut pool = TaskPool::new(3).unwrap();
        let a = pool.lease().unwrap();
        let b = pool.lease().unwrap();
        let c = pool.lease().unwrap();

        assert_eq!(pool.next(0, StatusMask::RUNNABLE), Some(a));
        pool.release(b).unwrap();
        assert_eq!(pool.next(a.index() + 1, StatusMask::RUNNABLE), Some(c));
        assert_eq!(pool.next(c.index() + 1, StatusMask::RUNNABLE), None);
    }

    #[test]
    fn test_vacuum_closes_gaps() {
        let mut pool = TaskPool::new(4).unwrap();
        let a = pool.lease().unwrap();
        let b = pool.lease().unwrap();
        let c = pool.lease().unwrap();
        pool.release(a).unwrap();
        pool.release(b).unwrap();
        pool.get_mut(c).unwrap().set_error(7);

        let moves = pool.vacuum();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].from, c);

        let moved = moves[0].to;
        assert_eq!(moved.index(), 0);
        assert_eq!(pool.get(moved).unwrap().error(), 7);
        assert!(pool.get(c).is_none());
        assert_eq!(pool.count(), 1);

        let fresh = pool.lease().unwrap();
        assert_eq!(fresh.index(), 1);
    }
}
