//! `select(2)` readiness monitor
//!
//! Tasks register a descriptor, an event mask and an optional timeout, then
//! park. Each tick builds the three descriptor sets from the table, blocks
//! in `select` for at most the scheduler's timeout, and wakes every task
//! whose descriptor became ready or whose deadline elapsed. Woken and stale
//! entries are squeezed out of the table in the same pass.

use std::io;
use std::mem;
use std::time::Instant;

use log::{debug, trace};
use tasklet_core::{
    Deadline, Events, Fd, Micros, Relocation, TaskId, TaskStatus, TkError, TkResult,
};
use tasklet_kernel::{FdMonitor, Module};
use tasklet_mem::{Task, TaskPool};

/// Sizing of a [`SelectMonitor`]
#[derive(Debug, Clone, Copy)]
pub struct SelectConfig {
    /// Largest descriptor accepted by `watch`
    pub max_fileno: Fd,
    /// Number of concurrent waits
    pub capacity: usize,
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self {
            max_fileno: libc::FD_SETSIZE as Fd - 1,
            capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WaitEntry {
    fd: Fd,
    events: Events,
    task: TaskId,
    deadline: Option<Deadline>,
}

struct FdSets {
    read: libc::fd_set,
    write: libc::fd_set,
    error: libc::fd_set,
}

impl FdSets {
    fn new() -> Self {
        // SAFETY: fd_set is a plain bit array; all-zero is the empty set.
        unsafe {
            Self {
                read: mem::zeroed(),
                write: mem::zeroed(),
                error: mem::zeroed(),
            }
        }
    }

    fn insert(&mut self, fd: Fd, events: Events) {
        // SAFETY: `watch` only admits descriptors below FD_SETSIZE.
        unsafe {
            if events.contains(Events::IN) {
                libc::FD_SET(fd, &mut self.read);
            }
            if events.contains(Events::OUT) {
                libc::FD_SET(fd, &mut self.write);
            }
            if events.contains(Events::ERR) {
                libc::FD_SET(fd, &mut self.error);
            }
        }
    }

    fn is_ready(&self, fd: Fd) -> bool {
        // SAFETY: as for `insert`.
        unsafe {
            libc::FD_ISSET(fd, &self.read)
                || libc::FD_ISSET(fd, &self.write)
                || libc::FD_ISSET(fd, &self.error)
        }
    }
}

/// Readiness source multiplexing descriptors with `select(2)`
pub struct SelectMonitor {
    entries: Vec<WaitEntry>,
    max_fileno: Fd,
    capacity: usize,
    origin: Instant,
}

impl SelectMonitor {
    /// Create a monitor with the default sizing
    pub fn new() -> Self {
        Self::with_config(SelectConfig::default())
    }

    /// Create a monitor
    ///
    /// `max_fileno` is clamped below `FD_SETSIZE`.
    pub fn with_config(config: SelectConfig) -> Self {
        let max_fileno = config.max_fileno.min(libc::FD_SETSIZE as Fd - 1);
        Self {
            entries: Vec::with_capacity(config.capacity),
            max_fileno,
            capacity: config.capacity,
            origin: Instant::now(),
        }
    }

    /// Number of registered waits
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if `fd` has a registered wait
    pub fn is_watched(&self, fd: Fd) -> bool {
        self.entries.iter().any(|entry| entry.fd == fd)
    }

    fn now(&self) -> Micros {
        Micros::new(self.origin.elapsed().as_micros() as u64)
    }

    fn select(&self, sets: &mut FdSets, timeout_us: u64) -> TkResult<usize> {
        let nfds = self
            .entries
            .iter()
            .map(|entry| entry.fd)
            .max()
            .map_or(0, |fd| fd + 1);
        let mut tv = libc::timeval {
            tv_sec: (timeout_us / 1_000_000) as libc::time_t,
            tv_usec: (timeout_us % 1_000_000) as libc::suseconds_t,
        };

        let ret = unsafe {
            libc::select(
                nfds,
                &mut sets.read,
                &mut sets.write,
                &mut sets.error,
                &mut tv,
            )
        };
        if ret >= 0 {
            return Ok(ret as usize);
        }

        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            trace!("select interrupted");
            *sets = FdSets::new();
            return Ok(0);
        }
        Err(crate::os_error(err))
    }
}

impl Default for SelectMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for SelectMonitor {
    fn name(&self) -> &'static str {
        "select"
    }

    fn tick(&mut self, pool: &mut TaskPool, timeout_us: u64) -> TkResult<()> {
        // A gone owner may have closed its descriptor; select would fail on it.
        self.entries.retain(|entry| {
            let live = pool.get(entry.task).is_some();
            if !live {
                trace!("fd {}: owner {} is gone", entry.fd, entry.task);
            }
            live
        });
        if self.entries.is_empty() {
            return Ok(());
        }

        let mut sets = FdSets::new();
        for entry in &self.entries {
            sets.insert(entry.fd, entry.events);
        }
        let ready = self.select(&mut sets, timeout_us)?;

        let now = self.now();
        let mut kept = 0;
        for i in 0..self.entries.len() {
            let entry = self.entries[i];

            let Some(task) = pool.get_mut(entry.task) else {
                continue;
            };

            if ready > 0 && sets.is_ready(entry.fd) {
                if task.status() == TaskStatus::Waiting {
                    task.set_status(TaskStatus::Running);
                    debug!("fd {} ready for {}", entry.fd, entry.task);
                }
                continue;
            }

            if task.status() == TaskStatus::Waiting {
                if let Some(deadline) = entry.deadline.filter(|d| d.is_elapsed(now)) {
                    task.wait_mut().expire(deadline.remaining_us(now));
                    task.set_status(TaskStatus::Running);
                    debug!("fd {} timed out for {}", entry.fd, entry.task);
                    continue;
                }
            }

            self.entries[kept] = entry;
            kept += 1;
        }
        self.entries.truncate(kept);
        Ok(())
    }

    fn nearest_deadline_us(&self) -> Option<u64> {
        let now = self.now();
        self.entries
            .iter()
            .filter_map(|entry| entry.deadline)
            .map(|deadline| deadline.until(now))
            .min()
    }

    fn relocate(&mut self, moves: &[Relocation]) {
        for entry in &mut self.entries {
            entry.task = Relocation::apply(moves, entry.task);
        }
    }
}

impl FdMonitor for SelectMonitor {
    fn watch(&mut self, task: &mut Task, fd: Fd, events: Events, timeout_us: u64) -> TkResult<()> {
        if fd < 0 || fd > self.max_fileno {
            return Err(TkError::InvalidDescriptor);
        }
        if events.is_empty() {
            return Err(TkError::Os(libc::EINVAL));
        }
        if self.is_watched(fd) {
            return Err(TkError::AlreadyWatched);
        }
        if self.entries.len() >= self.capacity {
            return Err(TkError::MonitorFull);
        }

        let now = self.now();
        task.wait_mut().stamp(now, timeout_us);
        self.entries.push(WaitEntry {
            fd,
            events,
            task: task.id(),
            deadline: task.wait().deadline(),
        });
        trace!("watch fd {} for {}", fd, task.id());
        Ok(())
    }

    fn forget(&mut self, fd: Fd) -> TkResult<()> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.fd == fd)
            .ok_or(TkError::NotWatched)?;
        self.entries.remove(index);
        trace!("forget fd {}", fd);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_rejections() {
        let mut pool = TaskPool::new(2).unwrap();
        let a = pool.lease().unwrap();
        let b = pool.lease().unwrap();
        let mut monitor = SelectMonitor::with_config(SelectConfig {
            max_fileno: 10,
            capacity: 1,
        });

        let task = pool.get_mut(a).unwrap();
        assert_eq!(monitor.watch(task, -1, Events::IN, 0), Err(TkError::InvalidDescriptor));
        assert_eq!(monitor.watch(task, 11, Events::IN, 0), Err(TkError::InvalidDescriptor));
        assert_eq!(monitor.watch(task, 3, Events::empty(), 0), Err(TkError::Os(libc::EINVAL)));
        monitor.watch(task, 3, Events::IN, 0).unwrap();

        let task = pool.get_mut(b).unwrap();
        assert_eq!(monitor.watch(task, 3, Events::OUT, 0), Err(TkError::AlreadyWatched));
        assert_eq!(monitor.watch(task, 4, Events::OUT, 0), Err(TkError::MonitorFull));

        assert_eq!(monitor.forget(4), Err(TkError::NotWatched));
        monitor.forget(3).unwrap();
        assert!(monitor.is_empty());
    }

    #[test]
    fn test_relocate_follows_owner() {
        let mut pool = TaskPool::new(2).unwrap();
        let gone = pool.lease().unwrap();
        let owner = pool.lease().unwrap();
        let mut monitor = SelectMonitor::new();
        monitor
            .watch(pool.get_mut(owner).unwrap(), 0, Events::IN, 0)
            .unwrap();

        pool.release(gone).unwrap();
        let moves = pool.vacuum();
        monitor.relocate(&moves);

        assert_eq!(monitor.entries[0].task, moves[0].to);
        assert!(pool.get(monitor.entries[0].task).is_some());
    }

    #[test]
    fn test_nearest_deadline_ignores_indefinite_waits() {
        let mut pool = TaskPool::new(2).unwrap();
        let a = pool.lease().unwrap();
        let b = pool.lease().unwrap();
        let mut monitor = SelectMonitor::new();

        monitor.watch(pool.get_mut(a).unwrap(), 0, Events::IN, 0).unwrap();
        assert_eq!(monitor.nearest_deadline_us(), None);

        monitor
            .watch(pool.get_mut(b).unwrap(), 1, Events::IN, 500_000)
            .unwrap();
        let nearest = monitor.nearest_deadline_us().unwrap();
        assert!(nearest <= 500_000 && nearest > 0);
    }
}
