//! One-shot timer descriptor
//!
//! Wraps `timerfd_create(2)`: the descriptor becomes readable once the armed
//! duration passes, so a task can wait for it through any descriptor
//! monitor.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

/// Owned, non-blocking timer descriptor on the monotonic clock
#[derive(Debug)]
pub struct TimerFd {
    fd: RawFd,
}

impl TimerFd {
    /// Create a disarmed timer
    pub fn new() -> io::Result<Self> {
        let fd = unsafe {
            libc::timerfd_create(libc::CLOCK_MONOTONIC, libc::TFD_NONBLOCK | libc::TFD_CLOEXEC)
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd })
    }

    /// Fire once after `duration`
    ///
    /// A zero duration would disarm the timer, so it is rounded up to one
    /// nanosecond.
    pub fn arm(&self, duration: Duration) -> io::Result<()> {
        let duration = duration.max(Duration::from_nanos(1));
        let spec = libc::itimerspec {
            it_interval: libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
            it_value: libc::timespec {
                tv_sec: duration.as_secs() as libc::time_t,
                tv_nsec: duration.subsec_nanos() as libc::c_long,
            },
        };

        let ret = unsafe { libc::timerfd_settime(self.fd, 0, &spec, std::ptr::null_mut()) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Consume pending expirations, returning how many there were
    ///
    /// Returns 0 when the timer has not fired.
    pub fn drain(&self) -> io::Result<u64> {
        let mut expirations: u64 = 0;
        let n = unsafe {
            libc::read(
                self.fd,
                &mut expirations as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(0);
            }
            return Err(err);
        }
        Ok(expirations)
    }

    /// The raw descriptor
    pub fn fd(&self) -> RawFd {
        self.fd
    }
}

impl AsRawFd for TimerFd {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for TimerFd {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_before_and_after_expiry() {
        let timer = TimerFd::new().unwrap();
        timer.arm(Duration::from_millis(5)).unwrap();
        assert_eq!(timer.drain().unwrap(), 0);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(timer.drain().unwrap(), 1);
    }
}
