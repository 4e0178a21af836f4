//! Producer and consumer over a non-blocking pipe
//!
//! The root task spawns a writer and a reader counted against one
//! semaphore, then parks until both are done. Each side waits on the
//! `select` monitor whenever the pipe would block.

use std::cell::{Cell, RefCell};
use std::io;
use std::os::unix::io::RawFd;
use std::rc::Rc;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::debug;
use tasklet_core::{Events, ResumePoint, Semaphore, TkError};
use tasklet_kernel::{Call1, FdMonitor, TaskCx};
use tasklet_posix::{errno, must_wait, SelectMonitor};

#[derive(Parser, Debug)]
#[command(author, version, about = "Pass numbers through a pipe between two tasks")]
struct Opts {
    #[arg(long = "count", default_value_t = 10_000, value_name = "N")]
    count: u32,

    /// Reader gives up after this long without data
    #[arg(long = "timeout-ms", default_value_t = 1_000, value_name = "MS")]
    timeout_ms: u64,

    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

const AGAIN: ResumePoint = ResumePoint::at(1);
const READABLE: ResumePoint = ResumePoint::at(2);
const DONE: ResumePoint = ResumePoint::at(1);

struct Channel {
    read: RawFd,
    write: RawFd,
}

impl Channel {
    fn new() -> io::Result<Self> {
        let mut fds = [0; 2];
        if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            read: fds[0],
            write: fds[1],
        })
    }

    fn send(&self, value: u32) -> io::Result<()> {
        let bytes = value.to_ne_bytes();
        let n = unsafe { libc::write(self.write, bytes.as_ptr().cast(), bytes.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn recv(&self) -> io::Result<Option<u32>> {
        let mut bytes = [0u8; 4];
        let n = unsafe { libc::read(self.read, bytes.as_mut_ptr().cast(), bytes.len()) };
        match n {
            n if n < 0 => Err(io::Error::last_os_error()),
            0 => Ok(None),
            _ => Ok(Some(u32::from_ne_bytes(bytes))),
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.read);
            libc::close(self.write);
        }
    }
}

struct Shared {
    monitor: Rc<RefCell<SelectMonitor>>,
    channel: Rc<Channel>,
    count: u32,
    timeout_us: u64,
    received: Cell<(u32, u64)>,
}

fn writer(cx: &mut TaskCx<'_>, sent: &mut u32, shared: &Rc<Shared>) {
    match cx.resume_point() {
        ResumePoint::START | AGAIN => {
            if *sent == shared.count {
                return cx.ret();
            }
            match shared.channel.send(*sent) {
                Ok(()) => {
                    *sent += 1;
                    cx.yield_now(AGAIN);
                }
                Err(err) if must_wait(errno(&err)) => {
                    let fd = shared.channel.write;
                    cx.watch_fd(&*shared.monitor, fd, Events::OUT, 0, AGAIN);
                }
                Err(err) => cx.reject(errno(&err)),
            }
        }
        _ => {
            let _ = shared.monitor.borrow_mut().forget(shared.channel.write);
            debug!("writer sent {}", sent);
            cx.finish();
        }
    }
}

fn reader(cx: &mut TaskCx<'_>, total: &mut (u32, u64), shared: &Rc<Shared>) {
    match cx.resume_point() {
        READABLE if cx.timed_out() => cx.reject(libc::ETIMEDOUT),
        ResumePoint::START | AGAIN | READABLE => {
            if total.0 == shared.count {
                return cx.ret();
            }
            match shared.channel.recv() {
                Ok(Some(value)) => {
                    total.0 += 1;
                    total.1 += u64::from(value);
                    cx.yield_now(AGAIN);
                }
                Ok(None) => cx.ret(),
                Err(err) if must_wait(errno(&err)) => {
                    let fd = shared.channel.read;
                    cx.watch_fd(&*shared.monitor, fd, Events::IN, shared.timeout_us, READABLE);
                }
                Err(err) => cx.reject(errno(&err)),
            }
        }
        _ => {
            let _ = shared.monitor.borrow_mut().forget(shared.channel.read);
            debug!("reader got {} values, sum {}", total.0, total.1);
            shared.received.set(*total);
            cx.finish();
        }
    }
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    tasklet_demos::init_logging(tasklet_demos::verbosity(opts.verbose));

    let channel = Rc::new(Channel::new().context("failed to create pipe")?);
    let count = opts.count;
    let timeout_us = opts.timeout_ms * 1_000;
    let spawn_error: Rc<Cell<Option<TkError>>> = Rc::new(Cell::new(None));
    let received = Rc::new(Cell::new((0, 0)));
    let (report, tally) = (spawn_error.clone(), received.clone());

    tasklet_posix::forever(
        move |monitor| {
            let shared = Rc::new(Shared {
                monitor,
                channel,
                count,
                timeout_us,
                received: Cell::new((0, 0)),
            });
            let semaphore = Semaphore::new();

            move |cx: &mut TaskCx<'_>| match cx.resume_point() {
                ResumePoint::START => {
                    if let Err(err) = cx.semaphore_acquire(&semaphore) {
                        report.set(Some(err));
                        return cx.reject(err.code());
                    }
                    let w = Call1::new(writer, 0, shared.clone());
                    let r = Call1::new(reader, (0, 0), shared.clone());
                    let spawned = cx
                        .spawn_with_semaphore(&semaphore, w)
                        .and_then(|_| cx.spawn_with_semaphore(&semaphore, r));
                    if let Err(err) = spawned {
                        report.set(Some(err));
                    }
                    if semaphore.is_pending() {
                        cx.wait(DONE);
                    } else {
                        cx.ret();
                    }
                }
                DONE => cx.ret(),
                _ => {
                    tally.set(shared.received.get());
                    cx.finish();
                }
            }
        },
        3,
    )
    .context("runtime aborted")?;

    if let Some(err) = spawn_error.get() {
        return Err(err).context("failed to start pipe tasks");
    }

    let (values, sum) = received.get();
    let expected: u64 = (0..u64::from(count)).sum();
    ensure!(values == count, "reader got {} of {} values", values, count);
    ensure!(sum == expected, "sum {} does not match {}", sum, expected);

    println!("passed {} values (sum {})", values, sum);
    Ok(())
}
