//! Timer-descriptor sleep

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use log::debug;
use tasklet_core::{Events, ResumePoint};
use tasklet_kernel::{Call2, FdMonitor, TaskCx};

use crate::TimerFd;

const EXPIRED: ResumePoint = ResumePoint::at(1);

/// Resumable returned by [`sleep`]
pub type Sleep<M> = Call2<Option<TimerFd>, Rc<RefCell<M>>, Duration>;

fn sleep_body<M>(
    cx: &mut TaskCx<'_>,
    timer: &mut Option<TimerFd>,
    monitor: &Rc<RefCell<M>>,
    duration: &Duration,
) where
    M: FdMonitor,
{
    match cx.resume_point() {
        ResumePoint::START => {
            let armed = TimerFd::new().and_then(|t| t.arm(*duration).map(|()| t));
            match armed {
                Ok(t) => {
                    let fd = t.fd();
                    *timer = Some(t);
                    cx.watch_fd(&**monitor, fd, Events::IN, 0, EXPIRED);
                }
                Err(err) => {
                    debug!("{}: cannot arm timer: {}", cx.id(), err);
                    cx.reject(crate::errno(&err));
                }
            }
        }
        EXPIRED => {
            if let Some(t) = timer {
                let _ = t.drain();
            }
            cx.ret();
        }
        _ => {
            if let Some(t) = timer.take() {
                // Gone already when the wait ended normally.
                let _ = monitor.borrow_mut().forget(t.fd());
            }
            cx.finish();
        }
    }
}

/// Resumable sleep on a timer descriptor watched by `monitor`
///
/// Await it from a body, or spawn it directly. Failing to create or arm the
/// timer faults the task with the errno.
pub fn sleep<M>(monitor: Rc<RefCell<M>>, duration: Duration) -> Sleep<M>
where
    M: FdMonitor + 'static,
{
    Call2::new(sleep_body::<M>, None, monitor, duration)
}
