//! Hardware-timer sleep
//!
//! On interrupt-driven targets a sleeping task parks itself directly and the
//! timer interrupt flips it back to `Running` through a [`TaskWaker`]. No
//! readiness module is involved.

use alloc::rc::Rc;
use core::cell::RefCell;
use core::time::Duration;

use log::debug;
use tasklet_core::{ResumePoint, TaskWaker};

use crate::{Call2, TaskCx};

/// A platform one-shot timer
pub trait OneShotTimer {
    /// Arm the timer; its interrupt must call `waker.wake()` on expiry
    ///
    /// Returns an errno-style code when the timer cannot be armed.
    fn start(&mut self, duration: Duration, waker: TaskWaker) -> Result<(), i32>;

    /// Disarm the timer; a no-op when it already fired
    fn cancel(&mut self);
}

const FIRED: ResumePoint = ResumePoint::at(1);

fn irq_sleep_body<T>(cx: &mut TaskCx<'_>, _state: &mut (), timer: &Rc<RefCell<T>>, duration: &Duration)
where
    T: OneShotTimer,
{
    match cx.resume_point() {
        ResumePoint::START => {
            // Park before arming so an early interrupt still finds us waiting.
            cx.wait(FIRED);
            let waker = cx.waker();
            if let Err(code) = timer.borrow_mut().start(*duration, waker) {
                debug!("{}: timer start failed ({})", cx.id(), code);
                cx.reject(code);
            }
        }
        FIRED => cx.ret(),
        _ => {
            timer.borrow_mut().cancel();
            cx.finish();
        }
    }
}

/// Resumable sleep on a hardware one-shot timer
///
/// Await it from a body, or spawn it directly. Failing to arm the timer
/// faults the task with the platform's code.
pub fn irq_sleep<T>(timer: Rc<RefCell<T>>, duration: Duration) -> Call2<(), Rc<RefCell<T>>, Duration>
where
    T: OneShotTimer + 'static,
{
    Call2::new(irq_sleep_body::<T>, (), timer, duration)
}
