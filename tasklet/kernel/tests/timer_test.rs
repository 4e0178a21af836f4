//! Hardware-timer sleep tests for tasklet-kernel
//!
//! A host thread stands in for the timer interrupt.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use tasklet_core::{ResumePoint, TaskWaker};
use tasklet_kernel::{forever, irq_sleep, OneShotTimer, TaskCx};

#[derive(Default)]
struct ThreadTimer {
    armed: usize,
    cancelled: usize,
}

impl OneShotTimer for ThreadTimer {
    fn start(&mut self, duration: Duration, waker: TaskWaker) -> Result<(), i32> {
        self.armed += 1;
        thread::spawn(move || {
            thread::sleep(duration);
            waker.wake();
        });
        Ok(())
    }

    fn cancel(&mut self) {
        self.cancelled += 1;
    }
}

struct BrokenTimer;

impl OneShotTimer for BrokenTimer {
    fn start(&mut self, _duration: Duration, _waker: TaskWaker) -> Result<(), i32> {
        Err(16)
    }

    fn cancel(&mut self) {}
}

#[test]
fn test_irq_sleep_waits_for_interrupt() {
    let timer = Rc::new(RefCell::new(ThreadTimer::default()));
    let started = Instant::now();

    forever(irq_sleep(timer.clone(), Duration::from_millis(20)), 1).unwrap();

    assert!(started.elapsed() >= Duration::from_millis(20));
    assert_eq!(timer.borrow().armed, 1);
    assert_eq!(timer.borrow().cancelled, 1);
}

#[test]
fn test_irq_sleep_arm_failure_faults_caller() {
    let code = Rc::new(Cell::new(0));
    let seen = code.clone();
    let timer = Rc::new(RefCell::new(BrokenTimer));

    forever(
        move |cx: &mut TaskCx<'_>| match cx.resume_point().raw() {
            0 => cx.await_call(
                ResumePoint::at(1),
                irq_sleep(timer.clone(), Duration::from_millis(5)),
            ),
            1 => {
                seen.set(cx.error());
                cx.ret();
            }
            _ => cx.finish(),
        },
        1,
    )
    .unwrap();

    assert_eq!(code.get(), 16);
}
