//! Scheduler tests for tasklet-kernel

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tasklet_core::{ResumePoint, Semaphore, TaskStatus, TkError};
use tasklet_kernel::{forever, Call, Call1, Module, Runtime, RuntimeConfig, TaskCx};
use tasklet_mem::TaskPool;

const NEXT: ResumePoint = ResumePoint::at(1);

/// Nests `depth` frames, parks in the innermost one, counts finally runs
fn nest(cx: &mut TaskCx<'_>, depth: &mut u32, finals: &Rc<Cell<u32>>) {
    match cx.resume_point().raw() {
        0 if *depth > 1 => {
            let child = Call1::new(nest, *depth - 1, finals.clone());
            cx.await_call(NEXT, child);
        }
        0 => cx.wait(NEXT),
        1 => cx.ret(),
        _ => {
            finals.set(finals.get() + 1);
            cx.finish();
        }
    }
}

/// Yields `steps` times, then finishes
fn worker(cx: &mut TaskCx<'_>, steps: &mut u32) {
    match cx.resume_point().raw() {
        0 | 1 if *steps > 0 => {
            *steps -= 1;
            cx.yield_now(NEXT);
        }
        0 | 1 => cx.ret(),
        _ => cx.finish(),
    }
}

/// Parks until woken, then finishes
fn parked(cx: &mut TaskCx<'_>, _state: &mut ()) {
    match cx.resume_point().raw() {
        0 => cx.wait(NEXT),
        1 => cx.ret(),
        _ => cx.finish(),
    }
}

#[test]
fn test_cancel_unwinds_every_frame_in_one_step() {
    let finals = Rc::new(Cell::new(0));
    let mut runtime = Runtime::new(1).unwrap();
    let id = runtime.spawn(Call1::new(nest, 4u32, finals.clone())).unwrap();

    for _ in 0..4 {
        assert!(!runtime.step(id));
    }
    assert_eq!(runtime.status(id), Some(TaskStatus::Waiting));
    assert_eq!(runtime.frames(), 4);

    runtime.cancel(id).unwrap();
    assert!(runtime.step(id));
    assert_eq!(finals.get(), 4);
    assert_eq!(runtime.frames(), 0);
}

#[test]
fn test_completed_awaits_restore_depth() {
    let depths = Rc::new(RefCell::new(Vec::new()));
    let seen = depths.clone();

    let mut runtime = Runtime::new(1).unwrap();
    runtime
        .spawn(move |cx: &mut TaskCx<'_>| match cx.resume_point().raw() {
            0 => {
                seen.borrow_mut().push(cx.depth());
                cx.await_call(NEXT, Call::new(worker, 1u32));
            }
            1 => {
                seen.borrow_mut().push(cx.depth());
                cx.await_call(ResumePoint::at(2), Call::new(worker, 0u32));
            }
            2 => {
                seen.borrow_mut().push(cx.depth());
                cx.ret();
            }
            _ => cx.finish(),
        })
        .unwrap();

    runtime.run().unwrap();
    assert_eq!(*depths.borrow(), [1, 1, 1]);
    assert_eq!(runtime.frames(), 0);
}

#[test]
fn test_reject_unwinds_only_the_failing_frame() {
    fn failing(cx: &mut TaskCx<'_>, _state: &mut ()) {
        match cx.resume_point().raw() {
            0 => cx.reject(5),
            _ => cx.finish(),
        }
    }

    let observed = Rc::new(Cell::new(0));
    let seen = observed.clone();

    tasklet_kernel::forever(
        move |cx: &mut TaskCx<'_>| match cx.resume_point().raw() {
            0 => cx.await_call(NEXT, Call::new(failing, ())),
            1 => {
                assert_eq!(cx.status(), TaskStatus::Running);
                seen.set(cx.error());
                cx.clear_error();
                cx.ret();
            }
            _ => cx.finish(),
        },
        1,
    )
    .unwrap();

    assert_eq!(observed.get(), 5);
}

#[test]
fn test_spawn_failures_leave_no_task() {
    let mut runtime = Runtime::new(1).unwrap();
    runtime.spawn(Call::new(worker, 0u32)).unwrap();
    assert_eq!(
        runtime.spawn(Call::new(worker, 0u32)).err(),
        Some(TkError::PoolFull)
    );
    assert_eq!(runtime.count(), 1);

    let config = RuntimeConfig::builder().max_tasks(2).max_frames(1).build();
    let mut runtime = Runtime::with_config(config).unwrap();
    runtime.spawn(Call::new(worker, 0u32)).unwrap();
    assert_eq!(
        runtime.spawn(Call::new(worker, 0u32)).err(),
        Some(TkError::AllocationFailure)
    );
    assert_eq!(runtime.count(), 1);
    assert_eq!(runtime.stats().used, 1);
}

#[test]
fn test_await_without_frames_faults_task() {
    let code = Rc::new(Cell::new(0));
    let seen = code.clone();

    let config = RuntimeConfig::builder().max_tasks(1).max_frames(1).build();
    let mut runtime = Runtime::with_config(config).unwrap();
    runtime
        .spawn(move |cx: &mut TaskCx<'_>| match cx.resume_point().raw() {
            0 => cx.await_call(NEXT, Call::new(worker, 0u32)),
            1 => cx.ret(),
            _ => {
                seen.set(cx.error());
                cx.finish();
            }
        })
        .unwrap();

    runtime.run().unwrap();
    assert_eq!(code.get(), TkError::AllocationFailure.code());
}

struct Waiter {
    semaphore: Semaphore,
    reattach: Rc<Cell<Option<TkError>>>,
}

fn waiter(cx: &mut TaskCx<'_>, state: &mut Waiter) {
    match cx.resume_point().raw() {
        0 => {
            cx.semaphore_acquire(&state.semaphore).unwrap();
            state
                .reattach
                .set(cx.semaphore_acquire(&state.semaphore).err());
            cx.spawn_with_semaphore(&state.semaphore, Call::new(worker, 2u32))
                .unwrap();
            if state.semaphore.is_pending() {
                cx.wait(NEXT);
            } else {
                cx.ret();
            }
        }
        1 => cx.ret(),
        _ => cx.finish(),
    }
}

#[test]
fn test_semaphore_rendezvous() {
    let semaphore = Semaphore::new();
    let reattach = Rc::new(Cell::new(None));

    let mut runtime = Runtime::new(2).unwrap();
    let id = runtime
        .spawn(Call::new(
            waiter,
            Waiter {
                semaphore: semaphore.clone(),
                reattach: reattach.clone(),
            },
        ))
        .unwrap();

    runtime.tick().unwrap();
    assert_eq!(reattach.get(), Some(TkError::AlreadyAttached));
    assert_eq!(runtime.status(id), Some(TaskStatus::Waiting));
    assert_eq!(semaphore.value(), 1);

    while runtime.count() > 1 {
        assert_eq!(runtime.status(id), Some(TaskStatus::Waiting));
        runtime.tick().unwrap();
    }
    assert_eq!(semaphore.value(), 0);
    assert_eq!(runtime.status(id), Some(TaskStatus::Running));

    runtime.tick().unwrap();
    assert_eq!(runtime.count(), 0);
}

#[test]
fn test_acquire_resets_count_of_earlier_attached_tasks() {
    let semaphore = Semaphore::new();
    let held = semaphore.clone();
    let pending = Rc::new(Cell::new(None));
    let seen = pending.clone();

    let mut runtime = Runtime::new(2).unwrap();
    let early = runtime
        .spawn_with_semaphore(&semaphore, Call::new(worker, 1u32))
        .unwrap();
    assert_eq!(semaphore.value(), 1);

    runtime
        .spawn(move |cx: &mut TaskCx<'_>| match cx.resume_point().raw() {
            0 => {
                cx.semaphore_acquire(&held).unwrap();
                seen.set(Some(held.is_pending()));
                if held.is_pending() {
                    cx.wait(NEXT);
                } else {
                    cx.ret();
                }
            }
            1 => cx.ret(),
            _ => cx.finish(),
        })
        .unwrap();

    // The waiter does not park: the earlier spawn no longer counts.
    runtime.tick().unwrap();
    assert_eq!(pending.get(), Some(false));
    assert_eq!(runtime.count(), 1);
    assert!(runtime.status(early).is_some());

    runtime.run().unwrap();
    assert_eq!(semaphore.value(), -1);
}

#[test]
fn test_vacuum_follows_semaphore_waiter() {
    let semaphore = Semaphore::new();
    let held = semaphore.clone();

    let mut runtime = Runtime::new(2).unwrap();
    runtime.spawn(Call::new(worker, 1u32)).unwrap();
    runtime
        .spawn(move |cx: &mut TaskCx<'_>| match cx.resume_point().raw() {
            0 => {
                cx.semaphore_acquire(&held).unwrap();
                cx.wait(NEXT);
            }
            1 => cx.ret(),
            _ => cx.finish(),
        })
        .unwrap();

    runtime.tick().unwrap();
    runtime.tick().unwrap();
    assert_eq!(runtime.count(), 1);

    let moves = runtime.vacuum();
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0].to.index(), 0);
    assert_eq!(semaphore.waiter(), Some(moves[0].to));

    runtime.cancel(moves[0].to).unwrap();
    runtime.run().unwrap();
    assert_eq!(runtime.count(), 0);
}

#[derive(Default)]
struct Probe {
    nearest: Option<u64>,
    fail_on: Option<usize>,
    ticks: usize,
    timeouts: Vec<u64>,
    started: bool,
    ended: bool,
}

impl Module for Probe {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn loop_start(&mut self, _pool: &mut TaskPool) {
        self.started = true;
    }

    fn tick(&mut self, _pool: &mut TaskPool, timeout_us: u64) -> tasklet_core::TkResult<()> {
        self.ticks += 1;
        self.timeouts.push(timeout_us);
        if self.fail_on == Some(self.ticks) {
            return Err(TkError::Os(5));
        }
        Ok(())
    }

    fn loop_end(&mut self, _pool: &mut TaskPool) {
        self.ended = true;
    }

    fn nearest_deadline_us(&self) -> Option<u64> {
        self.nearest
    }
}

#[test]
fn test_module_timeout_follows_idle_state() {
    let probe = Rc::new(RefCell::new(Probe {
        nearest: Some(250),
        ..Probe::default()
    }));
    let config = RuntimeConfig::builder()
        .max_tasks(1)
        .timeouts(0, 1_000)
        .build();
    let mut runtime = Runtime::with_config(config).unwrap();
    runtime.install(probe.clone()).unwrap();
    let id = runtime.spawn(Call::new(parked, ())).unwrap();

    for _ in 0..3 {
        runtime.tick().unwrap();
    }
    probe.borrow_mut().nearest = None;
    runtime.tick().unwrap();

    assert_eq!(probe.borrow().timeouts, [0, 0, 250, 1_000]);

    runtime.cancel(id).unwrap();
    runtime.run().unwrap();
}

#[test]
fn test_module_failure_aborts_instance() {
    let finals = Rc::new(Cell::new(0));
    let probe = Rc::new(RefCell::new(Probe {
        fail_on: Some(2),
        ..Probe::default()
    }));

    let mut runtime = Runtime::new(4).unwrap();
    runtime.install(probe.clone()).unwrap();
    for _ in 0..3 {
        runtime.spawn(Call1::new(nest, 2u32, finals.clone())).unwrap();
    }

    assert_eq!(runtime.run(), Err(TkError::Os(5)));
    assert_eq!(runtime.count(), 0);
    assert_eq!(finals.get(), 6);

    let probe = probe.borrow();
    assert!(probe.started);
    assert!(probe.ended);
    assert_eq!(probe.ticks, 2);
}

#[test]
fn test_uninstalled_module_is_not_ticked() {
    let probe = Rc::new(RefCell::new(Probe::default()));
    let module: tasklet_kernel::ModuleRef = probe.clone();

    let mut runtime = Runtime::new(1).unwrap();
    runtime.install(module.clone()).unwrap();
    runtime.uninstall(&module).unwrap();
    assert_eq!(runtime.uninstall(&module), Err(TkError::ModuleNotInstalled));

    runtime.spawn(Call::new(worker, 1u32)).unwrap();
    runtime.run().unwrap();
    assert_eq!(probe.borrow().ticks, 0);
}

#[test]
fn test_idle_callback_runs_on_idle_sweep() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    static IDLE: AtomicUsize = AtomicUsize::new(0);
    fn on_idle() {
        IDLE.fetch_add(1, Ordering::SeqCst);
    }

    let config = RuntimeConfig::builder()
        .max_tasks(1)
        .idle_callback(on_idle)
        .build();
    let mut runtime = Runtime::with_config(config).unwrap();
    let id = runtime.spawn(Call::new(parked, ())).unwrap();

    runtime.tick().unwrap();
    assert_eq!(IDLE.load(Ordering::SeqCst), 0);
    runtime.tick().unwrap();
    assert_eq!(IDLE.load(Ordering::SeqCst), 1);

    runtime.cancel(id).unwrap();
    runtime.run().unwrap();
}

#[test]
fn test_forever_drains_spawned_children() {
    let done = Rc::new(Cell::new(0));
    let seen = done.clone();

    forever(
        move |cx: &mut TaskCx<'_>| match cx.resume_point().raw() {
            0 => {
                for steps in 0..3u32 {
                    cx.spawn(Call::new(worker, steps)).unwrap();
                }
                cx.ret();
            }
            _ => {
                seen.set(seen.get() + 1);
                cx.finish();
            }
        },
        4,
    )
    .unwrap();

    assert_eq!(done.get(), 1);
}
