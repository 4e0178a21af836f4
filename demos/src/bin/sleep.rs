//! Run several timer-descriptor sleeps side by side
//!
//! Every sleeper parks on its own timer descriptor; the `select` monitor
//! wakes them all, so the total wall time is one sleep, not the sum.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use tasklet_core::{ResumePoint, TkError};
use tasklet_kernel::TaskCx;
use tasklet_posix::sleep;

#[derive(Parser, Debug)]
#[command(author, version, about = "Sleep in several tasks at once")]
struct Opts {
    #[arg(long = "millis", default_value_t = 500, value_name = "MS")]
    millis: u64,

    #[arg(long = "tasks", default_value_t = 4, value_name = "N")]
    tasks: usize,

    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    tasklet_demos::init_logging(tasklet_demos::verbosity(opts.verbose));

    let duration = Duration::from_millis(opts.millis);
    let sleepers = opts.tasks.max(1);
    let started = Instant::now();
    let spawn_error: Rc<Cell<Option<TkError>>> = Rc::new(Cell::new(None));
    let errno = Rc::new(Cell::new(0));
    let (report, seen) = (spawn_error.clone(), errno.clone());

    tasklet_posix::forever(
        move |monitor| {
            move |cx: &mut TaskCx<'_>| match cx.resume_point().raw() {
                0 => {
                    for _ in 1..sleepers {
                        if let Err(err) = cx.spawn(sleep(monitor.clone(), duration)) {
                            report.set(Some(err));
                        }
                    }
                    cx.await_call(ResumePoint::at(1), sleep(monitor.clone(), duration));
                }
                1 => {
                    seen.set(cx.error());
                    cx.ret();
                }
                _ => cx.finish(),
            }
        },
        sleepers,
    )
    .context("runtime aborted")?;

    if let Some(err) = spawn_error.get() {
        return Err(err).context("failed to spawn sleeper");
    }
    if errno.get() != 0 {
        bail!("sleep failed: errno {}", errno.get());
    }

    info!("{} sleepers done", sleepers);
    println!("{} x {:?} took {:?}", sleepers, duration, started.elapsed());
    Ok(())
}
