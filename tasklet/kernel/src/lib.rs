#![no_std]
#![forbid(unsafe_code)]

//! # Tasklet Kernel
//!
//! The cooperative execution engine. A [`Runtime`] owns a fixed-capacity
//! task pool and the frame arena holding every task's call chain, and
//! drives both from a single thread: each tick polls the installed
//! readiness modules, then sweeps the runnable tasks once each.
//!
//! Task bodies are plain functions organized around [`ResumePoint`]s. A body
//! reads where it left off with [`TaskCx::resume_point`], runs up to its next
//! suspension point, records where to continue and returns:
//!
//! ```ignore
//! fn blink(cx: &mut TaskCx<'_>, count: &mut u32) {
//!     match cx.resume_point().raw() {
//!         0 | 1 if *count < 3 => {
//!             *count += 1;
//!             cx.yield_now(ResumePoint::at(1));
//!         }
//!         0 | 1 => cx.ret(),
//!         _ => cx.finish(),
//!     }
//! }
//! ```
//!
//! [`ResumePoint`]: tasklet_core::ResumePoint

extern crate alloc;

pub mod config;
pub mod context;
pub mod coro;
pub mod module;
pub mod runtime;
pub mod semaphore;
pub mod timer;

pub use config::*;
pub use context::*;
pub use coro::*;
pub use module::*;
pub use runtime::*;
pub use timer::*;
