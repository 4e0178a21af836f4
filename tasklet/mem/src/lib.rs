#![no_std]
#![forbid(unsafe_code)]

//! # Tasklet Memory Management
//!
//! Fixed-capacity storage for the runtime: the task pool that leases and
//! releases task slots, and the frame arena holding every task's call chain.
//! Both are sized once at creation so that memory use is bounded up front.

extern crate alloc;

pub mod frames;
pub mod pool;
pub mod task;

pub use frames::*;
pub use pool::*;
pub use task::*;
