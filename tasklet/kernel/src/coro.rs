//! Resumable function bodies
//!
//! A frame stores its body as a `Box<dyn Resumable>`, which lets the
//! scheduler invoke frames of unrelated signatures uniformly. The `Call`
//! thunks bind a plain function to its private state and up to two
//! auxiliary arguments fixed when the frame is created.

use crate::TaskCx;

/// A unit of work the scheduler can re-enter
pub trait Resumable {
    /// Run from the frame's current resume point up to the next suspension
    fn resume(&mut self, cx: &mut TaskCx<'_>);
}

impl<F> Resumable for F
where
    F: FnMut(&mut TaskCx<'_>),
{
    fn resume(&mut self, cx: &mut TaskCx<'_>) {
        self(cx)
    }
}

/// Body taking only private state
pub type Body<S> = fn(&mut TaskCx<'_>, &mut S);

/// Body taking private state and one auxiliary argument
pub type Body1<S, A> = fn(&mut TaskCx<'_>, &mut S, &A);

/// Body taking private state and two auxiliary arguments
pub type Body2<S, A, B> = fn(&mut TaskCx<'_>, &mut S, &A, &B);

/// A body bound to its state
pub struct Call<S> {
    body: Body<S>,
    state: S,
}

impl<S> Call<S> {
    /// Bind `body` to `state`
    pub fn new(body: Body<S>, state: S) -> Self {
        Self { body, state }
    }

    /// Private state of the activation
    pub fn state(&self) -> &S {
        &self.state
    }
}

impl<S> Resumable for Call<S> {
    fn resume(&mut self, cx: &mut TaskCx<'_>) {
        (self.body)(cx, &mut self.state)
    }
}

/// A body bound to its state and one argument
pub struct Call1<S, A> {
    body: Body1<S, A>,
    state: S,
    arg: A,
}

impl<S, A> Call1<S, A> {
    /// Bind `body` to `state` and `arg`
    pub fn new(body: Body1<S, A>, state: S, arg: A) -> Self {
        Self { body, state, arg }
    }
}

impl<S, A> Resumable for Call1<S, A> {
    fn resume(&mut self, cx: &mut TaskCx<'_>) {
        (self.body)(cx, &mut self.state, &self.arg)
    }
}

/// A body bound to its state and two arguments
pub struct Call2<S, A, B> {
    body: Body2<S, A, B>,
    state: S,
    arg1: A,
    arg2: B,
}

impl<S, A, B> Call2<S, A, B> {
    /// Bind `body` to `state`, `arg1` and `arg2`
    pub fn new(body: Body2<S, A, B>, state: S, arg1: A, arg2: B) -> Self {
        Self {
            body,
            state,
            arg1,
            arg2,
        }
    }
}

impl<S, A, B> Resumable for Call2<S, A, B> {
    fn resume(&mut self, cx: &mut TaskCx<'_>) {
        (self.body)(cx, &mut self.state, &self.arg1, &self.arg2)
    }
}
