//! Call-frame arena
//!
//! Every coroutine invocation gets one frame. Frames link to their caller by
//! index, so a task's call chain is a singly linked list running from the
//! innermost frame back to the task's root.

use log::trace;
use slab::Slab;
use tasklet_core::{ResumePoint, TkError, TkResult};

/// Index of a frame in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(usize);

impl FrameId {
    /// Raw arena index
    pub const fn index(self) -> usize {
        self.0
    }
}

impl core::fmt::Display for FrameId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FrameId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "frame#{}", self.0);
    }
}

/// One coroutine activation
pub struct Frame<B> {
    parent: Option<FrameId>,
    resume_point: ResumePoint,
    body: Option<B>,
}

impl<B> Frame<B> {
    /// Calling frame, `None` for a task's root
    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    /// Where the body continues on its next invocation
    pub fn resume_point(&self) -> ResumePoint {
        self.resume_point
    }

    /// Consume the frame, yielding its body
    pub fn into_body(self) -> Option<B> {
        self.body
    }
}

/// Bounded storage for call frames
///
/// `B` is the coroutine body. While a body runs it is taken out of its frame
/// so it can borrow the rest of the runtime; `restore_body` puts it back.
pub struct FrameArena<B> {
    frames: Slab<Frame<B>>,
    limit: usize,
}

impl<B> FrameArena<B> {
    /// Create an arena holding at most `limit` frames
    pub fn new(limit: usize) -> Self {
        Self {
            frames: Slab::new(),
            limit,
        }
    }

    /// Maximum number of live frames
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of live frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if no frame is live
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Allocate a frame positioned at its start
    pub fn push(&mut self, parent: Option<FrameId>, body: B) -> TkResult<FrameId> {
        if self.frames.len() >= self.limit {
            return Err(TkError::AllocationFailure);
        }

        let key = self.frames.insert(Frame {
            parent,
            resume_point: ResumePoint::START,
            body: Some(body),
        });
        trace!("push frame#{} (parent {:?})", key, parent.map(FrameId::index));
        Ok(FrameId(key))
    }

    /// Free a frame, returning it
    pub fn pop(&mut self, id: FrameId) -> Option<Frame<B>> {
        let frame = self.frames.try_remove(id.0)?;
        trace!("pop frame#{}", id.0);
        Some(frame)
    }

    /// Look up a frame
    pub fn get(&self, id: FrameId) -> Option<&Frame<B>> {
        self.frames.get(id.0)
    }

    /// Calling frame of `id`
    pub fn parent(&self, id: FrameId) -> Option<FrameId> {
        self.get(id).and_then(Frame::parent)
    }

    /// Resume point of `id`
    pub fn resume_point(&self, id: FrameId) -> Option<ResumePoint> {
        self.get(id).map(Frame::resume_point)
    }

    /// Set the resume point of `id`
    pub fn set_resume_point(&mut self, id: FrameId, point: ResumePoint) {
        if let Some(frame) = self.frames.get_mut(id.0) {
            frame.resume_point = point;
        }
    }

    /// Take the body out of `id` for the duration of one invocation
    pub fn take_body(&mut self, id: FrameId) -> Option<B> {
        self.frames.get_mut(id.0).and_then(|frame| frame.body.take())
    }

    /// Put a body back after its invocation
    ///
    /// A frame freed while its body was out is gone; the body is dropped.
    pub fn restore_body(&mut self, id: FrameId, body: B) {
        if let Some(frame) = self.frames.get_mut(id.0) {
            frame.body = Some(body);
        }
    }

    /// Number of frames from `from` back to the root, inclusive
    pub fn depth(&self, from: Option<FrameId>) -> usize {
        let mut depth = 0;
        let mut cursor = from;
        while let Some(id) = cursor {
            depth += 1;
            cursor = self.parent(id);
        }
        depth
    }
}
