//! Per-frame refresh of the displayed "now" while a timer runs.
//!
//! A running timer keeps exactly one frame request pending. When the frame
//! fires, the loop publishes a fresh timestamp and asks for the next frame,
//! but only if the timer is still running. Stopping cancels the pending
//! request; a frame that was already handed out when the cancel happened is
//! recognised by its id and dropped.

use crate::clock::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(u64);

/// Platform per-frame callback primitive
pub trait FrameScheduler {
    /// Ask for a callback on the next display frame on behalf of `owner`
    fn request_frame(&mut self, owner: usize) -> FrameId;
    fn cancel_frame(&mut self, id: FrameId);
}

/// Frame scheduler backed by the runtime's display tick.
///
/// Requests made while the due frames are being dispatched land in the next
/// frame, never the current one.
#[derive(Debug, Default)]
pub struct FrameQueue {
    next_id: u64,
    pending: Vec<(FrameId, usize)>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand over every request made before this frame
    pub fn take_due(&mut self) -> Vec<(FrameId, usize)> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: FrameId) -> bool {
        self.pending.iter().any(|(pending, _)| *pending == id)
    }
}

impl FrameScheduler for FrameQueue {
    fn request_frame(&mut self, owner: usize) -> FrameId {
        self.next_id += 1;
        let id = FrameId(self.next_id);
        self.pending.push((id, owner));
        id
    }

    fn cancel_frame(&mut self, id: FrameId) {
        self.pending.retain(|(pending, _)| *pending != id);
    }
}

#[derive(Debug, Clone, Default)]
pub struct RefreshLoop {
    pending: Option<FrameId>,
    now: Timestamp,
    frames: u64,
}

impl RefreshLoop {
    pub fn new(now: Timestamp) -> Self {
        Self {
            pending: None,
            now,
            frames: 0,
        }
    }

    /// Latest published timestamp
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// How many timestamps have been published
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    pub fn begin(&mut self, scheduler: &mut impl FrameScheduler, owner: usize, now: Timestamp) {
        self.publish(now);
        if self.pending.is_none() {
            self.pending = Some(scheduler.request_frame(owner));
        }
    }

    /// Frame callback. Returns whether a new timestamp was published.
    pub fn on_frame(
        &mut self,
        scheduler: &mut impl FrameScheduler,
        id: FrameId,
        owner: usize,
        running: bool,
        now: Timestamp,
    ) -> bool {
        if self.pending != Some(id) {
            return false;
        }
        self.pending = None;
        if !running {
            return false;
        }

        self.publish(now);
        self.pending = Some(scheduler.request_frame(owner));
        true
    }

    pub fn cancel(&mut self, scheduler: &mut impl FrameScheduler) {
        if let Some(id) = self.pending.take() {
            scheduler.cancel_frame(id);
        }
    }

    /// Publish `now` without touching the frame request, e.g. to show the
    /// exact stop time once a timer is stopped.
    pub fn publish(&mut self, now: Timestamp) {
        if now > self.now {
            self.now = now;
        }
        self.frames += 1;
    }
}
