//! Per-input two-frame buffer.

use vidlay_frame_model::SharedFrame;

/// The frame currently shown for one input plus at most one frame queued
/// behind it.
///
/// `pending` is only populated between a pull and the next shift.
#[derive(Debug, Default)]
pub struct StreamSlot {
    current: Option<SharedFrame>,
    pending: Option<SharedFrame>,
}

impl StreamSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&SharedFrame> {
        self.current.as_ref()
    }

    pub fn pending(&self) -> Option<&SharedFrame> {
        self.pending.as_ref()
    }

    pub fn has_current(&self) -> bool {
        self.current.is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Accept a freshly pulled frame: it becomes `current` if nothing has
    /// been shown yet, otherwise it is queued as `pending`.
    pub fn accept(&mut self, frame: SharedFrame) {
        debug_assert!(self.pending.is_none(), "slot already holds a pending frame");
        if self.current.is_none() {
            self.current = Some(frame);
        } else {
            self.pending = Some(frame);
        }
    }

    /// Replace `current` with `pending`, releasing the old `current`.
    ///
    /// Returns false, leaving the slot untouched, when nothing is pending.
    pub fn shift(&mut self) -> bool {
        match self.pending.take() {
            Some(next) => {
                self.current = Some(next);
                true
            }
            None => false,
        }
    }

    /// Release both frames.
    pub fn clear(&mut self) {
        self.current = None;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vidlay_frame_model::{Frame, PixelFormat};

    fn frame(pts: i64) -> SharedFrame {
        Frame::alloc(PixelFormat::Bgr24, 1, 1).with_pts(pts).into_shared()
    }

    #[test]
    fn test_first_frame_becomes_current() {
        let mut slot = StreamSlot::new();
        slot.accept(frame(0));
        assert_eq!(slot.current().map(|f| f.pts), Some(0));
        assert!(!slot.has_pending());

        slot.accept(frame(10));
        assert_eq!(slot.current().map(|f| f.pts), Some(0));
        assert_eq!(slot.pending().map(|f| f.pts), Some(10));
    }

    #[test]
    fn test_shift_releases_previous_current() {
        let first = frame(0);
        let mut slot = StreamSlot::new();
        slot.accept(Arc::clone(&first));
        slot.accept(frame(10));
        assert_eq!(Arc::strong_count(&first), 2);

        assert!(slot.shift());
        assert_eq!(Arc::strong_count(&first), 1);
        assert_eq!(slot.current().map(|f| f.pts), Some(10));
        assert!(!slot.has_pending());
    }

    #[test]
    fn test_shift_without_pending_is_a_no_op() {
        let mut slot = StreamSlot::new();
        slot.accept(frame(5));
        assert!(!slot.shift());
        assert_eq!(slot.current().map(|f| f.pts), Some(5));
    }
}
