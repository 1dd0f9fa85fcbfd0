//! Upstream frame producers.

use std::collections::VecDeque;

use vidlay_common::error::{VidlayError, VidlayResult};
use vidlay_frame_model::{Frame, PixelFormat, Rational, SharedFrame};

/// Properties of a stream, known before its first frame is pulled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub sample_aspect_ratio: Rational,
    /// Nominal frame rate, when the producer knows it.
    pub frame_rate: Option<Rational>,
}

impl StreamInfo {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            sample_aspect_ratio: Rational::one(),
            frame_rate: None,
        }
    }
}

/// A producer of frames in presentation order.
///
/// `pull` returns `Ok(None)` once no more frames remain. Timestamps must be
/// non-decreasing and expressed in the stage time base
/// ([`vidlay_frame_model::TIME_BASE_US`]).
pub trait FrameSource {
    /// Stream geometry and format.
    fn info(&self) -> StreamInfo;

    /// Fetch the next frame.
    fn pull(&mut self) -> VidlayResult<Option<SharedFrame>>;

    /// Short label for logs.
    fn label(&self) -> &str {
        "source"
    }
}

/// Owned, type-erased source as held by the synchronizer.
pub type BoxedSource = Box<dyn FrameSource + Send>;

/// A source backed by frames held in memory.
///
/// Useful for still-image overlays and for driving the stage in tests.
/// [`MemorySource::failing_after`] makes the source error out once its
/// frames run out instead of ending cleanly.
#[derive(Debug)]
pub struct MemorySource {
    label: String,
    info: StreamInfo,
    frames: VecDeque<SharedFrame>,
    fail_when_empty: bool,
    pulls: usize,
}

impl MemorySource {
    /// Create a source whose stream info is taken from the first frame.
    pub fn new(label: impl Into<String>, frames: Vec<Frame>) -> VidlayResult<Self> {
        let first = frames
            .first()
            .ok_or_else(|| VidlayError::source("memory source needs at least one frame"))?;
        let info = StreamInfo {
            sample_aspect_ratio: first.sample_aspect_ratio,
            ..StreamInfo::new(first.width, first.height, first.format)
        };
        Ok(Self::with_info(label, info, frames))
    }

    /// Create a source with explicit stream info; `frames` may be empty.
    pub fn with_info(label: impl Into<String>, info: StreamInfo, frames: Vec<Frame>) -> Self {
        Self {
            label: label.into(),
            info,
            frames: frames.into_iter().map(Frame::into_shared).collect(),
            fail_when_empty: false,
            pulls: 0,
        }
    }

    /// Report an error instead of end-of-stream once drained.
    pub fn failing_after(mut self) -> Self {
        self.fail_when_empty = true;
        self
    }

    /// Number of times `pull` has been called.
    pub fn pulls(&self) -> usize {
        self.pulls
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemorySource {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn pull(&mut self) -> VidlayResult<Option<SharedFrame>> {
        self.pulls += 1;
        match self.frames.pop_front() {
            Some(frame) => Ok(Some(frame)),
            None if self.fail_when_empty => Err(VidlayError::source(format!(
                "{} has no more frames to give",
                self.label
            ))),
            None => Ok(None),
        }
    }

    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_drains_in_order() {
        let frames = vec![
            Frame::alloc(PixelFormat::Bgr24, 2, 2).with_pts(0),
            Frame::alloc(PixelFormat::Bgr24, 2, 2).with_pts(40),
        ];
        let mut source = MemorySource::new("main", frames).unwrap();
        assert_eq!(source.info().width, 2);
        assert_eq!(source.pull().unwrap().map(|f| f.pts), Some(0));
        assert_eq!(source.pull().unwrap().map(|f| f.pts), Some(40));
        assert!(source.pull().unwrap().is_none());
        assert_eq!(source.pulls(), 3);
    }

    #[test]
    fn test_failing_memory_source_errors_when_drained() {
        let info = StreamInfo::new(2, 2, PixelFormat::Bgra);
        let mut source = MemorySource::with_info("logo", info, vec![]).failing_after();
        assert!(source.pull().is_err());
    }

    #[test]
    fn test_empty_memory_source_needs_info() {
        assert!(MemorySource::new("empty", vec![]).is_err());
    }
}
