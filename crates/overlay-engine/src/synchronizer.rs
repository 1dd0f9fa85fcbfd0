//! Timestamp-ordered merge of the two input streams.
//!
//! Each input keeps a [`StreamSlot`]: the frame currently composited and
//! one frame of lookahead. Every step pulls into empty lookahead slots,
//! then advances whichever input has the earlier pending frame (both on a
//! tie). An input that has ended keeps showing its last frame.

use std::cmp::Ordering;

use vidlay_frame_model::{PixelFormat, SharedFrame};

use crate::slot::StreamSlot;
use crate::source::BoxedSource;

/// Input index of the base stream.
pub const MAIN: usize = 0;
/// Input index of the overlay stream.
pub const OVERLAY: usize = 1;

const ROLES: [&str; 2] = ["main", "overlay"];

/// Frames to composite for one output frame.
#[derive(Debug, Clone)]
pub struct FramePair {
    pub base: SharedFrame,
    pub overlay: SharedFrame,
}

/// Result of one synchronization step.
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Pair(FramePair),
    EndOfStream,
}

/// Which slots advance in a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shift {
    Main,
    Overlay,
    Both,
}

struct Input {
    source: BoxedSource,
    /// Format announced by the source before its first frame.
    format: PixelFormat,
    slot: StreamSlot,
    exhausted: bool,
}

impl Input {
    /// Pull one frame; failures are folded into end-of-stream.
    fn pull(&mut self, role: &str) -> Option<SharedFrame> {
        if self.exhausted {
            return None;
        }
        match self.source.pull() {
            Ok(Some(frame)) if frame.format != self.format => {
                tracing::warn!(
                    input = role,
                    source = self.source.label(),
                    expected = %self.format,
                    actual = %frame.format,
                    "Frame format differs from the stream format; treating input as ended"
                );
                self.exhausted = true;
                None
            }
            Ok(Some(frame)) => {
                tracing::trace!(input = role, pts = frame.pts, "Pulled frame");
                Some(frame)
            }
            Ok(None) => {
                tracing::debug!(
                    input = role,
                    source = self.source.label(),
                    "Input reached end of stream"
                );
                self.exhausted = true;
                None
            }
            Err(e) => {
                tracing::warn!(
                    input = role,
                    source = self.source.label(),
                    error = %e,
                    "Pull failed; treating input as ended"
                );
                self.exhausted = true;
                None
            }
        }
    }
}

/// Owns both inputs and decides which frames form the next output.
pub struct FrameSynchronizer {
    inputs: [Input; 2],
    finished: bool,
}

impl FrameSynchronizer {
    pub fn new(main: BoxedSource, overlay: BoxedSource) -> Self {
        let input = |source: BoxedSource| Input {
            format: source.info().format,
            source,
            slot: StreamSlot::new(),
            exhausted: false,
        };
        Self {
            inputs: [input(main), input(overlay)],
            finished: false,
        }
    }

    /// Whether end-of-stream has been reported. Once set, every further
    /// call to [`FrameSynchronizer::advance`] reports it again.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn slot(&self, index: usize) -> &StreamSlot {
        &self.inputs[index].slot
    }

    /// Produce the pair for the next output frame.
    pub fn advance(&mut self) -> SyncOutcome {
        if self.finished {
            return SyncOutcome::EndOfStream;
        }

        if self.inputs.iter().any(|input| !input.slot.has_current()) {
            return self.start();
        }

        let mut ended = 0;
        for (index, input) in self.inputs.iter_mut().enumerate() {
            if input.slot.has_pending() {
                continue;
            }
            match input.pull(ROLES[index]) {
                Some(frame) => input.slot.accept(frame),
                None => ended += 1,
            }
        }
        if ended == self.inputs.len() {
            return self.finish();
        }

        let main_pts = self.inputs[MAIN].slot.pending().map(|f| f.pts);
        let overlay_pts = self.inputs[OVERLAY].slot.pending().map(|f| f.pts);
        let shift = match (main_pts, overlay_pts) {
            (Some(main), Some(overlay)) => match main.cmp(&overlay) {
                Ordering::Less => Shift::Main,
                Ordering::Greater => Shift::Overlay,
                Ordering::Equal => Shift::Both,
            },
            (Some(_), None) => Shift::Main,
            (None, Some(_)) => Shift::Overlay,
            (None, None) => return self.finish(),
        };

        tracing::trace!(?shift, "Shifting inputs");
        match shift {
            Shift::Main => {
                self.inputs[MAIN].slot.shift();
            }
            Shift::Overlay => {
                self.inputs[OVERLAY].slot.shift();
            }
            Shift::Both => {
                self.inputs[MAIN].slot.shift();
                self.inputs[OVERLAY].slot.shift();
            }
        }

        self.current_pair()
    }

    /// First frame of every input that has none yet. Partial startup is
    /// not supported: any input ending here ends the stage.
    fn start(&mut self) -> SyncOutcome {
        for (index, input) in self.inputs.iter_mut().enumerate() {
            if input.slot.has_current() {
                continue;
            }
            match input.pull(ROLES[index]) {
                Some(frame) => input.slot.accept(frame),
                None => {
                    tracing::info!(input = ROLES[index], "Input ended before its first frame");
                    return self.finish();
                }
            }
        }
        self.current_pair()
    }

    fn current_pair(&mut self) -> SyncOutcome {
        let base = self.inputs[MAIN].slot.current().cloned();
        let overlay = self.inputs[OVERLAY].slot.current().cloned();
        match (base, overlay) {
            (Some(base), Some(overlay)) => SyncOutcome::Pair(FramePair { base, overlay }),
            _ => self.finish(),
        }
    }

    fn finish(&mut self) -> SyncOutcome {
        if !self.finished {
            tracing::debug!("Both inputs drained; synchronizer finished");
        }
        self.finished = true;
        for input in &mut self.inputs {
            input.slot.clear();
        }
        SyncOutcome::EndOfStream
    }
}

impl std::fmt::Debug for FrameSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSynchronizer")
            .field("main", &self.inputs[MAIN].slot)
            .field("overlay", &self.inputs[OVERLAY].slot)
            .field("finished", &self.finished)
            .finish()
    }
}
