//! vidlay Overlay Engine
//!
//! Pull-driven two-input overlay stage: frames from a base ("main") stream
//! and an overlay stream are merged by timestamp and composited into one
//! output stream.
//!
//! # Pipeline Architecture
//!
//! ```text
//! main.mkv ──── MovieSource ──┐
//!                             ├── FrameSynchronizer ── Compositor ── EncoderSink
//! logo.mov ──── MovieSource ──┘   (current/pending        │
//!                                  slot per input)        ▼
//!                                                      output.mp4
//! ```
//!
//! Everything runs on the caller's thread. Each call to
//! [`OverlayStage::produce_next`] pulls at most one frame per input.

pub mod ffmpeg;
pub mod movie;
pub mod sink;
pub mod slot;
pub mod source;
pub mod stage;
pub mod synchronizer;

pub use movie::{MovieSource, MovieSourceConfig};
pub use sink::{ConstantRateWriter, EncoderSink, RawFrameWriter};
pub use slot::StreamSlot;
pub use source::{BoxedSource, FrameSource, MemorySource, StreamInfo};
pub use stage::{FilterDescriptor, OverlayConfig, OverlayStage, StageStats, VideoFilter};
pub use synchronizer::{FramePair, FrameSynchronizer, SyncOutcome};
