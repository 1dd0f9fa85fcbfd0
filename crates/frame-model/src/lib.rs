//! vidlay Frame Model
//!
//! Defines the data contracts shared by every stage of the overlay pipeline:
//! - **Pixel formats:** packed RGB family and planar YUV, with or without alpha
//! - **Frames:** immutable per-plane image buffers with a presentation timestamp
//! - **Time bases:** rational units and timestamp rescaling
//!
//! Frames are produced by upstream sources and shared as [`SharedFrame`]
//! (`Arc<Frame>`); nothing downstream mutates them.

pub mod frame;
pub mod pixel;
pub mod time;

pub use frame::*;
pub use pixel::*;
pub use time::*;
