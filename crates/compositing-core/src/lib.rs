//! vidlay Compositing Core
//!
//! Everything needed to draw one output frame from a base frame and an
//! overlay frame:
//! - **Strategy:** pick the blend discipline for a negotiated format pair
//! - **Blend:** integer alpha kernels for packed and planar layouts
//! - **Compositor:** background copy plus a clipped overlay blit
//! - **Position:** one-time evaluation of the x/y offset expressions
//!
//! This crate is pure computation: no I/O and no timing decisions.
//! All inputs are frames; all outputs are frames.

pub mod blend;
pub mod compositor;
pub mod expr;
pub mod position;
pub mod strategy;

pub use compositor::{BlitRegion, Compositor};
pub use position::{resolve_position, OverlayPosition};
pub use strategy::{FormatGeometry, PixelFormatStrategy};
