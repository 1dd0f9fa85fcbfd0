//! Frame compositor: base frame as background, overlay blended on top.
//!
//! The compositor keeps no state between frames. Which frames to combine
//! is decided upstream by the synchronizer.

use vidlay_frame_model::Frame;

use crate::position::OverlayPosition;
use crate::strategy::PixelFormatStrategy;

/// Rectangle of the output written by the overlay, in luma pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlitRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BlitRegion {
    /// Clamp an overlay anchored at `position` to an output of
    /// `out_w x out_h`.
    ///
    /// The anchor is pulled inside the frame (negative offsets become 0,
    /// offsets past the edge land on the last row/column) and the extent
    /// is cut so the blit never leaves the output.
    pub fn clamp(
        position: OverlayPosition,
        out_w: u32,
        out_h: u32,
        overlay_w: u32,
        overlay_h: u32,
    ) -> Self {
        let x = clamp_anchor(position.x, out_w);
        let y = clamp_anchor(position.y, out_h);
        Self {
            x,
            y,
            width: (out_w - x).min(overlay_w),
            height: (out_h - y).min(overlay_h),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

fn clamp_anchor(offset: i32, extent: u32) -> u32 {
    if extent == 0 {
        return 0;
    }
    (offset.max(0) as u32).min(extent - 1)
}

/// Draws output frames for a fixed strategy and overlay position.
#[derive(Debug, Clone)]
pub struct Compositor {
    strategy: PixelFormatStrategy,
    position: OverlayPosition,
}

impl Compositor {
    pub fn new(strategy: PixelFormatStrategy, position: OverlayPosition) -> Self {
        Self { strategy, position }
    }

    pub fn strategy(&self) -> &PixelFormatStrategy {
        &self.strategy
    }

    pub fn position(&self) -> OverlayPosition {
        self.position
    }

    /// Compose a new output frame the size of `base`.
    pub fn compose(&self, base: &Frame, overlay: &Frame) -> Frame {
        let mut output = Frame::alloc(self.strategy.output_format(), base.width, base.height);
        self.compose_into(&mut output, base, overlay);
        output
    }

    /// Draw `base` into `output`, blend `overlay` on top and stamp the
    /// output with the later of the two timestamps.
    pub fn compose_into(&self, output: &mut Frame, base: &Frame, overlay: &Frame) {
        let bg_w = output.width.min(base.width);
        let bg_h = output.height.min(base.height);
        self.strategy.copy_region(output, 0, 0, base, bg_w, bg_h);
        output.sample_aspect_ratio = base.sample_aspect_ratio;

        let region = BlitRegion::clamp(
            self.position,
            output.width,
            output.height,
            overlay.width,
            overlay.height,
        );
        if !region.is_empty() {
            self.strategy.blend_region(
                output,
                region.x,
                region.y,
                overlay,
                region.width,
                region.height,
            );
        }

        output.pts = base.pts.max(overlay.pts);
        tracing::trace!(
            pts = output.pts,
            base_pts = base.pts,
            overlay_pts = overlay.pts,
            ?region,
            "Composed frame"
        );
    }
}
