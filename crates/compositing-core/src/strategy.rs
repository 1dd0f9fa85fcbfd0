//! Blend discipline selection for a negotiated format pair.
//!
//! The pair is resolved once at configuration time; per-frame code only
//! dispatches on the selected variant.

use vidlay_common::error::{VidlayError, VidlayResult};
use vidlay_frame_model::{Frame, PixelFormat};

use crate::blend;

/// Geometry derived from the negotiated formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatGeometry {
    /// Bytes per pixel of the base (and output) format. Planar formats
    /// report one byte per sample.
    pub bytes_per_pixel: usize,
    /// Horizontal chroma subsampling shift.
    pub hsub: u32,
    /// Vertical chroma subsampling shift.
    pub vsub: u32,
    /// Overlay carries a dedicated alpha plane.
    pub has_alpha_plane: bool,
    /// Overlay pixels carry a trailing alpha byte.
    pub interleaved_alpha: bool,
}

/// How overlay pixels are merged into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormatStrategy {
    /// Packed base, packed overlay with one extra alpha byte per pixel.
    PackedInterleavedAlpha {
        base: PixelFormat,
        overlay: PixelFormat,
        bytes_per_pixel: usize,
    },
    /// Planar base, planar overlay with a full resolution alpha plane.
    PlanarAlphaPlane {
        base: PixelFormat,
        overlay: PixelFormat,
        hsub: u32,
        vsub: u32,
    },
}

impl PixelFormatStrategy {
    /// Select the strategy for a `(base, overlay)` pair.
    ///
    /// Accepted pairs are `yuv420p + yuva420p`, `bgr24 + bgra` and
    /// `rgb24 + rgba`; anything else is a configuration error.
    pub fn negotiate(base: PixelFormat, overlay: PixelFormat) -> VidlayResult<Self> {
        let strategy = match (base, overlay) {
            (PixelFormat::Yuv420p, PixelFormat::Yuva420p) => {
                let (hsub, vsub) = base.chroma_shift();
                Self::PlanarAlphaPlane {
                    base,
                    overlay,
                    hsub,
                    vsub,
                }
            }
            (PixelFormat::Bgr24, PixelFormat::Bgra) | (PixelFormat::Rgb24, PixelFormat::Rgba) => {
                Self::PackedInterleavedAlpha {
                    base,
                    overlay,
                    bytes_per_pixel: base.bytes_per_pixel(),
                }
            }
            _ => {
                return Err(VidlayError::unsupported_format(format!(
                    "cannot overlay {overlay} onto {base} \
                     (supported: yuva420p on yuv420p, bgra on bgr24, rgba on rgb24)"
                )))
            }
        };

        tracing::debug!(%base, %overlay, geometry = ?strategy.geometry(), "Selected blend strategy");
        Ok(strategy)
    }

    pub fn base_format(&self) -> PixelFormat {
        match *self {
            Self::PackedInterleavedAlpha { base, .. } | Self::PlanarAlphaPlane { base, .. } => base,
        }
    }

    pub fn overlay_format(&self) -> PixelFormat {
        match *self {
            Self::PackedInterleavedAlpha { overlay, .. }
            | Self::PlanarAlphaPlane { overlay, .. } => overlay,
        }
    }

    /// Output frames keep the base layout.
    pub fn output_format(&self) -> PixelFormat {
        self.base_format()
    }

    pub fn geometry(&self) -> FormatGeometry {
        match *self {
            Self::PackedInterleavedAlpha {
                bytes_per_pixel, ..
            } => FormatGeometry {
                bytes_per_pixel,
                hsub: 0,
                vsub: 0,
                has_alpha_plane: false,
                interleaved_alpha: true,
            },
            Self::PlanarAlphaPlane { hsub, vsub, .. } => FormatGeometry {
                bytes_per_pixel: 1,
                hsub,
                vsub,
                has_alpha_plane: true,
                interleaved_alpha: false,
            },
        }
    }

    /// Plain copy of `src` into `dst` at `(x, y)`, covering `w x h` luma
    /// pixels. Used for the background and for sources without alpha.
    pub fn copy_region(&self, dst: &mut Frame, x: u32, y: u32, src: &Frame, w: u32, h: u32) {
        let planes = dst.planes.len().min(src.planes.len());
        for i in 0..planes {
            let (px, py, pw, ph) = self.plane_region(dst.format, i, x, y, w, h, true);
            let bpp = dst.format.bytes_per_pixel();
            let dst_plane = &mut dst.planes[i];
            let src_plane = &src.planes[i];
            let offset = py * dst_plane.stride + px * bpp;
            blend::copy_plane(
                &mut dst_plane.data[offset..],
                dst_plane.stride,
                &src_plane.data,
                src_plane.stride,
                pw * bpp,
                ph,
            );
        }
    }

    /// Blend the top-left `w x h` pixels of `src` into `dst` at `(x, y)`.
    ///
    /// Sources in the base format, or otherwise lacking alpha, are copied
    /// without weighting.
    pub fn blend_region(&self, dst: &mut Frame, x: u32, y: u32, src: &Frame, w: u32, h: u32) {
        if !src.format.has_alpha() {
            self.copy_region(dst, x, y, src, w, h);
            return;
        }

        // Inputs reject frames that differ from their announced format.
        debug_assert_eq!(src.format, self.overlay_format());
        if src.format != self.overlay_format() {
            return;
        }

        match *self {
            Self::PackedInterleavedAlpha {
                bytes_per_pixel, ..
            } => {
                let dst_plane = &mut dst.planes[0];
                let src_plane = &src.planes[0];
                let offset = y as usize * dst_plane.stride + x as usize * bytes_per_pixel;
                blend::blend_packed(
                    &mut dst_plane.data[offset..],
                    dst_plane.stride,
                    &src_plane.data,
                    src_plane.stride,
                    w as usize,
                    h as usize,
                    bytes_per_pixel,
                );
            }
            Self::PlanarAlphaPlane { hsub, vsub, .. } => {
                let alpha = &src.planes[3];
                for i in 0..3 {
                    let (px, py, pw, ph) = self.plane_region(dst.format, i, x, y, w, h, false);
                    let (hs, vs) = if i == 0 { (0, 0) } else { (hsub, vsub) };
                    let dst_plane = &mut dst.planes[i];
                    let src_plane = &src.planes[i];
                    let offset = py * dst_plane.stride + px;
                    blend::blend_plane(
                        &mut dst_plane.data[offset..],
                        dst_plane.stride,
                        &src_plane.data,
                        src_plane.stride,
                        &alpha.data,
                        alpha.stride,
                        pw,
                        ph,
                        hs,
                        vs,
                    );
                }
            }
        }
    }

    /// Position and extent of a luma-space region within plane `index`.
    ///
    /// Blends floor the chroma extent; copies round it up so that a full
    /// frame copy keeps the last chroma column and row of odd sizes.
    fn plane_region(
        &self,
        format: PixelFormat,
        index: usize,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        round_up: bool,
    ) -> (usize, usize, usize, usize) {
        if !format.is_chroma_plane(index) {
            return (x as usize, y as usize, w as usize, h as usize);
        }
        let (hsub, vsub) = format.chroma_shift();
        let (pw, ph) = if round_up {
            format.plane_dimensions(index, w, h)
        } else {
            (w >> hsub, h >> vsub)
        };
        (
            (x >> hsub) as usize,
            (y >> vsub) as usize,
            pw as usize,
            ph as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_pair_geometry() {
        let strategy =
            PixelFormatStrategy::negotiate(PixelFormat::Yuv420p, PixelFormat::Yuva420p).unwrap();
        let geometry = strategy.geometry();
        assert_eq!((geometry.hsub, geometry.vsub), (1, 1));
        assert!(geometry.has_alpha_plane);
        assert!(!geometry.interleaved_alpha);
        assert_eq!(strategy.output_format(), PixelFormat::Yuv420p);
    }

    #[test]
    fn test_packed_pair_geometry() {
        let strategy =
            PixelFormatStrategy::negotiate(PixelFormat::Bgr24, PixelFormat::Bgra).unwrap();
        let geometry = strategy.geometry();
        assert_eq!(geometry.bytes_per_pixel, 3);
        assert!(geometry.interleaved_alpha);
        assert!(!geometry.has_alpha_plane);
    }

    #[test]
    fn test_unsupported_pairs_are_rejected() {
        for (base, overlay) in [
            (PixelFormat::Yuv420p, PixelFormat::Bgra),
            (PixelFormat::Bgr24, PixelFormat::Rgba),
            (PixelFormat::Bgra, PixelFormat::Bgra),
            (PixelFormat::Yuva420p, PixelFormat::Yuva420p),
        ] {
            let err = PixelFormatStrategy::negotiate(base, overlay).unwrap_err();
            assert!(err.is_configuration());
            let text = err.to_string();
            assert!(text.contains(base.name()) && text.contains(overlay.name()));
        }
    }

    #[test]
    fn test_source_without_alpha_overwrites() {
        let strategy =
            PixelFormatStrategy::negotiate(PixelFormat::Yuv420p, PixelFormat::Yuva420p).unwrap();
        let mut dst = Frame::alloc(PixelFormat::Yuv420p, 4, 4);
        let mut src = Frame::alloc(PixelFormat::Yuv420p, 2, 2);
        src.fill_plane(0, 90);
        src.fill_plane(1, 91);
        src.fill_plane(2, 92);

        strategy.blend_region(&mut dst, 2, 2, &src, 2, 2);

        assert_eq!(dst.plane(0).row(2)[..4], [0, 0, 90, 90]);
        assert_eq!(dst.plane(0).row(3)[..4], [0, 0, 90, 90]);
        assert_eq!(dst.plane(1).data, vec![0, 0, 0, 91]);
        assert_eq!(dst.plane(2).data, vec![0, 0, 0, 92]);
    }

    #[test]
    fn test_full_copy_keeps_odd_chroma_edge() {
        let strategy =
            PixelFormatStrategy::negotiate(PixelFormat::Yuv420p, PixelFormat::Yuva420p).unwrap();
        let mut src = Frame::alloc(PixelFormat::Yuv420p, 5, 3);
        src.fill_plane(1, 128);
        src.fill_plane(2, 64);
        let mut dst = Frame::alloc(PixelFormat::Yuv420p, 5, 3);

        strategy.copy_region(&mut dst, 0, 0, &src, 5, 3);

        // 3x2 chroma planes, including the column and row that only half
        // overlap the luma grid.
        assert_eq!(dst.plane(1).data, vec![128; 6]);
        assert_eq!(dst.plane(2).data, vec![64; 6]);
    }
}
