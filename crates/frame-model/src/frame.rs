//! Planar image buffers.

use std::sync::Arc;

use vidlay_common::error::{VidlayError, VidlayResult};

use crate::pixel::PixelFormat;
use crate::time::{Pts, Rational};

/// A frame shared between its producer and the stages that hold on to it.
///
/// Dropping the last reference releases the pixel data.
pub type SharedFrame = Arc<Frame>;

/// One plane of pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    /// Sample bytes, `stride * rows` long.
    pub data: Vec<u8>,
    /// Distance in bytes between the starts of consecutive rows.
    pub stride: usize,
}

impl Plane {
    /// Bytes of row `y`, starting at its first sample.
    pub fn row(&self, y: usize) -> &[u8] {
        &self.data[y * self.stride..]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        &mut self.data[y * self.stride..]
    }
}

/// A decoded video frame.
///
/// Plane layout follows [`PixelFormat`]: packed formats hold a single
/// plane, planar formats hold Y, U, V and optionally A in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Presentation timestamp in the stage time base.
    pub pts: Pts,
    /// Pixel aspect ratio reported by the producer.
    pub sample_aspect_ratio: Rational,
    pub planes: Vec<Plane>,
}

impl Frame {
    /// Allocate a zeroed frame with tightly packed rows.
    pub fn alloc(format: PixelFormat, width: u32, height: u32) -> Self {
        let planes = (0..format.plane_count())
            .map(|i| {
                let stride = format.row_bytes(i, width);
                let (_, rows) = format.plane_dimensions(i, width, height);
                Plane {
                    data: vec![0; stride * rows as usize],
                    stride,
                }
            })
            .collect();

        Self {
            width,
            height,
            format,
            pts: 0,
            sample_aspect_ratio: Rational::one(),
            planes,
        }
    }

    /// Build a frame from existing planes, checking that each plane is
    /// large enough for the declared geometry.
    pub fn from_planes(
        format: PixelFormat,
        width: u32,
        height: u32,
        pts: Pts,
        planes: Vec<Plane>,
    ) -> VidlayResult<Self> {
        if planes.len() != format.plane_count() {
            return Err(VidlayError::frame(format!(
                "{format} expects {} planes, got {}",
                format.plane_count(),
                planes.len()
            )));
        }

        for (i, plane) in planes.iter().enumerate() {
            let row_bytes = format.row_bytes(i, width);
            let (_, rows) = format.plane_dimensions(i, width, height);
            if plane.stride < row_bytes {
                return Err(VidlayError::frame(format!(
                    "plane {i} stride {} is shorter than a {row_bytes} byte row",
                    plane.stride
                )));
            }
            let needed = if rows == 0 {
                0
            } else {
                plane.stride * (rows as usize - 1) + row_bytes
            };
            if plane.data.len() < needed {
                return Err(VidlayError::frame(format!(
                    "plane {i} holds {} bytes, {needed} required",
                    plane.data.len()
                )));
            }
        }

        Ok(Self {
            width,
            height,
            format,
            pts,
            sample_aspect_ratio: Rational::one(),
            planes,
        })
    }

    /// Split a contiguous, tightly packed buffer (as emitted by a rawvideo
    /// muxer) into planes.
    pub fn from_packed_bytes(
        format: PixelFormat,
        width: u32,
        height: u32,
        pts: Pts,
        bytes: &[u8],
    ) -> VidlayResult<Self> {
        let expected = format.frame_size(width, height);
        if bytes.len() != expected {
            return Err(VidlayError::frame(format!(
                "{width}x{height} {format} frame needs {expected} bytes, got {}",
                bytes.len()
            )));
        }

        let mut offset = 0;
        let mut planes = Vec::with_capacity(format.plane_count());
        for i in 0..format.plane_count() {
            let stride = format.row_bytes(i, width);
            let (_, rows) = format.plane_dimensions(i, width, height);
            let len = stride * rows as usize;
            planes.push(Plane {
                data: bytes[offset..offset + len].to_vec(),
                stride,
            });
            offset += len;
        }

        Self::from_planes(format, width, height, pts, planes)
    }

    pub fn with_pts(mut self, pts: Pts) -> Self {
        self.pts = pts;
        self
    }

    pub fn with_sample_aspect_ratio(mut self, sar: Rational) -> Self {
        self.sample_aspect_ratio = sar;
        self
    }

    pub fn plane(&self, index: usize) -> &Plane {
        &self.planes[index]
    }

    pub fn plane_mut(&mut self, index: usize) -> &mut Plane {
        &mut self.planes[index]
    }

    /// Alpha plane of a planar format that carries one.
    pub fn alpha_plane(&self) -> Option<&Plane> {
        if self.format.is_planar() && self.format.has_alpha() {
            self.planes.get(3)
        } else {
            None
        }
    }

    /// Sample dimensions of plane `index`.
    pub fn plane_dimensions(&self, index: usize) -> (u32, u32) {
        self.format.plane_dimensions(index, self.width, self.height)
    }

    /// Set every sample of plane `index` to `value`.
    pub fn fill_plane(&mut self, index: usize, value: u8) {
        self.planes[index].data.fill(value);
    }

    /// Set every pixel of a packed frame to `pixel`.
    pub fn fill_packed(&mut self, pixel: &[u8]) {
        let bpp = self.format.bytes_per_pixel();
        debug_assert_eq!(pixel.len(), bpp);
        let width = self.width as usize;
        let plane = &mut self.planes[0];
        for y in 0..self.height as usize {
            for px in plane.row_mut(y)[..width * bpp].chunks_exact_mut(bpp) {
                px.copy_from_slice(pixel);
            }
        }
    }

    /// Concatenate the planes without row padding.
    pub fn to_packed_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.format.frame_size(self.width, self.height));
        for (i, plane) in self.planes.iter().enumerate() {
            let row_bytes = self.format.row_bytes(i, self.width);
            let (_, rows) = self.plane_dimensions(i);
            for y in 0..rows as usize {
                out.extend_from_slice(&plane.row(y)[..row_bytes]);
            }
        }
        out
    }

    pub fn into_shared(self) -> SharedFrame {
        Arc::new(self)
    }
}
