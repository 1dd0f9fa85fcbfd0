//! Pixel format descriptions.
//!
//! Only the layouts the overlay stage can blend are modelled. Names match
//! ffmpeg's `-pix_fmt` spelling so they can be passed straight to the
//! decoder and encoder processes.

use serde::{Deserialize, Serialize};

/// Raw pixel layout of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Planar Y, U, V with 2x2 chroma subsampling.
    Yuv420p,
    /// [`PixelFormat::Yuv420p`] plus a full resolution alpha plane.
    Yuva420p,
    /// Packed 8-bit R, G, B.
    Rgb24,
    /// Packed 8-bit B, G, R.
    Bgr24,
    /// Packed 8-bit R, G, B, A.
    Rgba,
    /// Packed 8-bit B, G, R, A.
    Bgra,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 6] = [
        PixelFormat::Yuv420p,
        PixelFormat::Yuva420p,
        PixelFormat::Rgb24,
        PixelFormat::Bgr24,
        PixelFormat::Rgba,
        PixelFormat::Bgra,
    ];

    /// ffmpeg name of the format.
    pub fn name(self) -> &'static str {
        match self {
            Self::Yuv420p => "yuv420p",
            Self::Yuva420p => "yuva420p",
            Self::Rgb24 => "rgb24",
            Self::Bgr24 => "bgr24",
            Self::Rgba => "rgba",
            Self::Bgra => "bgra",
        }
    }

    /// Look a format up by its ffmpeg name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Whether each component lives in its own plane.
    pub fn is_planar(self) -> bool {
        matches!(self, Self::Yuv420p | Self::Yuva420p)
    }

    /// Whether the format carries per-pixel opacity, either as a dedicated
    /// plane or as an interleaved byte.
    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Yuva420p | Self::Rgba | Self::Bgra)
    }

    /// Number of planes in a frame of this format.
    pub fn plane_count(self) -> usize {
        match self {
            Self::Yuv420p => 3,
            Self::Yuva420p => 4,
            Self::Rgb24 | Self::Bgr24 | Self::Rgba | Self::Bgra => 1,
        }
    }

    /// Bytes per pixel in each plane's sample grid.
    ///
    /// Planar formats store one byte per sample in every plane.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Yuv420p | Self::Yuva420p => 1,
            Self::Rgb24 | Self::Bgr24 => 3,
            Self::Rgba | Self::Bgra => 4,
        }
    }

    /// Horizontal and vertical chroma subsampling as right-shift amounts.
    ///
    /// Packed formats report `(0, 0)`.
    pub fn chroma_shift(self) -> (u32, u32) {
        match self {
            Self::Yuv420p | Self::Yuva420p => (1, 1),
            _ => (0, 0),
        }
    }

    /// Whether plane `index` is subsampled by [`PixelFormat::chroma_shift`].
    ///
    /// Only the two chroma planes are; luma and alpha are full resolution.
    pub fn is_chroma_plane(self, index: usize) -> bool {
        self.is_planar() && (index == 1 || index == 2)
    }

    /// Width and height in samples of plane `index` for a `width x height`
    /// image. Subsampled dimensions round up.
    pub fn plane_dimensions(self, index: usize, width: u32, height: u32) -> (u32, u32) {
        if self.is_chroma_plane(index) {
            let (h, v) = self.chroma_shift();
            (ceil_shift(width, h), ceil_shift(height, v))
        } else {
            (width, height)
        }
    }

    /// Bytes in one tightly packed row of plane `index`.
    pub fn row_bytes(self, index: usize, width: u32) -> usize {
        let (w, _) = self.plane_dimensions(index, width, 1);
        w as usize * self.bytes_per_pixel()
    }

    /// Size in bytes of a tightly packed `width x height` frame.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        (0..self.plane_count())
            .map(|i| {
                let (_, h) = self.plane_dimensions(i, width, height);
                self.row_bytes(i, width) * h as usize
            })
            .sum()
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn ceil_shift(value: u32, shift: u32) -> u32 {
    (value + (1 << shift) - 1) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        for format in PixelFormat::ALL {
            assert_eq!(PixelFormat::from_name(format.name()), Some(format));
        }
        assert_eq!(PixelFormat::from_name("nv12"), None);
    }

    #[test]
    fn test_yuv420_chroma_rounds_up() {
        let format = PixelFormat::Yuv420p;
        assert_eq!(format.plane_dimensions(0, 5, 3), (5, 3));
        assert_eq!(format.plane_dimensions(1, 5, 3), (3, 2));
        assert_eq!(format.plane_dimensions(2, 4, 4), (2, 2));
    }

    #[test]
    fn test_alpha_plane_is_full_resolution() {
        let format = PixelFormat::Yuva420p;
        assert!(!format.is_chroma_plane(3));
        assert_eq!(format.plane_dimensions(3, 6, 4), (6, 4));
    }

    #[test]
    fn test_frame_sizes() {
        assert_eq!(PixelFormat::Yuv420p.frame_size(4, 4), 16 + 4 + 4);
        assert_eq!(PixelFormat::Yuva420p.frame_size(4, 4), 16 + 4 + 4 + 16);
        assert_eq!(PixelFormat::Bgr24.frame_size(2, 2), 12);
        assert_eq!(PixelFormat::Bgra.frame_size(2, 2), 16);
    }

    #[test]
    fn test_serde_uses_ffmpeg_names() {
        let json = serde_json::to_string(&PixelFormat::Yuva420p).unwrap();
        assert_eq!(json, "\"yuva420p\"");
    }
}
