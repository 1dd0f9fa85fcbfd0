//! Alpha blending kernels.
//!
//! All kernels operate on byte slices that already start at the top-left
//! sample of the region being written or read, with explicit row strides.
//! Blending uses `out = (out * (255 - a) + in * a + 128) >> 8`.

/// Blend a single sample.
#[inline]
pub fn blend_sample(out: u8, input: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((out as u32 * (255 - a) + input as u32 * a + 128) >> 8) as u8
}

/// Overwrite `rows` rows of `row_bytes` bytes each.
pub fn copy_plane(
    dst: &mut [u8],
    dst_stride: usize,
    src: &[u8],
    src_stride: usize,
    row_bytes: usize,
    rows: usize,
) {
    for y in 0..rows {
        let d = y * dst_stride;
        let s = y * src_stride;
        dst[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
    }
}

/// Blend a packed source whose pixels carry a trailing alpha byte onto a
/// packed destination with `bytes_per_pixel` color bytes per pixel.
///
/// The alpha byte is consumed, never written.
pub fn blend_packed(
    dst: &mut [u8],
    dst_stride: usize,
    src: &[u8],
    src_stride: usize,
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
) {
    let src_bpp = bytes_per_pixel + 1;
    for y in 0..height {
        let out_row = &mut dst[y * dst_stride..y * dst_stride + width * bytes_per_pixel];
        let in_row = &src[y * src_stride..y * src_stride + width * src_bpp];
        for (out_px, in_px) in out_row
            .chunks_exact_mut(bytes_per_pixel)
            .zip(in_row.chunks_exact(src_bpp))
        {
            let a = in_px[bytes_per_pixel];
            for c in 0..3.min(bytes_per_pixel) {
                out_px[c] = blend_sample(out_px[c], in_px[c], a);
            }
        }
    }
}

/// Blend one plane using a separate alpha plane.
///
/// `alpha` is sampled nearest-neighbor: column `x` of the blended plane
/// reads alpha column `x << hsub`, row `y` reads alpha row `y << vsub`.
/// Pass `(0, 0)` for planes at alpha resolution.
#[allow(clippy::too_many_arguments)]
pub fn blend_plane(
    dst: &mut [u8],
    dst_stride: usize,
    src: &[u8],
    src_stride: usize,
    alpha: &[u8],
    alpha_stride: usize,
    width: usize,
    height: usize,
    hsub: u32,
    vsub: u32,
) {
    for y in 0..height {
        let out_row = &mut dst[y * dst_stride..y * dst_stride + width];
        let in_row = &src[y * src_stride..y * src_stride + width];
        let alpha_row = &alpha[(y << vsub) * alpha_stride..];
        for (x, (out, input)) in out_row.iter_mut().zip(in_row).enumerate() {
            *out = blend_sample(*out, *input, alpha_row[x << hsub]);
        }
    }
}
