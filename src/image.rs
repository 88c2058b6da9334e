// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::error::FrameError;
use core::fmt;
use std::error::Error;
use tracing::debug;
use turbojpeg::OwnedBuf;

/// Pixel layouts held by the frame processor's working buffers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// NV21 4:2:0 YUV semi-planar, stored as single-byte rows (luma rows
    /// followed by interleaved V/U rows)
    Nv21,
    /// RGBA 32-bit pixel format (8 bits per channel, with alpha)
    Rgba,
    /// 8-bit single channel grayscale
    Grey,
}

impl PixelFormat {
    /// Bytes per element of a buffer in this format.
    pub const fn channels(self) -> usize {
        match self {
            PixelFormat::Nv21 => 1,
            PixelFormat::Rgba => 4,
            PixelFormat::Grey => 1,
        }
    }

    pub const fn fourcc(self) -> [u8; 4] {
        match self {
            PixelFormat::Nv21 => *b"NV21",
            PixelFormat::Rgba => *b"RGBA",
            PixelFormat::Grey => *b"GREY",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let fourcc = self.fourcc();
        write!(f, "{}", String::from_utf8_lossy(&fourcc))
    }
}

/// Dimensions and layout of a working buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Shape {
    pub rows: usize,
    pub cols: usize,
    pub format: PixelFormat,
}

impl Shape {
    pub const fn new(rows: usize, cols: usize, format: PixelFormat) -> Self {
        Self { rows, cols, format }
    }

    /// Number of bytes an allocation of this shape holds.
    pub const fn len(&self) -> usize {
        self.rows * self.cols * self.format.channels()
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true when a buffer currently allocated as `current` must be
    /// reallocated to hold this shape.
    ///
    /// A buffer with no allocation always needs one. Otherwise rows, columns
    /// and pixel format must all match for the allocation to be reused; a
    /// larger existing allocation is not reused for a smaller shape.
    pub fn requires_realloc(&self, current: Option<Shape>) -> bool {
        current != Some(*self)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{} {}", self.cols, self.rows, self.format)
    }
}

/// Reusable working buffer owned by the frame processor.
///
/// The backing storage is only replaced when [`ensure_capacity`] is asked for
/// a shape that differs from the current one, so a steady stream of frames
/// with the same dimensions performs no allocations after the first.
///
/// [`ensure_capacity`]: ScratchBuffer::ensure_capacity
#[derive(Debug, Default)]
pub struct ScratchBuffer {
    shape: Option<Shape>,
    data: Vec<u8>,
}

impl ScratchBuffer {
    pub const fn new() -> Self {
        Self {
            shape: None,
            data: Vec::new(),
        }
    }

    /// Makes the buffer hold exactly `rows x cols` elements of `format`.
    ///
    /// Returns true if the storage was reallocated. Contents are zeroed on
    /// reallocation and left untouched otherwise.
    pub fn ensure_capacity(&mut self, rows: usize, cols: usize, format: PixelFormat) -> bool {
        let required = Shape::new(rows, cols, format);
        if !required.requires_realloc(self.shape) {
            return false;
        }

        self.data = vec![0; required.len()];
        self.shape = Some(required);
        debug!("scratch buffer reallocated to {}", required);
        true
    }

    pub fn shape(&self) -> Option<Shape> {
        self.shape
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Size in bytes of an NV21 frame, or `None` if it does not fit in `usize`.
pub fn nv21_size(width: usize, height: usize) -> Option<usize> {
    width.checked_mul(height)?.checked_mul(3).map(|n| n / 2)
}

/// Size in bytes of an RGBA frame, or `None` if it does not fit in `usize`.
pub fn rgba_size(width: usize, height: usize) -> Option<usize> {
    width.checked_mul(height)?.checked_mul(4)
}

/// Read-only view of an NV21 frame owned by the caller.
///
/// The view borrows the caller's bytes for the duration of a single
/// processing call; the processor copies what it needs into its own working
/// buffers and never keeps the reference.
#[derive(Copy, Clone, Debug)]
pub struct Nv21Frame<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
}

impl<'a> Nv21Frame<'a> {
    /// Validates `data` as a `width x height` NV21 frame.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `width` or `height` is not positive
    /// - the frame byte counts overflow `usize`
    /// - `data` is shorter than `width * height * 3 / 2` bytes
    pub fn new(data: &'a [u8], width: i32, height: i32) -> Result<Self, FrameError> {
        if width <= 0 || height <= 0 {
            return Err(FrameError::InvalidDimensions { width, height });
        }

        let (w, h) = (width as usize, height as usize);
        let expected = match (nv21_size(w, h), rgba_size(w, h)) {
            (Some(expected), Some(_)) => expected,
            _ => return Err(FrameError::TooLarge { width, height }),
        };

        if data.len() < expected {
            return Err(FrameError::BufferTooShort {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            data,
            width: w,
            height: h,
        })
    }

    /// Same as [`Nv21Frame::new`] for hosts whose buffer may be absent.
    pub fn from_option(data: Option<&'a [u8]>, width: i32, height: i32) -> Result<Self, FrameError> {
        match data {
            Some(data) => Self::new(data, width, height),
            None => Err(FrameError::MissingBuffer),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }
}

impl fmt::Display for Nv21Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} NV21 ({} bytes)",
            self.width,
            self.height,
            self.data.len()
        )
    }
}

// ITU-R BT.601 video range YUV to RGB coefficients in 20-bit fixed point.
const YUV_SHIFT: u32 = 20;
const YUV_HALF: i32 = 1 << (YUV_SHIFT - 1);
const YUV_CY: i32 = 1_220_542;
const YUV_CUB: i32 = 2_116_026;
const YUV_CUG: i32 = -409_993;
const YUV_CVG: i32 = -852_492;
const YUV_CVR: i32 = 1_673_527;

// RGB to luma weights in 14-bit fixed point, summing to 1 << 14.
const GRAY_SHIFT: u32 = 14;
const GRAY_R: u32 = 4899;
const GRAY_G: u32 = 9617;
const GRAY_B: u32 = 1868;

#[inline]
fn saturate(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Converts NV21 to RGBA.
///
/// `src` holds `height` luma rows followed by `height / 2` rows of
/// interleaved V/U pairs, all `width` bytes wide. `dst` receives
/// `width * height` RGBA pixels with full opacity.
///
/// Each 2x2 block of luma shares one chroma pair. With odd dimensions the
/// trailing row or column reuses the last complete chroma pair, and frames
/// too small to hold any chroma pair are treated as neutral chroma.
pub fn nv21_to_rgba(src: &[u8], width: usize, height: usize, dst: &mut [u8]) {
    let (luma, chroma) = src.split_at(width * height);
    let chroma_rows = height / 2;
    let chroma_cols = width / 2;
    let has_chroma = chroma_rows > 0 && chroma_cols > 0;

    for (row, (y_row, out_row)) in luma
        .chunks_exact(width)
        .zip(dst.chunks_exact_mut(width * 4))
        .enumerate()
    {
        let vu_row = if has_chroma {
            let start = (row / 2).min(chroma_rows - 1) * width;
            Some(&chroma[start..start + chroma_cols * 2])
        } else {
            None
        };

        for (col, (&y, px)) in y_row.iter().zip(out_row.chunks_exact_mut(4)).enumerate() {
            let (v, u) = match vu_row {
                Some(vu) => {
                    let pair = (col / 2).min(chroma_cols - 1) * 2;
                    (vu[pair] as i32 - 128, vu[pair + 1] as i32 - 128)
                }
                None => (0, 0),
            };

            let y = (y as i32 - 16).max(0) * YUV_CY;
            let ruv = YUV_HALF + YUV_CVR * v;
            let guv = YUV_HALF + YUV_CVG * v + YUV_CUG * u;
            let buv = YUV_HALF + YUV_CUB * u;

            px[0] = saturate((y + ruv) >> YUV_SHIFT);
            px[1] = saturate((y + guv) >> YUV_SHIFT);
            px[2] = saturate((y + buv) >> YUV_SHIFT);
            px[3] = 255;
        }
    }
}

/// Converts RGBA to single channel luma, ignoring alpha.
pub fn rgba_to_gray(src: &[u8], dst: &mut [u8]) {
    for (px, gray) in src.chunks_exact(4).zip(dst.iter_mut()) {
        let luma = px[0] as u32 * GRAY_R
            + px[1] as u32 * GRAY_G
            + px[2] as u32 * GRAY_B
            + (1 << (GRAY_SHIFT - 1));
        *gray = (luma >> GRAY_SHIFT) as u8;
    }
}

/// Expands single channel pixels to opaque RGBA by replicating the channel.
pub fn gray_to_rgba(src: &[u8], dst: &mut [u8]) {
    for (&gray, px) in src.iter().zip(dst.chunks_exact_mut(4)) {
        px[0] = gray;
        px[1] = gray;
        px[2] = gray;
        px[3] = 255;
    }
}

/// One plane of a strided YUV 4:2:0 image, as handed out by camera APIs
/// that expose planes independently.
#[derive(Copy, Clone, Debug)]
pub struct Plane<'a> {
    pub data: &'a [u8],
    /// Bytes between the starts of consecutive rows
    pub row_stride: usize,
    /// Bytes between consecutive samples within a row
    pub pixel_stride: usize,
}

impl Plane<'_> {
    fn check(&self, name: &'static str, rows: usize, cols: usize) -> Result<(), FrameError> {
        if rows == 0 || cols == 0 {
            return Ok(());
        }

        let required = (rows - 1) * self.row_stride + (cols - 1) * self.pixel_stride + 1;
        if self.data.len() < required {
            return Err(FrameError::PlaneTooShort {
                plane: name,
                required,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    #[inline]
    fn sample(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.row_stride + col * self.pixel_stride]
    }
}

/// Three-plane YUV 4:2:0 image with independent strides per plane.
#[derive(Copy, Clone, Debug)]
pub struct Yuv420Planes<'a> {
    pub width: usize,
    pub height: usize,
    pub y: Plane<'a>,
    pub u: Plane<'a>,
    pub v: Plane<'a>,
}

/// Packs strided YUV 4:2:0 planes into a contiguous NV21 frame.
///
/// `out` is resized to `width * height * 3 / 2` bytes, reusing its existing
/// capacity. Chroma rows are laid out `width` bytes apart, matching what
/// [`nv21_to_rgba`] reads; with an odd width the unused trailing byte of
/// each chroma row is set to neutral chroma.
///
/// # Errors
///
/// Returns [`FrameError::PlaneTooShort`] if any plane is too small for its
/// declared strides, and [`FrameError::TooLarge`] if the frame size
/// overflows.
pub fn pack_nv21(planes: &Yuv420Planes<'_>, out: &mut Vec<u8>) -> Result<(), FrameError> {
    let (width, height) = (planes.width, planes.height);
    let size = nv21_size(width, height).ok_or(FrameError::TooLarge {
        width: width.try_into().unwrap_or(i32::MAX),
        height: height.try_into().unwrap_or(i32::MAX),
    })?;
    let (chroma_rows, chroma_cols) = (height / 2, width / 2);

    planes.y.check("Y", height, width)?;
    planes.u.check("U", chroma_rows, chroma_cols)?;
    planes.v.check("V", chroma_rows, chroma_cols)?;

    out.clear();
    out.resize(size, 128);

    let (luma, chroma) = out.split_at_mut(width * height);
    for (row, dst) in luma.chunks_exact_mut(width).enumerate() {
        if planes.y.pixel_stride == 1 {
            let start = row * planes.y.row_stride;
            dst.copy_from_slice(&planes.y.data[start..start + width]);
        } else {
            for (col, px) in dst.iter_mut().enumerate() {
                *px = planes.y.sample(row, col);
            }
        }
    }

    for row in 0..chroma_rows {
        let dst = &mut chroma[row * width..row * width + chroma_cols * 2];
        for (col, pair) in dst.chunks_exact_mut(2).enumerate() {
            pair[0] = planes.v.sample(row, col);
            pair[1] = planes.u.sample(row, col);
        }
    }

    Ok(())
}

/// Builds a synthetic NV21 frame for demos and benchmarks.
///
/// The luma plane is a diagonal gradient with a bright centred rectangle so
/// the edge filter has something to find; chroma is a gentle horizontal
/// tint.
pub fn test_pattern(width: usize, height: usize) -> Vec<u8> {
    let size = nv21_size(width, height).unwrap_or(0);
    let mut frame = vec![128; size];
    if size == 0 {
        return frame;
    }

    let (luma, chroma) = frame.split_at_mut(width * height);
    let span = (width + height).max(1);
    for (row, line) in luma.chunks_exact_mut(width).enumerate() {
        for (col, px) in line.iter_mut().enumerate() {
            let inside = row >= height / 4
                && row < height * 3 / 4
                && col >= width / 4
                && col < width * 3 / 4;
            *px = if inside {
                235
            } else {
                (16 + (row + col) * 128 / span) as u8
            };
        }
    }

    let chroma_cols = width / 2;
    for line in chroma.chunks_exact_mut(width).take(height / 2) {
        for (col, pair) in line.chunks_exact_mut(2).take(chroma_cols).enumerate() {
            let tint = (col * 64 / chroma_cols.max(1)) as u8;
            pair[0] = 96 + tint;
            pair[1] = 160 - tint;
        }
    }

    frame
}

/// Encodes an RGBA image to JPEG format using turbojpeg.
///
/// # Arguments
///
/// * `pix` - Raw RGBA pixel data, `width * height * 4` bytes
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `quality` - JPEG quality, 1 to 100
///
/// # Errors
///
/// Returns an error if:
/// - `pix` does not hold `width * height` RGBA pixels
/// - JPEG compression fails
pub fn encode_jpeg(
    pix: &[u8],
    width: usize,
    height: usize,
    quality: i32,
) -> Result<OwnedBuf, Box<dyn Error>> {
    if rgba_size(width, height) != Some(pix.len()) || pix.is_empty() {
        return Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!(
                "{} bytes is not a {}x{} RGBA image",
                pix.len(),
                width,
                height
            ),
        )));
    }

    let img = turbojpeg::Image {
        width,
        height,
        format: turbojpeg::PixelFormat::RGBA,
        pixels: pix,
        pitch: width * 4,
    };

    let res = turbojpeg::compress(img, quality, turbojpeg::Subsamp::Sub2x2);
    match res {
        Ok(buf) => Ok(buf),
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_realloc() {
        let rgba = Shape::new(2, 4, PixelFormat::Rgba);

        assert!(rgba.requires_realloc(None));
        assert!(!rgba.requires_realloc(Some(rgba)));
        assert!(rgba.requires_realloc(Some(Shape::new(4, 2, PixelFormat::Rgba))));
        assert!(rgba.requires_realloc(Some(Shape::new(2, 4, PixelFormat::Grey))));
        assert!(rgba.requires_realloc(Some(Shape::new(3, 4, PixelFormat::Rgba))));
    }

    #[test]
    fn test_ensure_capacity_reuses_allocation() {
        let mut buf = ScratchBuffer::new();
        assert!(buf.shape().is_none());

        assert!(buf.ensure_capacity(3, 5, PixelFormat::Rgba));
        assert_eq!(buf.as_slice().len(), 60);
        let ptr = buf.as_slice().as_ptr();

        buf.as_slice_mut()[0] = 42;
        assert!(!buf.ensure_capacity(3, 5, PixelFormat::Rgba));
        assert_eq!(buf.as_slice().as_ptr(), ptr);
        assert_eq!(buf.as_slice()[0], 42);

        assert!(buf.ensure_capacity(3, 5, PixelFormat::Grey));
        assert_eq!(buf.as_slice().len(), 15);
        assert_eq!(buf.shape(), Some(Shape::new(3, 5, PixelFormat::Grey)));
    }

    #[test]
    fn test_frame_validation() {
        let data = vec![0u8; 12];

        assert!(Nv21Frame::new(&data, 4, 2).is_ok());
        assert_eq!(
            Nv21Frame::new(&data, 0, 2).unwrap_err(),
            FrameError::InvalidDimensions {
                width: 0,
                height: 2
            }
        );
        assert_eq!(
            Nv21Frame::new(&data, 4, 4).unwrap_err(),
            FrameError::BufferTooShort {
                expected: 24,
                actual: 12
            }
        );
        assert_eq!(
            Nv21Frame::from_option(None, 4, 2).unwrap_err(),
            FrameError::MissingBuffer
        );
    }

    #[test]
    fn test_nv21_neutral_chroma_is_gray() {
        let (width, height) = (4, 2);
        let mut src = vec![128u8; 12];
        src[..8].copy_from_slice(&[16, 50, 100, 126, 150, 200, 235, 255]);

        let mut dst = vec![0u8; width * height * 4];
        nv21_to_rgba(&src, width, height, &mut dst);

        for px in dst.chunks_exact(4) {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
            assert_eq!(px[3], 255);
        }
        // video range black and white
        assert_eq!(&dst[..4], &[0, 0, 0, 255]);
        assert_eq!(&dst[24..28], &[255, 255, 255, 255]);
    }

    #[test]
    fn test_nv21_chroma_order() {
        // V is stored before U, a high V sample pushes red up and blue down
        let mut src = vec![128u8; 6];
        src[4] = 240;
        src[5] = 16;

        let mut dst = vec![0u8; 16];
        nv21_to_rgba(&src, 2, 2, &mut dst);

        assert!(dst[0] > 200);
        assert!(dst[2] < 50);
    }

    #[test]
    fn test_gray_conversions() {
        let rgba = [255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 255, 0];
        let mut gray = [0u8; 4];
        rgba_to_gray(&rgba, &mut gray);
        assert_eq!(gray, [76, 150, 29, 255]);

        let mut back = [0u8; 16];
        gray_to_rgba(&gray, &mut back);
        assert_eq!(&back[4..8], &[150, 150, 150, 255]);
        assert_eq!(&back[12..16], &[255, 255, 255, 255]);
    }

    #[test]
    fn test_test_pattern_size() {
        assert_eq!(test_pattern(640, 480).len(), 460800);
        assert_eq!(test_pattern(3, 3).len(), 13);
    }
}
