// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::FrameError,
    filter::{EdgeDetector, GaussianBlur},
    image::{gray_to_rgba, nv21_to_rgba, rgba_to_gray, Nv21Frame, PixelFormat, ScratchBuffer},
};
use core::fmt;
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

/// Gaussian kernel size applied before edge detection
pub const BLUR_KERNEL_SIZE: usize = 5;

/// Gaussian standard deviation applied before edge detection
pub const BLUR_SIGMA: f64 = 1.4;

/// Hysteresis low threshold, weak edges must exceed this gradient
pub const EDGE_LOW_THRESHOLD: f64 = 40.0;

/// Hysteresis high threshold, strong edges must exceed this gradient
pub const EDGE_HIGH_THRESHOLD: f64 = 120.0;

/// Output produced by [`FrameProcessor::process`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Mode {
    /// Colour conversion only
    #[default]
    Raw = 0,
    /// Colour conversion followed by blur, edge detection and recolouring
    EdgeDetect = 1,
}

impl From<i32> for Mode {
    /// Maps the integer mode identifiers used across the host boundary.
    /// Unknown identifiers fall back to [`Mode::Raw`].
    fn from(value: i32) -> Self {
        match value {
            1 => Mode::EdgeDetect,
            _ => Mode::Raw,
        }
    }
}

impl From<Mode> for i32 {
    fn from(mode: Mode) -> Self {
        mode as i32
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Mode::Raw => write!(f, "raw"),
            Mode::EdgeDetect => write!(f, "edge-detect"),
        }
    }
}

/// Counters describing the processor's allocation behaviour.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Frames that ran through the pipeline
    pub frames: u64,
    /// Working buffer reallocations across all frames
    pub reallocations: u64,
}

struct Pipeline {
    yuv: ScratchBuffer,
    rgba: ScratchBuffer,
    gray: ScratchBuffer,
    blurred: ScratchBuffer,
    edges: ScratchBuffer,
    blur: GaussianBlur,
    detector: EdgeDetector,
    stats: ProcessorStats,
}

impl Pipeline {
    fn new() -> Self {
        Self {
            yuv: ScratchBuffer::new(),
            rgba: ScratchBuffer::new(),
            gray: ScratchBuffer::new(),
            blurred: ScratchBuffer::new(),
            edges: ScratchBuffer::new(),
            blur: GaussianBlur::new(BLUR_KERNEL_SIZE, BLUR_SIGMA),
            detector: EdgeDetector::new(EDGE_LOW_THRESHOLD, EDGE_HIGH_THRESHOLD),
            stats: ProcessorStats::default(),
        }
    }

    fn run(&mut self, frame: &Nv21Frame<'_>, mode: Mode) -> Vec<u8> {
        let (width, height) = (frame.width(), frame.height());
        let mut reallocations = 0;

        reallocations += self.yuv.ensure_capacity(height + height / 2, width, PixelFormat::Nv21) as u64;
        let yuv = self.yuv.as_slice_mut();
        let len = yuv.len();
        yuv.copy_from_slice(&frame.as_slice()[..len]);

        reallocations += self.rgba.ensure_capacity(height, width, PixelFormat::Rgba) as u64;
        nv21_to_rgba(self.yuv.as_slice(), width, height, self.rgba.as_slice_mut());

        if mode == Mode::EdgeDetect {
            reallocations += self.gray.ensure_capacity(height, width, PixelFormat::Grey) as u64;
            reallocations += self.blurred.ensure_capacity(height, width, PixelFormat::Grey) as u64;
            reallocations += self.edges.ensure_capacity(height, width, PixelFormat::Grey) as u64;

            rgba_to_gray(self.rgba.as_slice(), self.gray.as_slice_mut());
            self.blur.apply(
                self.gray.as_slice(),
                self.blurred.as_slice_mut(),
                width,
                height,
            );
            self.detector.apply(
                self.blurred.as_slice(),
                self.edges.as_slice_mut(),
                width,
                height,
            );
            gray_to_rgba(self.edges.as_slice(), self.rgba.as_slice_mut());
        }

        self.stats.frames += 1;
        self.stats.reallocations += reallocations;
        if reallocations > 0 {
            debug!(reallocations, "working buffers resized for {}", frame);
        }

        self.rgba.as_slice().to_vec()
    }
}

/// Converts NV21 camera frames to RGBA, optionally rendering edges.
///
/// The processor owns its working buffers and reuses them from frame to
/// frame, only reallocating a buffer when the frame dimensions change. Each
/// call returns a freshly allocated output owned by the caller.
///
/// # Thread Safety
///
/// `FrameProcessor` is `Sync`. Calls from multiple threads are serialised by
/// an internal lock: at most one frame is processed at a time per instance
/// and other callers block until it completes. Waiters are not served in any
/// guaranteed order.
///
/// # Example
///
/// ```
/// use edgeproc::processor::{FrameProcessor, Mode};
///
/// let processor = FrameProcessor::new();
/// let mut nv21 = vec![235u8; 8];
/// nv21.extend_from_slice(&[128; 4]);
///
/// let rgba = processor.process(Some(&nv21), 4, 2, Mode::Raw);
/// assert_eq!(rgba.len(), 4 * 2 * 4);
///
/// // invalid frames produce an empty result
/// assert!(processor.process(None, 4, 2, Mode::Raw).is_empty());
/// ```
pub struct FrameProcessor {
    pipeline: Mutex<Pipeline>,
}

impl FrameProcessor {
    pub fn new() -> Self {
        Self {
            pipeline: Mutex::new(Pipeline::new()),
        }
    }

    /// Processes one NV21 frame.
    ///
    /// `mode` accepts either a [`Mode`] or the integer identifier used by
    /// host bindings, with unknown identifiers treated as [`Mode::Raw`].
    ///
    /// Returns `width * height * 4` bytes of row-major RGBA, or an empty
    /// vector when `raw` is absent, either dimension is not positive, or
    /// `raw` holds fewer than `width * height * 3 / 2` bytes.
    pub fn process(
        &self,
        raw: Option<&[u8]>,
        width: i32,
        height: i32,
        mode: impl Into<Mode>,
    ) -> Vec<u8> {
        match Nv21Frame::from_option(raw, width, height) {
            Ok(frame) => self.process_frame(&frame, mode.into()),
            Err(err) => {
                match err {
                    FrameError::MissingBuffer | FrameError::InvalidDimensions { .. } => {
                        debug!("frame skipped: {}", err)
                    }
                    _ => warn!("frame skipped: {}", err),
                }
                Vec::new()
            }
        }
    }

    /// Processes an already validated frame, see [`FrameProcessor::process`].
    #[instrument(skip_all, fields(width = frame.width(), height = frame.height(), %mode))]
    pub fn process_frame(&self, frame: &Nv21Frame<'_>, mode: Mode) -> Vec<u8> {
        let mut pipeline = self.pipeline.lock();
        pipeline.run(frame, mode)
    }

    pub fn stats(&self) -> ProcessorStats {
        self.pipeline.lock().stats
    }
}

impl Default for FrameProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameProcessor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FrameProcessor")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: usize, height: usize, luma: u8) -> Vec<u8> {
        let mut frame = vec![luma; width * height];
        frame.resize(width * height * 3 / 2, 128);
        frame
    }

    #[test]
    fn test_mode_from_i32() {
        assert_eq!(Mode::from(0), Mode::Raw);
        assert_eq!(Mode::from(1), Mode::EdgeDetect);
        assert_eq!(Mode::from(2), Mode::Raw);
        assert_eq!(Mode::from(-1), Mode::Raw);
        assert_eq!(Mode::from(99), Mode::Raw);
        assert_eq!(i32::from(Mode::EdgeDetect), 1);
    }

    #[test]
    fn test_same_shape_does_not_reallocate() {
        let processor = FrameProcessor::new();
        let frame = solid_frame(8, 6, 100);

        processor.process(Some(&frame), 8, 6, Mode::EdgeDetect);
        let first = processor.stats();
        assert_eq!(first.frames, 1);
        assert_eq!(first.reallocations, 5);

        for _ in 0..4 {
            processor.process(Some(&frame), 8, 6, Mode::EdgeDetect);
            processor.process(Some(&frame), 8, 6, Mode::Raw);
        }
        let after = processor.stats();
        assert_eq!(after.frames, 9);
        assert_eq!(after.reallocations, 5);
    }

    #[test]
    fn test_shape_change_reallocates() {
        let processor = FrameProcessor::new();

        processor.process(Some(&solid_frame(8, 6, 100)), 8, 6, Mode::Raw);
        assert_eq!(processor.stats().reallocations, 2);

        processor.process(Some(&solid_frame(6, 8, 100)), 6, 8, Mode::Raw);
        assert_eq!(processor.stats().reallocations, 4);
    }

    #[test]
    fn test_rejected_frames_are_not_counted() {
        let processor = FrameProcessor::new();
        let frame = solid_frame(4, 2, 100);

        assert!(processor.process(Some(&frame), 4, 4, Mode::Raw).is_empty());
        assert!(processor.process(Some(&frame), -4, 2, Mode::Raw).is_empty());
        assert!(processor.process(None, 4, 2, Mode::EdgeDetect).is_empty());
        assert_eq!(processor.stats(), ProcessorStats::default());
    }
}
