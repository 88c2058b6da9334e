// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::processor::FrameProcessor;
use std::sync::OnceLock;
use tracing::info;

/// Host-facing handle around a lazily constructed [`FrameProcessor`].
///
/// A host binding creates one `Session` when it starts, keeps it for as long
/// as frames are flowing, and drops it on shutdown, which releases the
/// processor and all of its working buffers at once. The methods mirror the
/// calls a platform bridge makes: an idempotent initialisation and a frame
/// call that takes integer dimensions and an integer mode identifier.
///
/// # Example
///
/// ```
/// use edgeproc::bridge::Session;
///
/// let session = Session::new();
/// session.init();
///
/// let nv21 = vec![128u8; 640 * 480 * 3 / 2];
/// let rgba = session.process_frame(Some(&nv21), 640, 480, 1);
/// assert_eq!(rgba.len(), 640 * 480 * 4);
/// ```
#[derive(Debug, Default)]
pub struct Session {
    processor: OnceLock<FrameProcessor>,
}

impl Session {
    pub const fn new() -> Self {
        Self {
            processor: OnceLock::new(),
        }
    }

    /// Ensures the processor exists. Calling it again has no further effect.
    ///
    /// Concurrent first calls are safe, exactly one processor is built.
    pub fn init(&self) -> &FrameProcessor {
        self.processor.get_or_init(|| {
            info!("frame processor initialized");
            FrameProcessor::new()
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.processor.get().is_some()
    }

    /// Processes one frame using the host boundary conventions.
    ///
    /// `mode` is `0` for raw colour conversion and `1` for edge detection,
    /// any other value is treated as `0`. Returns an empty vector for an
    /// absent or short buffer and for non-positive dimensions, otherwise
    /// `width * height * 4` bytes of RGBA. The processor is initialised on
    /// first use if [`Session::init`] was never called.
    pub fn process_frame(
        &self,
        nv21: Option<&[u8]>,
        width: i32,
        height: i32,
        mode: i32,
    ) -> Vec<u8> {
        if nv21.is_none() || width <= 0 || height <= 0 {
            return Vec::new();
        }

        self.init().process(nv21, width, height, mode)
    }
}
