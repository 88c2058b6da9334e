// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # EdgeFirst Frame Processor Library
//!
//! This library converts NV21 camera frames into displayable RGBA images,
//! optionally rendering an edge map instead of the colour image. It is built
//! to run once per captured frame inside a real-time capture pipeline, so the
//! processor keeps its working buffers alive between frames and only
//! reallocates them when the frame dimensions change.
//!
//! ## Features
//!
//! - **Colour Conversion**: Fixed point BT.601 NV21 to RGBA conversion.
//! - **Edge Rendering**: Grayscale, 5x5 Gaussian blur and dual threshold
//!   hysteresis edge detection, rendered back to RGBA.
//! - **Buffer Reuse**: Working buffers are resized only on shape changes.
//! - **Thread Safety**: Concurrent callers are serialised per processor.
//! - **Host Sessions**: An explicit [`bridge::Session`] handle exposes the
//!   integer based calls a platform binding makes.
//!
//! ## Example
//!
//! ```
//! use edgeproc::processor::{FrameProcessor, Mode};
//!
//! let processor = FrameProcessor::new();
//! let nv21 = vec![128u8; 320 * 240 * 3 / 2];
//!
//! let rgba = processor.process(Some(&nv21), 320, 240, Mode::EdgeDetect);
//! assert_eq!(rgba.len(), 320 * 240 * 4);
//! ```
//!
//! ## Determinism
//!
//! All conversions and filters use integer arithmetic, identical input
//! frames, dimensions and modes always produce byte identical output.

pub mod bridge;
pub mod error;
pub mod filter;
pub mod image;
pub mod processor;
