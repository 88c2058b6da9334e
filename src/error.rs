// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use thiserror::Error;

/// Reasons a frame is rejected before any processing begins.
///
/// The frame processing entry points never surface these to the caller, an
/// invalid frame simply produces an empty result. They are exposed so hosts
/// that construct [`Nv21Frame`](crate::image::Nv21Frame) views directly can
/// find out why a frame was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("no frame buffer provided")]
    MissingBuffer,

    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("frame dimensions {width}x{height} overflow the addressable size")]
    TooLarge { width: i32, height: i32 },

    #[error("frame buffer holds {actual} bytes but {expected} are required")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("{plane} plane holds {actual} bytes but its strides require {required}")]
    PlaneTooShort {
        plane: &'static str,
        required: usize,
        actual: usize,
    },
}
