// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgeproc::processor::Mode;
use std::path::PathBuf;

/// Frame processing output mode.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum ModeSetting {
    /// Colour converted camera image
    Raw,
    /// Edge map rendered as a grayscale image
    EdgeDetect,
}

impl From<ModeSetting> for Mode {
    fn from(setting: ModeSetting) -> Self {
        match setting {
            ModeSetting::Raw => Mode::Raw,
            ModeSetting::EdgeDetect => Mode::EdgeDetect,
        }
    }
}

/// Command-line arguments for the EdgeFirst frame processor.
///
/// Runs NV21 frames through the processor and saves the result. Arguments
/// can be specified via command line or environment variables.
///
/// # Example
///
/// ```bash
/// # Render edges for a captured 1280x720 frame
/// edgeproc --input frame.nv21 --size 1280 720 --mode edge-detect --output edges.jpg
///
/// # Benchmark 300 synthetic frames
/// export EDGEPROC_FRAMES=300
/// edgeproc --verbose
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// NV21 input frame, a synthetic test pattern is used when omitted
    #[arg(short, long, env = "EDGEPROC_INPUT")]
    pub input: Option<PathBuf>,

    /// Frame resolution in pixels (width height)
    #[arg(
        short,
        long,
        env = "EDGEPROC_SIZE",
        default_value = "640 480",
        value_delimiter = ' ',
        num_args = 2
    )]
    pub size: Vec<i32>,

    /// Processing mode
    #[arg(short, long, env = "EDGEPROC_MODE", default_value = "edge-detect", value_enum)]
    pub mode: ModeSetting,

    /// Number of times the frame is processed
    #[arg(short, long, env = "EDGEPROC_FRAMES", default_value = "1")]
    pub frames: u32,

    /// Output path, .jpg or .jpeg is JPEG encoded, anything else is raw RGBA
    #[arg(short, long, env = "EDGEPROC_OUTPUT")]
    pub output: Option<PathBuf>,

    /// JPEG quality (1-100)
    #[arg(long, env = "EDGEPROC_QUALITY", default_value = "90", value_parser = clap::value_parser!(i32).range(1..=100))]
    pub quality: i32,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY")]
    pub tracy: bool,
}

impl Args {
    pub fn width(&self) -> i32 {
        self.size[0]
    }

    pub fn height(&self) -> i32 {
        self.size[1]
    }
}
