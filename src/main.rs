// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use args::Args;
use clap::Parser;
use edgeproc::{
    bridge::Session,
    image::{encode_jpeg, test_pattern},
    processor::Mode,
};
use std::{
    error::Error,
    fs,
    io,
    path::Path,
    time::{Duration, Instant},
};
use tracing::{debug, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod args;

fn init_logging(args: &Args) {
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let stdout = tracing_subscriber::fmt::layer().with_filter(filter);
    let tracy = args.tracy.then(|| tracing_tracy::TracyLayer::default());

    tracing_subscriber::registry()
        .with(stdout)
        .with(tracy)
        .init();
}

fn load_frame(args: &Args) -> Result<Vec<u8>, Box<dyn Error>> {
    let (width, height) = (args.width(), args.height());
    if width <= 0 || height <= 0 {
        return Err(Box::new(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid frame size {}x{}", width, height),
        )));
    }

    match &args.input {
        Some(path) => {
            let frame = fs::read(path)?;
            info!("loaded {} ({} bytes)", path.display(), frame.len());
            Ok(frame)
        }
        None => {
            info!("using {}x{} test pattern", width, height);
            Ok(test_pattern(width as usize, height as usize))
        }
    }
}

fn save_frame(path: &Path, rgba: &[u8], args: &Args) -> Result<(), Box<dyn Error>> {
    let jpeg = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"));

    if jpeg {
        let now = Instant::now();
        let encoded = encode_jpeg(
            rgba,
            args.width() as usize,
            args.height() as usize,
            args.quality,
        )?;
        debug!("jpeg encode: {:?}", now.elapsed());
        fs::write(path, &encoded[..])?;
        info!("saved {} ({}KB)", path.display(), encoded.len() / 1024);
    } else {
        fs::write(path, rgba)?;
        info!("saved {} ({}KB raw RGBA)", path.display(), rgba.len() / 1024);
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(&args);

    let frame = load_frame(&args)?;
    let mode = Mode::from(args.mode);

    let session = Session::new();
    session.init();

    let mut rgba = Vec::new();
    let mut total = Duration::ZERO;
    for index in 0..args.frames {
        let now = Instant::now();
        rgba = session.process_frame(Some(&frame), args.width(), args.height(), mode.into());
        let elapsed = now.elapsed();
        total += elapsed;

        if let Some(client) = tracy_client::Client::running() {
            client.frame_mark();
        }

        if rgba.is_empty() {
            return Err(Box::new(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "frame of {} bytes rejected for {}x{}",
                    frame.len(),
                    args.width(),
                    args.height()
                ),
            )));
        }
        debug!("frame {} {}: {:?}", index, mode, elapsed);
    }

    if args.frames > 0 {
        let stats = session.init().stats();
        info!(
            "processed {} frames {}x{} {} avg: {:?} reallocations: {}",
            stats.frames,
            args.width(),
            args.height(),
            mode,
            total / args.frames,
            stats.reallocations,
        );
    }

    match &args.output {
        Some(path) if !rgba.is_empty() => save_frame(path, &rgba, &args)?,
        Some(path) => warn!("no frames processed, {} not written", path.display()),
        None => {}
    }

    Ok(())
}
