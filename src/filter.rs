// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Fixed point smoothing and edge filters for 8-bit single channel images.
//!
//! Both filters keep their intermediate storage between calls so that
//! processing a stream of equally sized frames does not allocate.

use tracing::trace;

/// Resizes `buf` to `len` elements without giving up its capacity.
fn reuse<T: Copy + Default>(buf: &mut Vec<T>, len: usize) {
    buf.clear();
    buf.resize(len, T::default());
}

/// Mirror index into `0..n` without repeating the edge sample
/// (`gfedcb|abcdefgh|gfedcba`).
fn reflect_101(index: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }

    let last = n as isize - 1;
    let mut i = index;
    loop {
        if i < 0 {
            i = -i;
        } else if i > last {
            i = 2 * last - i;
        } else {
            return i as usize;
        }
    }
}

/// One dimensional Gaussian kernel in 8-bit fixed point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GaussianKernel {
    weights: Vec<u32>,
}

impl GaussianKernel {
    pub const FRACTION_BITS: u32 = 8;

    /// Builds a normalised kernel of `size` taps.
    ///
    /// Even sizes are rounded up to the next odd size. A non-positive `sigma`
    /// is derived from the size the same way common vision libraries do,
    /// `0.3 * ((size - 1) / 2 - 1) + 0.8`. Quantisation error is folded into
    /// the centre tap so the weights always sum to `1 << FRACTION_BITS`.
    pub fn new(size: usize, sigma: f64) -> Self {
        let size = size.max(1) | 1;
        let sigma = if sigma > 0.0 {
            sigma
        } else {
            0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8
        };

        let radius = (size / 2) as isize;
        let raw: Vec<f64> = (-radius..=radius)
            .map(|x| (-((x * x) as f64) / (2.0 * sigma * sigma)).exp())
            .collect();
        let sum: f64 = raw.iter().sum();
        let one = (1u32 << Self::FRACTION_BITS) as f64;

        let mut weights: Vec<u32> = raw.iter().map(|w| (w / sum * one).round() as u32).collect();
        let total: u32 = weights.iter().sum();
        let centre = weights.len() / 2;
        weights[centre] = (weights[centre] + (1 << Self::FRACTION_BITS)).saturating_sub(total);

        Self { weights }
    }

    pub fn weights(&self) -> &[u32] {
        &self.weights
    }

    pub fn radius(&self) -> usize {
        self.weights.len() / 2
    }
}

/// Separable Gaussian blur with reflect-101 borders.
#[derive(Clone, Debug)]
pub struct GaussianBlur {
    kernel: GaussianKernel,
    horizontal: Vec<u32>,
    cols: Vec<usize>,
    rows: Vec<usize>,
}

impl GaussianBlur {
    pub fn new(size: usize, sigma: f64) -> Self {
        Self {
            kernel: GaussianKernel::new(size, sigma),
            horizontal: Vec::new(),
            cols: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn kernel(&self) -> &GaussianKernel {
        &self.kernel
    }

    /// Blurs the `width x height` image in `src` into `dst`.
    pub fn apply(&mut self, src: &[u8], dst: &mut [u8], width: usize, height: usize) {
        let radius = self.kernel.radius();
        let weights = self.kernel.weights();
        let taps = weights.len();

        // Border lookup tables, entry `i + k` is the source index for output
        // index `i` and tap `k`.
        self.cols.clear();
        self.cols.extend(
            (0..width + taps - 1).map(|i| reflect_101(i as isize - radius as isize, width)),
        );
        self.rows.clear();
        self.rows.extend(
            (0..height + taps - 1).map(|i| reflect_101(i as isize - radius as isize, height)),
        );

        reuse(&mut self.horizontal, width * height);
        for (line, out) in src
            .chunks_exact(width)
            .zip(self.horizontal.chunks_exact_mut(width))
        {
            for (x, acc) in out.iter_mut().enumerate() {
                *acc = weights
                    .iter()
                    .zip(&self.cols[x..x + taps])
                    .map(|(&w, &col)| w * line[col] as u32)
                    .sum();
            }
        }

        let round = 1u32 << (2 * GaussianKernel::FRACTION_BITS - 1);
        for (y, out) in dst.chunks_exact_mut(width).take(height).enumerate() {
            let rows = &self.rows[y..y + taps];
            for (x, px) in out.iter_mut().enumerate() {
                let acc: u32 = weights
                    .iter()
                    .zip(rows)
                    .map(|(&w, &row)| w * self.horizontal[row * width + x])
                    .sum();
                *px = ((acc + round) >> (2 * GaussianKernel::FRACTION_BITS)).min(255) as u8;
            }
        }
    }
}

// tan(22.5 degrees) in 15-bit fixed point
const TG22: i64 = 13573;
const TG_SHIFT: u32 = 15;

const NOT_EDGE: u8 = 0;
const WEAK: u8 = 1;
const EDGE: u8 = 2;

/// Dual threshold edge detector with hysteresis.
///
/// Gradients come from 3x3 Sobel operators with replicated borders and are
/// compared using the L1 magnitude `|dx| + |dy|`. After non-maximum
/// suppression along the gradient direction, pixels above `high` seed edges
/// that grow through 8-connected pixels above `low`. Output pixels are 255
/// on edges and 0 elsewhere.
#[derive(Clone, Debug)]
pub struct EdgeDetector {
    low: i32,
    high: i32,
    dx: Vec<i32>,
    dy: Vec<i32>,
    magnitude: Vec<i32>,
    labels: Vec<u8>,
    stack: Vec<usize>,
}

impl EdgeDetector {
    pub fn new(low: f64, high: f64) -> Self {
        let (low, high) = if low > high { (high, low) } else { (low, high) };
        Self {
            low: low.floor() as i32,
            high: high.floor() as i32,
            dx: Vec::new(),
            dy: Vec::new(),
            magnitude: Vec::new(),
            labels: Vec::new(),
            stack: Vec::new(),
        }
    }

    pub fn thresholds(&self) -> (i32, i32) {
        (self.low, self.high)
    }

    /// Detects edges in the `width x height` image in `src`, writing the
    /// binary edge map to `dst`.
    pub fn apply(&mut self, src: &[u8], dst: &mut [u8], width: usize, height: usize) {
        let len = width * height;
        reuse(&mut self.dx, len);
        reuse(&mut self.dy, len);
        reuse(&mut self.magnitude, len);
        reuse(&mut self.labels, len);
        self.stack.clear();

        self.gradients(src, width, height);
        self.suppress(width, height);
        let seeds = self.stack.len();
        self.hysteresis(width, height);
        trace!(seeds, "edge hysteresis complete");

        for (px, &label) in dst.iter_mut().zip(&self.labels) {
            *px = if label == EDGE { 255 } else { 0 };
        }
    }

    fn gradients(&mut self, src: &[u8], width: usize, height: usize) {
        let at = |x: usize, y: usize| src[y * width + x] as i32;

        for y in 0..height {
            let up = y.saturating_sub(1);
            let down = (y + 1).min(height - 1);
            for x in 0..width {
                let left = x.saturating_sub(1);
                let right = (x + 1).min(width - 1);

                let dx = (at(right, up) + 2 * at(right, y) + at(right, down))
                    - (at(left, up) + 2 * at(left, y) + at(left, down));
                let dy = (at(left, down) + 2 * at(x, down) + at(right, down))
                    - (at(left, up) + 2 * at(x, up) + at(right, up));

                let i = y * width + x;
                self.dx[i] = dx;
                self.dy[i] = dy;
                self.magnitude[i] = dx.abs() + dy.abs();
            }
        }
    }

    fn suppress(&mut self, width: usize, height: usize) {
        let (w, h) = (width as isize, height as isize);
        let magnitude = &self.magnitude;
        let mag = |x: isize, y: isize| {
            if x < 0 || y < 0 || x >= w || y >= h {
                0
            } else {
                magnitude[(y * w + x) as usize]
            }
        };

        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) as usize;
                let m = magnitude[i];
                if m <= self.low {
                    continue;
                }

                let (dx, dy) = (self.dx[i], self.dy[i]);
                let xs = dx.unsigned_abs() as i64;
                let ys = (dy.unsigned_abs() as i64) << TG_SHIFT;
                let tg22x = xs * TG22;

                let is_max = if ys < tg22x {
                    m > mag(x - 1, y) && m >= mag(x + 1, y)
                } else {
                    let tg67x = tg22x + (xs << (TG_SHIFT + 1));
                    if ys > tg67x {
                        m > mag(x, y - 1) && m >= mag(x, y + 1)
                    } else {
                        let s = if (dx ^ dy) < 0 { -1 } else { 1 };
                        m > mag(x - s, y - 1) && m > mag(x + s, y + 1)
                    }
                };

                if !is_max {
                    continue;
                }

                if m > self.high {
                    self.labels[i] = EDGE;
                    self.stack.push(i);
                } else {
                    self.labels[i] = WEAK;
                }
            }
        }
    }

    fn hysteresis(&mut self, width: usize, height: usize) {
        while let Some(i) = self.stack.pop() {
            let (x, y) = (i % width, i / width);
            for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    let n = ny * width + nx;
                    if self.labels[n] == WEAK {
                        self.labels[n] = EDGE;
                        self.stack.push(n);
                    }
                }
            }
        }

        for label in self.labels.iter_mut() {
            if *label == WEAK {
                *label = NOT_EDGE;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(0, 5), 0);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(-2, 2), 0);
        assert_eq!(reflect_101(3, 2), 1);
        assert_eq!(reflect_101(-2, 1), 0);
    }

    #[test]
    fn test_gaussian_kernel() {
        let kernel = GaussianKernel::new(5, 1.4);
        assert_eq!(kernel.weights(), &[28, 61, 78, 61, 28]);
        assert_eq!(kernel.radius(), 2);
        assert_eq!(kernel.weights().iter().sum::<u32>(), 256);

        let derived = GaussianKernel::new(4, 0.0);
        assert_eq!(derived.weights().len(), 5);
        assert_eq!(derived.weights().iter().sum::<u32>(), 256);
        assert_eq!(derived.weights()[0], derived.weights()[4]);
    }

    #[test]
    fn test_blur_preserves_flat_image() {
        let (width, height) = (7, 5);
        let src = vec![93u8; width * height];
        let mut dst = vec![0u8; width * height];

        let mut blur = GaussianBlur::new(5, 1.4);
        blur.apply(&src, &mut dst, width, height);
        assert!(dst.iter().all(|&px| px == 93));
    }

    #[test]
    fn test_blur_spreads_impulse() {
        let (width, height) = (9, 9);
        let mut src = vec![0u8; width * height];
        src[4 * width + 4] = 255;
        let mut dst = vec![0u8; width * height];

        let mut blur = GaussianBlur::new(5, 1.4);
        blur.apply(&src, &mut dst, width, height);

        let centre = dst[4 * width + 4];
        assert!(centre > 0 && centre < 255);
        assert_eq!(dst[4 * width + 3], dst[4 * width + 5]);
        assert_eq!(dst[3 * width + 4], dst[5 * width + 4]);
        assert!(dst[4 * width + 3] < centre);
        assert_eq!(dst[0], 0);
    }

    #[test]
    fn test_blur_tiny_images() {
        let mut blur = GaussianBlur::new(5, 1.4);

        let mut dst = [0u8; 1];
        blur.apply(&[200], &mut dst, 1, 1);
        assert_eq!(dst, [200]);

        let mut dst = [0u8; 3];
        blur.apply(&[10, 10, 10], &mut dst, 3, 1);
        assert_eq!(dst, [10, 10, 10]);
    }

    #[test]
    fn test_edges_vertical_step() {
        let (width, height) = (16, 8);
        let src: Vec<u8> = (0..width * height)
            .map(|i| if i % width < 8 { 0 } else { 200 })
            .collect();
        let mut dst = vec![0u8; width * height];

        let mut edges = EdgeDetector::new(40.0, 120.0);
        edges.apply(&src, &mut dst, width, height);

        for (i, &px) in dst.iter().enumerate() {
            let expected = if i % width == 7 { 255 } else { 0 };
            assert_eq!(px, expected, "pixel {} {}", i % width, i / width);
        }
    }

    #[test]
    fn test_edges_flat_image() {
        let (width, height) = (10, 10);
        let src = vec![180u8; width * height];
        let mut dst = vec![7u8; width * height];

        let mut edges = EdgeDetector::new(40.0, 120.0);
        edges.apply(&src, &mut dst, width, height);
        assert!(dst.iter().all(|&px| px == 0));
    }

    #[test]
    fn test_edges_weak_gradient_needs_strong_seed() {
        // A step of 10 gives a magnitude of 40 which never exceeds the low
        // threshold, a step of 25 gives 100 which is only weak.
        let (width, height) = (12, 6);
        let mut edges = EdgeDetector::new(40.0, 120.0);
        let mut dst = vec![0u8; width * height];

        for step in [10u8, 25] {
            let src: Vec<u8> = (0..width * height)
                .map(|i| if i % width < 6 { 100 } else { 100 + step })
                .collect();
            edges.apply(&src, &mut dst, width, height);
            assert!(dst.iter().all(|&px| px == 0), "step {}", step);
        }
    }

    #[test]
    fn test_edges_hysteresis_connects_weak_pixels() {
        // A step edge at column 5; the top half is strong and the bottom half
        // is only weak, so the bottom rows survive through hysteresis alone.
        let (width, height) = (12, 8);
        let src: Vec<u8> = (0..width * height)
            .map(|i| {
                let (x, y) = (i % width, i / width);
                match (x < 6, y < 4) {
                    (true, _) => 50,
                    (false, true) => 150,
                    (false, false) => 80,
                }
            })
            .collect();
        let mut dst = vec![0u8; width * height];

        let mut edges = EdgeDetector::new(40.0, 120.0);
        edges.apply(&src, &mut dst, width, height);

        let column: Vec<u8> = (0..height).map(|y| dst[y * width + 5]).collect();
        assert_eq!(&column[..3], &[255, 255, 255]);
        assert_eq!(&column[5..], &[255, 255, 255]);

        // the same weak step on its own produces nothing
        let src: Vec<u8> = (0..width * height)
            .map(|i| if i % width < 6 { 50 } else { 80 })
            .collect();
        edges.apply(&src, &mut dst, width, height);
        assert!(dst.iter().all(|&px| px == 0));
    }
}
