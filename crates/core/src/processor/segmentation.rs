//! Foreground segmentation seeded by a central rectangle.
//!
//! An iterative graph-cut style loop: pixels outside the seed rectangle are
//! fixed background, pixels inside start as probable foreground. Each round
//! fits small colour models to both sets, relabels the probable pixels by
//! nearest model, then smooths the labels with a 3x3 majority vote.

use image::{GrayImage, Luma, RgbImage};

use super::error::ProcessorError;
use super::ops::Rect;

const CLUSTERS: usize = 3;
const KMEANS_ROUNDS: usize = 5;
const MAX_SAMPLES: usize = 4096;

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Segment `image` and return a mask (`FOREGROUND` / `BACKGROUND` per pixel).
pub fn segment_foreground(
    image: &RgbImage,
    margin: f32,
    iterations: u32,
) -> Result<GrayImage, ProcessorError> {
    let (w, h) = image.dimensions();
    let seed = Rect::centered(w, h, margin);
    if seed.is_empty() || seed.area() == (w as u64 * h as u64) {
        return Err(ProcessorError::image(format!(
            "seed rectangle leaves no background in {}x{} image",
            w, h
        )));
    }

    let mut mask = GrayImage::from_fn(w, h, |x, y| {
        Luma([if seed.contains(x, y) { FOREGROUND } else { BACKGROUND }])
    });

    for _ in 0..iterations.max(1) {
        let fg = fit_model(image, &mask, FOREGROUND);
        let bg = fit_model(image, &mask, BACKGROUND);
        if fg.is_empty() || bg.is_empty() {
            break;
        }

        let mut relabeled = mask.clone();
        for y in seed.y..seed.bottom() {
            for x in seed.x..seed.right() {
                let px = color(image, x, y);
                // Ties go to background.
                let label = if nearest(&fg, px) < nearest(&bg, px) {
                    FOREGROUND
                } else {
                    BACKGROUND
                };
                relabeled.put_pixel(x, y, Luma([label]));
            }
        }
        let smoothed = smooth(&relabeled, seed);

        let changed = smoothed.as_raw() != mask.as_raw();
        mask = smoothed;
        if !changed {
            break;
        }
    }

    Ok(mask)
}

fn color(image: &RgbImage, x: u32, y: u32) -> [f32; 3] {
    image.get_pixel(x, y).0.map(f32::from)
}

fn distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    (0..3).map(|i| (a[i] - b[i]).powi(2)).sum()
}

fn nearest(centers: &[[f32; 3]], px: [f32; 3]) -> f32 {
    centers
        .iter()
        .map(|c| distance(*c, px))
        .fold(f32::INFINITY, f32::min)
}

/// K-means over a strided sample of the pixels carrying `label`.
fn fit_model(image: &RgbImage, mask: &GrayImage, label: u8) -> Vec<[f32; 3]> {
    let total = mask.pixels().filter(|p| p.0[0] == label).count();
    if total == 0 {
        return Vec::new();
    }
    let stride = total.div_ceil(MAX_SAMPLES).max(1);

    let samples: Vec<[f32; 3]> = mask
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] == label)
        .step_by(stride)
        .map(|(x, y, _)| color(image, x, y))
        .collect();

    let k = CLUSTERS.min(samples.len());
    let mut centers: Vec<[f32; 3]> = (0..k).map(|i| samples[i * samples.len() / k]).collect();

    for _ in 0..KMEANS_ROUNDS {
        let mut sums = vec![[0.0f32; 3]; k];
        let mut counts = vec![0usize; k];
        for s in &samples {
            let (best, _) = centers
                .iter()
                .enumerate()
                .map(|(i, c)| (i, distance(*c, *s)))
                .fold((0, f32::INFINITY), |acc, cur| if cur.1 < acc.1 { cur } else { acc });
            counts[best] += 1;
            for ch in 0..3 {
                sums[best][ch] += s[ch];
            }
        }
        for i in 0..k {
            if counts[i] > 0 {
                centers[i] = sums[i].map(|v| v / counts[i] as f32);
            }
        }
    }

    centers
}

/// 3x3 majority vote inside `region`; pixels outside keep their label.
fn smooth(mask: &GrayImage, region: Rect) -> GrayImage {
    let (w, h) = mask.dimensions();
    let mut out = mask.clone();
    for y in region.y..region.bottom() {
        for x in region.x..region.right() {
            let mut fg = 0;
            let mut n = 0;
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    n += 1;
                    if mask.get_pixel(nx, ny).0[0] == FOREGROUND {
                        fg += 1;
                    }
                }
            }
            let label = if fg * 2 > n { FOREGROUND } else { BACKGROUND };
            out.put_pixel(x, y, Luma([label]));
        }
    }
    out
}
