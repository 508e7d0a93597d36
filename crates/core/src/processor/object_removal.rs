//! Object removal: fill a region by diffusing its border inward.

use async_trait::async_trait;
use image::{DynamicImage, Rgb};

use super::error::ProcessorError;
use super::ops::Rect;
use super::params;
use super::traits::Processor;
use crate::job::{Parameters, TransformationType};

const MAX_PASSES: u32 = 200;

#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectRemovalProcessor;

/// Mean colour of the one-pixel ring just outside `region`.
fn ring_mean(image: &image::RgbImage, region: Rect) -> [f32; 3] {
    let (w, h) = image.dimensions();
    let x0 = region.x.saturating_sub(1);
    let y0 = region.y.saturating_sub(1);
    let x1 = region.right().min(w - 1);
    let y1 = region.bottom().min(h - 1);

    let mut sum = [0.0f32; 3];
    let mut n = 0.0f32;
    for y in y0..=y1 {
        for x in x0..=x1 {
            if region.contains(x, y) {
                continue;
            }
            let px = image.get_pixel(x, y).0;
            for c in 0..3 {
                sum[c] += px[c] as f32;
            }
            n += 1.0;
        }
    }

    if n == 0.0 {
        [0.0; 3]
    } else {
        sum.map(|s| s / n)
    }
}

#[async_trait]
impl Processor for ObjectRemovalProcessor {
    fn transformation_type(&self) -> TransformationType {
        TransformationType::ObjectRemoval
    }

    fn output_suffix(&self) -> &'static str {
        "object_removed"
    }

    fn run(&self, image: DynamicImage, params: &Parameters) -> Result<DynamicImage, ProcessorError> {
        let region = params::rect(params, "region")?;
        let mut rgb = image.to_rgb8();
        let (w, h) = rgb.dimensions();

        if !region.fits_within(w, h) {
            return Err(ProcessorError::invalid_parameter(
                "region",
                format!("must be a non-empty rectangle inside the {}x{} image", w, h),
            ));
        }
        if region.width == w && region.height == h {
            return Err(ProcessorError::invalid_parameter(
                "region",
                "cannot cover the whole image",
            ));
        }

        // Working buffer for the region plus a one-pixel frame of known pixels.
        let fx = region.x.saturating_sub(1);
        let fy = region.y.saturating_sub(1);
        let fw = (region.right() + 1).min(w) - fx;
        let fh = (region.bottom() + 1).min(h) - fy;
        let at = |x: u32, y: u32| ((y - fy) * fw + (x - fx)) as usize;

        let seed = ring_mean(&rgb, region);
        let mut buf: Vec<[f32; 3]> = Vec::with_capacity((fw * fh) as usize);
        for y in fy..fy + fh {
            for x in fx..fx + fw {
                buf.push(if region.contains(x, y) {
                    seed
                } else {
                    rgb.get_pixel(x, y).0.map(f32::from)
                });
            }
        }

        let passes = region.width.max(region.height).min(MAX_PASSES);
        for _ in 0..passes {
            for y in region.y..region.bottom() {
                for x in region.x..region.right() {
                    let mut acc = [0.0f32; 3];
                    let mut n = 0.0f32;
                    let neighbours = [
                        (x.wrapping_sub(1), y),
                        (x + 1, y),
                        (x, y.wrapping_sub(1)),
                        (x, y + 1),
                    ];
                    for (nx, ny) in neighbours {
                        if nx < fx || ny < fy || nx >= fx + fw || ny >= fy + fh {
                            continue;
                        }
                        let v = buf[at(nx, ny)];
                        for c in 0..3 {
                            acc[c] += v[c];
                        }
                        n += 1.0;
                    }
                    if n > 0.0 {
                        buf[at(x, y)] = acc.map(|a| a / n);
                    }
                }
            }
        }

        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                let v = buf[at(x, y)];
                rgb.put_pixel(x, y, Rgb(v.map(|c| c.round().clamp(0.0, 255.0) as u8)));
            }
        }

        Ok(DynamicImage::ImageRgb8(rgb))
    }
}
