//! Background removal via rectangle-seeded segmentation.

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};

use super::error::ProcessorError;
use super::params;
use super::segmentation::{segment_foreground, FOREGROUND};
use super::traits::Processor;
use crate::job::{Parameters, TransformationType};

pub(crate) const DEFAULT_ITERATIONS: u32 = 5;
pub(crate) const DEFAULT_MARGIN: f32 = 0.1;

/// Keeps the segmented foreground and makes everything else transparent.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackgroundRemovalProcessor;

#[async_trait]
impl Processor for BackgroundRemovalProcessor {
    fn transformation_type(&self) -> TransformationType {
        TransformationType::BackgroundRemoval
    }

    fn output_suffix(&self) -> &'static str {
        "bg_removed"
    }

    fn run(&self, image: DynamicImage, params: &Parameters) -> Result<DynamicImage, ProcessorError> {
        let iterations = params::u32_or(params, "iterations", DEFAULT_ITERATIONS)?;
        let margin = params::f32_or(params, "margin", DEFAULT_MARGIN)?;

        let rgb = image.to_rgb8();
        let mask = segment_foreground(&rgb, margin, iterations)?;

        let out = RgbaImage::from_fn(rgb.width(), rgb.height(), |x, y| {
            if mask.get_pixel(x, y).0[0] == FOREGROUND {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                Rgba([r, g, b, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });

        Ok(DynamicImage::ImageRgba8(out))
    }
}
