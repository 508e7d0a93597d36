//! Background replacement: segment, then composite over a solid colour.

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};

use super::background_removal::{DEFAULT_ITERATIONS, DEFAULT_MARGIN};
use super::error::ProcessorError;
use super::params;
use super::segmentation::{segment_foreground, FOREGROUND};
use super::traits::Processor;
use crate::job::{Parameters, TransformationType};

const DEFAULT_COLOR: [u8; 3] = [255, 255, 255];

#[derive(Debug, Default, Clone, Copy)]
pub struct BackgroundReplacementProcessor;

#[async_trait]
impl Processor for BackgroundReplacementProcessor {
    fn transformation_type(&self) -> TransformationType {
        TransformationType::BackgroundReplacement
    }

    fn output_suffix(&self) -> &'static str {
        "bg_replaced"
    }

    fn run(&self, image: DynamicImage, params: &Parameters) -> Result<DynamicImage, ProcessorError> {
        let color = params::color_or(params, "color", DEFAULT_COLOR)?;
        let iterations = params::u32_or(params, "iterations", DEFAULT_ITERATIONS)?;
        let margin = params::f32_or(params, "margin", DEFAULT_MARGIN)?;

        let rgb = image.to_rgb8();
        let mask = segment_foreground(&rgb, margin, iterations)?;

        let out = RgbImage::from_fn(rgb.width(), rgb.height(), |x, y| {
            if mask.get_pixel(x, y).0[0] == FOREGROUND {
                *rgb.get_pixel(x, y)
            } else {
                Rgb(color)
            }
        });

        Ok(DynamicImage::ImageRgb8(out))
    }
}
