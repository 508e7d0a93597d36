//! Style transfer stand-in: a global saturation and contrast remap.

use async_trait::async_trait;
use image::DynamicImage;

use super::error::ProcessorError;
use super::ops::{hsv_to_rgb, rgb_to_hsv, scale_abs_region};
use super::params;
use super::traits::Processor;
use crate::job::{Parameters, TransformationType};

#[derive(Debug, Default, Clone, Copy)]
pub struct StyleTransferProcessor;

#[async_trait]
impl Processor for StyleTransferProcessor {
    fn transformation_type(&self) -> TransformationType {
        TransformationType::StyleTransfer
    }

    fn output_suffix(&self) -> &'static str {
        "styled"
    }

    fn run(&self, image: DynamicImage, params: &Parameters) -> Result<DynamicImage, ProcessorError> {
        let saturation = params::f32_or(params, "saturation", 1.5)?;
        let contrast = params::f32_or(params, "contrast", 1.2)?;
        let brightness = params::f32_or(params, "brightness", 10.0)?;
        if saturation < 0.0 {
            return Err(ProcessorError::invalid_parameter(
                "saturation",
                "must not be negative",
            ));
        }

        let mut rgb = image.to_rgb8();
        for px in rgb.pixels_mut() {
            let (h, s, v) = rgb_to_hsv(*px);
            *px = hsv_to_rgb(h, (s * saturation).min(1.0), v);
        }
        scale_abs_region(&mut rgb, None, contrast, brightness);

        Ok(DynamicImage::ImageRgb8(rgb))
    }
}
