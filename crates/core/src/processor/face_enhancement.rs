//! Face enhancement: edge-preserving smoothing and a lift inside detected faces.

use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;

use super::error::ProcessorError;
use super::face::{FaceDetector, SkinToneFaceDetector};
use super::ops::{bilateral_region, scale_abs_region};
use super::params;
use super::traits::Processor;
use crate::job::{Parameters, TransformationType};

const DEFAULT_RADIUS: u32 = 4;
const DEFAULT_BRIGHTNESS: f32 = 5.0;
const MAX_RADIUS: u32 = 15;
const SIGMA_COLOR: f32 = 75.0;
const SIGMA_SPACE: f32 = 75.0;

pub struct FaceEnhancementProcessor {
    detector: Arc<dyn FaceDetector>,
}

impl Default for FaceEnhancementProcessor {
    fn default() -> Self {
        Self::with_detector(Arc::new(SkinToneFaceDetector::default()))
    }
}

impl FaceEnhancementProcessor {
    pub fn with_detector(detector: Arc<dyn FaceDetector>) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl Processor for FaceEnhancementProcessor {
    fn transformation_type(&self) -> TransformationType {
        TransformationType::FaceEnhancement
    }

    fn output_suffix(&self) -> &'static str {
        "enhanced"
    }

    fn run(&self, image: DynamicImage, params: &Parameters) -> Result<DynamicImage, ProcessorError> {
        let radius = params::u32_or(params, "smoothing_radius", DEFAULT_RADIUS)?;
        let brightness = params::f32_or(params, "brightness", DEFAULT_BRIGHTNESS)?;
        if radius > MAX_RADIUS {
            return Err(ProcessorError::invalid_parameter(
                "smoothing_radius",
                format!("must be at most {}", MAX_RADIUS),
            ));
        }

        let mut rgb = image.to_rgb8();
        let faces = self.detector.detect(&rgb)?;

        for face in faces {
            bilateral_region(&mut rgb, face, radius, SIGMA_COLOR, SIGMA_SPACE);
            scale_abs_region(&mut rgb, Some(face), 1.1, brightness);
        }

        Ok(DynamicImage::ImageRgb8(rgb))
    }
}
