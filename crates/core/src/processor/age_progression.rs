//! Age progression: grain and darkening inside detected faces.

use std::f32::consts::TAU;
use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::ProcessorError;
use super::face::{FaceDetector, SkinToneFaceDetector};
use super::ops::{scale_abs_region, Rect};
use super::params;
use super::traits::Processor;
use crate::job::{Parameters, TransformationType};

const DEFAULT_NOISE_SIGMA: f32 = 10.0;

pub struct AgeProgressionProcessor {
    detector: Arc<dyn FaceDetector>,
}

impl Default for AgeProgressionProcessor {
    fn default() -> Self {
        Self::with_detector(Arc::new(SkinToneFaceDetector::default()))
    }
}

impl AgeProgressionProcessor {
    pub fn with_detector(detector: Arc<dyn FaceDetector>) -> Self {
        Self { detector }
    }
}

/// Standard normal sample via Box-Muller.
fn gaussian(rng: &mut StdRng) -> f32 {
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

fn add_noise(image: &mut RgbImage, face: Rect, sigma: f32, rng: &mut StdRng) {
    for y in face.y..face.bottom().min(image.height()) {
        for x in face.x..face.right().min(image.width()) {
            let px = image.get_pixel_mut(x, y);
            for c in px.0.iter_mut() {
                *c = (*c as f32 + gaussian(rng) * sigma).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

#[async_trait]
impl Processor for AgeProgressionProcessor {
    fn transformation_type(&self) -> TransformationType {
        TransformationType::AgeProgression
    }

    fn output_suffix(&self) -> &'static str {
        "aged"
    }

    fn run(&self, image: DynamicImage, params: &Parameters) -> Result<DynamicImage, ProcessorError> {
        let sigma = params::f32_or(params, "noise_sigma", DEFAULT_NOISE_SIGMA)?;
        if sigma < 0.0 {
            return Err(ProcessorError::invalid_parameter(
                "noise_sigma",
                "must not be negative",
            ));
        }
        let mut rng = match params::u64_opt(params, "seed")? {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut rgb = image.to_rgb8();
        let faces = self.detector.detect(&rgb)?;

        for face in faces {
            add_noise(&mut rgb, face, sigma, &mut rng);
            scale_abs_region(&mut rgb, Some(face), 0.9, -5.0);
        }

        Ok(DynamicImage::ImageRgb8(rgb))
    }
}
