//! Testing utilities: a controllable mock processor and image fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use morphflux_core::testing::{fixtures, MockProcessor};
//!
//! let dir = tempfile::tempdir()?;
//! fixtures::write_valid_png(&dir.path().join("valid.png"));
//!
//! let processor = MockProcessor::new(TransformationType::BackgroundRemoval)
//!     .with_delay(Duration::from_millis(100));
//! ```

mod mock_processor;

pub use mock_processor::MockProcessor;

/// Test images and helpers to write them to disk.
pub mod fixtures {
    use std::path::Path;

    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    pub const WIDTH: u32 = 128;
    pub const HEIGHT: u32 = 96;

    /// A colour the skin-tone face detector accepts.
    pub const SKIN: [u8; 3] = [220, 170, 140];
    /// Backdrop colour with no skin tones.
    pub const BACKDROP: [u8; 3] = [40, 90, 200];
    /// Centre of the face blob in [`face_image`].
    pub const FACE_CENTER: (u32, u32) = (64, 48);

    /// Colour of the square in [`subject_image`].
    pub const SUBJECT: [u8; 3] = [220, 40, 40];
    /// Centre of the square in [`subject_image`].
    pub const SUBJECT_CENTER: (u32, u32) = (40, 40);

    /// A smooth gradient; decodes fine and suits any processor that needs no face.
    pub fn valid_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
            Rgb([(x * 255 / WIDTH) as u8, (y * 255 / HEIGHT) as u8, 160])
        }))
    }

    /// A flat backdrop with nothing face-like in it.
    pub fn no_faces_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(WIDTH, HEIGHT, Rgb(BACKDROP)))
    }

    /// A skin-toned ellipse (40x52) on the backdrop.
    pub fn face_image() -> DynamicImage {
        let (cx, cy) = (FACE_CENTER.0 as f32, FACE_CENTER.1 as f32);
        let (rx, ry) = (20.0f32, 26.0f32);
        DynamicImage::ImageRgb8(RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
            let dx = (x as f32 - cx) / rx;
            let dy = (y as f32 - cy) / ry;
            if dx * dx + dy * dy <= 1.0 {
                Rgb(SKIN)
            } else {
                Rgb(BACKDROP)
            }
        }))
    }

    /// An 80x80 image with a red square (25..55) on a blue backdrop.
    pub fn subject_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(80, 80, |x, y| {
            if (25..55).contains(&x) && (25..55).contains(&y) {
                Rgb(SUBJECT)
            } else {
                Rgb([30, 90, 200])
            }
        }))
    }

    fn write_png(image: &DynamicImage, path: &Path) {
        image
            .save_with_format(path, ImageFormat::Png)
            .expect("failed to write fixture image");
    }

    pub fn write_valid_png(path: &Path) {
        write_png(&valid_image(), path);
    }

    pub fn write_no_faces_png(path: &Path) {
        write_png(&no_faces_image(), path);
    }

    pub fn write_face_png(path: &Path) {
        write_png(&face_image(), path);
    }
}
