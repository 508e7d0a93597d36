//! Face detection used by the face-dependent processors.

use std::collections::VecDeque;

use image::{Rgb, RgbImage};

use super::error::ProcessorError;
use super::ops::Rect;

/// Locates faces in an image.
pub trait FaceDetector: Send + Sync {
    /// Candidate face rectangles, possibly empty.
    fn find(&self, image: &RgbImage) -> Vec<Rect>;

    /// Like [`find`](Self::find) but an empty result is a domain error.
    fn detect(&self, image: &RgbImage) -> Result<Vec<Rect>, ProcessorError> {
        let faces = self.find(image);
        if faces.is_empty() {
            return Err(ProcessorError::NoFaceDetected);
        }
        Ok(faces)
    }
}

/// Heuristic detector: skin-coloured connected regions of face-like shape.
#[derive(Debug, Clone)]
pub struct SkinToneFaceDetector {
    /// Minimum bounding-box side in pixels.
    pub min_size: u32,
    /// Minimum share of the bounding box covered by skin pixels.
    pub min_fill: f32,
    /// Accepted width/height ratio range.
    pub aspect_range: (f32, f32),
}

impl Default for SkinToneFaceDetector {
    fn default() -> Self {
        Self {
            min_size: 24,
            min_fill: 0.4,
            aspect_range: (0.5, 2.0),
        }
    }
}

impl SkinToneFaceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_skin(px: &Rgb<u8>) -> bool {
        let [r, g, b] = px.0.map(i32::from);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        r > 95 && g > 40 && b > 20 && max - min > 15 && (r - g).abs() > 15 && r > g && r > b
    }

    fn accepts(&self, rect: &Rect, pixels: u64) -> bool {
        if rect.width < self.min_size || rect.height < self.min_size {
            return false;
        }
        let fill = pixels as f32 / rect.area() as f32;
        let aspect = rect.width as f32 / rect.height as f32;
        fill >= self.min_fill && aspect >= self.aspect_range.0 && aspect <= self.aspect_range.1
    }
}

impl FaceDetector for SkinToneFaceDetector {
    fn find(&self, image: &RgbImage) -> Vec<Rect> {
        let (w, h) = image.dimensions();
        let idx = |x: u32, y: u32| (y * w + x) as usize;

        let mask: Vec<bool> = image.pixels().map(Self::is_skin).collect();
        let mut visited = vec![false; mask.len()];
        let mut faces = Vec::new();
        let mut queue = VecDeque::new();

        for sy in 0..h {
            for sx in 0..w {
                let start = idx(sx, sy);
                if !mask[start] || visited[start] {
                    continue;
                }

                visited[start] = true;
                queue.push_back((sx, sy));
                let (mut min_x, mut min_y, mut max_x, mut max_y) = (sx, sy, sx, sy);
                let mut pixels = 0u64;

                while let Some((x, y)) = queue.pop_front() {
                    pixels += 1;
                    min_x = min_x.min(x);
                    max_x = max_x.max(x);
                    min_y = min_y.min(y);
                    max_y = max_y.max(y);

                    let neighbours = [
                        (x.wrapping_sub(1), y),
                        (x + 1, y),
                        (x, y.wrapping_sub(1)),
                        (x, y + 1),
                    ];
                    for (nx, ny) in neighbours {
                        if nx >= w || ny >= h {
                            continue;
                        }
                        let n = idx(nx, ny);
                        if mask[n] && !visited[n] {
                            visited[n] = true;
                            queue.push_back((nx, ny));
                        }
                    }
                }

                let rect = Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1);
                if self.accepts(&rect, pixels) {
                    faces.push(rect);
                }
            }
        }

        faces.sort_by(|a, b| b.area().cmp(&a.area()));
        faces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_detects_skin_blob() {
        let image = fixtures::face_image().to_rgb8();
        let faces = SkinToneFaceDetector::new().detect(&image).unwrap();

        assert_eq!(faces.len(), 1);
        let face = faces[0];
        assert!(face.contains(fixtures::FACE_CENTER.0, fixtures::FACE_CENTER.1));
    }

    #[test]
    fn test_no_face_in_plain_image() {
        let image = fixtures::no_faces_image().to_rgb8();
        let err = SkinToneFaceDetector::new().detect(&image).unwrap_err();
        assert_eq!(err, ProcessorError::NoFaceDetected);
    }

    #[test]
    fn test_small_blobs_ignored() {
        let mut image = fixtures::no_faces_image().to_rgb8();
        for y in 10..20 {
            for x in 10..20 {
                image.put_pixel(x, y, Rgb(fixtures::SKIN));
            }
        }
        assert!(SkinToneFaceDetector::new().find(&image).is_empty());
    }

    #[test]
    fn test_thin_strip_rejected_by_aspect() {
        let mut image = fixtures::no_faces_image().to_rgb8();
        for y in 10..40 {
            for x in 0..image.width() {
                image.put_pixel(x, y, Rgb(fixtures::SKIN));
            }
        }
        assert!(SkinToneFaceDetector::new().find(&image).is_empty());
    }
}
