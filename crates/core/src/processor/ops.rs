//! Pixel-level building blocks shared by the processors.

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// True when the rectangle lies entirely inside a `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        !self.is_empty() && self.right() <= width && self.bottom() <= height
    }

    /// Central rectangle leaving `margin` (fraction of each dimension) on every side.
    pub fn centered(width: u32, height: u32, margin: f32) -> Self {
        let margin = margin.clamp(0.0, 0.49);
        let mx = (width as f32 * margin) as u32;
        let my = (height as f32 * margin) as u32;
        Self::new(
            mx,
            my,
            width.saturating_sub(2 * mx),
            height.saturating_sub(2 * my),
        )
    }
}

/// `saturate(|v * alpha + beta|)`, the linear remap used for contrast and brightness.
pub fn scale_abs(value: u8, alpha: f32, beta: f32) -> u8 {
    (value as f32 * alpha + beta).abs().round().min(255.0) as u8
}

/// Apply [`scale_abs`] to every channel inside `region` (or the whole image).
pub fn scale_abs_region(image: &mut RgbImage, region: Option<Rect>, alpha: f32, beta: f32) {
    let full = Rect::new(0, 0, image.width(), image.height());
    let region = region.unwrap_or(full);
    for y in region.y..region.bottom().min(image.height()) {
        for x in region.x..region.right().min(image.width()) {
            let px = image.get_pixel_mut(x, y);
            for c in px.0.iter_mut() {
                *c = scale_abs(*c, alpha, beta);
            }
        }
    }
}

/// RGB (0-255) to HSV with hue in degrees and saturation/value in 0-1.
pub fn rgb_to_hsv(px: Rgb<u8>) -> (f32, f32, f32) {
    let [r, g, b] = px.0.map(|c| c as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max == 0.0 { 0.0 } else { delta / max };

    (h, s, max)
}

pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
    let c = v * s;
    let hp = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    Rgb([r, g, b].map(|ch| ((ch + m) * 255.0).round().clamp(0.0, 255.0) as u8))
}

/// Edge-preserving smoothing restricted to `region`.
///
/// Each output pixel is a weighted mean of its neighbourhood, weighted by both
/// spatial distance and colour difference. Reads come from an untouched copy.
pub fn bilateral_region(
    image: &mut RgbImage,
    region: Rect,
    radius: u32,
    sigma_color: f32,
    sigma_space: f32,
) {
    if radius == 0 || region.is_empty() {
        return;
    }

    let source = image.clone();
    let (w, h) = source.dimensions();
    let r = radius as i64;
    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    for y in region.y..region.bottom().min(h) {
        for x in region.x..region.right().min(w) {
            let center = source.get_pixel(x, y).0.map(|c| c as f32);
            let mut acc = [0.0f32; 3];
            let mut weight_sum = 0.0f32;

            for dy in -r..=r {
                for dx in -r..=r {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let n = source.get_pixel(nx as u32, ny as u32).0.map(|c| c as f32);
                    let color_dist: f32 = (0..3).map(|i| (n[i] - center[i]).powi(2)).sum();
                    let space_dist = (dx * dx + dy * dy) as f32;
                    let wgt = (color_dist * color_coeff + space_dist * space_coeff).exp();
                    for i in 0..3 {
                        acc[i] += n[i] * wgt;
                    }
                    weight_sum += wgt;
                }
            }

            let out = image.get_pixel_mut(x, y);
            for i in 0..3 {
                out.0[i] = (acc[i] / weight_sum).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}
