//! Coarse colour composition of a captured frame.
//!
//! Only a fixed palette matters for boot detection: the light yellow/tan of
//! the firmware screen, the grey (or white) of the startup screen and black.
//! Everything else is counted in the total but in no bucket.

use crate::raster::RasterImage;

/// Roughly how many pixels are inspected per frame, independent of size.
const TARGET_SAMPLES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swatch {
    Yellow,
    Grey,
    Black,
    Other,
}

/// Percentages of sampled pixels per bucket, each in `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassificationSample {
    pub yellow_pct: f32,
    pub grey_pct: f32,
    pub black_pct: f32,
}

impl std::fmt::Display for ClassificationSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "yellow={:.1}% grey={:.1}% black={:.1}%",
            self.yellow_pct, self.grey_pct, self.black_pct
        )
    }
}

/// Bucket a single pixel. Rules are checked in order; the first match wins.
pub fn swatch(r: u8, g: u8, b: u8) -> Swatch {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));

    let light_yellow = r > 200 && g > 200 && b < 220 && (b < r - 20 || b < g - 20);
    let tan = r > 180 && g > 160 && b < 160 && r > b + 30;
    if light_yellow || tan {
        return Swatch::Yellow;
    }

    let grey = (r - g).abs() < 20 && (g - b).abs() < 20 && r > 165 && r < 215;
    let white = r > 230 && g > 230 && b > 230;
    if grey || white {
        return Swatch::Grey;
    }

    if r < 60 && g < 60 && b < 60 {
        return Swatch::Black;
    }
    Swatch::Other
}

/// Byte distance between two sampled pixels. Always a whole number of
/// pixels so every read lands on an RGB boundary.
pub fn sample_stride(pixel_bytes: usize) -> usize {
    (pixel_bytes / (TARGET_SAMPLES * 3)).max(3) * 3
}

pub fn classify(image: &RasterImage) -> ClassificationSample {
    classify_pixels(&image.pixels)
}

pub fn classify_pixels(pixels: &[u8]) -> ClassificationSample {
    let stride = sample_stride(pixels.len());
    let mut yellow = 0u32;
    let mut grey = 0u32;
    let mut black = 0u32;
    let mut total = 0u32;

    for px in pixels.chunks_exact(3).step_by(stride / 3) {
        total += 1;
        match swatch(px[0], px[1], px[2]) {
            Swatch::Yellow => yellow += 1,
            Swatch::Grey => grey += 1,
            Swatch::Black => black += 1,
            Swatch::Other => {}
        }
    }

    if total == 0 {
        return ClassificationSample::default();
    }
    let pct = |n: u32| n as f32 * 100.0 / total as f32;
    ClassificationSample {
        yellow_pct: pct(yellow),
        grey_pct: pct(grey),
        black_pct: pct(black),
    }
}
