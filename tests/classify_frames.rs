use smart_splash::classify::{classify, ClassificationSample};
use smart_splash::raster::{decode, RasterImage};
use tempfile::tempdir;

fn write_ppm(path: &std::path::Path, w: u32, h: u32, pixel: impl Fn(u32, u32) -> [u8; 3]) {
    let mut data = format!("P6\n# CREATOR: test\n{w} {h}\n255\n").into_bytes();
    for y in 0..h {
        for x in 0..w {
            data.extend_from_slice(&pixel(x, y));
        }
    }
    std::fs::write(path, data).unwrap();
}

fn classify_file(w: u32, h: u32, pixel: impl Fn(u32, u32) -> [u8; 3]) -> ClassificationSample {
    let dir = tempdir().unwrap();
    let path = dir.path().join("frame.ppm");
    write_ppm(&path, w, h, pixel);
    classify(&decode(&path).unwrap())
}

fn in_range(s: &ClassificationSample) -> bool {
    let each = [s.yellow_pct, s.grey_pct, s.black_pct]
        .iter()
        .all(|p| (0.0..=100.0).contains(p));
    each && s.yellow_pct + s.grey_pct + s.black_pct <= 100.0 + 1e-3
}

#[test]
fn uniform_firmware_yellow() {
    let s = classify_file(640, 480, |_, _| [255, 255, 150]);
    assert!((s.yellow_pct - 100.0).abs() < 0.01);
    assert_eq!(s.grey_pct, 0.0);
}

#[test]
fn uniform_startup_grey() {
    let s = classify_file(640, 480, |_, _| [189, 189, 189]);
    assert!((s.grey_pct - 100.0).abs() < 0.01);
}

#[test]
fn uniform_black() {
    let s = classify_file(800, 600, |_, _| [0, 0, 0]);
    assert!((s.black_pct - 100.0).abs() < 0.01);
}

#[test]
fn uniform_purple_is_unclassified() {
    let s = classify_file(320, 200, |_, _| [100, 50, 200]);
    assert_eq!(s, ClassificationSample::default());
}

#[test]
fn percentages_stay_bounded_on_busy_frames() {
    let patterns: [&dyn Fn(u32, u32) -> [u8; 3]; 3] = [
        &|x, y| [(x * 7) as u8, (y * 13) as u8, ((x + y) * 3) as u8],
        &|x, _| if x < 100 { [255, 255, 150] } else { [189, 189, 189] },
        &|x, y| if (x + y) % 2 == 0 { [0, 0, 0] } else { [240, 240, 180] },
    ];
    for pattern in patterns {
        let s = classify_file(333, 217, pattern);
        assert!(in_range(&s), "out of range: {s}");
    }
}

#[test]
fn tiny_image_samples_first_pixel() {
    let img = RasterImage::uniform(1, 1, [0, 0, 0]);
    assert_eq!(classify(&img).black_pct, 100.0);
}
