use image::codecs::pnm::PnmDecoder;
use image::error::ImageError;
use image::DynamicImage;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unable to open raster {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed raster header: {0}")]
    Format(String),
    #[error("raster pixel data is truncated: {0}")]
    Truncated(String),
}

/// A decoded frame: 3 bytes per pixel, row-major RGB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RasterImage {
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 3);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// An image filled with a single colour.
    pub fn uniform(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::from_rgb(width, height, pixels)
    }
}

/// Decode a binary PPM (`P6`) dump as written by the emulator's
/// `screendump` command.
pub fn decode(path: &Path) -> Result<RasterImage, DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    decode_reader(BufReader::new(file))
}

/// Only the binary RGB flavour is accepted; other netpbm variants are
/// rejected before any pixel is read.
pub fn decode_reader<R: std::io::BufRead>(mut reader: R) -> Result<RasterImage, DecodeError> {
    let head = reader
        .fill_buf()
        .map_err(|e| DecodeError::Truncated(e.to_string()))?;
    if head.is_empty() {
        return Err(DecodeError::Truncated("empty dump".into()));
    }
    if !head.starts_with(b"P6") {
        return Err(DecodeError::Format("expected P6 magic".into()));
    }
    let decoder = PnmDecoder::new(reader).map_err(header_error)?;
    let rgb = DynamicImage::from_decoder(decoder)
        .map_err(pixel_error)?
        .into_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(RasterImage {
        width,
        height,
        pixels: rgb.into_raw(),
    })
}

fn header_error(err: ImageError) -> DecodeError {
    match err {
        ImageError::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            DecodeError::Truncated(e.to_string())
        }
        other => DecodeError::Format(other.to_string()),
    }
}

fn pixel_error(err: ImageError) -> DecodeError {
    match err {
        ImageError::IoError(e) => DecodeError::Truncated(e.to_string()),
        other => DecodeError::Format(other.to_string()),
    }
}
