//! Decoded texture pixels ready for upload

use std::path::Path;
use thiserror::Error;

/// Image decode failure
#[derive(Error, Debug)]
#[error("Failed to decode image {source_name}: {reason}")]
pub struct TextureDataError {
    /// File path or "memory"
    pub source_name: String,
    /// Decoder message
    pub reason: String,
}

/// Raw RGBA8 pixel buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Channels per pixel, always 4 after decoding
    pub channels: u8,
    /// Row-major pixel bytes
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Decode an image file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TextureDataError> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|e| TextureDataError {
            source_name: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let data = Self::from_rgba(img.to_rgba8());
        log::debug!("Decoded {} ({}x{})", path.display(), data.width, data.height);
        Ok(data)
    }

    /// Decode an in-memory image
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TextureDataError> {
        let img = image::load_from_memory(bytes).map_err(|e| TextureDataError {
            source_name: "memory".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_rgba(img.to_rgba8()))
    }

    fn from_rgba(rgba: image::RgbaImage) -> Self {
        let (width, height) = rgba.dimensions();
        Self {
            width,
            height,
            channels: 4,
            pixels: rgba.into_raw(),
        }
    }

    /// Single color fill, used for fallback textures
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let count = (width * height) as usize;
        Self {
            width,
            height,
            channels: 4,
            pixels: color.repeat(count),
        }
    }

    /// Two-color checkerboard with `cell` pixel squares
    pub fn checkerboard(size: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let cell = cell.max(1);
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let color = if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b };
                pixels.extend_from_slice(&color);
            }
        }
        Self {
            width: size,
            height: size,
            channels: 4,
            pixels,
        }
    }

    /// Byte size of the pixel buffer
    pub fn size_bytes(&self) -> usize {
        self.pixels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_color() {
        let tex = TextureData::solid_color(4, 2, [255, 0, 0, 255]);
        assert_eq!(tex.size_bytes(), 4 * 2 * 4);
        assert_eq!(&tex.pixels[4..8], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_checkerboard_alternates() {
        let white = [255; 4];
        let black = [0, 0, 0, 255];
        let tex = TextureData::checkerboard(4, 2, white, black);
        assert_eq!(&tex.pixels[0..4], &white);
        // third pixel on the first row is in the next cell
        assert_eq!(&tex.pixels[8..12], &black);
    }

    #[test]
    fn test_bad_bytes_error() {
        assert!(TextureData::from_bytes(&[1, 2, 3]).is_err());
    }
}
