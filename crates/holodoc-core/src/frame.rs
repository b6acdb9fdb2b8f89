//! Camera frames and their wire encodings.
//!
//! A [`CameraFrame`] is an immutable RGBA8 pixel buffer. Outbound payloads
//! carry it as an upper-case hex string of a JPEG; inbound answers carry a
//! base64-encoded image.

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::defaults::BYTES_PER_PIXEL;
use crate::error::{Error, Result};

/// One captured camera image.
///
/// Cloning shares the pixel buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct CameraFrame {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl CameraFrame {
    /// Build a frame from a row-major RGBA8 buffer.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!(
                "camera frame must have non-zero dimensions, got {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(Error::InvalidInput(format!(
                "camera frame {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    /// Frame filled with a single colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let count = width as usize * height as usize;
        let pixels = rgba.iter().copied().cycle().take(count * BYTES_PER_PIXEL).collect();
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Decode any image format the codec understands (JPEG, PNG).
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_rgba(img.to_rgba8()))
    }

    /// Read and decode an image file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_encoded(&bytes)
    }

    /// Decode the base64 image field of a server answer.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Image(format!("invalid base64 image: {}", e)))?;
        Self::from_encoded(&bytes)
    }

    fn from_rgba(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw().into(),
        }
    }

    /// Encode as JPEG. Alpha is dropped.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let rgba = RgbaImage::from_raw(self.width, self.height, self.pixels.to_vec())
            .ok_or_else(|| Error::Image("pixel buffer does not match dimensions".to_string()))?;
        let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        encoder.encode_image(&rgb)?;
        Ok(out)
    }

    /// Upper-case hex of the JPEG encoding, as expected in `image` request fields.
    pub fn to_hex_jpeg(&self, quality: u8) -> Result<String> {
        Ok(hex::encode_upper(self.encode_jpeg(quality)?))
    }
}

impl fmt::Debug for CameraFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}
