use std::fmt;
use std::str::FromStr;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::runtime::Error;

/// The representation a snapshot is decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotFormat {
    /// Row-major RGB pixels, `(height, width, 3)`.
    PixelArray,
    /// A decoded `image::RgbImage`.
    RawImage,
    /// The encoded file bytes (JPEG/PNG), untouched.
    RawBytes,
}

impl SnapshotFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotFormat::PixelArray => "pixels",
            SnapshotFormat::RawImage => "image",
            SnapshotFormat::RawBytes => "bytes",
        }
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapshotFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pixels" | "pixel_array" | "numpy" => Ok(SnapshotFormat::PixelArray),
            "image" | "raw_image" | "pil" => Ok(SnapshotFormat::RawImage),
            "bytes" | "raw_bytes" => Ok(SnapshotFormat::RawBytes),
            _ => Err(Error::UnsupportedFormat(format!(
                "{s:?} (expected one of: pixels, image, bytes)"
            ))),
        }
    }
}

/// Mime type requested from the page when it exports the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    Jpeg,
    Png,
}

impl ImageEncoding {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "image/jpeg",
            ImageEncoding::Png => "image/png",
        }
    }
}

/// Owned RGB pixels with their dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, Error> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(Error::Decode(format!(
                "pixel buffer of {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(height, width, channels)`, the usual observation-space layout.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height as usize, self.width as usize, 3)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }
}

impl From<RgbImage> for PixelBuffer {
    fn from(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

impl From<PixelBuffer> for RgbImage {
    fn from(pixels: PixelBuffer) -> Self {
        // Length is checked on construction, so from_raw cannot fail here.
        RgbImage::from_raw(pixels.width, pixels.height, pixels.data)
            .unwrap_or_else(|| RgbImage::new(0, 0))
    }
}

/// A decoded stage capture.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Pixels(PixelBuffer),
    Image(RgbImage),
    Bytes(Vec<u8>),
}

impl Snapshot {
    pub fn format(&self) -> SnapshotFormat {
        match self {
            Snapshot::Pixels(_) => SnapshotFormat::PixelArray,
            Snapshot::Image(_) => SnapshotFormat::RawImage,
            Snapshot::Bytes(_) => SnapshotFormat::RawBytes,
        }
    }

    /// `(height, width, 3)` for decoded variants; `None` for raw bytes.
    pub fn shape(&self) -> Option<(usize, usize, usize)> {
        match self {
            Snapshot::Pixels(p) => Some(p.shape()),
            Snapshot::Image(img) => Some((img.height() as usize, img.width() as usize, 3)),
            Snapshot::Bytes(_) => None,
        }
    }

    pub fn as_pixels(&self) -> Option<&PixelBuffer> {
        match self {
            Snapshot::Pixels(p) => Some(p),
            _ => None,
        }
    }

    /// Converts any variant to pixels, decoding raw bytes if needed.
    pub fn to_pixels(&self) -> Result<PixelBuffer, Error> {
        match self {
            Snapshot::Pixels(p) => Ok(p.clone()),
            Snapshot::Image(img) => Ok(PixelBuffer::from(img.clone())),
            Snapshot::Bytes(bytes) => super::codec::decode_image_bytes(bytes).map(PixelBuffer::from),
        }
    }
}
