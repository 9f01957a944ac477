use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageOutputFormat, RgbImage};

use crate::runtime::Error;
use crate::snapshot::types::{ImageEncoding, PixelBuffer, Snapshot, SnapshotFormat};

const BASE64_MARKER: &str = ";base64,";

/// Returns the base64 body of a `data:image/...;base64,` URI.
///
/// A payload without the `data:` scheme is taken to be the body already.
pub fn strip_data_uri(payload: &str) -> Result<&str, Error> {
    let payload = payload.trim();
    if !payload.starts_with("data:") {
        return Ok(payload);
    }
    match payload.find(BASE64_MARKER) {
        Some(idx) if payload[5..idx].starts_with("image/") => Ok(&payload[idx + BASE64_MARKER.len()..]),
        Some(_) => Err(Error::Decode("data URI does not carry an image".into())),
        None => Err(Error::Decode("data URI is not base64 encoded".into())),
    }
}

/// Decodes a stage snapshot into the requested representation.
pub fn decode(payload: &str, format: SnapshotFormat) -> Result<Snapshot, Error> {
    let body = strip_data_uri(payload)?;
    let bytes = STANDARD
        .decode(body)
        .map_err(|e| Error::Decode(format!("invalid base64: {e}")))?;

    match format {
        SnapshotFormat::RawBytes => Ok(Snapshot::Bytes(bytes)),
        SnapshotFormat::RawImage => decode_image_bytes(&bytes).map(Snapshot::Image),
        SnapshotFormat::PixelArray => decode_image_bytes(&bytes).map(|img| Snapshot::Pixels(img.into())),
    }
}

/// Like [`decode`], with the format given by name. Unknown names are rejected
/// before any decoding work happens.
pub fn decode_named(payload: &str, format: &str) -> Result<Snapshot, Error> {
    let format: SnapshotFormat = format.parse()?;
    decode(payload, format)
}

pub(crate) fn decode_image_bytes(bytes: &[u8]) -> Result<RgbImage, Error> {
    image::load_from_memory(bytes)
        .map(DynamicImage::into_rgb8)
        .map_err(|e| Error::Decode(format!("invalid image data: {e}")))
}

/// Encodes pixels as a data URI. `quality` (1-100) only applies to JPEG.
pub fn encode(pixels: &PixelBuffer, encoding: ImageEncoding, quality: u8) -> Result<String, Error> {
    let image = RgbImage::from_raw(pixels.width(), pixels.height(), pixels.data().to_vec())
        .ok_or_else(|| Error::Internal("pixel buffer does not match its dimensions".into()))?;
    let output = match encoding {
        ImageEncoding::Png => ImageOutputFormat::Png,
        ImageEncoding::Jpeg => ImageOutputFormat::Jpeg(quality.clamp(1, 100)),
    };

    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buf, output)
        .map_err(|e| Error::Internal(format!("failed to encode snapshot: {e}")))?;

    Ok(format!(
        "data:{}{BASE64_MARKER}{}",
        encoding.mime(),
        STANDARD.encode(buf.into_inner())
    ))
}
