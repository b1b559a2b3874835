// ============================================================================
// IMAGE I/O — container bytes <-> PixelBuffer via the `image` crate
// ============================================================================
//
// Everything format-specific lives here; the rest of the crate only sees
// PixelBuffer on one side and opaque byte vectors on the other.

use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use image::io::{Limits, Reader};
use image::{DynamicImage, ImageError, ImageFormat, ImageOutputFormat};
use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::error::{DecodeError, EncodeError, EngineError, Result};

/// Default JPEG quality when none is configured.
pub const DEFAULT_QUALITY: u8 = 90;

/// Output container formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
    Tga,
    Tiff,
}

impl SaveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Tga => "tga",
            SaveFormat::Tiff => "tiff",
        }
    }

    pub fn supports_quality(&self) -> bool {
        matches!(self, SaveFormat::Jpeg)
    }

    /// Decoding the output gives back exactly the encoded samples.
    pub fn is_lossless(&self) -> bool {
        !matches!(self, SaveFormat::Jpeg)
    }

    pub fn all() -> &'static [SaveFormat] {
        &[
            SaveFormat::Png,
            SaveFormat::Jpeg,
            SaveFormat::Bmp,
            SaveFormat::Tga,
            SaveFormat::Tiff,
        ]
    }

    /// Parse a format name or file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<SaveFormat> {
        match ext.to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "bmp" => Some(SaveFormat::Bmp),
            "tga" => Some(SaveFormat::Tga),
            "tif" | "tiff" => Some(SaveFormat::Tiff),
            _ => None,
        }
    }

    /// Format implied by a file name's extension, if any.
    pub fn from_filename(name: &str) -> Option<SaveFormat> {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(SaveFormat::from_extension)
    }

    fn output_format(&self, quality: u8) -> ImageOutputFormat {
        match self {
            SaveFormat::Png => ImageOutputFormat::Png,
            SaveFormat::Jpeg => ImageOutputFormat::Jpeg(quality.clamp(1, 100)),
            SaveFormat::Bmp => ImageOutputFormat::Bmp,
            SaveFormat::Tga => ImageOutputFormat::Tga,
            SaveFormat::Tiff => ImageOutputFormat::Tiff,
        }
    }
}

/// Upper bounds applied before and after decoding untrusted bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_bytes: usize,
    pub max_pixels: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_bytes: 32 * 1024 * 1024,
            max_pixels: 64 * 1024 * 1024,
        }
    }
}

// ============================================================================
// DECODE
// ============================================================================

/// Decode any container the `image` crate recognises into a BGR buffer.
/// Alpha, if present, is discarded.
pub fn decode_image(bytes: &[u8], limits: DecodeLimits) -> std::result::Result<PixelBuffer, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    if bytes.len() > limits.max_bytes {
        return Err(DecodeError::TooLarge {
            size: bytes.len(),
            limit: limits.max_bytes,
        });
    }

    let format = image::guess_format(bytes).map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    // Only the header is read here; nothing is allocated for pixels until the
    // dimensions pass the limit.
    let (width, height) = Reader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(decode_error)?;
    if width as u64 * height as u64 > limits.max_pixels {
        return Err(DecodeError::DimensionsTooLarge {
            width,
            height,
            limit: limits.max_pixels,
        });
    }

    let mut reader = Reader::with_format(Cursor::new(bytes), format);
    let mut io_limits = Limits::default();
    io_limits.max_image_width = Some(width);
    io_limits.max_image_height = Some(height);
    reader.limits(io_limits);
    let img = reader.decode().map_err(decode_error)?;

    PixelBuffer::from_rgb_image(&img.to_rgb8()).map_err(|e| DecodeError::Malformed(e.to_string()))
}

fn decode_error(e: ImageError) -> DecodeError {
    match e {
        ImageError::Unsupported(u) => DecodeError::Unsupported(u.to_string()),
        other => DecodeError::Malformed(other.to_string()),
    }
}

/// Synchronously read and decode an image file (CLI / headless mode).
pub fn load_image_sync(path: &Path, limits: DecodeLimits) -> Result<PixelBuffer> {
    let bytes = std::fs::read(path)?;
    Ok(decode_image(&bytes, limits)?)
}

/// Guess the container of already-encoded bytes, for naming fetched blobs.
pub fn sniff_format(bytes: &[u8]) -> Option<SaveFormat> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some(SaveFormat::Png),
        ImageFormat::Jpeg => Some(SaveFormat::Jpeg),
        ImageFormat::Bmp => Some(SaveFormat::Bmp),
        ImageFormat::Tiff => Some(SaveFormat::Tiff),
        _ => None,
    }
}

// ============================================================================
// ENCODE
// ============================================================================

/// Encode a buffer into an in-memory container.
pub fn encode_image(
    buffer: &PixelBuffer,
    format: SaveFormat,
    quality: u8,
) -> std::result::Result<Vec<u8>, EncodeError> {
    let img = DynamicImage::ImageRgb8(buffer.to_rgb_image());
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, format.output_format(quality))
        .map_err(|e| match e {
            ImageError::Unsupported(_) => EncodeError::UnsupportedFormat(format),
            other => EncodeError::Codec(other.to_string()),
        })?;
    Ok(cursor.into_inner())
}

/// Encode and write a buffer to a file. Encoding finishes before the file is
/// created, so a codec failure never leaves a partial file behind.
pub fn encode_and_write(buffer: &PixelBuffer, path: &Path, format: SaveFormat, quality: u8) -> Result<()> {
    let bytes = encode_image(buffer, format, quality)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush().map_err(EngineError::from)
}
