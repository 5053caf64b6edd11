//! Raster decoders (JPEG, PNG, WebP) on the `image` crate.
//!
//! Every decode first probes the header for declared dimensions and refuses
//! anything over the ceiling before a pixel buffer is allocated. The decoder
//! itself then runs with the same ceiling as its `image::Limits`.

use super::backend::BackendError;
use super::format::ImageFormat;
use super::params::Limits;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

const SOI: [u8; 2] = [0xFF, 0xD8];
const MARKER_SOS: u8 = 0xDA;
const MARKER_EOI: u8 = 0xD9;

fn codec_format(format: ImageFormat) -> image::ImageFormat {
    match format {
        ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        ImageFormat::Png => image::ImageFormat::Png,
        ImageFormat::WebP => image::ImageFormat::WebP,
        ImageFormat::Avif => image::ImageFormat::Avif,
    }
}

/// Declared dimensions from the container header.
pub fn raster_dimensions(data: &[u8], format: ImageFormat) -> Result<(u32, u32), BackendError> {
    ImageReader::with_format(Cursor::new(data), codec_format(format))
        .into_dimensions()
        .map_err(|e| BackendError::Decode(format!("unreadable {format} header: {e}")))
}

pub(crate) fn check_ceiling(width: u32, height: u32, limits: &Limits) -> Result<(), BackendError> {
    if width > limits.max_dimension || height > limits.max_dimension {
        return Err(BackendError::TooLarge {
            width,
            height,
            max: limits.max_dimension,
        });
    }
    Ok(())
}

fn decode_raster(
    data: &[u8],
    format: ImageFormat,
    limits: &Limits,
) -> Result<DynamicImage, BackendError> {
    let (width, height) = raster_dimensions(data, format)?;
    check_ceiling(width, height, limits)?;

    let mut decode_limits = image::Limits::default();
    decode_limits.max_image_width = Some(limits.max_dimension);
    decode_limits.max_image_height = Some(limits.max_dimension);

    let mut reader = ImageReader::with_format(Cursor::new(data), codec_format(format));
    reader.limits(decode_limits);
    reader
        .decode()
        .map_err(|e| BackendError::Decode(format!("failed to decode {format}: {e}")))
}

/// Decode a JPEG. A stream whose final scan is never terminated by an EOI
/// marker is treated as truncated, even where the codec would pad it out.
pub fn decode_jpeg(data: &[u8], limits: &Limits) -> Result<DynamicImage, BackendError> {
    if !jpeg_is_complete(data) {
        return Err(BackendError::Decode(
            "truncated jpeg: no end-of-image marker after the last scan".into(),
        ));
    }
    decode_raster(data, ImageFormat::Jpeg, limits)
}

pub fn decode_png(data: &[u8], limits: &Limits) -> Result<DynamicImage, BackendError> {
    decode_raster(data, ImageFormat::Png, limits)
}

pub fn decode_webp(data: &[u8], limits: &Limits) -> Result<DynamicImage, BackendError> {
    decode_raster(data, ImageFormat::WebP, limits)
}

/// True when the marker stream from SOI reaches an EOI after at least one
/// scan.
///
/// Segments are skipped by their declared length, so EXIF thumbnails never
/// confuse the walk. Inside entropy-coded data 0xFF is escaped as 0xFF00 and
/// restart markers are skipped. The walk stops at the first EOI, so trailers
/// appended after the image (motion photo video, MPF data) are ignored.
fn jpeg_is_complete(data: &[u8]) -> bool {
    if !data.starts_with(&SOI) {
        return false;
    }
    let byte = |i: usize| data.get(i).copied();
    let mut pos = SOI.len();
    let mut seen_scan = false;
    let mut in_scan = false;

    loop {
        if in_scan {
            loop {
                match (byte(pos), byte(pos + 1)) {
                    (Some(0xFF), Some(0x00 | 0xD0..=0xD7)) => pos += 2,
                    (Some(0xFF), Some(_)) => break,
                    (Some(_), _) => pos += 1,
                    (None, _) => return false,
                }
            }
        }

        if byte(pos) != Some(0xFF) {
            return false;
        }
        // fill bytes
        while byte(pos + 1) == Some(0xFF) {
            pos += 1;
        }
        let Some(marker) = byte(pos + 1) else {
            return false;
        };
        pos += 2;

        match marker {
            MARKER_EOI => return seen_scan,
            0x01 | 0xD0..=0xD7 => {}
            _ => {
                let (Some(hi), Some(lo)) = (byte(pos), byte(pos + 1)) else {
                    return false;
                };
                let length = usize::from(u16::from_be_bytes([hi, lo]));
                if length < 2 {
                    return false;
                }
                pos += length;
                in_scan = marker == MARKER_SOS;
                seen_scan |= in_scan;
            }
        }
    }
}
