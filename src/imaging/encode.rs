//! Encoders for the four output formats.
//!
//! | Format | Encoder | Quality |
//! |---|---|---|
//! | JPEG | `image::codecs::jpeg::JpegEncoder` | 1-100 native |
//! | PNG | `image::codecs::png::PngEncoder` | ignored (lossless) |
//! | WebP | `webp` (libwebp, lossy) | 1-100 native |
//! | AVIF | `image::codecs::avif::AvifEncoder` (rav1e) | 1-100 native, speed from config |
//!
//! Inputs are normalized to 8-bit RGB or RGBA first so every encoder sees a
//! pixel layout it accepts. JPEG has no alpha channel and drops it.

use super::backend::BackendError;
use super::params::Quality;
use image::DynamicImage;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;

fn to_8bit(img: &DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img.clone(),
        _ if img.color().has_alpha() => DynamicImage::ImageRgba8(img.to_rgba8()),
        _ => DynamicImage::ImageRgb8(img.to_rgb8()),
    }
}

fn failed(format: &str, e: impl std::fmt::Display) -> BackendError {
    BackendError::Encode(format!("{format} encode failed: {e}"))
}

pub fn encode_jpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value());
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| failed("JPEG", e))?;
    Ok(buf)
}

pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    to_8bit(img)
        .write_with_encoder(PngEncoder::new(&mut buf))
        .map_err(|e| failed("PNG", e))?;
    Ok(buf)
}

pub fn encode_webp(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let pixels = to_8bit(img);
    let (width, height) = (pixels.width(), pixels.height());
    let encoder = match &pixels {
        DynamicImage::ImageRgba8(rgba) => webp::Encoder::from_rgba(rgba.as_raw(), width, height),
        DynamicImage::ImageRgb8(rgb) => webp::Encoder::from_rgb(rgb.as_raw(), width, height),
        other => return Err(failed("WebP", format!("pixel layout {:?}", other.color()))),
    };
    let memory = encoder
        .encode_simple(false, f32::from(quality.value()))
        .map_err(|e| failed("WebP", format!("{e:?}")))?;
    Ok(memory.to_vec())
}

pub fn encode_avif(
    img: &DynamicImage,
    quality: Quality,
    speed: u8,
) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let encoder = AvifEncoder::new_with_speed_quality(&mut buf, speed, quality.value());
    to_8bit(img)
        .write_with_encoder(encoder)
        .map_err(|e| failed("AVIF", e))?;
    Ok(buf)
}
