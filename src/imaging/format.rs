//! The four supported container formats as one tagged variant.
//!
//! Each variant knows its byte signature, its content type, and which decode
//! and encode function serves it. Adding a format means adding a variant and
//! its two functions; nothing dispatches on strings or runtime type checks.

use super::backend::BackendError;
use super::params::{EncodeParams, Limits};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
}

const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47];
const AVIF_BRANDS: &[&[u8]] = &[b"avif", b"avis"];

impl ImageFormat {
    pub const ALL: [ImageFormat; 4] = [Self::Jpeg, Self::Png, Self::WebP, Self::Avif];

    /// Identify the real encoded format from leading bytes.
    ///
    /// A declared content type is never consulted: this is the only source of
    /// truth for what a payload contains.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(JPEG_SIGNATURE) {
            Some(Self::Jpeg)
        } else if data.starts_with(PNG_SIGNATURE) {
            Some(Self::Png)
        } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            Some(Self::WebP)
        } else if data.len() >= 12
            && &data[4..8] == b"ftyp"
            && AVIF_BRANDS.contains(&&data[8..12])
        {
            Some(Self::Avif)
        } else {
            None
        }
    }

    /// Parse a requested output format, case-insensitively. `jpg` is accepted
    /// as an alias of `jpeg`.
    pub fn from_param(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "avif" => Some(Self::Avif),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
        }
    }

    /// Decode a payload already identified as this format.
    pub fn decode(self, data: &[u8], limits: &Limits) -> Result<DynamicImage, BackendError> {
        match self {
            Self::Jpeg => super::decode::decode_jpeg(data, limits),
            Self::Png => super::decode::decode_png(data, limits),
            Self::WebP => super::decode::decode_webp(data, limits),
            Self::Avif => super::avif::decode_avif(data, limits),
        }
    }

    /// Header-only dimension probe.
    pub fn dimensions(self, data: &[u8]) -> Result<(u32, u32), BackendError> {
        match self {
            Self::Avif => super::avif::avif_dimensions(data),
            raster => super::decode::raster_dimensions(data, raster),
        }
    }

    /// Encode pixels into this format.
    pub fn encode(
        self,
        img: &DynamicImage,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, BackendError> {
        match self {
            Self::Jpeg => super::encode::encode_jpeg(img, params.quality),
            Self::Png => super::encode::encode_png(img),
            Self::WebP => super::encode::encode_webp(img, params.quality),
            Self::Avif => super::encode::encode_avif(img, params.quality, params.avif_speed),
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
        };
        f.write_str(name)
    }
}
