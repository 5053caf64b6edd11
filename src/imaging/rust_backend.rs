//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary; no system codec
//! libraries are required at runtime apart from libwebp, which the `webp`
//! crate builds from source.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP) | `image` crate decoders, bounded by `image::Limits` |
//! | Decode (AVIF) | `avif-parse` (container) + `rav1d` (AV1 decode) + YUV→RGB |
//! | Orientation | `kamadak-exif` tag read, `image` rotate/flip |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Encode → JPEG / PNG / AVIF | `image::codecs::{jpeg, png, avif}` |
//! | Encode → WebP (lossy) | `webp` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::TargetGeometry;
use super::format::ImageFormat;
use super::orientation;
use super::params::{EncodeParams, Limits};
use image::DynamicImage;
use image::imageops::FilterType;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, data: &[u8], format: ImageFormat) -> Result<Dimensions, BackendError> {
        let (width, height) = format.dimensions(data)?;
        Ok(Dimensions { width, height })
    }

    fn decode(
        &self,
        data: &[u8],
        format: ImageFormat,
        limits: &Limits,
    ) -> Result<DynamicImage, BackendError> {
        let img = format.decode(data, limits)?;
        Ok(orientation::normalize(img, data))
    }

    fn resize(
        &self,
        image: DynamicImage,
        target: TargetGeometry,
    ) -> Result<DynamicImage, BackendError> {
        if (image.width(), image.height()) == (target.width, target.height) {
            return Ok(image);
        }
        Ok(image.resize_exact(target.width, target.height, FilterType::Lanczos3))
    }

    fn encode(
        &self,
        image: &DynamicImage,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, BackendError> {
        params.format.encode(image, params)
    }
}
