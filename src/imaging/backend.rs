//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four pixel operations the engine
//! drives: identify, decode, resize and encode. Everything around them
//! (validation, geometry, metadata stripping, short-circuit rules) lives
//! outside the backend, so a mock can stand in for the pixel work in tests.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::calculations::TargetGeometry;
use super::format::ImageFormat;
use super::params::{EncodeParams, Limits};
use crate::error::TransformError;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{0}")]
    Decode(String),
    #[error("image is {width}x{height}, larger than the {max}x{max} decode ceiling")]
    TooLarge { width: u32, height: u32, max: u32 },
    #[error("{0}")]
    Encode(String),
    #[error("metadata strip failed: {0}")]
    Metadata(String),
}

impl From<BackendError> for TransformError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Decode(_) | BackendError::TooLarge { .. } => {
                TransformError::DecodeFailed(err.to_string())
            }
            BackendError::Encode(_) | BackendError::Metadata(_) => {
                TransformError::EncodeFailed(err.to_string())
            }
        }
    }
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Implementations must be `Sync`: one backend instance serves every
/// concurrent invocation and holds no per-request state.
pub trait ImageBackend: Sync {
    /// Read dimensions from the container header without decoding pixels.
    fn identify(&self, data: &[u8], format: ImageFormat) -> Result<Dimensions, BackendError>;

    /// Decode a payload of a known format into an upright pixel buffer,
    /// refusing anything whose declared size exceeds `limits.max_dimension`.
    fn decode(
        &self,
        data: &[u8],
        format: ImageFormat,
        limits: &Limits,
    ) -> Result<DynamicImage, BackendError>;

    /// Resample to exactly `target`.
    fn resize(
        &self,
        image: DynamicImage,
        target: TargetGeometry,
    ) -> Result<DynamicImage, BackendError>;

    /// Serialize pixels. Output may still carry encoder-written metadata;
    /// stripping is a separate step.
    fn encode(&self, image: &DynamicImage, params: &EncodeParams)
    -> Result<Vec<u8>, BackendError>;
}
