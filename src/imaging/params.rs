//! Parameter types for a transform.
//!
//! These describe *what* to produce, never *how*. The validator builds them,
//! the engine reads them, and the backend receives only the narrow pieces it
//! needs ([`EncodeParams`], a target geometry).
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality, 1–100 (default 80). Checked, not clamped.
//! - [`TransformParams`]: requested width/height/format/quality, all optional.
//! - [`TransformRequest`]: an object key plus its [`TransformParams`].
//! - [`Limits`]: process-wide bounds, fixed at startup and shared read-only.
//! - [`EncodeParams`]: what the encoder needs: format, quality, AVIF speed.

use super::format::ImageFormat;
use crate::error::TransformError;

pub const MAX_DIMENSION: u32 = 4096;
pub const MAX_INPUT_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_QUALITY: u8 = 80;
pub const DEFAULT_AVIF_SPEED: u8 = 4;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u32) -> Result<Self, TransformError> {
        if (1..=100).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(TransformError::InvalidParameter(format!(
                "quality must be 1-100, got {value}"
            )))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(DEFAULT_QUALITY)
    }
}

/// Requested transform. Every field is optional; all four absent is the
/// distinct passthrough mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<ImageFormat>,
    pub quality: Option<Quality>,
}

impl TransformParams {
    pub fn is_passthrough(&self) -> bool {
        self.width.is_none()
            && self.height.is_none()
            && self.format.is_none()
            && self.quality.is_none()
    }

    pub fn wants_resize(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }
}

/// A validated request for one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    pub key: String,
    pub params: TransformParams,
}

/// Process-wide bounds. Built once from config; every invocation reads the
/// same instance and none may mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Ceiling for requested, decoded and produced width/height.
    pub max_dimension: u32,
    pub max_input_bytes: u64,
    pub default_quality: Quality,
    /// rav1e speed preset, 1 (slowest) to 10 (fastest).
    pub avif_speed: u8,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            max_input_bytes: MAX_INPUT_BYTES,
            default_quality: Quality::default(),
            avif_speed: DEFAULT_AVIF_SPEED,
        }
    }
}

/// Everything an encoder needs to serialize one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub format: ImageFormat,
    pub quality: Quality,
    pub avif_speed: u8,
}
