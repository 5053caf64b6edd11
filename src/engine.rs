//! Transform Orchestrator.
//!
//! One call turns (original bytes, validated parameters) into output bytes:
//!
//! ```text
//! size check → sniff → [passthrough?] → decode → [contain-fit + resize]
//!            → encode → strip metadata → output
//! ```
//!
//! ## Short-circuit shapes
//!
//! | Parameters | Stages run |
//! |---|---|
//! | none | sniff only; original bytes returned untouched |
//! | `w`/`h` | decode, geometry, resize (if the size changes), encode, strip |
//! | `f` and/or `q` only | decode, encode, strip (no geometry) |
//! | all | decode once, resize once, encode once, strip |
//!
//! The engine holds nothing but a backend and read-only [`Limits`]; an
//! `Engine` behind an `Arc` serves any number of concurrent calls.

use crate::error::{Result, TransformError};
use crate::imaging::{
    Dimensions, EncodeParams, ImageBackend, ImageFormat, Limits, RustBackend, TransformParams,
    contain_fit, metadata,
};
use crate::validation::check_params;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;

/// Result of one transform, with enough context for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub bytes: Bytes,
    pub format: ImageFormat,
    pub source_format: ImageFormat,
    /// `None` on passthrough, where nothing is decoded.
    pub source_size: Option<Dimensions>,
    pub output_size: Option<Dimensions>,
}

impl TransformOutput {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    pub fn is_passthrough(&self) -> bool {
        self.source_size.is_none()
    }
}

pub struct Engine<B: ImageBackend = RustBackend> {
    backend: B,
    limits: Arc<Limits>,
}

impl Engine<RustBackend> {
    pub fn with_limits(limits: Arc<Limits>) -> Self {
        Self::new(RustBackend::new(), limits)
    }
}

impl<B: ImageBackend> Engine<B> {
    pub fn new(backend: B, limits: Arc<Limits>) -> Self {
        Self { backend, limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Reject input larger than `max_input_bytes`.
    pub fn check_size(&self, len: u64) -> Result<()> {
        let max = self.limits.max_input_bytes;
        if len > max {
            return Err(TransformError::PayloadTooLarge { size: len, max });
        }
        Ok(())
    }

    /// Run the pipeline over `input`.
    pub fn transform(&self, input: Bytes, params: &TransformParams) -> Result<TransformOutput> {
        check_params(params, &self.limits)?;
        self.check_size(input.len() as u64)?;

        let source_format = sniff(&input)?;

        if params.is_passthrough() {
            return Ok(TransformOutput {
                bytes: input,
                format: source_format,
                source_format,
                source_size: None,
                output_size: None,
            });
        }

        let started = Instant::now();
        let mut image = self
            .backend
            .decode(&input, source_format, &self.limits)?;
        // The original's buffer is no longer needed once pixels exist.
        drop(input);
        let source_size = Dimensions {
            width: image.width(),
            height: image.height(),
        };

        if params.wants_resize() {
            let target = contain_fit(
                (source_size.width, source_size.height),
                params.width,
                params.height,
            )?;
            let max = self.limits.max_dimension;
            if target.width > max || target.height > max {
                return Err(TransformError::InvalidParameter(format!(
                    "resize of {}x{} gives {}x{}, beyond the {max}x{max} output bound",
                    source_size.width, source_size.height, target.width, target.height
                )));
            }
            if (target.width, target.height) != (source_size.width, source_size.height) {
                image = self.backend.resize(image, target)?;
            }
        }

        let encode = EncodeParams {
            format: params.format.unwrap_or(source_format),
            quality: params.quality.unwrap_or(self.limits.default_quality),
            avif_speed: self.limits.avif_speed,
        };
        let encoded = self.backend.encode(&image, &encode)?;
        let output_size = Dimensions {
            width: image.width(),
            height: image.height(),
        };
        drop(image);

        let stripped = metadata::strip(encode.format, encoded)?;

        tracing::debug!(
            source = %source_format,
            output = %encode.format,
            quality = encode.quality.value(),
            bytes = stripped.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline finished"
        );

        Ok(TransformOutput {
            bytes: Bytes::from(stripped),
            format: encode.format,
            source_format,
            source_size: Some(source_size),
            output_size: Some(output_size),
        })
    }

    /// Sniffed format and header dimensions, without decoding pixels.
    pub fn identify(&self, data: &[u8]) -> Result<(ImageFormat, Dimensions)> {
        let format = sniff(data)?;
        let dims = self.backend.identify(data, format)?;
        Ok((format, dims))
    }
}

fn sniff(data: &[u8]) -> Result<ImageFormat> {
    ImageFormat::sniff(data).ok_or_else(|| {
        TransformError::DecodeFailed("payload is not a jpeg, png, webp or avif image".into())
    })
}
