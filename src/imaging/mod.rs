//! Image processing: decode, resize, encode, strip.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Sniff** | leading-byte signatures ([`ImageFormat::sniff`]) |
//! | **Identify** | `image::ImageReader::into_dimensions`, AVIF `ispe` property |
//! | **Decode** | `image` (JPEG/PNG/WebP), `avif-parse` + `rav1d` (AVIF) |
//! | **Resize** | contain-fit geometry + Lanczos3 |
//! | **Encode** | `image` (JPEG/PNG/AVIF), `webp` (lossy WebP) |
//! | **Strip** | `img-parts` segment/chunk removal |
//!
//! The module is split into:
//! - **Format**: the tagged variant every stage dispatches on
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing a transform and its bounds
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Codecs**: `decode`, `avif`, `encode`, `orientation`, `metadata`

mod avif;
pub mod backend;
pub mod calculations;
mod decode;
mod encode;
pub mod format;
pub mod metadata;
pub mod orientation;
pub mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{TargetGeometry, contain_fit};
pub use format::ImageFormat;
pub use metadata::{MetadataKind, find_metadata, strip};
pub use params::{EncodeParams, Limits, Quality, TransformParams, TransformRequest};
pub use rust_backend::RustBackend;
