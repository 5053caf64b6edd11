//! The closed failure taxonomy every transform resolves to.
//!
//! Stages (validator, decoder, resizer, encoder, storage) each fail with their
//! own detail, but callers only ever observe a [`TransformError`]. The HTTP
//! layer maps [`ErrorKind`] to a status; nothing else needs to look inside.
//!
//! | Kind | Trigger | Attributable to |
//! |---|---|---|
//! | `NotFound` | object absent upstream | client |
//! | `InvalidParameter` | malformed/out-of-range w, h, q or key | client |
//! | `UnsupportedFormat` | format outside the whitelist | client |
//! | `PayloadTooLarge` | input exceeds the size bound | client |
//! | `DecodeFailed` | corrupt, mismatched or oversized-declared input | client |
//! | `EncodeFailed` | encoder defect | server |
//! | `Internal` | anything unexpected | server |

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("object not found")]
    NotFound,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("unsupported format '{0}' (supported: jpeg, png, webp, avif)")]
    UnsupportedFormat(String),
    #[error("payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge { size: u64, max: u64 },
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    #[error("encode failed: {0}")]
    EncodeFailed(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Fieldless view of [`TransformError`], for status mapping and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidParameter,
    UnsupportedFormat,
    PayloadTooLarge,
    DecodeFailed,
    EncodeFailed,
    Internal,
}

impl TransformError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::InvalidParameter(_) => ErrorKind::InvalidParameter,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::DecodeFailed(_) => ErrorKind::DecodeFailed,
            Self::EncodeFailed(_) => ErrorKind::EncodeFailed,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True when the failure is caused by the request or the stored original,
    /// false when it indicates a defect on our side.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::EncodeFailed(_) | Self::Internal(_))
    }

    /// Message safe to hand to a caller. Server-side failures collapse to a
    /// generic text so internal detail never leaks.
    pub fn public_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            "internal server error".to_string()
        }
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;
