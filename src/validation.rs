//! Parameter Validator: raw request strings in, a [`TransformRequest`] out.
//!
//! Values arrive exactly as the caller sent them (query strings, CLI flags)
//! and are classified here rather than by an extractor, so every malformed
//! value maps onto the same taxonomy:
//!
//! - `w`, `h`: integer in `1..=max_dimension`, otherwise `InvalidParameter`
//! - `q`: integer in `1..=100`, otherwise `InvalidParameter`
//! - `f`: one of jpeg/jpg/png/webp/avif (any case), otherwise `UnsupportedFormat`
//! - present-but-empty values are `InvalidParameter`
//! - key: see [`validate_key`]
//!
//! Validation is pure and touches no storage.

use crate::error::{Result, TransformError};
use crate::imaging::{ImageFormat, Limits, Quality, TransformParams, TransformRequest};
use serde::Deserialize;

pub const MAX_KEY_LENGTH: usize = 1024;

/// Transform parameters as received, before any parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawParams {
    pub w: Option<String>,
    pub h: Option<String>,
    pub f: Option<String>,
    pub q: Option<String>,
}

/// Validate an object key and return it percent-decoded.
///
/// Checks run on the decoded value so an encoded `%2e%2e` cannot slip a
/// traversal past them. Rejected:
/// - empty, or longer than [`MAX_KEY_LENGTH`] bytes
/// - invalid percent-encoding or non-UTF-8 after decoding
/// - anything but ASCII alphanumerics and `-_./`
/// - `..`, a leading `/`, `//`, `\`
pub fn validate_key(key: &str) -> Result<String> {
    if key.is_empty() {
        return Err(invalid("key is required"));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(invalid(format!("key too long (max: {MAX_KEY_LENGTH})")));
    }

    let decoded = urlencoding::decode(key).map_err(|_| invalid("key has invalid URL encoding"))?;

    if decoded.is_empty() {
        return Err(invalid("key is required"));
    }
    if !decoded
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.'))
    {
        return Err(invalid("key contains invalid characters"));
    }
    if decoded.contains("..")
        || decoded.starts_with('/')
        || decoded.contains("//")
        || decoded.contains('\\')
    {
        return Err(invalid("key must be a relative path without '..' or empty segments"));
    }

    Ok(decoded.into_owned())
}

/// Parse raw parameter strings against the configured bounds.
pub fn parse_params(raw: &RawParams, limits: &Limits) -> Result<TransformParams> {
    Ok(TransformParams {
        width: raw
            .w
            .as_deref()
            .map(|v| parse_dimension("width", v, limits.max_dimension))
            .transpose()?,
        height: raw
            .h
            .as_deref()
            .map(|v| parse_dimension("height", v, limits.max_dimension))
            .transpose()?,
        format: raw.f.as_deref().map(parse_format).transpose()?,
        quality: raw.q.as_deref().map(parse_quality).transpose()?,
    })
}

/// Full validation of one request: key plus parameters.
pub fn validate_request(key: &str, raw: &RawParams, limits: &Limits) -> Result<TransformRequest> {
    Ok(TransformRequest {
        key: validate_key(key)?,
        params: parse_params(raw, limits)?,
    })
}

/// Re-check already-typed parameters against `limits`.
///
/// Typed parameters can be built without going through [`parse_params`]
/// (library callers, the CLI); the engine runs this before touching bytes.
pub fn check_params(params: &TransformParams, limits: &Limits) -> Result<()> {
    for (name, value) in [("width", params.width), ("height", params.height)] {
        if let Some(v) = value {
            check_dimension(name, v, limits.max_dimension)?;
        }
    }
    Ok(())
}

fn parse_dimension(name: &str, raw: &str, max: u32) -> Result<u32> {
    let value = parse_integer(name, raw)?;
    let value = u32::try_from(value)
        .map_err(|_| invalid(format!("{name} must be 1-{max}, got {raw}")))?;
    check_dimension(name, value, max)?;
    Ok(value)
}

fn check_dimension(name: &str, value: u32, max: u32) -> Result<()> {
    if value == 0 || value > max {
        return Err(invalid(format!("{name} must be 1-{max}, got {value}")));
    }
    Ok(())
}

fn parse_quality(raw: &str) -> Result<Quality> {
    let value = parse_integer("quality", raw)?;
    let value = u32::try_from(value)
        .map_err(|_| invalid(format!("quality must be 1-100, got {raw}")))?;
    Quality::new(value)
}

fn parse_format(raw: &str) -> Result<ImageFormat> {
    if raw.is_empty() {
        return Err(invalid("format must not be empty"));
    }
    ImageFormat::from_param(raw).ok_or_else(|| TransformError::UnsupportedFormat(raw.to_string()))
}

/// Decimal integer, optional leading sign. Values beyond `u64` still parse as
/// "out of range" rather than "not a number" so the reason stays accurate.
fn parse_integer(name: &str, raw: &str) -> Result<u64> {
    if raw.is_empty() {
        return Err(invalid(format!("{name} must not be empty")));
    }
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    if let Some(negative) = digits.strip_prefix('-') {
        if !negative.is_empty() && negative.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(format!("{name} must be positive, got {raw}")));
        }
    }
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(format!("{name} must be an integer, got '{raw}'")));
    }
    Ok(digits.parse::<u64>().unwrap_or(u64::MAX))
}

fn invalid(msg: impl Into<String>) -> TransformError {
    TransformError::InvalidParameter(msg.into())
}
