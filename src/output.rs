//! CLI output formatting.
//!
//! Each command has a `format_*` function returning `Vec<String>` so the
//! text can be tested without capturing stdout, and a `print_*` wrapper
//! that writes it.
//!
//! ## Transform
//!
//! ```text
//! photos/dawn.jpg → out/dawn.webp
//!     300x169 webp, 12.4 KB
//! photos/broken.jpg
//!     failed: decode failed: ...
//!
//! Transformed 1 file, 1 failed
//! ```
//!
//! ## Identify
//!
//! ```text
//! photos/dawn.jpg
//!     Format: jpeg (image/jpeg)
//!     Size: 1920x1080
//!     Metadata: EXIF, XMP
//! ```

use crate::batch::{BatchEvent, BatchSummary};
use crate::imaging::{Dimensions, ImageFormat, MetadataKind};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn human_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// transform
// ============================================================================

pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Transformed {
            source,
            output,
            format,
            size,
            bytes,
        } => {
            let detail = match size {
                Some(d) => format!("{}x{} {}, {}", d.width, d.height, format, human_bytes(*bytes)),
                None => format!("{} unchanged, {}", format, human_bytes(*bytes)),
            };
            vec![
                format!("{} \u{2192} {}", source.display(), output.display()),
                format!("{}{}", indent(1), detail),
            ]
        }
        BatchEvent::Failed { source, error } => vec![
            source.display().to_string(),
            format!("{}failed: {}", indent(1), error),
        ],
    }
}

pub fn format_batch_summary(summary: &BatchSummary) -> Vec<String> {
    let mut line = format!("Transformed {}", plural(summary.transformed, "file"));
    if summary.failed > 0 {
        line.push_str(&format!(", {} failed", summary.failed));
    }
    vec![String::new(), line]
}

pub fn print_batch_summary(summary: &BatchSummary) {
    for line in format_batch_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// identify
// ============================================================================

pub fn format_identify(
    path: &Path,
    format: ImageFormat,
    dims: Dimensions,
    metadata: &[MetadataKind],
) -> Vec<String> {
    let metadata = if metadata.is_empty() {
        "none".to_string()
    } else {
        metadata
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    vec![
        path.display().to_string(),
        format!("{}Format: {} ({})", indent(1), format, format.content_type()),
        format!("{}Size: {}x{}", indent(1), dims.width, dims.height),
        format!("{}Metadata: {}", indent(1), metadata),
    ]
}

pub fn print_identify(
    path: &Path,
    format: ImageFormat,
    dims: Dimensions,
    metadata: &[MetadataKind],
) {
    for line in format_identify(path, format, dims, metadata) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
