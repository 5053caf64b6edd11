//! Local batch transforms for `imgforge transform`.
//!
//! Inputs are files or directories. Directories are expanded to the images
//! inside them (one level, or the whole tree with `recursive`), keeping the
//! path relative to the directory so outputs mirror the input layout:
//!
//! ```text
//! photos/                       out/
//! ├── dawn.jpg        →         ├── dawn.webp
//! └── trips/                    └── trips/
//!     └── rome.png    →             └── rome.webp
//! ```
//!
//! Files run in parallel on the rayon pool through the same [`Engine`] the
//! HTTP service uses. A failing file is reported and counted; it does not
//! stop the batch.

use crate::engine::Engine;
use crate::imaging::{Dimensions, ImageBackend, ImageFormat, TransformParams};
use bytes::Bytes;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("input not found: {0}")]
    InputNotFound(PathBuf),
}

/// One image to transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path under the output directory, before the extension is replaced.
    pub relative: PathBuf,
}

/// Progress reported per file while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    Transformed {
        source: PathBuf,
        output: PathBuf,
        format: ImageFormat,
        size: Option<Dimensions>,
        bytes: usize,
    },
    Failed {
        source: PathBuf,
        error: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub transformed: usize,
    pub failed: usize,
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| matches!(e.as_str(), "jpg" | "jpeg" | "png" | "webp" | "avif"))
}

/// Expand `inputs` into the list of images to transform, sorted by path
/// within each directory.
pub fn collect_inputs(inputs: &[PathBuf], recursive: bool) -> Result<Vec<SourceFile>, BatchError> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            let name = input
                .file_name()
                .map(PathBuf::from)
                .ok_or_else(|| BatchError::InputNotFound(input.clone()))?;
            files.push(SourceFile {
                path: input.clone(),
                relative: name,
            });
        } else if input.is_dir() {
            let depth = if recursive { usize::MAX } else { 1 };
            for entry in WalkDir::new(input).max_depth(depth).sort_by_file_name() {
                let entry = entry?;
                if !entry.file_type().is_file() || !has_image_extension(entry.path()) {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(input)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| PathBuf::from(entry.file_name()));
                files.push(SourceFile {
                    path: entry.path().to_path_buf(),
                    relative,
                });
            }
        } else {
            return Err(BatchError::InputNotFound(input.clone()));
        }
    }
    Ok(files)
}

/// Where `source` lands once encoded as `format`.
pub fn output_path(source: &SourceFile, out_dir: &Path, format: ImageFormat) -> PathBuf {
    out_dir
        .join(&source.relative)
        .with_extension(format.extension())
}

/// Transform every file in `files` into `out_dir`.
///
/// Per-file failures are sent as [`BatchEvent::Failed`] and counted in the
/// summary. Only failing to create `out_dir` aborts the batch.
pub fn run<B: ImageBackend>(
    engine: &Engine<B>,
    files: &[SourceFile],
    out_dir: &Path,
    params: &TransformParams,
    events: Option<Sender<BatchEvent>>,
) -> Result<BatchSummary, BatchError> {
    std::fs::create_dir_all(out_dir)?;

    let results: Vec<bool> = files
        .par_iter()
        .map(|file| {
            let event = match transform_file(engine, file, out_dir, params) {
                Ok(event) => event,
                Err(error) => {
                    tracing::warn!(source = %file.path.display(), %error, "transform failed");
                    BatchEvent::Failed {
                        source: file.path.clone(),
                        error,
                    }
                }
            };
            let ok = matches!(event, BatchEvent::Transformed { .. });
            if let Some(tx) = &events {
                // A dropped receiver only means nobody is printing.
                let _ = tx.send(event);
            }
            ok
        })
        .collect();

    let transformed = results.iter().filter(|ok| **ok).count();
    Ok(BatchSummary {
        transformed,
        failed: results.len() - transformed,
    })
}

fn transform_file<B: ImageBackend>(
    engine: &Engine<B>,
    file: &SourceFile,
    out_dir: &Path,
    params: &TransformParams,
) -> Result<BatchEvent, String> {
    let len = std::fs::metadata(&file.path)
        .map_err(|e| e.to_string())?
        .len();
    engine.check_size(len).map_err(|e| e.to_string())?;
    let data = std::fs::read(&file.path).map_err(|e| e.to_string())?;

    let output = engine
        .transform(Bytes::from(data), params)
        .map_err(|e| e.to_string())?;

    let target = output_path(file, out_dir, output.format);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    std::fs::write(&target, &output.bytes).map_err(|e| e.to_string())?;

    Ok(BatchEvent::Transformed {
        source: file.path.clone(),
        output: target,
        format: output.format,
        size: output.output_size,
        bytes: output.bytes.len(),
    })
}
