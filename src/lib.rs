//! # imgforge
//!
//! On-the-fly image resizing and format conversion. An original is fetched
//! by key, decoded, optionally scaled to fit a box, re-encoded in the
//! requested format and quality, and returned with all ancillary metadata
//! removed.
//!
//! ```text
//! GET /transform/photos/dawn.jpg?w=300&f=webp&q=75
//!         │
//!   validation ── key + w/h/f/q → TransformRequest
//!         │
//!   storage ───── ObjectSource::fetch(key) → bytes
//!         │
//!   engine ────── sniff → decode → contain-fit → resize → encode → strip
//!         │
//!   server ────── 200 image/webp, immutable, ETag
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`validation`] | Raw query/CLI strings to typed, bounded parameters; object key checks |
//! | [`engine`] | The transform orchestrator and its short-circuit shapes |
//! | [`imaging`] | Codecs, format sniffing, contain-fit geometry, resampling, metadata stripping |
//! | [`error`] | The error taxonomy every failure is reported in |
//! | [`storage`] | Fetch-by-key over `object_store` (local, S3, memory) |
//! | [`server`] | axum routes, response headers, error bodies, graceful shutdown |
//! | [`batch`] | Parallel local transforms for the CLI |
//! | [`config`] | `config.toml` loading, environment overrides, validation |
//! | [`telemetry`] | `tracing` subscriber setup |
//! | [`output`] | CLI output formatting |
//!
//! # Bounds
//!
//! Nothing larger than 4096×4096 pixels is decoded or produced, no input
//! above 10 MiB is read, and quality is always within 1..=100. The config
//! file may tighten these, never loosen them.
//!
//! # Pure-Rust Codecs
//!
//! JPEG and PNG go through the `image` crate, WebP through libwebp via the
//! `webp` crate, AVIF decode through `rav1d` and AVIF encode through `rav1e`.
//! Metadata is removed at the container level with `img-parts` after
//! encoding, so the guarantee holds regardless of what an encoder emits.

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod imaging;
pub mod output;
pub mod server;
pub mod storage;
pub mod telemetry;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_helpers;
