//! Service configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Configuration is
//! layered: stock defaults, then the user's config file, then environment
//! overrides. The result is fixed at startup; the engine only ever sees the
//! derived [`Limits`], shared read-only.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! bind = "0.0.0.0"
//! port = 8080
//!
//! [limits]
//! max_dimension = 4096        # ceiling for requested, decoded and output sides
//! max_input_bytes = 10485760  # originals above this are refused (10 MiB)
//! default_quality = 80        # used when `q` is absent
//!
//! [encoding]
//! avif_speed = 4              # rav1e preset, 1 (slow, small) to 10 (fast)
//!
//! [storage]
//! backend = "local"           # "local" | "s3" | "memory"
//! root = "originals"          # local backend directory
//! # bucket = "images"         # s3 backend
//! # region = "auto"
//! # endpoint = "https://<account>.r2.cloudflarestorage.com"
//!
//! [logging]
//! format = "json"             # "json" | "pretty"
//! filter = "info"             # used when RUST_LOG is unset
//!
//! [processing]
//! max_processes = 4           # CLI batch workers (omit for auto = CPU cores)
//! ```
//!
//! ## Environment Overrides
//!
//! | Variable | Overrides |
//! |---|---|
//! | `PORT` | `server.port` |
//! | `IMGFORGE_BIND` | `server.bind` |
//! | `IMGFORGE_STORAGE_ROOT` | `storage.root` (and selects the local backend) |
//! | `IMGFORGE_BUCKET` | `storage.bucket` (and selects the s3 backend) |
//! | `IMGFORGE_ENDPOINT` | `storage.endpoint` |
//! | `IMGFORGE_REGION` | `storage.region` |
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::params::{MAX_DIMENSION, MAX_INPUT_BYTES};
use crate::imaging::{Limits, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// HTTP listener.
    pub server: ServerConfig,
    /// Transform bounds.
    pub limits: LimitsConfig,
    /// Encoder tuning.
    pub encoding: EncodingConfig,
    /// Where originals are fetched from.
    pub storage: StorageConfig,
    /// Log output.
    pub logging: LoggingConfig,
    /// Parallel processing settings (CLI batch mode).
    pub processing: ProcessingConfig,
}

impl ServiceConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        if limits.max_dimension == 0 || limits.max_dimension > MAX_DIMENSION {
            return Err(ConfigError::Validation(format!(
                "limits.max_dimension must be 1-{MAX_DIMENSION}"
            )));
        }
        if limits.max_input_bytes == 0 || limits.max_input_bytes > MAX_INPUT_BYTES {
            return Err(ConfigError::Validation(format!(
                "limits.max_input_bytes must be 1-{MAX_INPUT_BYTES}"
            )));
        }
        if !(1..=100).contains(&limits.default_quality) {
            return Err(ConfigError::Validation(
                "limits.default_quality must be 1-100".into(),
            ));
        }
        if !(1..=10).contains(&self.encoding.avif_speed) {
            return Err(ConfigError::Validation(
                "encoding.avif_speed must be 1-10".into(),
            ));
        }
        if self.storage.backend == StorageBackend::S3
            && self.storage.bucket.as_deref().is_none_or(str::is_empty)
        {
            return Err(ConfigError::Validation(
                "storage.bucket is required for the s3 backend".into(),
            ));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Validation(
                "logging.filter must not be empty".into(),
            ));
        }
        self.server.socket_addr()?;
        Ok(())
    }

    /// The engine's read-only bounds.
    pub fn limits(&self) -> Result<Limits, ConfigError> {
        let default_quality = Quality::new(self.limits.default_quality)
            .map_err(|e| ConfigError::Validation(format!("limits.default_quality: {e}")))?;
        Ok(Limits {
            max_dimension: self.limits.max_dimension,
            max_input_bytes: self.limits.max_input_bytes,
            default_quality,
            avif_speed: self.encoding.avif_speed,
        })
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.bind.parse().map_err(|_| {
            ConfigError::Validation(format!("server.bind '{}' is not an IP address", self.bind))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Transform bounds. These are ceilings: a config may tighten them, never
/// loosen them past 4096 px / 10 MiB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub max_dimension: u32,
    pub max_input_bytes: u64,
    pub default_quality: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            max_dimension: limits.max_dimension,
            max_input_bytes: limits.max_input_bytes,
            default_quality: u32::from(limits.default_quality.value()),
        }
    }
}

/// Encoder tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    /// rav1e speed preset: 1 is slowest/smallest, 10 fastest.
    pub avif_speed: u8,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            avif_speed: Limits::default().avif_speed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    S3,
    Memory,
}

/// Object storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory holding originals (local backend).
    pub root: PathBuf,
    /// Bucket name (s3 backend).
    pub bucket: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible providers (R2, MinIO).
    pub endpoint: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            root: PathBuf::from("originals"),
            bucket: None,
            region: None,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            filter: "info".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Stock defaults as a TOML value, the base layer for merging.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ServiceConfig::default())?)
}

/// Deep-merge `overlay` onto `base`. Tables merge key by key; any other
/// value in the overlay replaces the base value outright.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. A missing file is `None`.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the base and deserialize the result.
///
/// Validation is left to the caller so environment overrides can be applied
/// first.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ServiceConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    Ok(merged.try_into()?)
}

/// Apply environment overrides via `lookup` (normally `std::env::var`).
pub fn apply_env_overrides<F>(config: &mut ServiceConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        config.server.port = port
            .parse()
            .map_err(|_| ConfigError::Validation(format!("PORT '{port}' is not a valid port")))?;
    }
    if let Some(bind) = lookup("IMGFORGE_BIND") {
        config.server.bind = bind;
    }
    if let Some(root) = lookup("IMGFORGE_STORAGE_ROOT") {
        config.storage.backend = StorageBackend::Local;
        config.storage.root = PathBuf::from(root);
    }
    if let Some(bucket) = lookup("IMGFORGE_BUCKET") {
        config.storage.backend = StorageBackend::S3;
        config.storage.bucket = Some(bucket);
    }
    if let Some(endpoint) = lookup("IMGFORGE_ENDPOINT") {
        config.storage.endpoint = Some(endpoint);
    }
    if let Some(region) = lookup("IMGFORGE_REGION") {
        config.storage.region = Some(region);
    }
    Ok(())
}

/// Load the full configuration: defaults, file, environment, validation.
///
/// An explicitly given `path` must exist. Without one, `config.toml` in the
/// working directory is used if present.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let overlay = match path {
        Some(p) => {
            let raw = load_raw_config(p)?;
            if raw.is_none() {
                return Err(ConfigError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("config file not found: {}", p.display()),
                )));
            }
            raw
        }
        None => load_raw_config(Path::new(DEFAULT_CONFIG_FILE))?,
    };
    let mut config = resolve_config(stock_defaults_value()?, overlay)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

/// A fully commented stock `config.toml`, printed by `imgforge gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# imgforge configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.
# Environment variables override the file: PORT, IMGFORGE_BIND,
# IMGFORGE_STORAGE_ROOT, IMGFORGE_BUCKET, IMGFORGE_ENDPOINT, IMGFORGE_REGION.

# ---------------------------------------------------------------------------
# HTTP listener
# ---------------------------------------------------------------------------
[server]
bind = "0.0.0.0"
port = 8080

# ---------------------------------------------------------------------------
# Transform bounds (hard ceilings: 4096 px, 10 MiB)
# ---------------------------------------------------------------------------
[limits]
# Largest width/height accepted in a request, decoded from an original, or
# produced by a resize.
max_dimension = 4096

# Originals larger than this many bytes are refused.
max_input_bytes = 10485760

# Encoding quality when the request has no `q` (1 = worst, 100 = best).
default_quality = 80

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[encoding]
# rav1e speed preset for AVIF output: 1 (slow, small) to 10 (fast, larger).
avif_speed = 4

# ---------------------------------------------------------------------------
# Object storage
# ---------------------------------------------------------------------------
[storage]
# "local" reads from `root`; "s3" reads from `bucket` (credentials from the
# standard AWS_* environment); "memory" starts empty (testing only).
backend = "local"
root = "originals"
# bucket = "images"
# region = "auto"
# endpoint = "https://<account>.r2.cloudflarestorage.com"

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# "json" for log shippers, "pretty" for terminals.
format = "json"
# Filter directives, used when RUST_LOG is unset.
filter = "info"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for `imgforge transform`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn parse(toml_str: &str) -> Result<ServiceConfig, ConfigError> {
        let overlay: toml::Value = toml::from_str(toml_str)?;
        resolve_config(stock_defaults_value()?, Some(overlay))
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    // =========================================================================
    // defaults and parsing
    // =========================================================================

    #[test]
    fn default_config_matches_engine_bounds() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.limits.max_dimension, 4096);
        assert_eq!(config.limits.max_input_bytes, 10 * 1024 * 1024);
        assert_eq!(config.limits.default_quality, 80);
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.limits().unwrap(), Limits::default());
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(ServiceConfig::default().validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let config = parse(
            r#"
            [limits]
            default_quality = 65

            [storage]
            backend = "s3"
            bucket = "photos"
            endpoint = "http://localhost:9000"
        "#,
        )
        .unwrap();

        assert_eq!(config.limits.default_quality, 65);
        assert_eq!(config.limits.max_dimension, 4096);
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.bucket.as_deref(), Some("photos"));
        assert_eq!(config.server, ServerConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_key_rejected() {
        assert!(parse("[limits]\nmax_width = 10\n").is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        assert!(parse("[cache]\nttl = 10\n").is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        assert!(parse("[storage]\nbackend = \"ftp\"\n").is_err());
    }

    // =========================================================================
    // validation
    // =========================================================================

    #[test]
    fn validate_limits_cannot_exceed_ceilings() {
        let too_wide = parse("[limits]\nmax_dimension = 8192\n").unwrap();
        assert!(matches!(
            too_wide.validate(),
            Err(ConfigError::Validation(_))
        ));

        let too_big = parse("[limits]\nmax_input_bytes = 20000000\n").unwrap();
        assert!(too_big.validate().is_err());

        let tighter = parse("[limits]\nmax_dimension = 2048\nmax_input_bytes = 1000\n").unwrap();
        assert!(tighter.validate().is_ok());
        assert_eq!(tighter.limits().unwrap().max_dimension, 2048);
    }

    #[test]
    fn validate_quality_and_speed() {
        assert!(parse("[limits]\ndefault_quality = 0\n").unwrap().validate().is_err());
        assert!(parse("[limits]\ndefault_quality = 101\n").unwrap().validate().is_err());
        assert!(parse("[limits]\ndefault_quality = 100\n").unwrap().validate().is_ok());
        assert!(parse("[encoding]\navif_speed = 0\n").unwrap().validate().is_err());
        assert!(parse("[encoding]\navif_speed = 11\n").unwrap().validate().is_err());
    }

    #[test]
    fn validate_s3_requires_bucket() {
        let config = parse("[storage]\nbackend = \"s3\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_bind_address() {
        let config = parse("[server]\nbind = \"not-an-ip\"\n").unwrap();
        assert!(config.validate().is_err());

        let config = parse("[server]\nbind = \"127.0.0.1\"\nport = 9000\n").unwrap();
        assert_eq!(
            config.server.socket_addr().unwrap(),
            "127.0.0.1:9000".parse().unwrap()
        );
    }

    // =========================================================================
    // environment overrides
    // =========================================================================

    #[test]
    fn env_overrides_apply_after_file() {
        let env: HashMap<&str, &str> = [
            ("PORT", "3000"),
            ("IMGFORGE_BUCKET", "originals"),
            ("IMGFORGE_REGION", "auto"),
        ]
        .into_iter()
        .collect();

        let mut config = parse("[server]\nport = 9000\n").unwrap();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.bucket.as_deref(), Some("originals"));
        assert_eq!(config.storage.region.as_deref(), Some("auto"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_storage_root_selects_local() {
        let mut config = parse("[storage]\nbackend = \"memory\"\n").unwrap();
        apply_env_overrides(&mut config, |k| {
            (k == "IMGFORGE_STORAGE_ROOT").then(|| "/srv/images".to_string())
        })
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.root, PathBuf::from("/srv/images"));
    }

    #[test]
    fn invalid_port_env_is_error() {
        let mut config = ServiceConfig::default();
        let result =
            apply_env_overrides(&mut config, |k| (k == "PORT").then(|| "http".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn no_env_changes_nothing() {
        let mut config = ServiceConfig::default();
        apply_env_overrides(&mut config, no_env).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    // =========================================================================
    // files
    // =========================================================================

    #[test]
    fn load_raw_config_returns_none_when_no_file() {
        let tmp = TempDir::new().unwrap();
        assert!(load_raw_config(&tmp.path().join("config.toml")).unwrap().is_none());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("imgforge.toml");
        fs::write(&path, "[limits]\ndefault_quality = 70\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.limits.default_quality, 70);
    }

    #[test]
    fn load_config_missing_explicit_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(Some(&tmp.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[limits\nbroken").unwrap();
        assert!(matches!(load_config(Some(&path)), Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // merging
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\nz = 4\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
        assert_eq!(merged["a"]["z"].as_integer(), Some(4));
    }

    #[test]
    fn merge_toml_scalar_override() {
        let merged = merge_toml(toml::Value::Integer(1), toml::Value::Integer(2));
        assert_eq!(merged.as_integer(), Some(2));
    }

    // =========================================================================
    // stock config and threads
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let value: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config: ServiceConfig = value.try_into().unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value().unwrap();
        for section in ["server", "limits", "encoding", "storage", "logging", "processing"] {
            assert!(value.get(section).is_some(), "missing [{section}]");
        }
    }

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(cores + 100),
        };
        assert_eq!(effective_threads(&config), cores);
    }
}
