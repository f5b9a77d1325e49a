//! Imaging configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. The user file is
//! layered on top of the stock defaults, so it only needs the keys it wants
//! to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [images]
//! quality_mode = "jpg"         # "jpg", "png" or "png_all"
//! generation_method = 0        # 0 auto, 1 width priority, 2 height priority
//!
//! [quality]
//! png = 9                      # zlib compression level (0-9)
//! jpeg = 90                    # JPEG quality (0-100)
//! webp = 80                    # WebP quality (0-100)
//!
//! [limits]
//! memory_limit_mb = 128        # Decode + canvas budget, 0 disables the check
//!
//! [upload]
//! max_size_bytes = 8388608     # 0 disables the size check
//! allowed_extensions = ["gif", "jpg", "jpeg", "jpe", "png", "webp"]
//!
//! [sniffing]
//! external_probes = true       # Ask xdg-mime / file when installed
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{
    GenerationMethod, ProcessorSettings, Quality, QualityMode, QualitySettings,
};
use crate::upload::DEFAULT_EXTENSIONS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagingConfig {
    /// Output format policy and fit strategy.
    pub images: ImagesConfig,
    /// Per-format encoder settings.
    pub quality: QualityConfig,
    /// Resource limits.
    pub limits: LimitsConfig,
    /// Upload gate settings.
    pub upload: UploadConfig,
    /// Content-type detection.
    pub sniffing: SniffingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub quality_mode: QualityMode,
    pub generation_method: GenerationMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    /// zlib compression level, 0-9.
    pub png: u32,
    /// JPEG quality, 0-100.
    pub jpeg: u32,
    /// WebP quality, 0-100.
    pub webp: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            png: 9,
            jpeg: 90,
            webp: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Memory available for one operation (decoded source plus canvas), in
    /// MiB. `0` disables the check.
    pub memory_limit_mb: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            memory_limit_mb: 128,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Largest accepted upload. `0` disables the check.
    pub max_size_bytes: u64,
    /// Accepted file name extensions, lowercase, without the dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 8 * 1024 * 1024,
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SniffingConfig {
    /// Fall back to `xdg-mime` and `file` when they are on `PATH`.
    pub external_probes: bool,
}

impl Default for SniffingConfig {
    fn default() -> Self {
        Self {
            external_probes: true,
        }
    }
}

impl ImagingConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quality.png > 9 {
            return Err(ConfigError::Validation("quality.png must be 0-9".into()));
        }
        if self.quality.jpeg > 100 {
            return Err(ConfigError::Validation("quality.jpeg must be 0-100".into()));
        }
        if self.quality.webp > 100 {
            return Err(ConfigError::Validation("quality.webp must be 0-100".into()));
        }
        if self.upload.allowed_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "upload.allowed_extensions must not be empty".into(),
            ));
        }
        if let Some(bad) = self
            .upload
            .allowed_extensions
            .iter()
            .find(|e| e.is_empty() || e.starts_with('.') || e.chars().any(|c| c.is_uppercase()))
        {
            return Err(ConfigError::Validation(format!(
                "upload.allowed_extensions entry '{bad}' must be lowercase and without a dot"
            )));
        }
        Ok(())
    }

    /// Encoder settings handed to the renderer.
    pub fn quality_settings(&self) -> QualitySettings {
        QualitySettings {
            png_compression: self.quality.png.min(9) as u8,
            jpeg: Quality::new(self.quality.jpeg),
            webp: Quality::new(self.quality.webp),
        }
    }

    /// `None` when the memory check is disabled.
    pub fn memory_limit_bytes(&self) -> Option<u64> {
        (self.limits.memory_limit_mb > 0)
            .then(|| self.limits.memory_limit_mb.saturating_mul(1024 * 1024))
    }

    pub fn processor_settings(&self) -> ProcessorSettings {
        ProcessorSettings {
            generation_method: self.images.generation_method,
            quality_mode: self.images.quality_mode,
            memory_limit_bytes: self.memory_limit_bytes(),
            quality: self.quality_settings(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ImagingConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
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

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ImagingConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ImagingConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the TOML file at `path`.
///
/// A missing file yields the stock defaults. Unknown keys are rejected and
/// the result is validated.
pub fn load_config(path: &Path) -> Result<ImagingConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    let config = resolve_config(base, overlay)?;
    tracing::debug!(path = %path.display(), ?config, "configuration loaded");
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Catalog Image Configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output policy
# ---------------------------------------------------------------------------
[images]
# Store-wide format override:
#   "jpg"     - keep the requested format
#   "png"     - keep PNG sources as PNG unless the caller forces the format
#   "png_all" - write everything except WebP as PNG
quality_mode = "jpg"

# Which axis drives the scale factor when aspect ratios differ:
#   0 - auto: pick by ratio, keep the requested canvas and letterbox
#   1 - width priority: canvas height follows the content
#   2 - height priority: canvas width follows the content
generation_method = 0

# ---------------------------------------------------------------------------
# Encoder settings
# ---------------------------------------------------------------------------
[quality]
# PNG zlib compression level (0-9). 0-3 fast, 4-6 default, 7-9 best.
png = 9

# JPEG quality (0-100).
jpeg = 90

# WebP quality (0-100).
webp = 80

# ---------------------------------------------------------------------------
# Resource limits
# ---------------------------------------------------------------------------
[limits]
# Memory available for one operation, in MiB: the decoded source plus the
# output canvas. Requests whose estimate exceeds this (minus 1 MiB headroom)
# are refused before any pixels are read. 0 disables the check.
memory_limit_mb = 128

# ---------------------------------------------------------------------------
# Upload validation
# ---------------------------------------------------------------------------
[upload]
# Largest accepted upload in bytes. 0 disables the check.
max_size_bytes = 8388608

# Accepted file name extensions (lowercase, no dot).
allowed_extensions = ["gif", "jpg", "jpeg", "jpe", "png", "webp"]

# ---------------------------------------------------------------------------
# Content-type detection
# ---------------------------------------------------------------------------
[sniffing]
# Fall back to `xdg-mime query filetype` and `file --mime-type` when the
# built-in probes have no answer and the tools are installed.
external_probes = true
"##
}
