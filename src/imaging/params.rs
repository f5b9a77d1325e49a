//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module,
//! the pure [`calculations`](super::calculations) and the
//! [`render`](super::render) stage that does the pixel work.
//!
//! ## Types
//!
//! - [`OutputFormat`]: Target encoding, parsed from `gif|png|jpg|jpeg|webp`.
//! - [`Quality`]: Lossy encoding quality (0–100). Clamped on construction.
//! - [`QualitySettings`]: Per-format encoder settings, built once from config.
//! - [`GenerationMethod`]: Which axis drives the scale factor.
//! - [`QualityMode`]: Store-wide PNG override policy.
//! - [`Rotation`]: Orientation correction applied before drawing.
//! - [`ResizeRequest`] / [`CutRequest`]: Everything one call needs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Output encoding for a resize or crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Gif,
    Png,
    Jpeg,
    WebP,
}

impl OutputFormat {
    /// The format token written to the `fileType` marker.
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Gif => "gif",
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Gif => "image/gif",
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::WebP => "image/webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown image format '{0}', expected one of gif, png, jpg, jpeg, webp")]
pub struct UnknownFormat(pub String);

impl FromStr for OutputFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gif" => Ok(OutputFormat::Gif),
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "webp" => Ok(OutputFormat::WebP),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Quality setting for lossy image encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Encoder settings for every output format.
///
/// GIF has no knob: it is always written losslessly (palette quantized).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualitySettings {
    /// zlib-style compression level, 0 (none) to 9 (best).
    pub png_compression: u8,
    pub jpeg: Quality,
    pub webp: Quality,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            png_compression: 9,
            jpeg: Quality::new(90),
            webp: Quality::new(80),
        }
    }
}

/// Policy selecting which axis drives the scale factor when the source and
/// requested aspect ratios differ.
///
/// Stored in configuration as the integers `0`, `1`, `2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GenerationMethod {
    /// Pick the axis from the ratio comparison and letterbox the other one.
    #[default]
    Auto,
    /// Always scale by width; the canvas height follows the content.
    WidthPriority,
    /// Always scale by height; the canvas width follows the content.
    HeightPriority,
}

impl TryFrom<u8> for GenerationMethod {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GenerationMethod::Auto),
            1 => Ok(GenerationMethod::WidthPriority),
            2 => Ok(GenerationMethod::HeightPriority),
            other => Err(format!("generation method must be 0, 1 or 2 (got {other})")),
        }
    }
}

impl From<GenerationMethod> for u8 {
    fn from(method: GenerationMethod) -> Self {
        match method {
            GenerationMethod::Auto => 0,
            GenerationMethod::WidthPriority => 1,
            GenerationMethod::HeightPriority => 2,
        }
    }
}

/// Store-wide output format override.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMode {
    /// Keep the requested format.
    #[default]
    Jpg,
    /// Keep PNG sources as PNG unless the caller forces the format.
    Png,
    /// Write everything except WebP as PNG.
    PngAll,
}

/// Orientation correction derived from the EXIF orientation tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    /// EXIF 6: turn 90° clockwise.
    Clockwise,
    /// EXIF 8: turn 90° counter-clockwise.
    CounterClockwise,
    /// EXIF 3.
    UpsideDown,
}

impl Rotation {
    /// Signed angle, counter-clockwise positive.
    pub fn degrees(self) -> i32 {
        match self {
            Rotation::None => 0,
            Rotation::Clockwise => -90,
            Rotation::CounterClockwise => 90,
            Rotation::UpsideDown => 180,
        }
    }

    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Clockwise | Rotation::CounterClockwise)
    }
}

/// Parameters for a letterboxed resize.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// `None` or `Some(0)` means "use the source width".
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: OutputFormat,
    /// Bypass the `png` quality mode for PNG sources.
    pub force_format: bool,
}

impl ResizeRequest {
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        format: OutputFormat,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            width: None,
            height: None,
            format,
            force_format: false,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// Parameters for a region crop.
#[derive(Debug, Clone, PartialEq)]
pub struct CutRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Region size; `None` or `Some(0)` means "use the source size".
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: OutputFormat,
    /// Top-left corner of the region in the source.
    pub x: u32,
    pub y: u32,
}
