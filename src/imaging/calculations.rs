//! Pure calculation functions for resize geometry and policy decisions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::{Dimensions, SourceInfo};
use super::params::{GenerationMethod, OutputFormat, QualityMode, Rotation};
use serde::Serialize;

/// Geometry of one letterboxed resize.
///
/// The content (scaled source) is drawn at `(offset_x, offset_y)` inside a
/// canvas of `canvas_width × canvas_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FitPlan {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub content_width: u32,
    pub content_height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl FitPlan {
    pub fn canvas(&self) -> Dimensions {
        Dimensions::new(self.canvas_width, self.canvas_height)
    }

    pub fn content(&self) -> Dimensions {
        Dimensions::new(self.content_width, self.content_height)
    }
}

/// Calculate canvas size, content size and centring offsets.
///
/// A requested dimension of `0` means "same as the source". Sources are
/// never upscaled: when both ratios exceed 1 the content keeps the source
/// size and is centred on the larger canvas.
///
/// Otherwise the scaling axis is height for [`GenerationMethod::HeightPriority`]
/// or for [`GenerationMethod::Auto`] when `w_ratio > h_ratio` (strict, no
/// epsilon), and width in every other case. Under `Auto` the canvas keeps
/// the requested size on both axes; under an explicit method the canvas
/// follows the content on the non-driving axis. The derived content
/// dimension is rounded to the nearest pixel and never drops below 1.
///
/// # Examples
/// ```
/// # use catalog_image::imaging::{plan_fit, Dimensions, GenerationMethod};
/// let plan = plan_fit(Dimensions::new(800, 600), 400, 400, GenerationMethod::Auto);
/// assert_eq!((plan.content_width, plan.content_height), (400, 300));
/// assert_eq!((plan.canvas_width, plan.canvas_height), (400, 400));
/// assert_eq!((plan.offset_x, plan.offset_y), (0, 50));
/// ```
pub fn plan_fit(
    source: Dimensions,
    requested_width: u32,
    requested_height: u32,
    method: GenerationMethod,
) -> FitPlan {
    let Dimensions {
        width: src_w,
        height: src_h,
    } = source;

    let mut canvas_w = if requested_width == 0 {
        src_w
    } else {
        requested_width
    };
    let mut canvas_h = if requested_height == 0 {
        src_h
    } else {
        requested_height
    };

    let w_ratio = canvas_w as f64 / src_w as f64;
    let h_ratio = canvas_h as f64 / src_h as f64;

    let (content_w, content_h) = if w_ratio > 1.0 && h_ratio > 1.0 {
        (src_w, src_h)
    } else if method == GenerationMethod::HeightPriority
        || (method == GenerationMethod::Auto && w_ratio > h_ratio)
    {
        let h = canvas_h;
        let w = ((src_w as f64 * h as f64 / src_h as f64).round() as u32).max(1);
        if method != GenerationMethod::Auto {
            canvas_w = w;
        }
        (w, h)
    } else {
        let w = canvas_w;
        let h = ((src_h as f64 * w as f64 / src_w as f64).round() as u32).max(1);
        if method != GenerationMethod::Auto {
            canvas_h = h;
        }
        (w, h)
    };

    FitPlan {
        canvas_width: canvas_w,
        canvas_height: canvas_h,
        content_width: content_w,
        content_height: content_h,
        offset_x: canvas_w.saturating_sub(content_w) / 2,
        offset_y: canvas_h.saturating_sub(content_h) / 2,
    }
}

/// Effective source geometry after orientation correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrientationResult {
    pub effective: Dimensions,
    pub rotation: Rotation,
}

/// Map an EXIF orientation tag onto a rotation and effective dimensions.
///
/// Only the pure rotations are honoured: 3 (180°), 6 (90° clockwise) and
/// 8 (90° counter-clockwise). Mirrored variants and absent tags leave the
/// image as decoded.
pub fn resolve_orientation(decoded: Dimensions, tag: Option<u32>) -> OrientationResult {
    let rotation = match tag {
        Some(3) => Rotation::UpsideDown,
        Some(6) => Rotation::Clockwise,
        Some(8) => Rotation::CounterClockwise,
        _ => Rotation::None,
    };
    let effective = if rotation.swaps_axes() {
        decoded.swapped()
    } else {
        decoded
    };
    OrientationResult {
        effective,
        rotation,
    }
}

/// Fixed allocator overhead added to every decode estimate.
const DECODE_OVERHEAD_BYTES: u64 = 65_536;
/// Headroom kept free below the configured limit.
const LIMIT_HEADROOM_BYTES: u64 = 1_048_576;
/// Working-copy multiplier applied to the raw pixel buffer.
const DECODE_TWEAK_FACTOR: f64 = 1.8;

/// Estimate the memory needed to decode and resample a source.
pub fn estimate_decode_memory(info: &SourceInfo) -> u64 {
    let pixels = u64::from(info.dimensions.width) * u64::from(info.dimensions.height);
    let raw = pixels * u64::from(info.bytes_per_pixel) + DECODE_OVERHEAD_BYTES;
    (raw as f64 * DECODE_TWEAK_FACTOR).ceil() as u64
}

/// Bytes of an RGBA canvas of `size`.
///
/// `None` when the buffer could not be addressed at all, which no memory
/// limit can allow.
pub fn canvas_memory(size: Dimensions) -> Option<u64> {
    (u64::from(size.width) * u64::from(size.height))
        .checked_mul(4)
        .filter(|&bytes| bytes <= isize::MAX as u64)
}

/// Decode estimate plus the output canvas. `None` when the canvas is not
/// addressable.
pub fn estimate_resize_memory(info: &SourceInfo, canvas: Dimensions) -> Option<u64> {
    canvas_memory(canvas).map(|bytes| estimate_decode_memory(info).saturating_add(bytes))
}

/// Whether an operation needing `required` bytes would blow the budget.
///
/// An unaddressable requirement (`None`) always exceeds. A `None` limit
/// means no limit is configured and any addressable requirement passes.
pub fn exceeds_memory_limit(required: Option<u64>, limit_bytes: Option<u64>) -> bool {
    match (required, limit_bytes) {
        (None, _) => true,
        (Some(required), Some(limit)) => required > limit.saturating_sub(LIMIT_HEADROOM_BYTES),
        (Some(_), None) => false,
    }
}

/// Apply the store-wide quality mode to the requested output format.
///
/// WebP requests are never overridden. `png_all` turns everything else into
/// PNG, even when the caller forces the format; `png` keeps PNG sources as
/// PNG unless forced.
pub fn resolve_output_format(
    requested: OutputFormat,
    source_is_png: bool,
    mode: QualityMode,
    force_format: bool,
) -> OutputFormat {
    if requested == OutputFormat::WebP {
        return requested;
    }
    match mode {
        QualityMode::PngAll => OutputFormat::Png,
        QualityMode::Png if source_is_png && !force_format => OutputFormat::Png,
        _ => requested,
    }
}

/// Whether the canvas starts fully transparent instead of opaque white.
pub fn uses_transparent_background(format: OutputFormat, source_is_png: bool) -> bool {
    (format == OutputFormat::Png && source_is_png) || format == OutputFormat::WebP
}

/// Whether the draw can use nearest-neighbour sampling: true when the
/// canvas is at least as large as the source on both axes, so no real
/// downscale happens.
pub fn uses_fast_resampling(canvas: Dimensions, source: Dimensions) -> bool {
    canvas.width >= source.width && canvas.height >= source.height
}
