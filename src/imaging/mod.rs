//! Image processing: letterboxed resize and region crop.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader` header decode |
//! | **EXIF orientation** | `kamadak-exif` |
//! | **Resample** | `image::imageops::resize` (Nearest / Triangle) |
//! | **Encode** | `image` GIF and PNG encoders, `jpeg-encoder` (progressive), `webp` (lossy) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for geometry and policy (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Render**: Canvas drawing and encoding via [`Renderer`]
//! - **Operations**: [`ImageProcessor`], the resize pipeline

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod render;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, ImageHandle, SourceInfo};
pub use calculations::{
    FitPlan, OrientationResult, canvas_memory, estimate_decode_memory, estimate_resize_memory,
    exceeds_memory_limit, plan_fit, resolve_orientation, resolve_output_format,
    uses_fast_resampling, uses_transparent_background,
};
pub use operations::{
    ImageProcessor, ProcessorSettings, ResizeError, ResizeOutcome, ResizePreview,
};
pub use params::{
    CutRequest, GenerationMethod, OutputFormat, Quality, QualityMode, QualitySettings,
    ResizeRequest, Rotation, UnknownFormat,
};
pub use render::{FORMAT_MARKER_FILENAME, Renderer};
pub use rust_backend::RustBackend;
