//! Canvas rendering and encoding.
//!
//! The [`Renderer`] owns the codec backend and the encoder settings. It
//! receives a decoded [`ImageHandle`] plus a [`FitPlan`] and does all pixel
//! work: canvas allocation, background fill, orientation correction,
//! resampling, drawing, and handing the canvas to the encoder.
//!
//! Handles are consumed by value, so the decoded source is released on every
//! return path, including encoder failures.

use super::backend::{Dimensions, ImageBackend, ImageHandle};
use super::calculations::{FitPlan, uses_fast_resampling};
use super::operations::ResizeError;
use super::params::{OutputFormat, QualitySettings, Rotation};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use std::path::Path;

/// File written next to every resized image, holding the chosen format.
pub const FORMAT_MARKER_FILENAME: &str = "fileType";

/// Permission bits applied to every encoded file.
#[cfg(unix)]
const OUTPUT_MODE: u32 = 0o664;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TRANSPARENT: Rgba<u8> = Rgba([255, 255, 255, 0]);

/// A blank canvas, white or fully transparent.
pub fn create_canvas(size: Dimensions, transparent: bool) -> RgbaImage {
    let fill = if transparent { TRANSPARENT } else { WHITE };
    RgbaImage::from_pixel(size.width, size.height, fill)
}

/// Make every exact-white pixel fully transparent.
///
/// Formats without alpha (JPEG) flatten these back to white on encode.
pub fn apply_white_color_key(canvas: &mut RgbaImage) {
    for pixel in canvas.pixels_mut() {
        if *pixel == WHITE {
            *pixel = TRANSPARENT;
        }
    }
}

/// Draws sources onto canvases and writes them through the backend.
pub struct Renderer<B> {
    backend: B,
    quality: QualitySettings,
}

impl<B: ImageBackend> Renderer<B> {
    pub fn new(backend: B, quality: QualitySettings) -> Self {
        Self { backend, quality }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn quality(&self) -> &QualitySettings {
        &self.quality
    }

    /// Render a letterboxed resize and write it to `destination`.
    ///
    /// Returns the number of bytes written. On success the format marker is
    /// refreshed in the destination directory.
    pub fn render(
        &self,
        mut source: ImageHandle,
        plan: &FitPlan,
        rotation: Rotation,
        format: OutputFormat,
        transparent: bool,
        destination: &Path,
    ) -> Result<u64, ResizeError> {
        let mut canvas = create_canvas(plan.canvas(), transparent);

        source.rotate(rotation);
        let source_size = source.dimensions();

        let filter = if uses_fast_resampling(plan.canvas(), source_size) {
            FilterType::Nearest
        } else {
            FilterType::Triangle
        };
        tracing::debug!(
            canvas = %plan.canvas(),
            content = %plan.content(),
            source = %source_size,
            ?filter,
            transparent,
            "drawing source onto canvas"
        );

        let content = imageops::resize(
            &source.image().to_rgba8(),
            plan.content_width,
            plan.content_height,
            filter,
        );
        drop(source);

        let (x, y) = (i64::from(plan.offset_x), i64::from(plan.offset_y));
        if transparent {
            imageops::replace(&mut canvas, &content, x, y);
        } else {
            imageops::overlay(&mut canvas, &content, x, y);
        }

        let written = self.write(canvas, format, destination)?;
        write_format_marker(destination, format);
        Ok(written)
    }

    /// Copy a `size` region starting at `origin` onto a white canvas and
    /// write it, with white as the transparent colour key.
    ///
    /// The region is clipped to the source; uncovered canvas stays white.
    pub fn cut(
        &self,
        source: ImageHandle,
        size: Dimensions,
        origin: (u32, u32),
        format: OutputFormat,
        destination: &Path,
    ) -> Result<u64, ResizeError> {
        let mut canvas = create_canvas(size, false);
        let region =
            imageops::crop_imm(source.image(), origin.0, origin.1, size.width, size.height)
                .to_image();
        drop(source);

        imageops::overlay(&mut canvas, &region, 0, 0);
        apply_white_color_key(&mut canvas);

        self.write(canvas, format, destination)
    }

    /// Encode and chmod. On failure the destination is left as it was; the
    /// backend only replaces it after a complete encode.
    fn write(
        &self,
        canvas: RgbaImage,
        format: OutputFormat,
        destination: &Path,
    ) -> Result<u64, ResizeError> {
        let canvas = DynamicImage::ImageRgba8(canvas);
        let written = self
            .backend
            .encode(&canvas, format, &self.quality, destination)
            .map_err(|source| ResizeError::EncodeFailure {
                path: destination.to_path_buf(),
                format,
                source,
            })?;
        set_output_permissions(destination);
        Ok(written)
    }
}

/// Record the chosen format in the destination directory.
///
/// The marker is shared by every image in the directory and overwritten on
/// each resize. Write failures are logged, never fatal.
pub fn write_format_marker(destination: &Path, format: OutputFormat) {
    let dir = destination.parent().unwrap_or_else(|| Path::new("."));
    let marker = dir.join(FORMAT_MARKER_FILENAME);
    if let Err(e) = std::fs::write(&marker, format.as_str()) {
        tracing::warn!(path = %marker.display(), error = %e, "could not write format marker");
    }
}

#[cfg(unix)]
fn set_output_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(OUTPUT_MODE)) {
        tracing::warn!(path = %path.display(), error = %e, "could not set output permissions");
    }
}

#[cfg(not(unix))]
fn set_output_permissions(_path: &Path) {}
