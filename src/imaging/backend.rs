//! Image codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the single codec capability the rest of the
//! crate depends on: identify, read_orientation, decode, and encode. All
//! geometry and pixel compositing happens above it, so swapping the backend
//! (e.g. for a recording mock in tests) never changes resize semantics.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate's pure Rust codecs.

use super::params::{OutputFormat, QualitySettings, Rotation};
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Not supported by this backend: {0}")]
    Unsupported(&'static str),
}

/// Pixel dimensions, always whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Header-level facts about a source file, read without decoding pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    pub dimensions: Dimensions,
    pub format: Option<ImageFormat>,
    /// Decoded bytes per pixel (channels × bytes per channel).
    pub bytes_per_pixel: u8,
}

impl SourceInfo {
    pub fn is_png(&self) -> bool {
        self.format == Some(ImageFormat::Png)
    }
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// A decoded bitmap owned by exactly one operation.
///
/// The pixels are released when the handle is dropped, which happens on
/// every exit path of the operation that decoded it. An optional release
/// hook runs at that moment.
pub struct ImageHandle {
    image: DynamicImage,
    on_release: Option<ReleaseHook>,
}

impl ImageHandle {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            on_release: None,
        }
    }

    /// Wrap an image and run `hook` once when the handle is released.
    pub fn with_release_hook(image: DynamicImage, hook: impl FnOnce() + Send + 'static) -> Self {
        Self {
            image,
            on_release: Some(Box::new(hook)),
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.image.width(), self.image.height())
    }

    /// Rotate in place. `Rotation::Clockwise` turns the picture 90° clockwise.
    pub fn rotate(&mut self, rotation: Rotation) {
        self.image = match rotation {
            Rotation::None => return,
            Rotation::Clockwise => self.image.rotate90(),
            Rotation::CounterClockwise => self.image.rotate270(),
            Rotation::UpsideDown => self.image.rotate180(),
        };
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("dimensions", &self.dimensions())
            .field("color", &self.image.color())
            .finish()
    }
}

impl Drop for ImageHandle {
    fn drop(&mut self) {
        tracing::trace!(dimensions = %self.dimensions(), "releasing image handle");
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

/// Codec capability used by the resize and crop operations.
pub trait ImageBackend {
    /// Read dimensions, container format and pixel depth from headers.
    fn identify(&self, path: &Path) -> Result<SourceInfo, BackendError>;

    /// Read the EXIF orientation tag. `Ok(None)` when the tag is absent,
    /// `Err(BackendError::Unsupported)` when the backend cannot read metadata.
    fn read_orientation(&self, path: &Path) -> Result<Option<u32>, BackendError>;

    /// Decode the full bitmap.
    fn decode(&self, path: &Path) -> Result<ImageHandle, BackendError>;

    /// Encode `image` to `output`, returning the number of bytes written.
    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: &QualitySettings,
        output: &Path,
    ) -> Result<u64, BackendError>;
}
