//! High-level image operations.
//!
//! [`ImageProcessor`] combines the pure calculations with backend execution.
//! A resize runs these stages in order, stopping at the first failure:
//!
//! 1. source exists and is non-empty
//! 2. identify (headers only)
//! 3. orientation, only for JPEG output
//! 4. output format resolution against the quality mode
//! 5. fit plan
//! 6. memory budget (decoded source plus output canvas)
//! 7. decode, render, encode
//!
//! Nothing is decoded before the memory check passes, and every decoded
//! handle is released before the call returns. A canvas too large to
//! address is refused even when no limit is configured.

use super::backend::{BackendError, Dimensions, ImageBackend, SourceInfo};
use super::calculations::{
    FitPlan, OrientationResult, canvas_memory, estimate_resize_memory, exceeds_memory_limit,
    plan_fit, resolve_orientation, resolve_output_format, uses_transparent_background,
};
use super::params::{
    CutRequest, GenerationMethod, OutputFormat, QualityMode, QualitySettings, ResizeRequest,
    Rotation,
};
use super::render::Renderer;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResizeError {
    #[error("source file does not exist or is empty: {}", .0.display())]
    FileNotExist(PathBuf),
    #[error("could not read a usable width from {}", .0.display())]
    ZeroWidth(PathBuf),
    #[error("decoding needs about {required} bytes, over the {limit} byte memory limit")]
    MemoryLimitExceeded { required: u64, limit: u64 },
    #[error("failed to decode {}: {source}", .path.display())]
    DecodeFailure {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("failed to write {format} output {}: {source}", .path.display())]
    EncodeFailure {
        path: PathBuf,
        format: OutputFormat,
        #[source]
        source: BackendError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Store-wide settings applied to every operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorSettings {
    pub generation_method: GenerationMethod,
    pub quality_mode: QualityMode,
    /// `None` disables the decode memory check.
    pub memory_limit_bytes: Option<u64>,
    pub quality: QualitySettings,
}

/// What a successful resize produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResizeOutcome {
    /// Source size after orientation correction.
    pub source: Dimensions,
    /// Final canvas size.
    pub target: Dimensions,
    pub plan: FitPlan,
    pub rotation: Rotation,
    pub format: OutputFormat,
    pub bytes_written: u64,
}

/// Everything a resize would do, computed without decoding pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResizePreview {
    pub decoded: Dimensions,
    pub orientation: OrientationResult,
    pub plan: FitPlan,
    pub format: OutputFormat,
    pub transparent: bool,
    pub estimated_memory_bytes: u64,
    pub within_memory_limit: bool,
}

/// Runs resize and crop requests against one backend.
pub struct ImageProcessor<B> {
    renderer: Renderer<B>,
    generation_method: GenerationMethod,
    quality_mode: QualityMode,
    memory_limit_bytes: Option<u64>,
}

impl<B: ImageBackend> ImageProcessor<B> {
    pub fn new(backend: B, settings: ProcessorSettings) -> Self {
        Self {
            renderer: Renderer::new(backend, settings.quality),
            generation_method: settings.generation_method,
            quality_mode: settings.quality_mode,
            memory_limit_bytes: settings.memory_limit_bytes,
        }
    }

    pub fn backend(&self) -> &B {
        self.renderer.backend()
    }

    /// Resize `request.source` into a letterboxed canvas at
    /// `request.destination`.
    pub fn resize(&self, request: &ResizeRequest) -> Result<ResizeOutcome, ResizeError> {
        let preview = self.preview(request)?;

        if !preview.within_memory_limit {
            return Err(self.memory_error(preview.estimated_memory_bytes));
        }

        let handle = self
            .backend()
            .decode(&request.source)
            .map_err(|source| ResizeError::DecodeFailure {
                path: request.source.clone(),
                source,
            })?;

        let bytes_written = self.renderer.render(
            handle,
            &preview.plan,
            preview.orientation.rotation,
            preview.format,
            preview.transparent,
            &request.destination,
        )?;

        tracing::info!(
            source = %request.source.display(),
            destination = %request.destination.display(),
            size = %preview.plan.canvas(),
            format = %preview.format,
            bytes = bytes_written,
            "resized"
        );

        Ok(ResizeOutcome {
            source: preview.orientation.effective,
            target: preview.plan.canvas(),
            plan: preview.plan,
            rotation: preview.orientation.rotation,
            format: preview.format,
            bytes_written,
        })
    }

    /// Run the header-only stages of a resize: existence, identify,
    /// orientation, format resolution, fit plan and memory estimate.
    ///
    /// The memory check is reported, not enforced.
    pub fn preview(&self, request: &ResizeRequest) -> Result<ResizePreview, ResizeError> {
        ensure_source(&request.source, true)?;
        let info = self.identify(&request.source)?;

        let orientation = if request.format == OutputFormat::Jpeg {
            resolve_orientation(info.dimensions, self.orientation_tag(&request.source))
        } else {
            resolve_orientation(info.dimensions, None)
        };

        let format = resolve_output_format(
            request.format,
            info.is_png(),
            self.quality_mode,
            request.force_format,
        );
        if format != request.format {
            tracing::debug!(requested = %request.format, chosen = %format, mode = ?self.quality_mode, "output format overridden");
        }

        let plan = plan_fit(
            orientation.effective,
            request.width.unwrap_or(0),
            request.height.unwrap_or(0),
            self.generation_method,
        );
        let required = estimate_resize_memory(&info, plan.canvas());

        Ok(ResizePreview {
            decoded: info.dimensions,
            orientation,
            plan,
            format,
            transparent: uses_transparent_background(format, info.is_png()),
            estimated_memory_bytes: required.unwrap_or(u64::MAX),
            within_memory_limit: !exceeds_memory_limit(required, self.memory_limit_bytes),
        })
    }

    /// Copy a region of `request.source` onto a white canvas.
    ///
    /// Returns the canvas size.
    pub fn cut(&self, request: &CutRequest) -> Result<Dimensions, ResizeError> {
        ensure_source(&request.source, false)?;

        let handle = self
            .backend()
            .decode(&request.source)
            .map_err(|source| ResizeError::DecodeFailure {
                path: request.source.clone(),
                source,
            })?;
        let source_size = handle.dimensions();

        let size = Dimensions::new(
            request.width.filter(|&w| w > 0).unwrap_or(source_size.width),
            request.height.filter(|&h| h > 0).unwrap_or(source_size.height),
        );
        let required = canvas_memory(size);
        if exceeds_memory_limit(required, self.memory_limit_bytes) {
            return Err(self.memory_error(required.unwrap_or(u64::MAX)));
        }

        let bytes = self.renderer.cut(
            handle,
            size,
            (request.x, request.y),
            request.format,
            &request.destination,
        )?;

        tracing::info!(
            source = %request.source.display(),
            destination = %request.destination.display(),
            %size,
            x = request.x,
            y = request.y,
            bytes,
            "cut"
        );
        Ok(size)
    }

    fn memory_error(&self, required: u64) -> ResizeError {
        tracing::info!(required, limit = ?self.memory_limit_bytes, "refused over memory budget");
        ResizeError::MemoryLimitExceeded {
            required,
            limit: self.memory_limit_bytes.unwrap_or(isize::MAX as u64),
        }
    }

    fn identify(&self, path: &Path) -> Result<SourceInfo, ResizeError> {
        match self.backend().identify(path) {
            Ok(info) if info.dimensions.width > 0 => Ok(info),
            Ok(_) => Err(ResizeError::ZeroWidth(path.to_path_buf())),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "identify failed");
                Err(ResizeError::ZeroWidth(path.to_path_buf()))
            }
        }
    }

    fn orientation_tag(&self, path: &Path) -> Option<u32> {
        match self.backend().read_orientation(path) {
            Ok(tag) => tag,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "orientation unavailable, assuming upright");
                None
            }
        }
    }
}

fn ensure_source(path: &Path, require_content: bool) -> Result<(), ResizeError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && (!require_content || meta.len() > 0) => Ok(()),
        Ok(_) => Err(ResizeError::FileNotExist(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ResizeError::FileNotExist(path.to_path_buf()))
        }
        Err(e) => Err(ResizeError::Io(e)),
    }
}
