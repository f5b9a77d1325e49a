//! Pure Rust codec backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader` header decode (no pixels) |
//! | EXIF orientation | `kamadak-exif` container reader |
//! | Decode (GIF, JPEG, PNG, WebP) | `image` crate decoders |
//! | Encode → GIF | `image::codecs::gif::GifEncoder` (palette quantized) |
//! | Encode → PNG | `image::codecs::png::PngEncoder`, level mapped to compression type |
//! | Encode → JPEG | `jpeg-encoder`, progressive, with quality |
//! | Encode → WebP | `webp` (libwebp), lossy with quality |
//!
//! Output is encoded into a temporary file next to the destination and
//! renamed over it only once the encoder succeeded, so a failed encode
//! leaves any previous file untouched.

use super::backend::{BackendError, Dimensions, ImageBackend, ImageHandle, SourceInfo};
use super::params::{OutputFormat, QualitySettings};
use image::codecs::gif::GifEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{DynamicImage, Frame, ImageDecoder, ImageReader};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Backend built on the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn open_reader(path: &Path) -> Result<ImageReader<BufReader<File>>, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)
}

/// Map a 0–9 zlib level onto the encoder's coarse compression presets.
fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

fn encode_failed(format: OutputFormat, e: image::ImageError) -> BackendError {
    BackendError::ProcessingFailed(format!("{format} encode failed: {e}"))
}

/// Encode `image` into `writer` with the format-specific encoder.
fn write_encoded<W: Write>(
    mut writer: W,
    image: &DynamicImage,
    format: OutputFormat,
    quality: &QualitySettings,
) -> Result<(), BackendError> {
    match format {
        OutputFormat::Gif => {
            let mut encoder = GifEncoder::new(writer);
            encoder
                .encode_frame(Frame::new(image.to_rgba8()))
                .map_err(|e| encode_failed(format, e))
        }
        OutputFormat::Png => {
            let encoder = PngEncoder::new_with_quality(
                writer,
                png_compression(quality.png_compression),
                PngFilter::Adaptive,
            );
            image
                .write_with_encoder(encoder)
                .map_err(|e| encode_failed(format, e))
        }
        OutputFormat::Jpeg => write_progressive_jpeg(writer, image, quality.jpeg.value()),
        OutputFormat::WebP => {
            let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
            let encoder = webp::Encoder::from_image(&rgba)
                .map_err(|e| BackendError::ProcessingFailed(format!("webp encode failed: {e}")))?;
            let encoded = encoder.encode(f32::from(quality.webp.value()));
            writer.write_all(&encoded)?;
            Ok(())
        }
    }
}

/// Progressive JPEG. JPEG has no alpha channel; the canvas is already opaque.
fn write_progressive_jpeg<W: Write>(
    writer: W,
    image: &DynamicImage,
    quality: u8,
) -> Result<(), BackendError> {
    let too_large = || BackendError::Unsupported("JPEG dimensions above 65535 pixels");
    let width = u16::try_from(image.width()).map_err(|_| too_large())?;
    let height = u16::try_from(image.height()).map_err(|_| too_large())?;

    let mut encoder = jpeg_encoder::Encoder::new(writer, quality);
    encoder.set_progressive(true);
    encoder
        .encode(image.to_rgb8().as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| BackendError::ProcessingFailed(format!("jpg encode failed: {e}")))
}

/// Directory the staging file is created in.
fn staging_dir(output: &Path) -> &Path {
    match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<SourceInfo, BackendError> {
        let reader = open_reader(path)?;
        let format = reader.format();
        let decoder = reader.into_decoder().map_err(|e| {
            BackendError::ProcessingFailed(format!(
                "Failed to read headers of {}: {}",
                path.display(),
                e
            ))
        })?;
        let (width, height) = decoder.dimensions();
        Ok(SourceInfo {
            dimensions: Dimensions { width, height },
            format,
            bytes_per_pixel: decoder.color_type().bytes_per_pixel(),
        })
    }

    fn read_orientation(&self, path: &Path) -> Result<Option<u32>, BackendError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let exif = match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(_)) => return Ok(None),
            Err(e) => {
                return Err(BackendError::ProcessingFailed(format!(
                    "Failed to read EXIF from {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        Ok(exif
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0)))
    }

    fn decode(&self, path: &Path) -> Result<ImageHandle, BackendError> {
        let image = open_reader(path)?.decode().map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })?;
        Ok(ImageHandle::new(image))
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: &QualitySettings,
        output: &Path,
    ) -> Result<u64, BackendError> {
        let mut staged = tempfile::Builder::new()
            .prefix(".catalog-image-")
            .tempfile_in(staging_dir(output))?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            write_encoded(&mut writer, image, format, quality)?;
            writer.flush()?;
        }
        let written = staged.as_file().metadata()?.len();
        staged
            .persist(output)
            .map_err(|e| BackendError::Io(e.error))?;
        Ok(written)
    }
}
