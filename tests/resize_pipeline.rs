//! End-to-end resize and crop runs against the real codec backend.
//!
//! Every test writes synthetic sources into a temp dir, runs the public
//! `ImageProcessor` API, and inspects the encoded files on disk.

use catalog_image::imaging::{
    CutRequest, Dimensions, FORMAT_MARKER_FILENAME, GenerationMethod, ImageBackend,
    ImageProcessor, OutputFormat, ProcessorSettings, QualityMode, ResizeError, ResizeRequest,
    Rotation, RustBackend,
};
use catalog_image::sniff::MimeSniffer;
use image::{ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};
use std::path::Path;
use tempfile::TempDir;

fn write_jpeg(path: &Path, img: &RgbImage) {
    let file = std::fs::File::create(path).unwrap();
    image::codecs::jpeg::JpegEncoder::new_with_quality(std::io::BufWriter::new(file), 95)
        .write_image(img.as_raw(), img.width(), img.height(), image::ExtendedColorType::Rgb8)
        .unwrap();
}

fn write_png(path: &Path, img: &RgbaImage) {
    let file = std::fs::File::create(path).unwrap();
    image::codecs::png::PngEncoder::new(std::io::BufWriter::new(file))
        .write_image(img.as_raw(), img.width(), img.height(), image::ExtendedColorType::Rgba8)
        .unwrap();
}

/// Insert a big-endian EXIF segment holding only the orientation tag.
fn add_orientation(path: &Path, orientation: u16) {
    let jpeg = std::fs::read(path).unwrap();
    let mut payload = b"Exif\0\0MM\0\x2A\0\0\0\x08\0\x01\x01\x12\0\x03\0\0\0\x01".to_vec();
    payload.extend_from_slice(&orientation.to_be_bytes());
    payload.extend_from_slice(&[0, 0, 0, 0, 0, 0]);

    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    std::fs::write(path, out).unwrap();
}

fn processor(settings: ProcessorSettings) -> ImageProcessor<RustBackend> {
    ImageProcessor::new(RustBackend::new(), settings)
}

fn identify(path: &Path) -> Dimensions {
    RustBackend::new().identify(path).unwrap().dimensions
}

fn sniff(path: &Path) -> String {
    MimeSniffer::default().sniff(path).unwrap_or_default()
}

fn marker(dir: &Path) -> String {
    std::fs::read_to_string(dir.join(FORMAT_MARKER_FILENAME)).unwrap()
}

#[test]
fn jpeg_letterboxed_into_square() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("product.jpg");
    let dst = tmp.path().join("product-square.jpg");
    write_jpeg(&src, &RgbImage::from_pixel(800, 600, Rgb([200, 30, 30])));

    let outcome = processor(ProcessorSettings::default())
        .resize(&ResizeRequest::new(&src, &dst, OutputFormat::Jpeg).with_size(400, 400))
        .unwrap();

    assert_eq!(outcome.target, Dimensions::new(400, 400));
    assert_eq!(outcome.plan.content(), Dimensions::new(400, 300));
    assert_eq!(identify(&dst), Dimensions::new(400, 400));
    assert_eq!(sniff(&dst), "image/jpeg");
    assert_eq!(marker(tmp.path()), "jpg");
    assert_eq!(outcome.bytes_written, std::fs::metadata(&dst).unwrap().len());

    // letterbox band is white, content is red (JPEG is lossy, allow slack)
    let out = image::open(&dst).unwrap().to_rgb8();
    let band = out.get_pixel(200, 10);
    assert!(band.0.iter().all(|&c| c > 240), "band {band:?}");
    let content = out.get_pixel(200, 200);
    assert!(content[0] > 180 && content[1] < 70, "content {content:?}");
}

#[cfg(unix)]
#[test]
fn output_permissions_are_group_writable() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("a.jpg");
    let dst = tmp.path().join("b.jpg");
    write_jpeg(&src, &RgbImage::from_pixel(20, 20, Rgb([1, 2, 3])));

    processor(ProcessorSettings::default())
        .resize(&ResizeRequest::new(&src, &dst, OutputFormat::Jpeg))
        .unwrap();

    let mode = std::fs::metadata(&dst).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o664);
}

#[test]
fn png_source_keeps_transparent_letterbox() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("logo.png");
    let dst = tmp.path().join("logo-out.png");
    write_png(&src, &RgbaImage::from_pixel(100, 50, Rgba([0, 0, 255, 255])));

    processor(ProcessorSettings::default())
        .resize(&ResizeRequest::new(&src, &dst, OutputFormat::Png).with_size(100, 100))
        .unwrap();

    let out = image::open(&dst).unwrap().to_rgba8();
    assert_eq!(out.dimensions(), (100, 100));
    assert_eq!(out.get_pixel(50, 5)[3], 0);
    assert_eq!(out.get_pixel(50, 50), &Rgba([0, 0, 255, 255]));
    assert_eq!(marker(tmp.path()), "png");
}

#[test]
fn webp_output_is_real_webp() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("a.jpg");
    let dst = tmp.path().join("a.webp");
    write_jpeg(&src, &RgbImage::from_pixel(64, 32, Rgb([0, 128, 0])));

    let outcome = processor(ProcessorSettings::default())
        .resize(&ResizeRequest::new(&src, &dst, OutputFormat::WebP).with_size(32, 32))
        .unwrap();

    assert_eq!(outcome.format, OutputFormat::WebP);
    assert_eq!(sniff(&dst), "image/webp");
    assert_eq!(identify(&dst), Dimensions::new(32, 32));
    // webp letterbox is transparent even for JPEG sources
    let out = image::open(&dst).unwrap().to_rgba8();
    assert_eq!(out.get_pixel(16, 2)[3], 0);
}

#[test]
fn gif_output_identifies_as_gif() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("a.png");
    let dst = tmp.path().join("a.gif");
    write_png(&src, &RgbaImage::from_pixel(30, 30, Rgba([10, 20, 30, 255])));

    processor(ProcessorSettings::default())
        .resize(&ResizeRequest::new(&src, &dst, OutputFormat::Gif).with_size(15, 15))
        .unwrap();

    assert_eq!(sniff(&dst), "image/gif");
    assert_eq!(identify(&dst), Dimensions::new(15, 15));
    assert_eq!(marker(tmp.path()), "gif");
}

#[test]
fn exif_orientation_rotates_jpeg_output() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("portrait.jpg");
    let dst = tmp.path().join("portrait-out.jpg");
    write_jpeg(&src, &RgbImage::from_pixel(40, 20, Rgb([90, 90, 90])));
    add_orientation(&src, 6);

    let outcome = processor(ProcessorSettings::default())
        .resize(&ResizeRequest::new(&src, &dst, OutputFormat::Jpeg))
        .unwrap();

    assert_eq!(outcome.rotation, Rotation::Clockwise);
    assert_eq!(identify(&dst), Dimensions::new(20, 40));
}

#[test]
fn exif_orientation_ignored_for_png_output() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("portrait.jpg");
    let dst = tmp.path().join("portrait-out.png");
    write_jpeg(&src, &RgbImage::from_pixel(40, 20, Rgb([90, 90, 90])));
    add_orientation(&src, 6);

    let outcome = processor(ProcessorSettings::default())
        .resize(&ResizeRequest::new(&src, &dst, OutputFormat::Png))
        .unwrap();

    assert_eq!(outcome.rotation, Rotation::None);
    assert_eq!(identify(&dst), Dimensions::new(40, 20));
}

#[test]
fn png_all_mode_rewrites_requested_format() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("a.jpg");
    let dst = tmp.path().join("a-out.jpg");
    write_jpeg(&src, &RgbImage::from_pixel(10, 10, Rgb([5, 5, 5])));
    let settings = ProcessorSettings {
        quality_mode: QualityMode::PngAll,
        ..ProcessorSettings::default()
    };

    let outcome = processor(settings)
        .resize(&ResizeRequest::new(&src, &dst, OutputFormat::Jpeg))
        .unwrap();

    assert_eq!(outcome.format, OutputFormat::Png);
    // the file name is the caller's business; the content is PNG
    assert_eq!(sniff(&dst), "image/png");
    assert_eq!(marker(tmp.path()), "png");
}

#[test]
fn width_priority_shrinks_canvas() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("a.jpg");
    let dst = tmp.path().join("b.jpg");
    write_jpeg(&src, &RgbImage::from_pixel(800, 600, Rgb([5, 5, 5])));
    let settings = ProcessorSettings {
        generation_method: GenerationMethod::WidthPriority,
        ..ProcessorSettings::default()
    };

    processor(settings)
        .resize(&ResizeRequest::new(&src, &dst, OutputFormat::Jpeg).with_size(400, 400))
        .unwrap();

    assert_eq!(identify(&dst), Dimensions::new(400, 300));
}

#[test]
fn small_source_is_centred_not_upscaled() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("tiny.png");
    let dst = tmp.path().join("tiny-out.png");
    write_png(&src, &RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));

    let outcome = processor(ProcessorSettings::default())
        .resize(&ResizeRequest::new(&src, &dst, OutputFormat::Png).with_size(50, 50))
        .unwrap();

    assert_eq!(outcome.plan.content(), Dimensions::new(10, 10));
    let out = image::open(&dst).unwrap().to_rgba8();
    assert_eq!(out.get_pixel(25, 25), &Rgba([255, 0, 0, 255]));
    assert_eq!(out.get_pixel(5, 5)[3], 0);
}

#[test]
fn memory_limit_refuses_without_writing() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("a.jpg");
    let dst = tmp.path().join("b.jpg");
    write_jpeg(&src, &RgbImage::from_pixel(64, 64, Rgb([5, 5, 5])));
    let settings = ProcessorSettings {
        memory_limit_bytes: Some(1024 * 1024),
        ..ProcessorSettings::default()
    };

    let err = processor(settings)
        .resize(&ResizeRequest::new(&src, &dst, OutputFormat::Jpeg))
        .unwrap_err();

    assert!(matches!(err, ResizeError::MemoryLimitExceeded { .. }));
    assert!(!dst.exists());
    assert!(!tmp.path().join(FORMAT_MARKER_FILENAME).exists());
}

#[test]
fn oversized_request_is_an_error_not_a_panic() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("a.jpg");
    let dst = tmp.path().join("b.jpg");
    write_jpeg(&src, &RgbImage::from_pixel(10, 10, Rgb([5, 5, 5])));

    let err = processor(ProcessorSettings::default())
        .resize(&ResizeRequest::new(&src, &dst, OutputFormat::Jpeg).with_size(u32::MAX, u32::MAX))
        .unwrap_err();

    assert!(matches!(err, ResizeError::MemoryLimitExceeded { .. }));
    assert!(!dst.exists());
}

#[test]
fn jpeg_output_is_progressive() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("a.png");
    let dst = tmp.path().join("a.jpg");
    write_png(&src, &RgbaImage::from_pixel(40, 30, Rgba([90, 10, 200, 255])));

    processor(ProcessorSettings::default())
        .resize(&ResizeRequest::new(&src, &dst, OutputFormat::Jpeg).with_size(20, 20))
        .unwrap();

    let bytes = std::fs::read(&dst).unwrap();
    assert!(bytes.windows(2).any(|w| w == [0xFF, 0xC2]));
}

#[test]
fn garbage_source_is_zero_width() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("fake.jpg");
    std::fs::write(&src, b"<?php system($_GET['c']); ?>").unwrap();

    let err = processor(ProcessorSettings::default())
        .resize(&ResizeRequest::new(&src, tmp.path().join("o.jpg"), OutputFormat::Jpeg))
        .unwrap_err();
    assert!(matches!(err, ResizeError::ZeroWidth(_)));
}

#[test]
fn missing_destination_dir_is_encode_failure() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("a.jpg");
    write_jpeg(&src, &RgbImage::from_pixel(8, 8, Rgb([5, 5, 5])));
    let dst = tmp.path().join("missing").join("b.jpg");

    let err = processor(ProcessorSettings::default())
        .resize(&ResizeRequest::new(&src, &dst, OutputFormat::Jpeg))
        .unwrap_err();

    assert!(matches!(err, ResizeError::EncodeFailure { .. }));
    assert!(!tmp.path().join(FORMAT_MARKER_FILENAME).exists());
}

#[test]
fn cut_region_with_white_color_key() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("sheet.png");
    let dst = tmp.path().join("tile.png");
    let mut sheet = RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 255]));
    for x in 10..20 {
        for y in 10..20 {
            sheet.put_pixel(x, y, Rgba([0, 0, 0, 255]));
        }
    }
    write_png(&src, &sheet);

    let size = processor(ProcessorSettings::default())
        .cut(&CutRequest {
            source: src,
            destination: dst.clone(),
            width: Some(10),
            height: Some(10),
            format: OutputFormat::Png,
            x: 5,
            y: 5,
        })
        .unwrap();

    assert_eq!(size, Dimensions::new(10, 10));
    let out = image::open(&dst).unwrap().to_rgba8();
    assert_eq!(out.get_pixel(0, 0)[3], 0);
    assert_eq!(out.get_pixel(9, 9), &Rgba([0, 0, 0, 255]));
    assert!(!tmp.path().join(FORMAT_MARKER_FILENAME).exists());
}
